use std::{sync::Arc, time::Duration};

use http::Uri;
use hyper::Request;
use log::{debug, error, info};
use rand::Rng;
use tokio::{
    task::JoinHandle,
    time::{Interval, MissedTickBehavior},
};

use roundabout_lb::{HealthTransition, Probe};
use roundabout_transport::{HttpClient, empty_body, forwarder::join_uri};

use crate::Pool;

fn log_health_transition(address: &str, transition: HealthTransition) {
    match transition {
        HealthTransition::BecameHealthy => {
            info!("Backend {} became healthy", address);
        }
        HealthTransition::BecameUnhealthy => {
            error!("Backend {} became unhealthy", address);
        }
    }
}

fn health_uri(target: &Uri, path: &str) -> Option<Uri> {
    let path = if path.is_empty() { "/" } else { path };
    let path: Uri = path.parse().ok()?;
    join_uri(target, &path).ok()
}

/// A single probe: 2xx within `timeout` counts as healthy.
pub async fn check_once(client: &HttpClient, uri: &Uri, timeout: Duration) -> bool {
    let request = match Request::get(uri.clone()).body(empty_body()) {
        Ok(req) => req,
        Err(_) => return false,
    };

    match tokio::time::timeout(timeout, client.send(request)).await {
        Ok(Ok(response)) => response.status().is_success(),
        Ok(Err(e)) => {
            debug!("Health check {} failed: {}", uri, e);
            false
        }
        Err(_) => {
            debug!("Health check {} timed out", uri);
            false
        }
    }
}

// Fixed-rate ticker; a slow check delays the next tick instead of bursting.
fn probe_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run_probe(address: String, uri: Uri, probe: Arc<Probe>, client: HttpClient) {
    let health = probe.health_check();
    let interval_ms = health.interval.max(1);
    let interval = Duration::from_millis(interval_ms);
    let timeout = Duration::from_millis(health.timeout_ms.max(1));

    // Spread the first round so probes do not fire in lockstep.
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..interval_ms));
    tokio::time::sleep(jitter).await;

    let mut ticker = probe_ticker(interval);
    loop {
        ticker.tick().await;

        let transition = if check_once(&client, &uri, timeout).await {
            probe.record_success()
        } else {
            probe.record_failure()
        };

        if let Some(transition) = transition {
            log_health_transition(&address, transition);
        }
    }
}

/// Starts one background prober per target whose liveness is probed.
pub fn spawn_health_checks(pool: &Arc<Pool>, client: &HttpClient) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    for target in pool.targets() {
        let Some(probe) = target.liveness().probe() else {
            continue;
        };

        let Some(uri) = health_uri(target.uri(), &probe.health_check().path) else {
            error!(
                "Health checks disabled for {}: invalid path '{}'",
                target.address(),
                probe.health_check().path
            );
            continue;
        };

        debug!("Probing {} every {}ms", uri, probe.health_check().interval);
        handles.push(tokio::spawn(run_probe(
            target.address().to_string(),
            uri,
            probe.clone(),
            client.clone(),
        )));
    }

    handles
}
