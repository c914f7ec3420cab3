use std::{sync::Arc, time::Duration};

use roundabout_config::config::Config;
use roundabout_lb::{Dispatcher, Liveness, Target, TargetError};
use roundabout_transport::{HttpClient, HttpForwarder};
use tokio::net::TcpListener;

pub mod health;
pub mod server;

/// The dispatcher as wired for real HTTP traffic.
pub type Pool = Dispatcher<HttpForwarder>;

#[derive(Debug)]
pub enum ProxyError {
    Config(String),
    Tls(String),
    Target(TargetError),
    Bind {
        address: String,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError::Config(msg) => write!(f, "Config error: {}", msg),
            ProxyError::Tls(msg) => write!(f, "TLS client error: {}", msg),
            ProxyError::Target(err) => write!(f, "Target error: {}", err),
            ProxyError::Bind { address, source } => {
                write!(f, "Failed to bind {}: {}", address, source)
            }
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Config(_) | ProxyError::Tls(_) => None,
            ProxyError::Target(err) => Some(err),
            ProxyError::Bind { source, .. } => Some(source),
        }
    }
}

impl From<TargetError> for ProxyError {
    fn from(err: TargetError) -> Self {
        ProxyError::Target(err)
    }
}

pub struct ProxyServer {
    pub listener: TcpListener,
    pub client: HttpClient,
    pub pool: Arc<Pool>,
    pub drain_timeout: Duration,
}

/// Builds one target per configured backend, in configuration order. Any
/// unusable address aborts the whole build.
pub fn build_pool(config: &Config, client: &HttpClient) -> Result<Pool, ProxyError> {
    let mut targets = Vec::with_capacity(config.backends.len());

    for address in config.backend_addresses() {
        let liveness = Liveness::from_config(&config.liveness, &config.health_check)
            .map_err(ProxyError::Config)?;
        let target = Target::bind(&address, liveness, |uri| {
            HttpForwarder::new(uri.clone(), client.clone(), config.max_inflight)
        })?;
        targets.push(target);
    }

    Ok(Dispatcher::new(config.listen.port, targets))
}
