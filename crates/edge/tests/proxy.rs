use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use hyper::{Request, Response, StatusCode, body::Incoming, service::service_fn};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::{TokioExecutor, TokioIo},
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

use roundabout_config::config::{Backend, Config, HealthCheck, Listen};
use roundabout_edge::ProxyServer;

// Answers "<name> <path>" everywhere and reports `/health` from `healthy`.
async fn start_backend(name: &'static str, healthy: Arc<AtomicBool>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let healthy = healthy.clone();
            let service = service_fn(move |req: Request<Incoming>| {
                let healthy = healthy.clone();
                async move {
                    let body = format!("{name} {}", req.uri().path());
                    let mut response = Response::new(Full::new(Bytes::from(body)));
                    if req.uri().path() == "/health" && !healthy.load(Ordering::SeqCst) {
                        *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
                    }
                    Ok::<_, Infallible>(response)
                }
            });

            tokio::spawn(async move {
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    format!("http://127.0.0.1:{port}")
}

// Accepts requests and never answers them.
async fn start_stalled_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let service = service_fn(|_req: Request<Incoming>| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, Infallible>(Response::new(Full::new(Bytes::new())))
            });

            tokio::spawn(async move {
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    format!("http://127.0.0.1:{port}")
}

fn config(backends: Vec<String>, liveness: &str) -> Config {
    Config {
        listen: Listen {
            address: "127.0.0.1".to_string(),
            port: 0,
        },
        backends: backends.into_iter().map(Backend::Simple).collect(),
        liveness: liveness.to_string(),
        health_check: HealthCheck {
            path: "/health".to_string(),
            interval: 20,
            timeout_ms: 200,
            failure_threshold: 1,
            success_threshold: 1,
            cooldown_ms: 0,
        },
        ..Config::default()
    }
}

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

async fn start_proxy(config: Config) -> Running {
    let server = ProxyServer::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve(async move {
        let _ = stopped.await;
    }));

    Running { addr, stop, task }
}

async fn get(addr: SocketAddr, path: &str) -> (StatusCode, String) {
    let client: Client<HttpConnector, Empty<Bytes>> =
        Client::builder(TokioExecutor::new()).build_http();
    let response = client
        .get(format!("http://{addr}{path}").parse().unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn alive() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(true))
}

#[tokio::test]
async fn requests_rotate_across_backends() {
    let a = start_backend("a", alive()).await;
    let b = start_backend("b", alive()).await;
    let c = start_backend("c", alive()).await;
    let proxy = start_proxy(config(vec![a, b, c], "always")).await;

    let mut seen = Vec::new();
    for _ in 0..6 {
        let (status, body) = get(proxy.addr, "/hello").await;
        assert_eq!(status, StatusCode::OK);
        seen.push(body);
    }

    assert_eq!(
        seen,
        vec!["a /hello", "b /hello", "c /hello", "a /hello", "b /hello", "c /hello"]
    );
}

#[tokio::test]
async fn empty_pool_answers_service_unavailable() {
    let proxy = start_proxy(config(Vec::new(), "always")).await;

    for _ in 0..3 {
        let (status, body) = get(proxy.addr, "/").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "No available server\n");
    }
}

#[tokio::test]
async fn unreachable_backend_is_a_bad_gateway_without_failover() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let live = start_backend("live", alive()).await;

    let proxy = start_proxy(config(vec![dead, live], "always")).await;

    let (status, body) = get(proxy.addr, "/").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, "upstream error\n");

    // The failed target stays in rotation.
    let (status, body) = get(proxy.addr, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "live /");
    let (status, _) = get(proxy.addr, "/").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn probed_liveness_skips_sick_backend() {
    let sick_flag = Arc::new(AtomicBool::new(false));
    let sick = start_backend("sick", sick_flag.clone()).await;
    let well = start_backend("well", alive()).await;
    let proxy = start_proxy(config(vec![sick, well], "probed")).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    for _ in 0..4 {
        let (_, body) = get(proxy.addr, "/").await;
        assert_eq!(body, "well /");
    }

    sick_flag.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut bodies = Vec::new();
    for _ in 0..4 {
        bodies.push(get(proxy.addr, "/").await.1);
    }
    assert!(bodies.contains(&"sick /".to_string()));
    assert!(bodies.contains(&"well /".to_string()));
}

#[tokio::test]
async fn shutdown_stops_the_listener() {
    let a = start_backend("a", alive()).await;
    let proxy = start_proxy(config(vec![a], "always")).await;

    let (status, _) = get(proxy.addr, "/").await;
    assert_eq!(status, StatusCode::OK);

    proxy.stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), proxy.task)
        .await
        .unwrap()
        .unwrap();

    assert!(tokio::net::TcpStream::connect(proxy.addr).await.is_err());
}

#[tokio::test]
async fn drain_timeout_aborts_stuck_connections() {
    let stalled = start_stalled_backend().await;
    let mut config = config(vec![stalled], "always");
    config.drain_timeout_ms = 100;
    let proxy = start_proxy(config).await;

    let addr = proxy.addr;
    let pending = tokio::spawn(async move {
        let client: Client<HttpConnector, Empty<Bytes>> =
            Client::builder(TokioExecutor::new()).build_http();
        client.get(format!("http://{addr}/slow").parse().unwrap()).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    proxy.stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), proxy.task)
        .await
        .unwrap()
        .unwrap();

    // The in-flight exchange is cut instead of waiting on the backend.
    let outcome = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.is_err());
}
