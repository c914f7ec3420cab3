use std::{convert::Infallible, future::Future, net::SocketAddr, sync::Arc, time::Duration};

use http::{HeaderValue, StatusCode, header};
use hyper::{Request, Response, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::{rt::TokioIo, server::graceful::GracefulShutdown};
use log::{debug, error, info, warn};
use tokio::{net::TcpListener, task::JoinSet};

use roundabout_config::config::Config;
use roundabout_lb::{DispatchError, UNAVAILABLE_BODY};
use roundabout_transport::{HttpClient, ProxyBody, full_body};

use crate::{Pool, ProxyError, ProxyServer, build_pool, health::spawn_health_checks};

const UPSTREAM_ERROR_BODY: &str = "upstream error\n";

fn simple_response(status: StatusCode, body: &'static str) -> Response<ProxyBody> {
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Hands one inbound request to the pool and turns a dispatch failure into
/// a plain-text response.
pub async fn proxy(pool: &Pool, req: Request<Incoming>) -> Response<ProxyBody> {
    match pool.dispatch(req).await {
        Ok(response) => response,
        Err(DispatchError::Unavailable) => {
            simple_response(StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_BODY)
        }
        Err(err @ DispatchError::Upstream(_)) => {
            error!("{}", err);
            simple_response(err.status(), UPSTREAM_ERROR_BODY)
        }
    }
}

impl ProxyServer {
    pub async fn bind(config: &Config) -> Result<Self, ProxyError> {
        let client = HttpClient::new().map_err(|e| ProxyError::Tls(e.to_string()))?;
        let pool = Arc::new(build_pool(config, &client)?);

        let address = format!("{}:{}", config.listen.address, config.listen.port);
        let listener = TcpListener::bind(address.as_str())
            .await
            .map_err(|source| ProxyError::Bind {
                address: address.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            client,
            pool,
            drain_timeout: Duration::from_millis(config.drain_timeout_ms),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves, then waits up to
    /// `drain_timeout` for open connections to finish. Connections still open
    /// after that are aborted.
    pub async fn serve<S>(self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        match self.local_addr() {
            Ok(addr) => info!("Listening on {}", addr),
            Err(_) => info!("Listening on port {}", self.pool.port()),
        }

        let probes = spawn_health_checks(&self.pool, &self.client);
        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        let mut shutdown = std::pin::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Failed to accept connection: {:?}", e);
                            continue;
                        }
                    };
                    debug!("Accepted connection from {}", peer);

                    let pool = self.pool.clone();
                    let service = service_fn(move |req: Request<Incoming>| {
                        let pool = pool.clone();
                        async move { Ok::<_, Infallible>(proxy(&pool, req).await) }
                    });

                    let connection = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service);
                    let connection = graceful.watch(connection);

                    connections.spawn(async move {
                        if let Err(e) = connection.await {
                            debug!("Connection from {} ended with error: {:?}", peer, e);
                        }
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut shutdown => {
                    info!("Draining connections");
                    break;
                }
            }
        }

        drop(self.listener);
        for probe in probes {
            probe.abort();
        }

        tokio::select! {
            _ = graceful.shutdown() => info!("All connections closed"),
            _ = tokio::time::sleep(self.drain_timeout) => {
                warn!(
                    "Drain timeout reached, aborting {} remaining connections",
                    connections.len()
                );
                connections.abort_all();
            }
        }

        while connections.join_next().await.is_some() {}
    }
}
