use std::{convert::Infallible, net::SocketAddr};

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::{Request, Response, body::Incoming, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(version, about = "Minimal HTTP/1 backend for trying out roundabout")]
struct Cli {
    #[arg(long, default_value_t = 8081)]
    port: u16,

    /// Text every response carries
    #[arg(long, default_value = "backend")]
    name: String,
}

fn reply_body(name: &str, path: &str) -> String {
    if path == "/health" {
        "ok\n".to_string()
    } else {
        format!("{}\n", name)
    }
}

async fn handle_request(
    name: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let body = reply_body(name, req.uri().path());
    Ok(Response::new(Full::new(Bytes::from(body))))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let addr: SocketAddr = format!("127.0.0.1:{}", cli.port).parse()?;

    let listener = TcpListener::bind(addr).await?;
    println!("{} listening on http://{}", cli.name, addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let name = cli.name.clone();
        let service = service_fn(move |req| {
            let name = name.clone();
            async move { handle_request(&name, req).await }
        });

        tokio::spawn(async move {
            let _ = hyper::server::conn::http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_with_its_name() {
        assert_eq!(reply_body("alpha", "/"), "alpha\n");
        assert_eq!(reply_body("alpha", "/orders/7?x=1"), "alpha\n");
    }

    #[test]
    fn health_is_ok() {
        assert_eq!(reply_body("alpha", "/health"), "ok\n");
    }
}
