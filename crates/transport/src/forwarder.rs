use std::{future::Future, sync::Arc};

use bytes::Bytes;
use http::{
    HeaderMap, HeaderValue, Uri,
    header::{self, HeaderName},
    uri::PathAndQuery,
};
use http_body_util::BodyExt;
use hyper::{Request, Response, body::Body};
use log::debug;
use tokio::sync::Semaphore;

use roundabout_lb::Forward;

use crate::client::{HttpClient, ProxyBody};

#[derive(Debug)]
pub enum ForwardError {
    InvalidUri(String),
    Closed,
    Send(hyper_util::client::legacy::Error),
}

impl std::fmt::Display for ForwardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardError::InvalidUri(reason) => write!(f, "invalid upstream uri: {reason}"),
            ForwardError::Closed => write!(f, "forwarder closed"),
            ForwardError::Send(err) => write!(f, "send failed: {err}"),
        }
    }
}

impl std::error::Error for ForwardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ForwardError::Send(err) => Some(err),
            _ => None,
        }
    }
}

const HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "proxy-authenticate",
    "proxy-authorization",
];

fn strip_hop_headers(headers: &mut HeaderMap) {
    // Headers listed in Connection are hop-by-hop too.
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in &listed {
        headers.remove(name);
    }
    for name in HOP_HEADERS {
        headers.remove(*name);
    }
}

fn single_joining_slash(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Rebases `incoming` onto `base`: scheme and authority come from `base`, the
/// paths are joined and both query strings are kept.
pub fn join_uri(base: &Uri, incoming: &Uri) -> Result<Uri, ForwardError> {
    let path = single_joining_slash(base.path(), incoming.path());
    let query = [base.query(), incoming.query()]
        .into_iter()
        .flatten()
        .filter(|query| !query.is_empty())
        .collect::<Vec<_>>()
        .join("&");

    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    };

    let mut parts = base.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|err| ForwardError::InvalidUri(err.to_string()))?,
    );

    Uri::from_parts(parts).map_err(|err| ForwardError::InvalidUri(err.to_string()))
}

/// Forwards requests to one fixed upstream.
pub struct HttpForwarder {
    base: Uri,
    client: HttpClient,
    inflight: Arc<Semaphore>,
}

impl HttpForwarder {
    pub fn new(base: Uri, client: HttpClient, max_inflight: usize) -> Self {
        Self {
            base,
            client,
            inflight: Arc::new(Semaphore::new(max_inflight.max(1))),
        }
    }

    pub async fn send<B>(&self, req: Request<B>) -> Result<Response<ProxyBody>, ForwardError>
    where
        B: Body<Data = Bytes, Error = hyper::Error> + Send + 'static,
    {
        let (mut parts, body) = req.into_parts();

        parts.uri = join_uri(&self.base, &parts.uri)?;
        strip_hop_headers(&mut parts.headers);
        if !parts.headers.contains_key(header::HOST)
            && let Some(authority) = self.base.authority()
            && let Ok(host) = HeaderValue::from_str(authority.as_str())
        {
            parts.headers.insert(header::HOST, host);
        }

        debug!("{} {} -> {}", parts.method, parts.uri.path(), self.base);
        let req = Request::from_parts(parts, body.boxed_unsync());

        let response = {
            let _permit = self
                .inflight
                .acquire()
                .await
                .map_err(|_| ForwardError::Closed)?;
            self.client.send(req).await.map_err(ForwardError::Send)?
        };

        let (mut parts, body) = response.into_parts();
        strip_hop_headers(&mut parts.headers);
        Ok(Response::from_parts(parts, body.boxed_unsync()))
    }
}

impl<B> Forward<Request<B>> for HttpForwarder
where
    B: Body<Data = Bytes, Error = hyper::Error> + Send + 'static,
{
    type Response = Response<ProxyBody>;
    type Error = ForwardError;

    fn forward(
        &self,
        req: Request<B>,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        self.send(req)
    }
}
