use std::future::Future;

use http::Uri;

use crate::liveness::Liveness;

/// Relays a request to the upstream a forwarder was bound to.
pub trait Forward<Req>: Send + Sync {
    type Response;
    type Error;

    fn forward(
        &self,
        req: Req,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    InvalidUri { address: String, reason: String },
    UnsupportedScheme { address: String, scheme: String },
    MissingAuthority { address: String },
}

impl std::fmt::Display for TargetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetError::InvalidUri { address, reason } => {
                write!(f, "invalid backend address '{address}': {reason}")
            }
            TargetError::UnsupportedScheme { address, scheme } => {
                write!(
                    f,
                    "unsupported scheme '{scheme}' in backend address '{address}' (expected http or https)"
                )
            }
            TargetError::MissingAuthority { address } => {
                write!(f, "backend address '{address}' has no host")
            }
        }
    }
}

impl std::error::Error for TargetError {}

/// One upstream server in the pool.
#[derive(Debug)]
pub struct Target<F> {
    address: String,
    uri: Uri,
    liveness: Liveness,
    forwarder: F,
}

impl<F> Target<F> {
    /// Parses `address` and binds a forwarder to the parsed URI. Nothing is
    /// constructed when the address is rejected.
    pub fn bind<B>(address: &str, liveness: Liveness, bind: B) -> Result<Self, TargetError>
    where
        B: FnOnce(&Uri) -> F,
    {
        let uri = parse_address(address)?;
        let forwarder = bind(&uri);

        Ok(Self {
            address: address.to_string(),
            uri,
            liveness,
            forwarder,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    pub async fn forward<Req>(&self, req: Req) -> Result<F::Response, F::Error>
    where
        F: Forward<Req>,
    {
        self.forwarder.forward(req).await
    }
}

fn parse_address(address: &str) -> Result<Uri, TargetError> {
    let uri: Uri = address.parse().map_err(|err: http::uri::InvalidUri| {
        TargetError::InvalidUri {
            address: address.to_string(),
            reason: err.to_string(),
        }
    })?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(scheme) => {
            return Err(TargetError::UnsupportedScheme {
                address: address.to_string(),
                scheme: scheme.to_string(),
            });
        }
        None => {
            return Err(TargetError::InvalidUri {
                address: address.to_string(),
                reason: "missing scheme".to_string(),
            });
        }
    }

    if uri.authority().is_none() {
        return Err(TargetError::MissingAuthority {
            address: address.to_string(),
        });
    }

    Ok(uri)
}
