use std::sync::{Mutex, PoisonError};

use http::StatusCode;
use log::{info, warn};

use crate::target::{Forward, Target};

pub const UNAVAILABLE_BODY: &str = "No available server\n";

#[derive(Debug)]
pub enum DispatchError<E> {
    /// No target in the pool is alive, or the pool is empty.
    Unavailable,
    /// The chosen target's forwarder failed. Passed through untouched.
    Upstream(E),
}

impl<E> DispatchError<E> {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for DispatchError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Unavailable => write!(f, "no available server"),
            DispatchError::Upstream(err) => write!(f, "upstream error: {err}"),
        }
    }
}

impl<E> std::error::Error for DispatchError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Unavailable => None,
            DispatchError::Upstream(err) => Some(err),
        }
    }
}

/// Round-robin dispatcher over a static pool of targets.
pub struct Dispatcher<F> {
    listen_port: u16,
    targets: Vec<Target<F>>,
    // Position right after the last selected target.
    cursor: Mutex<usize>,
}

impl<F> Dispatcher<F> {
    pub fn new(listen_port: u16, targets: Vec<Target<F>>) -> Self {
        Self {
            listen_port,
            targets,
            cursor: Mutex::new(0),
        }
    }

    pub fn port(&self) -> u16 {
        self.listen_port
    }

    pub fn targets(&self) -> &[Target<F>] {
        &self.targets
    }

    /// Picks the first alive target at or after the cursor, wrapping around
    /// once. The cursor moves past the pick; it stays put when nothing is
    /// alive.
    pub fn select_next(&self) -> Option<&Target<F>> {
        let len = self.targets.len();
        if len == 0 {
            return None;
        }

        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        for offset in 0..len {
            let index = (*cursor + offset) % len;
            let target = &self.targets[index];
            if target.is_alive() {
                *cursor = (index + 1) % len;
                return Some(target);
            }
        }

        None
    }

    pub async fn dispatch<Req>(&self, req: Req) -> Result<F::Response, DispatchError<F::Error>>
    where
        F: Forward<Req>,
    {
        let Some(target) = self.select_next() else {
            warn!("No available server among {} targets", self.targets.len());
            return Err(DispatchError::Unavailable);
        };

        info!("Forwarding request to address {:?}", target.address());
        target.forward(req).await.map_err(DispatchError::Upstream)
    }
}
