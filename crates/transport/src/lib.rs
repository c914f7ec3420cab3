pub mod client;
pub mod forwarder;

pub use client::{HttpClient, ProxyBody, empty_body, full_body};
pub use forwarder::{ForwardError, HttpForwarder};
