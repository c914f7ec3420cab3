//! Backend pool and round-robin selection.

pub mod dispatcher;
pub mod liveness;
pub mod target;

pub use dispatcher::{DispatchError, Dispatcher, UNAVAILABLE_BODY};
pub use liveness::{HealthTransition, Liveness, Probe};
pub use target::{Forward, Target, TargetError};
