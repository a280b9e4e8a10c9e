//! Operator alerting for the robot dispatcher.
//!
//! - [`AlertSink`] -- the seam the dispatcher reports failures through.
//! - [`FailureAlert`] -- the alert envelope (worker identity + message).
//! - [`delivery`] -- concrete sinks: SMTP email and log-only.

pub mod alert;
pub mod delivery;

pub use alert::{AlertError, AlertSink, FailureAlert};
pub use delivery::email::{EmailConfig, EmailDelivery};
pub use delivery::log::LogAlertSink;
