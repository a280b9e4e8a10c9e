//! Alert envelope and the sink trait.

use async_trait::async_trait;

use crate::delivery::email::EmailError;

/// Connection to the broker keeps failing.
pub const MSG_BROKER_CONNECTION: &str = "FAILURE - BROKER CONNECTION";

/// The consumption loop stopped on an error it could not recover from.
pub const MSG_QUEUE_CONSUMPTION: &str = "FAILURE - QUEUE CONSUMPTION";

/// Required configuration is missing or invalid.
pub const MSG_CONFIGURATION: &str = "FAILURE - CONFIGURATION";

/// A failure worth telling an operator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureAlert {
    /// Identity of the dispatcher instance raising the alert.
    pub worker: String,
    /// Short, human-readable failure description.
    pub message: String,
}

impl FailureAlert {
    pub fn new(worker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            message: message.into(),
        }
    }

    /// Subject line used by every delivery channel: `<worker>: <message>`.
    pub fn subject(&self) -> String {
        format!("{}: {}", self.worker, self.message)
    }
}

/// Error raised by an [`AlertSink`].
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error(transparent)]
    Email(#[from] EmailError),
}

/// Outbound channel for failure alerts.
///
/// Implementations deliver the alert and return once the transport has
/// accepted it. Throttling is the caller's concern.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &FailureAlert) -> Result<(), AlertError>;
}
