/// Errors raised while talking to the broker.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Could not open a connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The broker rejected channel, QoS, queue or consumer setup on a live
    /// connection.
    #[error("Setup error: {0}")]
    Setup(String),

    /// An established connection or delivery stream broke.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// A message could not be acknowledged or returned to its queue.
    #[error("Acknowledgement failed: {0}")]
    Ack(String),
}

impl BrokerError {
    /// Whether reconnecting is expected to help.
    ///
    /// Setup errors mean the broker itself refused our topology (for
    /// example a queue declared elsewhere with different arguments);
    /// retrying would fail the same way.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Setup(_))
    }
}
