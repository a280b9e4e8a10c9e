use async_trait::async_trait;

use crate::alert::{AlertError, AlertSink, FailureAlert};

/// Sink that only writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send(&self, alert: &FailureAlert) -> Result<(), AlertError> {
        tracing::warn!(
            worker = %alert.worker,
            message = %alert.message,
            "Failure alert (no email transport configured)",
        );
        Ok(())
    }
}
