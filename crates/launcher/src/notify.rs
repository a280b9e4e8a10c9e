//! Side notification channel to a freshly started robot.
//!
//! Robots listen on a local WebSocket endpoint once they are up. The
//! dispatcher connects as a client, sends the job as one JSON text frame
//! and closes; no reply is expected.

use async_trait::async_trait;
use futures::SinkExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use robodispatch_core::JobDescriptor;

/// Endpoint robots listen on when none is configured.
pub const DEFAULT_NOTIFY_URL: &str = "ws://localhost:6010";

/// Errors that can occur while handing a job to a robot.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connected, but the frame could not be sent.
    #[error("Send error: {0}")]
    Send(String),
}

/// Delivers a job to a running robot.
#[async_trait]
pub trait SideChannel: Send + Sync {
    async fn deliver(&self, job: &JobDescriptor) -> Result<(), NotifyError>;
}

/// [`SideChannel`] over a WebSocket client connection.
#[derive(Debug, Clone)]
pub struct WebSocketNotifier {
    url: String,
}

impl Default for WebSocketNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_URL)
    }
}

impl WebSocketNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SideChannel for WebSocketNotifier {
    async fn deliver(&self, job: &JobDescriptor) -> Result<(), NotifyError> {
        let (mut ws_stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| NotifyError::Connection(format!("{}: {e}", self.url)))?;

        let robot = job.robot().unwrap_or("-");
        tracing::info!(robot, url = %self.url, "Sending job to robot");

        ws_stream
            .send(Message::Text(job.to_json_string()))
            .await
            .map_err(|e| NotifyError::Send(e.to_string()))?;

        tracing::info!(robot, "Job delivered to robot");

        // The frame is already flushed; a failed close handshake does not
        // undo the delivery.
        if let Err(e) = ws_stream.close(None).await {
            tracing::debug!(robot, error = %e, "WebSocket close failed after delivery");
        }
        Ok(())
    }
}
