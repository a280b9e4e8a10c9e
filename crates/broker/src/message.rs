use async_trait::async_trait;
use lapin::options::{BasicAckOptions, BasicNackOptions};

use crate::error::BrokerError;

/// One delivered message awaiting a decision.
#[async_trait]
pub trait InboundMessage: Send + Sync {
    fn body(&self) -> &[u8];

    /// Remove the message from its queue.
    async fn ack(&self) -> Result<(), BrokerError>;

    /// Return the message to its queue for redelivery.
    async fn requeue(&self) -> Result<(), BrokerError>;
}

#[async_trait]
impl InboundMessage for lapin::message::Delivery {
    fn body(&self) -> &[u8] {
        &self.data
    }

    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }

    async fn requeue(&self) -> Result<(), BrokerError> {
        self.acker
            .nack(BasicNackOptions {
                requeue: true,
                ..Default::default()
            })
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }
}
