//! Broker connection seams.
//!
//! The supervisor only sees [`Connector`] and [`BrokerSession`], so the
//! retry state machine can be driven by in-memory fakes.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::BrokerError;
use crate::message::InboundMessage;

/// Highest message priority a queue is declared with.
pub const MAX_PRIORITY: u8 = 10;

/// Unacknowledged messages a consumer may hold at once.
pub const PREFETCH: u16 = 1;

/// Stream of deliveries for one queue. Ends when the consumer is
/// cancelled or the connection closes.
pub type DeliveryStream<M> = BoxStream<'static, Result<M, BrokerError>>;

/// How one queue is declared and consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSubscription {
    pub queue: String,
    pub durable: bool,
    pub max_priority: u8,
    pub prefetch: u16,
}

impl QueueSubscription {
    /// Durable, priority 0-10, one message in flight.
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            durable: true,
            max_priority: MAX_PRIORITY,
            prefetch: PREFETCH,
        }
    }
}

/// A live broker connection.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    type Message: InboundMessage + 'static;

    /// Declare the queue and start consuming it.
    async fn subscribe(
        &self,
        subscription: &QueueSubscription,
    ) -> Result<DeliveryStream<Self::Message>, BrokerError>;

    fn is_connected(&self) -> bool;

    /// Close the connection, ending every delivery stream.
    async fn close(&self);
}

/// Opens broker sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: BrokerSession + 'static;

    async fn connect(&self) -> Result<Self::Session, BrokerError>;
}
