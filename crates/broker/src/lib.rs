//! Broker side of the robot dispatcher.
//!
//! - [`QueueConsumer`] -- per-message validation, dispatch and
//!   acknowledgement for one queue's delivery stream.
//! - [`ConnectionSupervisor`] -- connect / subscribe / consume / retry state
//!   machine over an abstract [`Connector`].
//! - [`amqp`] -- the RabbitMQ implementation of [`Connector`] and
//!   [`BrokerSession`] on top of `lapin`.

pub mod amqp;
pub mod consumer;
pub mod error;
pub mod handler;
pub mod message;
pub mod session;
pub mod supervisor;

pub use consumer::{Disposition, QueueConsumer};
pub use error::BrokerError;
pub use handler::JobHandler;
pub use message::InboundMessage;
pub use session::{BrokerSession, Connector, DeliveryStream, QueueSubscription};
pub use supervisor::{ConnectionSupervisor, FixedDelay, RetryPolicy, SupervisorConfig};
