//! RabbitMQ implementation of the broker seams, built on `lapin`.
//!
//! Each queue gets its own channel so that the prefetch limit applies to
//! that queue alone and a channel-level error on one queue is reported
//! against that queue.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{Channel, Connection, ConnectionProperties};

use crate::error::BrokerError;
use crate::session::{BrokerSession, Connector, DeliveryStream, QueueSubscription};

/// Default AMQP port.
pub const DEFAULT_PORT: u16 = 5672;

/// Default virtual host.
pub const DEFAULT_VHOST: &str = "/";

/// Queue argument carrying the highest supported priority.
const MAX_PRIORITY_ARG: &str = "x-max-priority";

/// Reply code sent when the dispatcher closes its own connection.
const REPLY_SUCCESS: u16 = 200;

/// Where and as whom to connect.
#[derive(Clone)]
pub struct AmqpSettings {
    pub host: String,
    pub port: u16,
    pub vhost: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AmqpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("vhost", &self.vhost)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl AmqpSettings {
    pub fn uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.username.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            ..Default::default()
        }
    }
}

/// Run lapin's I/O on the current tokio runtime. Panics outside one.
fn connection_properties() -> ConnectionProperties {
    ConnectionProperties::default()
        .with_executor(tokio_executor_trait::Tokio::current())
        .with_reactor(tokio_reactor_trait::Tokio)
}

/// Opens [`AmqpSession`]s.
pub struct AmqpConnector {
    settings: AmqpSettings,
    /// Prefix for consumer tags, usually the worker identity.
    tag_prefix: String,
}

impl AmqpConnector {
    pub fn new(settings: AmqpSettings, tag_prefix: impl Into<String>) -> Self {
        Self {
            settings,
            tag_prefix: tag_prefix.into(),
        }
    }
}

#[async_trait]
impl Connector for AmqpConnector {
    type Session = AmqpSession;

    async fn connect(&self) -> Result<AmqpSession, BrokerError> {
        tracing::info!(
            host = %self.settings.host,
            port = self.settings.port,
            vhost = %self.settings.vhost,
            "Connecting to broker",
        );

        let connection = Connection::connect_uri(self.settings.uri(), connection_properties())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(AmqpSession {
            connection,
            channels: Mutex::new(Vec::new()),
            tag_prefix: self.tag_prefix.clone(),
        })
    }
}

/// One open AMQP connection plus the channels consuming on it.
pub struct AmqpSession {
    connection: Connection,
    /// Held so consumer channels live as long as the session.
    channels: Mutex<Vec<Channel>>,
    tag_prefix: String,
}

impl AmqpSession {
    /// Classify a failed setup call: a refusal on a live connection is a
    /// setup error, anything on a dead one is a lost connection.
    fn setup_error(&self, step: &str, queue: &str, e: lapin::Error) -> BrokerError {
        let detail = format!("{step} on queue '{queue}': {e}");
        if self.connection.status().connected() {
            BrokerError::Setup(detail)
        } else {
            BrokerError::ConnectionLost(detail)
        }
    }
}

#[async_trait]
impl BrokerSession for AmqpSession {
    type Message = lapin::message::Delivery;

    async fn subscribe(
        &self,
        subscription: &QueueSubscription,
    ) -> Result<DeliveryStream<lapin::message::Delivery>, BrokerError> {
        let queue = subscription.queue.as_str();

        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| self.setup_error("create channel", queue, e))?;

        channel
            .basic_qos(subscription.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| self.setup_error("set qos", queue, e))?;

        let mut arguments = FieldTable::default();
        arguments.insert(
            MAX_PRIORITY_ARG.into(),
            AMQPValue::LongInt(i32::from(subscription.max_priority)),
        );
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: subscription.durable,
                    ..Default::default()
                },
                arguments,
            )
            .await
            .map_err(|e| self.setup_error("declare", queue, e))?;

        let consumer_tag = format!("{}-{}-{}", self.tag_prefix, queue, uuid::Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| self.setup_error("consume", queue, e))?;

        tracing::debug!(queue, consumer_tag = %consumer_tag, "Consumer registered");

        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(channel);

        Ok(consumer
            .map(|delivery| delivery.map_err(|e| BrokerError::ConnectionLost(e.to_string())))
            .boxed())
    }

    fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    async fn close(&self) {
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self
            .connection
            .close(REPLY_SUCCESS, "dispatcher reconnecting")
            .await
        {
            tracing::debug!(error = %e, "Broker connection close failed");
        }
    }
}
