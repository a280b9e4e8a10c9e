//! Broker connection lifecycle.
//!
//! [`ConnectionSupervisor`] drives this state machine until it stops or
//! hits a fatal error:
//!
//! ```text
//!   Connecting --ok--> Connected --all queues ended, still connected--> Stopped
//!       ^   |              |
//!       |   fail           queue task failed / connection dropped
//!       |   v              v
//!     Disconnected <-------+        (wait per RetryPolicy, then reconnect)
//! ```
//!
//! Connection failures are retried forever. They are reported to the
//! operator through the [`AlertSink`], at most once per throttle window.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use robodispatch_core::NotificationThrottle;
use robodispatch_events::alert::MSG_BROKER_CONNECTION;
use robodispatch_events::{AlertSink, FailureAlert};

use crate::consumer::QueueConsumer;
use crate::error::BrokerError;
use crate::session::{BrokerSession, Connector, QueueSubscription};

/// Wait between connection attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Throttle kind for the "broker unreachable" alert.
pub const ALERT_BROKER_UNREACHABLE: &str = "broker-unreachable";

/// Throttle kind for the "connected" console banner.
pub const NOTICE_BROKER_CONNECTED: &str = "broker-connected";

/// Decides how long to wait before the next connection attempt.
pub trait RetryPolicy: Send + Sync {
    /// `failures` is the number of consecutive failed attempts, >= 1.
    fn delay(&self, failures: u32) -> Duration;
}

/// Same delay after every failure, no growth, no limit.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy for FixedDelay {
    fn delay(&self, _failures: u32) -> Duration {
        self.0
    }
}

/// What the supervisor consumes and who it reports as.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub worker: String,
    pub queues: Vec<String>,
}

enum State<S> {
    Connecting,
    Connected(S),
    Disconnected,
    Stopped,
}

/// How a connected session came to an end.
enum SessionEnd {
    /// Every queue stream ended while the connection stayed up.
    Finished,
    Lost(BrokerError),
}

pub struct ConnectionSupervisor<C: Connector> {
    connector: C,
    consumer: Arc<QueueConsumer>,
    alerts: Arc<dyn AlertSink>,
    throttle: NotificationThrottle,
    retry: Box<dyn RetryPolicy>,
    config: SupervisorConfig,
}

impl<C: Connector> ConnectionSupervisor<C> {
    pub fn new(
        connector: C,
        consumer: Arc<QueueConsumer>,
        alerts: Arc<dyn AlertSink>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            connector,
            consumer,
            alerts,
            throttle: NotificationThrottle::default(),
            retry: Box::new(FixedDelay::default()),
            config,
        }
    }

    pub fn with_retry_policy(mut self, retry: impl RetryPolicy + 'static) -> Self {
        self.retry = Box::new(retry);
        self
    }

    pub fn with_throttle(mut self, throttle: NotificationThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run until every queue has stopped on a live connection.
    ///
    /// Only fatal (non-recoverable) broker errors are returned.
    pub async fn run(&self) -> Result<(), BrokerError> {
        let mut state = State::Connecting;
        let mut failures: u32 = 0;

        loop {
            state = match state {
                State::Connecting => match self.connector.connect().await {
                    Ok(session) => {
                        failures = 0;
                        self.announce_connected();
                        State::Connected(session)
                    }
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        tracing::error!(error = %e, attempt = failures, "Failed to connect to broker");
                        self.report_unreachable().await;
                        State::Disconnected
                    }
                },
                State::Connected(session) => match self.consume(&session).await? {
                    SessionEnd::Finished => State::Stopped,
                    SessionEnd::Lost(e) => {
                        failures = failures.saturating_add(1);
                        tracing::error!(error = %e, "Lost connection to broker");
                        self.report_unreachable().await;
                        State::Disconnected
                    }
                },
                State::Disconnected => {
                    let delay = self.retry.delay(failures.max(1));
                    tracing::info!(delay_secs = delay.as_secs(), "Retrying broker connection");
                    tokio::time::sleep(delay).await;
                    State::Connecting
                }
                State::Stopped => {
                    tracing::info!("All queue consumers stopped");
                    return Ok(());
                }
            };
        }
    }

    /// Subscribe every queue and wait for all queue tasks to finish.
    async fn consume(&self, session: &C::Session) -> Result<SessionEnd, BrokerError> {
        let mut tasks = JoinSet::new();
        let mut failure: Option<BrokerError> = None;

        for queue in &self.config.queues {
            let subscription = QueueSubscription::new(queue.as_str());
            match session.subscribe(&subscription).await {
                Ok(deliveries) => {
                    tracing::info!(queue = %queue, "Consuming queue");
                    let consumer = Arc::clone(&self.consumer);
                    let queue = queue.clone();
                    tasks.spawn(async move {
                        let result = consumer.run(&queue, deliveries).await;
                        (queue, result)
                    });
                }
                Err(e) => {
                    tracing::error!(queue = %queue, error = %e, "Failed to subscribe to queue");
                    failure = Some(e);
                    break;
                }
            }
        }

        if failure.is_some() {
            session.close().await;
        }

        while let Some(joined) = tasks.join_next().await {
            let error = match joined {
                Ok((queue, Ok(()))) => {
                    tracing::info!(queue = %queue, "Queue consumer stopped");
                    continue;
                }
                Ok((queue, Err(e))) => {
                    tracing::warn!(queue = %queue, error = %e, "Queue consumer failed");
                    e
                }
                Err(e) => {
                    tracing::error!(error = %e, "Queue task aborted");
                    BrokerError::ConnectionLost(format!("queue task aborted: {e}"))
                }
            };

            // One broken queue takes the whole connection down so that
            // every queue is re-subscribed together.
            if failure.is_none() {
                session.close().await;
                failure = Some(error);
            }
        }

        match failure {
            Some(e) if !e.is_recoverable() => Err(e),
            Some(e) => Ok(SessionEnd::Lost(e)),
            None if session.is_connected() => Ok(SessionEnd::Finished),
            None => Ok(SessionEnd::Lost(BrokerError::ConnectionLost(
                "connection closed while consuming".to_string(),
            ))),
        }
    }

    fn announce_connected(&self) {
        tracing::debug!(queues = ?self.config.queues, "Connected to broker");
        if self.throttle.should_fire(NOTICE_BROKER_CONNECTED) {
            tracing::info!("[!] ------ Connected to broker ------ [!]");
        }
    }

    async fn report_unreachable(&self) {
        if !self.throttle.should_fire(ALERT_BROKER_UNREACHABLE) {
            tracing::debug!("Broker alert suppressed by throttle");
            return;
        }

        let alert = FailureAlert::new(self.config.worker.as_str(), MSG_BROKER_CONNECTION);
        if let Err(e) = self.alerts.send(&alert).await {
            tracing::error!(error = %e, "Failed to send broker alert");
        }
    }
}
