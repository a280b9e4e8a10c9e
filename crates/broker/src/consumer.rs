//! Per-queue message consumption.
//!
//! Messages on one queue are handled strictly one at a time, in delivery
//! order. The acknowledgement policy is:
//!
//! | Outcome                               | Broker action      |
//! |---------------------------------------|--------------------|
//! | body is not a JSON object             | requeue            |
//! | robot field absent, null or empty     | requeue            |
//! | dispatched                            | ack                |
//! | dispatch failed                       | ack (not retried)  |
//!
//! Undecodable jobs are requeued because the fix lives upstream; they stay
//! in the queue until corrected or purged. Dispatch failures are never
//! retried because the robot may already have done part of the work.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use robodispatch_core::job::ROBOT_FIELD;
use robodispatch_core::{JobDescriptor, JobError};

use crate::error::BrokerError;
use crate::handler::JobHandler;
use crate::message::InboundMessage;
use crate::session::DeliveryStream;

/// Pause after each message before pulling the next one from the queue.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// What happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acked,
    Requeued,
}

/// Validates, dispatches and acknowledges messages.
///
/// One consumer is shared by every queue task of a dispatcher.
pub struct QueueConsumer {
    worker: String,
    handler: Arc<dyn JobHandler>,
    cooldown: Duration,
}

impl QueueConsumer {
    pub fn new(worker: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            worker: worker.into(),
            handler,
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    /// Consume `deliveries` until the stream ends or breaks.
    ///
    /// Returns `Ok(())` when the stream ends cleanly and an error when the
    /// stream breaks or a message cannot be acknowledged. The cooldown is
    /// applied after every message, requeued ones included, so a poison
    /// message cannot spin the queue.
    pub async fn run<M>(&self, queue: &str, mut deliveries: DeliveryStream<M>) -> Result<(), BrokerError>
    where
        M: InboundMessage,
    {
        while let Some(delivery) = deliveries.next().await {
            let message = delivery?;
            self.handle(queue, &message).await?;
            tokio::time::sleep(self.cooldown).await;
        }

        tracing::info!(queue, "Delivery stream ended");
        Ok(())
    }

    /// Decide and apply the fate of a single message.
    pub async fn handle<M>(&self, queue: &str, message: &M) -> Result<Disposition, BrokerError>
    where
        M: InboundMessage + ?Sized,
    {
        let job = match JobDescriptor::parse(message.body()) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(queue, error = %e, "Message returned to queue - not a valid job");
                message.requeue().await?;
                return Ok(Disposition::Requeued);
            }
        };

        // Only an absent robot is requeued. A robot field of the wrong shape
        // goes on to dispatch, fails there and is acknowledged.
        let robot = match job.robot() {
            Ok(robot) => robot.to_string(),
            Err(e @ JobError::MissingRobotField { .. }) => {
                tracing::info!(queue, error = %e, "Message returned to queue - robot not specified");
                message.requeue().await?;
                return Ok(Disposition::Requeued);
            }
            Err(_) => job
                .get(ROBOT_FIELD)
                .map(|value| value.to_string())
                .unwrap_or_default(),
        };

        let job_id = job.id_label();
        tracing::info!(queue, job_id = %job_id, robot = %robot, "Processing message");

        if let Err(e) = self.handler.handle_job(&self.worker, job).await {
            tracing::error!(
                queue,
                job_id = %job_id,
                robot = %robot,
                error = %e,
                "Dispatch failed; message acknowledged without retry",
            );
        }

        message.ack().await?;
        Ok(Disposition::Acked)
    }
}
