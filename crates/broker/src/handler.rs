use async_trait::async_trait;

use robodispatch_core::JobDescriptor;
use robodispatch_launcher::{DispatchError, JobLauncher};

/// What the consumer hands validated jobs to.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle_job(&self, worker: &str, job: JobDescriptor) -> Result<(), DispatchError>;
}

#[async_trait]
impl JobHandler for JobLauncher {
    async fn handle_job(&self, worker: &str, job: JobDescriptor) -> Result<(), DispatchError> {
        let dispatched = self.dispatch(worker, job).await?;
        tracing::debug!(
            robot = %dispatched.robot,
            pid = ?dispatched.pid,
            notified = dispatched.notified,
            "Job dispatched",
        );
        Ok(())
    }
}
