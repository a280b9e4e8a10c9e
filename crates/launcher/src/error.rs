use robodispatch_core::JobError;

use crate::notify::NotifyError;

/// Errors returned by [`JobLauncher::dispatch`](crate::JobLauncher::dispatch).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Invalid robot name '{0}'")]
    InvalidRobotName(String),

    #[error("Failed to spawn robot '{robot}': {source}")]
    Spawn {
        robot: String,
        #[source]
        source: std::io::Error,
    },

    /// The side-channel handoff failed; the robot has been killed.
    #[error("Failed to hand job to robot '{robot}': {source}")]
    Notify {
        robot: String,
        #[source]
        source: NotifyError,
    },
}
