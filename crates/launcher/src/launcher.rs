//! The job launcher.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use robodispatch_core::JobDescriptor;

use crate::command::{default_robots_root, RobotCommand};
use crate::error::DispatchError;
use crate::lock::SpawnLock;
use crate::notify::SideChannel;
use crate::process::{RobotProcess, RobotSpawner};

/// Wait between spawning a robot and handing it the job, giving the
/// robot time to open its side-channel listener.
pub const DEFAULT_HANDSHAKE_DELAY: Duration = Duration::from_secs(10);

/// Static launcher settings.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Folder holding one sub-folder per robot.
    pub robots_root: PathBuf,
    pub handshake_delay: Duration,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            robots_root: default_robots_root(),
            handshake_delay: DEFAULT_HANDSHAKE_DELAY,
        }
    }
}

/// Result of a successful dispatch: the robot is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub robot: String,
    pub pid: Option<u32>,
    /// Whether the job was handed to the robot over the side channel.
    pub notified: bool,
}

/// Launches one robot process per job.
///
/// All launchers sharing a [`SpawnLock`] start robots strictly one at a
/// time. The lock covers the spawn and the side-channel handoff only; the
/// robot's run and the draining of its output happen outside it.
pub struct JobLauncher {
    config: LauncherConfig,
    lock: SpawnLock,
    spawner: Arc<dyn RobotSpawner>,
    channel: Arc<dyn SideChannel>,
}

impl JobLauncher {
    pub fn new(
        config: LauncherConfig,
        lock: SpawnLock,
        spawner: Arc<dyn RobotSpawner>,
        channel: Arc<dyn SideChannel>,
    ) -> Self {
        Self {
            config,
            lock,
            spawner,
            channel,
        }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Parse a raw message body and dispatch it.
    pub async fn dispatch_raw(&self, worker: &str, body: &[u8]) -> Result<Dispatched, DispatchError> {
        let job = JobDescriptor::parse(body)?;
        self.dispatch(worker, job).await
    }

    /// Start the robot named by `job`.
    ///
    /// Returns once the process is running (and, for payload-bearing jobs,
    /// has received the job). The robot's exit is never reported back.
    pub async fn dispatch(
        &self,
        worker: &str,
        mut job: JobDescriptor,
    ) -> Result<Dispatched, DispatchError> {
        let robot = job.robot()?.to_string();
        job.inject_worker(worker);
        let command = RobotCommand::resolve(&self.config.robots_root, &robot)?;

        let (process, notified) = {
            let _guard = self.lock.acquire().await;
            self.start_locked(&command, &job).await?
        };

        let pid = process.id();
        tokio::spawn(drain(robot.clone(), process));

        Ok(Dispatched {
            robot,
            pid,
            notified,
        })
    }

    /// Spawn and hand off. Must be called with the spawn lock held.
    async fn start_locked(
        &self,
        command: &RobotCommand,
        job: &JobDescriptor,
    ) -> Result<(Box<dyn RobotProcess>, bool), DispatchError> {
        let robot = command.robot.as_str();

        let mut process =
            self.spawner
                .spawn(command)
                .await
                .map_err(|source| DispatchError::Spawn {
                    robot: robot.to_string(),
                    source,
                })?;

        tracing::info!(robot, pid = ?process.id(), "Robot started");

        if !job.has_payload_beyond_identity() {
            return Ok((process, false));
        }

        tokio::time::sleep(self.config.handshake_delay).await;

        if let Err(source) = self.channel.deliver(job).await {
            tracing::error!(robot, error = %source, "Failed to send job to robot");
            match process.kill().await {
                Ok(()) => tracing::info!(robot, "Robot killed"),
                Err(e) => tracing::warn!(robot, error = %e, "Failed to kill robot"),
            }
            return Err(DispatchError::Notify {
                robot: robot.to_string(),
                source,
            });
        }

        Ok((process, true))
    }
}

/// Read the robot's output to the end and log how it exited.
async fn drain(robot: String, mut process: Box<dyn RobotProcess>) {
    match process.drain().await {
        Ok(output) => tracing::info!(
            robot = %robot,
            code = ?output.code,
            stdout_bytes = output.stdout_bytes,
            stderr_bytes = output.stderr_bytes,
            "Robot exited",
        ),
        Err(e) => tracing::warn!(robot = %robot, error = %e, "Failed to drain robot output"),
    }
}
