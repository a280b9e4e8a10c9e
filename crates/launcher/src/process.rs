//! Robot process spawning and supervision.
//!
//! [`RobotSpawner`] is the seam between the launcher and the operating
//! system. [`ShellSpawner`] is the real implementation: it runs the robot
//! through the platform shell with all three stdio streams piped.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

use crate::command::RobotCommand;

/// What is left of a robot once it has exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout_bytes: u64,
    pub stderr_bytes: u64,
}

/// A running robot.
#[async_trait]
pub trait RobotProcess: Send {
    /// OS process id, if the process is still known to the OS.
    fn id(&self) -> Option<u32>;

    /// Forcibly terminate the process.
    async fn kill(&mut self) -> std::io::Result<()>;

    /// Close stdin, read stdout/stderr to the end and wait for exit.
    async fn drain(&mut self) -> std::io::Result<ProcessOutput>;
}

/// Starts robot processes.
#[async_trait]
pub trait RobotSpawner: Send + Sync {
    async fn spawn(&self, command: &RobotCommand) -> std::io::Result<Box<dyn RobotProcess>>;
}

// ---------------------------------------------------------------------------
// Shell implementation
// ---------------------------------------------------------------------------

/// Spawns robots via `cmd /C` on Windows and `sh -c` elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellSpawner;

fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(line);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(line);
        cmd
    }
}

#[async_trait]
impl RobotSpawner for ShellSpawner {
    async fn spawn(&self, command: &RobotCommand) -> std::io::Result<Box<dyn RobotProcess>> {
        let line = command.shell_line();
        tracing::debug!(robot = %command.robot, %line, "Spawning robot");

        let child = shell_command(&line)
            .current_dir(&command.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        Ok(Box::new(ShellProcess { child }))
    }
}

/// A robot started by [`ShellSpawner`].
pub struct ShellProcess {
    child: Child,
}

#[async_trait]
impl RobotProcess for ShellProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    async fn drain(&mut self) -> std::io::Result<ProcessOutput> {
        drop(self.child.stdin.take());

        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();
        let (stdout_bytes, stderr_bytes) = tokio::try_join!(read_all(stdout), read_all(stderr))?;

        let status = self.child.wait().await?;
        Ok(ProcessOutput {
            code: status.code(),
            stdout_bytes,
            stderr_bytes,
        })
    }
}

/// Consume a stdio pipe to EOF, keeping only the byte count.
async fn read_all<R>(stream: Option<R>) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return Ok(0);
    };
    tokio::io::copy(&mut stream, &mut tokio::io::sink()).await
}
