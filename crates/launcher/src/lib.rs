//! Robot process launching.
//!
//! [`JobLauncher`] turns one [`JobDescriptor`](robodispatch_core::JobDescriptor)
//! into one running robot process:
//!
//! 1. resolve the robot's interpreter and entry point under the robots root
//!    ([`command`]),
//! 2. take the global [`SpawnLock`] and spawn the process ([`process`]),
//! 3. optionally hand the full job to the robot over the side channel
//!    ([`notify`]), killing the robot if that fails,
//! 4. release the lock and drain the robot's stdio in the background.
//!
//! The launcher does not track job completion. A robot's exit status is
//! logged by the drain task and nothing else; anything that needs to know
//! when a job finished must add its own completion channel.

pub mod command;
pub mod error;
pub mod launcher;
pub mod lock;
pub mod notify;
pub mod process;

pub use command::RobotCommand;
pub use error::DispatchError;
pub use launcher::{Dispatched, JobLauncher, LauncherConfig};
pub use lock::SpawnLock;
pub use notify::{NotifyError, SideChannel, WebSocketNotifier};
pub use process::{ProcessOutput, RobotProcess, RobotSpawner, ShellSpawner};
