//! Process-level pieces of the robot dispatcher binary: environment
//! configuration and log setup.

pub mod config;
pub mod logging;

pub use config::{ConfigError, DispatcherConfig};
