//! Shared domain types for the robot dispatcher.
//!
//! - [`JobDescriptor`] -- one job message as received from the broker.
//! - [`JobError`] -- why a message could not be turned into a job.
//! - [`NotificationThrottle`] -- per-kind cooling-off window for
//!   operator alerts and console notices.

pub mod error;
pub mod job;
pub mod throttle;

pub use error::JobError;
pub use job::JobDescriptor;
pub use throttle::NotificationThrottle;
