//! Alert delivery channels.
//!
//! Email is the production channel; the log sink is used when no SMTP
//! server is configured so alerts are still visible in the log file.

pub mod email;
pub mod log;
