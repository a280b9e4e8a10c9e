/// Reasons a broker message cannot be accepted as a job.
///
/// Both variants are treated as externally correctable: the consumer
/// returns the message to its queue instead of dropping it.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Malformed job: {0}")]
    Malformed(String),

    #[error("Job is missing the '{field}' field")]
    MissingRobotField { field: &'static str },
}
