//! Job descriptors.
//!
//! A [`JobDescriptor`] is the JSON object carried by one broker message.
//! Only two fields are interpreted by the dispatcher: [`ROBOT_FIELD`]
//! names the robot to launch and [`ID_FIELD`] is used for logging.
//! Everything else is opaque payload forwarded to the robot.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::JobError;

/// Field naming the robot program to run.
pub const ROBOT_FIELD: &str = "Robo";

/// Field carrying the caller's job id. Only used in log lines.
pub const ID_FIELD: &str = "id";

/// Field injected by the dispatcher with its own worker identity.
pub const WORKER_FIELD: &str = "worker";

/// One job as received from a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobDescriptor {
    fields: Map<String, Value>,
}

impl JobDescriptor {
    /// Parse a raw message body. The body must be a JSON object.
    pub fn parse(body: &[u8]) -> Result<Self, JobError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| JobError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Wrap an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, JobError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(JobError::Malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Name of the robot this job is for.
    ///
    /// Fails with [`JobError::MissingRobotField`] when the field is absent,
    /// null or `""`, and with [`JobError::Malformed`] when it is present but
    /// not a string. Any other string, blank ones included, is returned as
    /// is; whether it names a runnable robot is for the launcher to decide.
    pub fn robot(&self) -> Result<&str, JobError> {
        match self.fields.get(ROBOT_FIELD) {
            None | Some(Value::Null) => Err(JobError::MissingRobotField { field: ROBOT_FIELD }),
            Some(Value::String(s)) if s.is_empty() => {
                Err(JobError::MissingRobotField { field: ROBOT_FIELD })
            }
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(JobError::Malformed(format!(
                "'{ROBOT_FIELD}' must be a string, got {}",
                json_kind(other)
            ))),
        }
    }

    /// The caller-supplied job id rendered for log lines (`-` if absent).
    pub fn id_label(&self) -> String {
        match self.fields.get(ID_FIELD) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "-".to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Stamp the job with the dispatcher's worker identity, replacing any
    /// value the producer may have set.
    pub fn inject_worker(&mut self, worker: &str) {
        self.fields
            .insert(WORKER_FIELD.to_string(), Value::String(worker.to_string()));
    }

    /// Whether the job should be handed to the robot over the side channel.
    ///
    /// The threshold is "more than one field", counted after the worker
    /// identity has been injected. A job carrying only the robot name
    /// therefore already qualifies.
    pub fn has_payload_beyond_identity(&self) -> bool {
        self.fields.len() > 1
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serialise back to a compact JSON object string.
    pub fn to_json_string(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_accepts_objects() {
        let job = JobDescriptor::parse(br#"{"id": 1, "Robo": "Billing"}"#).unwrap();
        assert_eq!(job.len(), 2);
        assert_eq!(job.robot().unwrap(), "Billing");
    }

    #[test]
    fn parse_rejects_invalid_json() {
        assert_matches!(JobDescriptor::parse(b"{not json"), Err(JobError::Malformed(_)));
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert_matches!(
            JobDescriptor::parse(b"[1, 2, 3]"),
            Err(JobError::Malformed(msg)) if msg.contains("an array")
        );
        assert_matches!(JobDescriptor::parse(b"\"Billing\""), Err(JobError::Malformed(_)));
    }

    #[test]
    fn robot_missing_null_or_empty() {
        for value in [json!({"id": 1}), json!({"Robo": null}), json!({"Robo": ""})] {
            let job = JobDescriptor::from_value(value).unwrap();
            assert_matches!(job.robot(), Err(JobError::MissingRobotField { field: "Robo" }));
        }
    }

    #[test]
    fn blank_robot_is_present() {
        let job = JobDescriptor::from_value(json!({"Robo": "   "})).unwrap();
        assert_eq!(job.robot().unwrap(), "   ");
    }

    #[test]
    fn robot_must_be_a_string() {
        let job = JobDescriptor::from_value(json!({"Robo": 42})).unwrap();
        assert_matches!(job.robot(), Err(JobError::Malformed(_)));
    }

    #[test]
    fn inject_worker_overwrites_existing_value() {
        let mut job = JobDescriptor::from_value(json!({"Robo": "Billing", "worker": "spoofed"})).unwrap();
        job.inject_worker("vm-01");
        assert_eq!(job.get(WORKER_FIELD), Some(&json!("vm-01")));
        assert_eq!(job.len(), 2);
    }

    #[test]
    fn payload_threshold_counts_injected_worker() {
        let mut bare = JobDescriptor::from_value(json!({"Robo": "Billing"})).unwrap();
        assert!(!bare.has_payload_beyond_identity());
        bare.inject_worker("vm-01");
        assert!(bare.has_payload_beyond_identity());
    }

    #[test]
    fn id_label_renders_any_json_value() {
        let numeric = JobDescriptor::from_value(json!({"id": 7})).unwrap();
        let text = JobDescriptor::from_value(json!({"id": "abc"})).unwrap();
        let missing = JobDescriptor::from_value(json!({})).unwrap();
        assert_eq!(numeric.id_label(), "7");
        assert_eq!(text.id_label(), "abc");
        assert_eq!(missing.id_label(), "-");
    }

    #[test]
    fn to_json_string_keeps_all_fields() {
        let mut job = JobDescriptor::from_value(json!({"id": 1, "Robo": "Billing"})).unwrap();
        job.inject_worker("vm-01");
        let round: Value = serde_json::from_str(&job.to_json_string()).unwrap();
        assert_eq!(round, json!({"id": 1, "Robo": "Billing", "worker": "vm-01"}));
    }
}
