//! Event envelope and event types.

use chrono::{DateTime, Utc};
use fleet_id::{JobName, MachineId};
use serde::{Deserialize, Serialize};

use crate::EventError;

/// Kind of cluster event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "job.target_state_changed")]
    JobTargetStateChanged,
    #[serde(rename = "machine.removed")]
    MachineRemoved,
}

impl EventType {
    /// Canonical dotted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::JobTargetStateChanged => "job.target_state_changed",
            EventType::MachineRemoved => "machine.removed",
        }
    }

    /// Returns true for events whose subject is a job.
    pub fn is_job_event(&self) -> bool {
        self.as_str().starts_with("job.")
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s {
            "job.target_state_changed" => EventType::JobTargetStateChanged,
            "machine.removed" => EventType::MachineRemoved,
            other => return Err(EventError::UnknownEventType(other.to_string())),
        };
        Ok(ty)
    }
}

/// A single cluster event.
///
/// `subject` is the job name for `job.*` events and the machine ID for
/// `machine.*` events. `context` optionally names the machine that caused
/// the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MachineId>,
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    /// Create a job event.
    pub fn for_job(event_type: EventType, job: &JobName) -> Self {
        Self {
            event_type,
            subject: job.to_string(),
            context: None,
            occurred_at: Utc::now(),
        }
    }

    /// Create a machine event.
    pub fn for_machine(event_type: EventType, machine: &MachineId) -> Self {
        Self {
            event_type,
            subject: machine.to_string(),
            context: None,
            occurred_at: Utc::now(),
        }
    }

    /// Attach the originating machine.
    pub fn with_context(mut self, machine: MachineId) -> Self {
        self.context = Some(machine);
        self
    }

    /// Subject parsed as a job name.
    pub fn job_name(&self) -> Result<JobName, EventError> {
        if !self.event_type.is_job_event() {
            return Err(EventError::InvalidPayload(format!(
                "{} does not refer to a job",
                self.event_type
            )));
        }
        Ok(JobName::parse(&self.subject)?)
    }

    /// Decode the event from JSON.
    pub fn from_json(s: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(s)?)
    }
}
