//! Cluster data model.

use std::collections::BTreeSet;

use fleet_id::{JobName, MachineId};
use serde::{Deserialize, Serialize};

/// Desired run state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Inactive,
    Loaded,
    Launched,
}

/// A named unit of desired work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: JobName,
    /// Opaque unit definition; the engine never parses it.
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub target_state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_machine: Option<MachineId>,
}

impl Job {
    /// Create an unscheduled job.
    pub fn new(name: JobName, unit: impl Into<String>) -> Self {
        Self {
            name,
            unit: unit.into(),
            target_state: JobState::default(),
            target_machine: None,
        }
    }

    /// Returns true if the job has a target machine.
    pub fn is_scheduled(&self) -> bool {
        self.target_machine.is_some()
    }
}

/// A job published for bidding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOffer {
    pub job: Job,
}

impl JobOffer {
    /// Build an offer from the job's current definition.
    ///
    /// The offered copy never carries a target machine.
    pub fn from_job(job: &Job) -> Self {
        let mut job = job.clone();
        job.target_machine = None;
        Self { job }
    }

    /// Name of the offered job.
    pub fn name(&self) -> &JobName {
        &self.job.name
    }
}

/// The set of machines bidding on one offer.
///
/// Enumeration order is ascending by machine ID, so the first bid is the
/// lexicographically smallest machine ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidSet(BTreeSet<MachineId>);

impl BidSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bidder. Returns false if it had already bid.
    pub fn insert(&mut self, machine: MachineId) -> bool {
        self.0.insert(machine)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First bidder in enumeration order.
    pub fn first(&self) -> Option<&MachineId> {
        self.0.iter().next()
    }
}

impl FromIterator<MachineId> for BidSet {
    fn from_iter<I: IntoIterator<Item = MachineId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// State a machine publishes about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineState {
    pub id: MachineId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

impl MachineState {
    pub fn new(id: MachineId) -> Self {
        Self {
            id,
            public_ip: None,
        }
    }
}
