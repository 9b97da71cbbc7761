//! Point-in-time view of the cluster.

use std::collections::BTreeMap;

use fleet_id::{JobName, MachineId};
use fleet_registry::{Job, JobOffer, MachineState};

/// Jobs, unresolved offers and machines read for one pass.
///
/// A snapshot is never mutated. It may already be stale when acted on; the
/// registry's answer to a later write is authoritative.
#[derive(Debug, Clone, Default)]
pub struct ClusterState {
    jobs: BTreeMap<JobName, Job>,
    offers: BTreeMap<JobName, JobOffer>,
    machines: BTreeMap<MachineId, MachineState>,
}

impl ClusterState {
    pub fn new(jobs: Vec<Job>, offers: Vec<JobOffer>, machines: Vec<MachineState>) -> Self {
        Self {
            jobs: jobs.into_iter().map(|j| (j.name.clone(), j)).collect(),
            offers: offers
                .into_iter()
                .map(|o| (o.name().clone(), o))
                .collect(),
            machines: machines.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn offers(&self) -> impl Iterator<Item = &JobOffer> {
        self.offers.values()
    }

    pub fn machines(&self) -> impl Iterator<Item = &MachineState> {
        self.machines.values()
    }

    pub fn job(&self, name: &JobName) -> Option<&Job> {
        self.jobs.get(name)
    }

    pub fn has_offer(&self, name: &JobName) -> bool {
        self.offers.contains_key(name)
    }

    pub fn has_machine(&self, id: &MachineId) -> bool {
        self.machines.contains_key(id)
    }

    /// Jobs with neither a target machine nor an open offer.
    pub fn unoffered_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs
            .values()
            .filter(|j| !j.is_scheduled() && !self.has_offer(&j.name))
    }

    /// Jobs whose target machine is not in the machine set, paired with
    /// that target.
    pub fn orphaned_jobs(&self) -> impl Iterator<Item = (&JobName, &MachineId)> {
        self.jobs.values().filter_map(|j| match &j.target_machine {
            Some(m) if !self.has_machine(m) => Some((&j.name, m)),
            _ => None,
        })
    }
}
