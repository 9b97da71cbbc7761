//! Scheduling capability handed to a reconciler.

use async_trait::async_trait;
use fleet_id::{JobName, MachineId};
use fleet_registry::{BidSet, Job, RegistryResult};

use crate::ClusterState;

/// Read/write access a reconciler has to the cluster.
///
/// Each write primitive performs exactly one registry mutation and never
/// retries. Failures are logged by the implementation and reported to the
/// caller.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Read jobs, unresolved offers and machines. Any failed read fails
    /// the whole snapshot.
    async fn cluster_state(&self) -> RegistryResult<ClusterState>;

    /// Publish an offer built from `job`.
    async fn offer_job(&self, job: &Job) -> RegistryResult<()>;

    /// Close the offer for `job`. Call only after its schedule commit.
    async fn resolve_job_offer(&self, job: &JobName) -> RegistryResult<()>;

    /// Accept one bid on the offer for `job` and commit it.
    ///
    /// Returns false when there are no bids yet or the registry failed;
    /// the offer then stays open for a later pass.
    async fn attempt_schedule_job(&self, job: &JobName) -> bool;

    /// Clear `job`'s target if it is still `machine`.
    async fn unschedule_job(&self, job: &JobName, machine: &MachineId) -> RegistryResult<()>;
}

/// Choose the winning bid: the first in enumeration order, which for a
/// [`BidSet`] is the lexicographically smallest machine ID.
pub fn select_bid(bids: &BidSet) -> Option<&MachineId> {
    bids.first()
}
