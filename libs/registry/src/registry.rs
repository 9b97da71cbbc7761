//! Registry contract.

use std::time::Duration;

use async_trait::async_trait;
use fleet_id::{JobName, MachineId, RoleName};

use crate::{BidSet, Job, JobOffer, Lease, MachineState, RegistryResult};

/// Shared cluster store consumed by the engine.
#[async_trait]
pub trait Registry: Send + Sync {
    /// All known jobs.
    async fn jobs(&self) -> RegistryResult<Vec<Job>>;

    /// All offers that have not been resolved.
    async fn unresolved_job_offers(&self) -> RegistryResult<Vec<JobOffer>>;

    /// All known machines.
    async fn machines(&self) -> RegistryResult<Vec<MachineState>>;

    /// Current bids on the offer for `job`.
    async fn bids(&self, job: &JobName) -> RegistryResult<BidSet>;

    /// Publish an offer.
    async fn create_job_offer(&self, offer: &JobOffer) -> RegistryResult<()>;

    /// Close the offer for `job`.
    async fn resolve_job_offer(&self, job: &JobName) -> RegistryResult<()>;

    /// Commit `machine` as the target of `job`.
    async fn schedule_job(&self, job: &JobName, machine: &MachineId) -> RegistryResult<()>;

    /// Clear the target of `job` if it is `machine`.
    async fn clear_job_target(&self, job: &JobName, machine: &MachineId) -> RegistryResult<()>;

    /// Try to acquire the lease on `role` for `holder`.
    ///
    /// Returns `Ok(None)` when someone else currently holds it.
    async fn lease_role(
        &self,
        role: &RoleName,
        holder: &MachineId,
        ttl: Duration,
    ) -> RegistryResult<Option<Box<dyn Lease>>>;
}
