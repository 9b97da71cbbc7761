//! Cluster snapshot assembly and scheduling primitives.

use std::sync::Arc;

use async_trait::async_trait;
use fleet_id::{JobName, MachineId};
use fleet_reconcile::{select_bid, ClusterState, Scheduler};
use fleet_registry::{Job, JobOffer, Registry, RegistryResult};
use tracing::{debug, error, info};

/// [`Scheduler`] backed directly by a [`Registry`].
///
/// Every primitive issues at most one registry write, logs the outcome and
/// returns it. Nothing retries.
#[derive(Clone)]
pub struct RegistryScheduler {
    registry: Arc<dyn Registry>,
}

impl RegistryScheduler {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }
}

/// Read jobs, unresolved offers and machines into one snapshot.
///
/// The three reads are independent; the first failure aborts the snapshot
/// and nothing partial is returned.
pub async fn assemble_cluster_state(registry: &dyn Registry) -> RegistryResult<ClusterState> {
    let jobs = async {
        registry.jobs().await.inspect_err(|e| {
            error!(error = %e, "Failed fetching Jobs from Registry");
        })
    };
    let offers = async {
        registry.unresolved_job_offers().await.inspect_err(|e| {
            error!(error = %e, "Failed fetching JobOffers from Registry");
        })
    };
    let machines = async {
        registry.machines().await.inspect_err(|e| {
            error!(error = %e, "Failed fetching Machines from Registry");
        })
    };

    let (jobs, offers, machines) = tokio::try_join!(jobs, offers, machines)?;
    Ok(ClusterState::new(jobs, offers, machines))
}

#[async_trait]
impl Scheduler for RegistryScheduler {
    async fn cluster_state(&self) -> RegistryResult<ClusterState> {
        assemble_cluster_state(self.registry.as_ref()).await
    }

    async fn offer_job(&self, job: &Job) -> RegistryResult<()> {
        let offer = JobOffer::from_job(job);
        match self.registry.create_job_offer(&offer).await {
            Ok(()) => {
                info!(job = %job.name, "Published JobOffer");
                Ok(())
            }
            Err(e) => {
                error!(job = %job.name, error = %e, "Failed publishing JobOffer");
                Err(e)
            }
        }
    }

    async fn resolve_job_offer(&self, job: &JobName) -> RegistryResult<()> {
        match self.registry.resolve_job_offer(job).await {
            Ok(()) => {
                info!(job = %job, "Resolved JobOffer");
                Ok(())
            }
            Err(e) => {
                error!(job = %job, error = %e, "Failed resolving JobOffer");
                Err(e)
            }
        }
    }

    async fn attempt_schedule_job(&self, job: &JobName) -> bool {
        let bids = match self.registry.bids(job).await {
            Ok(bids) => bids,
            Err(e) => {
                error!(job = %job, error = %e, "Failed determining open JobBids for JobOffer");
                return false;
            }
        };

        let Some(choice) = select_bid(&bids) else {
            debug!(job = %job, "No bids found for unresolved JobOffer, unable to resolve");
            return false;
        };

        if let Err(e) = self.registry.schedule_job(job, choice).await {
            error!(job = %job, machine = %choice, error = %e, "Failed scheduling Job");
            return false;
        }

        info!(job = %job, machine = %choice, bids = bids.len(), "Scheduled Job");
        true
    }

    async fn unschedule_job(&self, job: &JobName, machine: &MachineId) -> RegistryResult<()> {
        match self.registry.clear_job_target(job, machine).await {
            Ok(()) => {
                info!(job = %job, machine = %machine, "Unscheduled Job");
                Ok(())
            }
            Err(e) => {
                error!(
                    job = %job,
                    machine = %machine,
                    error = %e,
                    "Failed clearing target Machine of Job"
                );
                Err(e)
            }
        }
    }
}
