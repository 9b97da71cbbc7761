//! Reconciliation policies.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{ReconcileError, ReconcileResult, Scheduler};

/// Counters for one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub offers_published: u32,
    pub jobs_scheduled: u32,
    pub offers_resolved: u32,
    pub jobs_unscheduled: u32,
    /// Primitive calls that reported a failure.
    pub failures: u32,
}

impl ReconcileStats {
    /// Returns true if the pass changed nothing and hit no failures.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// A placement policy driving one convergence pass.
///
/// The engine calls [`reconcile`](Reconciler::reconcile) once per pass
/// while it holds leadership. Implementations decide what to offer, which
/// bids to accept and what to unschedule, using only the primitives on
/// [`Scheduler`].
#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn reconcile(&self, scheduler: &dyn Scheduler) -> ReconcileResult<ReconcileStats>;
}

/// Default policy: offer every unplaced job, accept the first bid on every
/// open offer, and unschedule jobs whose machine has gone away.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfferBidReconciler;

impl OfferBidReconciler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reconciler for OfferBidReconciler {
    #[instrument(skip_all)]
    async fn reconcile(&self, scheduler: &dyn Scheduler) -> ReconcileResult<ReconcileStats> {
        let state = scheduler
            .cluster_state()
            .await
            .map_err(ReconcileError::Snapshot)?;
        let mut stats = ReconcileStats::default();

        debug!(
            jobs = state.jobs().count(),
            offers = state.offers().count(),
            machines = state.machines().count(),
            "Reconciling cluster snapshot"
        );

        for job in state.unoffered_jobs() {
            match scheduler.offer_job(job).await {
                Ok(()) => stats.offers_published += 1,
                Err(_) => stats.failures += 1,
            }
        }

        for offer in state.offers() {
            let name = offer.name();

            // A previous pass committed the schedule but failed to resolve.
            let already_placed = state.job(name).is_some_and(|j| j.is_scheduled());
            if !already_placed {
                if !scheduler.attempt_schedule_job(name).await {
                    continue;
                }
                stats.jobs_scheduled += 1;
            }

            match scheduler.resolve_job_offer(name).await {
                Ok(()) => stats.offers_resolved += 1,
                Err(_) => stats.failures += 1,
            }
        }

        for (job, machine) in state.orphaned_jobs() {
            match scheduler.unschedule_job(job, machine).await {
                Ok(()) => stats.jobs_unscheduled += 1,
                Err(_) => stats.failures += 1,
            }
        }

        Ok(stats)
    }
}
