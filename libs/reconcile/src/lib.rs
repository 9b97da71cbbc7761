//! Reconciliation primitives.
//!
//! This library holds the pieces of a reconciliation pass that do not
//! depend on how the engine reaches the registry:
//!
//! - **Cluster snapshot**: an immutable read of jobs, open offers and
//!   machines taken once per pass.
//! - **Scheduler**: the capability a policy drives. It exposes exactly the
//!   scheduling primitives (offer, attempt, resolve, unschedule) and the
//!   snapshot assembler.
//! - **Reconciler**: a policy that runs one convergence pass against a
//!   scheduler. [`OfferBidReconciler`] is the default.
//!
//! # Invariants
//!
//! - Every write in a pass is decided from the one snapshot taken at the
//!   start of that pass
//! - A failing primitive only affects the job it concerns
//! - An offer is resolved only after a schedule commit for it landed

mod policy;
mod scheduler;
mod snapshot;

use fleet_registry::RegistryError;
use thiserror::Error;

pub use policy::{OfferBidReconciler, ReconcileStats, Reconciler};
pub use scheduler::{select_bid, Scheduler};
pub use snapshot::ClusterState;

/// Result type for a reconciliation pass.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Reconciliation errors.
///
/// Only failures that abort a whole pass are errors; per-job failures are
/// counted in [`ReconcileStats`].
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The cluster snapshot could not be assembled.
    #[error("failed assembling cluster snapshot: {0}")]
    Snapshot(#[source] RegistryError),
}
