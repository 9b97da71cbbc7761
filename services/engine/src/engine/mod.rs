//! The reconciliation engine.
//!
//! One engine runs per machine, but only the engine holding the leader
//! lease reconciles. The run loop wakes on a fixed interval or on a
//! trigger, makes sure it still leads, then hands a [`Scheduler`] to the
//! configured [`Reconciler`] for one pass. Passes never overlap.
//!
//! [`Scheduler`]: fleet_reconcile::Scheduler

mod leadership;
mod primitives;
mod trigger;

use std::sync::Arc;
use std::time::Duration;

use fleet_events::Event;
use fleet_id::{MachineId, RoleName};
use fleet_reconcile::{OfferBidReconciler, Reconciler};
use fleet_registry::{Lease, LocalMachine, Registry};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

pub use leadership::LeadershipManager;
pub use primitives::{assemble_cluster_state, RegistryScheduler};
pub use trigger::TriggerHandle;

/// Time between periodic reconciliation passes.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(2);

/// Role leased by the leading engine.
pub const ENGINE_ROLE_NAME: &str = "engine-leader";

/// Time the leader role is leased for before it must be renewed.
pub const ENGINE_ROLE_LEASE_PERIOD: Duration = Duration::from_secs(10);

/// Engine timing and role settings.
///
/// `reconcile_interval` must be non-zero; [`Engine::with_config`] replaces a
/// zero interval with [`RECONCILE_INTERVAL`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub reconcile_interval: Duration,
    pub lease_ttl: Duration,
    pub role: RoleName,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: RECONCILE_INTERVAL,
            lease_ttl: ENGINE_ROLE_LEASE_PERIOD,
            role: RoleName::from_static(ENGINE_ROLE_NAME),
        }
    }
}

/// Everything a pass touches. Kept apart from the trigger receiver so the
/// receiver can be drained while a pass holds `&mut EngineCore`.
struct EngineCore {
    config: EngineConfig,
    registry: Arc<dyn Registry>,
    machine: Arc<dyn LocalMachine>,
    scheduler: RegistryScheduler,
    reconciler: Box<dyn Reconciler>,
    leadership: LeadershipManager,
    lease: Option<Box<dyn Lease>>,
}

/// Leader-gated reconciliation engine.
pub struct Engine {
    core: EngineCore,
    triggers: mpsc::Receiver<()>,
    handle: TriggerHandle,
}

impl Engine {
    /// Create an engine with the default config and the default policy.
    pub fn new(registry: Arc<dyn Registry>, machine: Arc<dyn LocalMachine>) -> Self {
        let config = EngineConfig::default();
        let (handle, triggers) = trigger::channel();

        Self {
            core: EngineCore {
                leadership: LeadershipManager::new(config.role.clone(), config.lease_ttl),
                scheduler: RegistryScheduler::new(Arc::clone(&registry)),
                config,
                registry,
                machine,
                reconciler: Box::new(OfferBidReconciler::new()),
                lease: None,
            },
            triggers,
            handle,
        }
    }

    pub fn with_config(mut self, mut config: EngineConfig) -> Self {
        if config.reconcile_interval.is_zero() {
            warn!(
                default_ms = RECONCILE_INTERVAL.as_millis() as u64,
                "Zero reconcile interval, using the default"
            );
            config.reconcile_interval = RECONCILE_INTERVAL;
        }
        self.core.leadership = LeadershipManager::new(config.role.clone(), config.lease_ttl);
        self.core.config = config;
        self
    }

    /// Replace the placement policy.
    pub fn with_reconciler(mut self, reconciler: Box<dyn Reconciler>) -> Self {
        self.core.reconciler = reconciler;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.core.config
    }

    /// A handle event sources use to request a pass.
    pub fn trigger_handle(&self) -> TriggerHandle {
        self.handle.clone()
    }

    /// Respond to a change in any job's target state.
    pub fn handle_job_target_state_change(&self, event: &Event) {
        debug!(job = %event.subject, "Job target state changed");
        self.handle.trigger();
    }

    pub fn is_leader(&self) -> bool {
        self.core.lease.is_some()
    }

    /// Run until `shutdown` flips to true (or its sender goes away).
    ///
    /// Shutdown is checked only between passes and always wins over a
    /// ready tick or trigger. A pass in flight runs to completion.
    #[instrument(skip_all)]
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let machine_id = self.core.machine.state().id;
        info!(
            machine = %machine_id,
            interval_ms = self.core.config.reconcile_interval.as_millis() as u64,
            "Starting engine"
        );

        let mut ticker = tokio::time::interval(self.core.config.reconcile_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Don't immediately tick on startup - wait for first interval
        ticker.tick().await;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    debug!("Engine tick");
                    self.reconcile_with(&machine_id).await;
                }
                Some(()) = self.triggers.recv() => {
                    debug!("Engine reconciliation triggered by job state change");
                    self.reconcile_with(&machine_id).await;
                }
            }
        }

        info!("Engine exiting due to stop signal");
    }

    /// Run one pass now: ensure leadership, then reconcile if leading.
    pub async fn reconcile_once(&mut self) {
        let machine_id = self.core.machine.state().id;
        self.reconcile_with(&machine_id).await;
    }

    async fn reconcile_with(&mut self, machine_id: &MachineId) {
        trigger::drain_while(&mut self.triggers, self.core.reconcile(machine_id)).await;
    }

    /// Release the leader lease if held. Failure is logged and dropped; the
    /// lease expires on its own.
    pub async fn purge(&mut self) {
        let Some(lease) = self.core.lease.take() else {
            return;
        };

        match lease.release().await {
            Ok(()) => info!(role = %lease.role(), "Released engine leadership"),
            Err(e) => error!(role = %lease.role(), error = %e, "Failed to release lease"),
        }
    }
}

/// How a spawned engine task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExit {
    Stopped,
    /// The task panicked or was aborted.
    Failed,
    TimedOut,
}

/// Wait up to `timeout` for a spawned engine task and log how it ended.
pub async fn join_engine(handle: JoinHandle<()>, timeout: Duration) -> EngineExit {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => EngineExit::Stopped,
        Ok(Err(e)) => {
            error!(error = %e, "Engine task failed");
            EngineExit::Failed
        }
        Err(e) => {
            warn!(error = %e, "Engine did not shut down in time");
            EngineExit::TimedOut
        }
    }
}

impl EngineCore {
    async fn reconcile(&mut self, machine_id: &MachineId) {
        self.lease = self
            .leadership
            .ensure_leader(self.lease.take(), self.registry.as_ref(), machine_id)
            .await;
        if self.lease.is_none() {
            return;
        }

        let start = Instant::now();
        let result = self.reconciler.reconcile(&self.scheduler).await;
        let elapsed = start.elapsed();

        match result {
            Ok(stats) if !stats.is_noop() => info!(
                offers_published = stats.offers_published,
                jobs_scheduled = stats.jobs_scheduled,
                offers_resolved = stats.offers_resolved,
                jobs_unscheduled = stats.jobs_unscheduled,
                failures = stats.failures,
                "Reconciliation pass changed cluster state"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Reconciliation pass aborted"),
        }

        let elapsed_ms = elapsed.as_millis() as u64;
        if elapsed > self.config.reconcile_interval {
            warn!(elapsed_ms, "Engine completed reconciliation in {elapsed:?}");
        } else {
            debug!(elapsed_ms, "Engine completed reconciliation in {elapsed:?}");
        }
    }
}
