//! Run loop behavior: ticks, triggers, coalescing, shutdown and purge.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleet_engine::{
    join_engine, Engine, EngineConfig, EngineExit, ENGINE_ROLE_NAME, RECONCILE_INTERVAL,
};
use fleet_events::{Event, EventType};
use fleet_id::{JobName, MachineId, RoleName};
use fleet_reconcile::{ReconcileResult, ReconcileStats, Reconciler, Scheduler};
use fleet_registry::{
    BidSet, Job, JobOffer, Lease, MachineState, MemoryRegistry, Registry, RegistryOp,
    RegistryResult, StaticMachine,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Registry whose job listing takes a while, to keep a pass in flight.
struct SlowRegistry {
    inner: MemoryRegistry,
    delay: Duration,
}

#[async_trait]
impl Registry for SlowRegistry {
    async fn jobs(&self) -> RegistryResult<Vec<Job>> {
        let jobs = self.inner.jobs().await;
        tokio::time::sleep(self.delay).await;
        jobs
    }

    async fn unresolved_job_offers(&self) -> RegistryResult<Vec<JobOffer>> {
        self.inner.unresolved_job_offers().await
    }

    async fn machines(&self) -> RegistryResult<Vec<MachineState>> {
        self.inner.machines().await
    }

    async fn bids(&self, job: &JobName) -> RegistryResult<BidSet> {
        self.inner.bids(job).await
    }

    async fn create_job_offer(&self, offer: &JobOffer) -> RegistryResult<()> {
        self.inner.create_job_offer(offer).await
    }

    async fn resolve_job_offer(&self, job: &JobName) -> RegistryResult<()> {
        self.inner.resolve_job_offer(job).await
    }

    async fn schedule_job(&self, job: &JobName, machine: &MachineId) -> RegistryResult<()> {
        self.inner.schedule_job(job, machine).await
    }

    async fn clear_job_target(&self, job: &JobName, machine: &MachineId) -> RegistryResult<()> {
        self.inner.clear_job_target(job, machine).await
    }

    async fn lease_role(
        &self,
        role: &RoleName,
        holder: &MachineId,
        ttl: Duration,
    ) -> RegistryResult<Option<Box<dyn Lease>>> {
        self.inner.lease_role(role, holder, ttl).await
    }
}

/// Policy that only counts how often it ran.
#[derive(Clone, Default)]
struct CountingReconciler {
    runs: Arc<AtomicU32>,
}

#[async_trait]
impl Reconciler for CountingReconciler {
    async fn reconcile(&self, _scheduler: &dyn Scheduler) -> ReconcileResult<ReconcileStats> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(ReconcileStats::default())
    }
}

fn machine(id: &str) -> Arc<StaticMachine> {
    Arc::new(StaticMachine::new(MachineState::new(
        MachineId::parse(id).unwrap(),
    )))
}

/// Config whose timer never fires during a test unless asked to.
fn quiet_config() -> EngineConfig {
    EngineConfig {
        reconcile_interval: Duration::from_secs(3600),
        ..EngineConfig::default()
    }
}

fn spawn(mut engine: Engine) -> (watch::Sender<bool>, JoinHandle<Engine>) {
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        engine.run(rx).await;
        engine
    });
    (tx, handle)
}

async fn leadership_checks(reg: &MemoryRegistry) -> u64 {
    reg.calls(RegistryOp::LeaseRole).await + reg.calls(RegistryOp::RenewLease).await
}

#[tokio::test(start_paused = true)]
async fn test_timer_drives_passes() {
    let reg = MemoryRegistry::new();
    let engine = Engine::new(Arc::new(reg.clone()), machine("m1")).with_config(EngineConfig {
        reconcile_interval: Duration::from_secs(2),
        ..EngineConfig::default()
    });

    let (stop, handle) = spawn(engine);
    tokio::time::sleep(Duration::from_secs(7)).await;
    stop.send(true).unwrap();
    let engine = handle.await.unwrap();

    // Ticks at 2s, 4s and 6s.
    assert_eq!(leadership_checks(&reg).await, 3);
    assert_eq!(reg.calls(RegistryOp::Jobs).await, 3);
    assert!(engine.is_leader());
}

#[tokio::test(start_paused = true)]
async fn test_trigger_runs_pass() {
    let reg = MemoryRegistry::new();
    let engine = Engine::new(Arc::new(reg.clone()), machine("m1")).with_config(quiet_config());
    let trigger = engine.trigger_handle();

    let (stop, handle) = spawn(engine);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(reg.calls(RegistryOp::Jobs).await, 0);

    assert!(trigger.trigger());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(reg.calls(RegistryOp::Jobs).await, 1);

    stop.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_triggers_during_pass_coalesce() {
    let inner = MemoryRegistry::new();
    let reg = SlowRegistry {
        inner: inner.clone(),
        delay: Duration::from_secs(5),
    };
    let engine = Engine::new(Arc::new(reg), machine("m1")).with_config(quiet_config());
    let trigger = engine.trigger_handle();

    let (stop, handle) = spawn(engine);
    tokio::time::sleep(Duration::from_millis(10)).await;
    trigger.trigger();

    // Pass is now stuck in the slow job listing.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(inner.calls(RegistryOp::Jobs).await, 1);
    for _ in 0..50 {
        trigger.trigger();
    }

    tokio::time::sleep(Duration::from_secs(30)).await;
    let passes = inner.calls(RegistryOp::Jobs).await;
    // Every trigger arrived mid-pass and was discarded.
    assert_eq!(passes, 1, "triggers during a pass must not queue another");

    stop.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_wins_over_pending_trigger() {
    let reg = MemoryRegistry::new();
    let mut engine = Engine::new(Arc::new(reg.clone()), machine("m1")).with_config(quiet_config());

    engine.trigger_handle().trigger();
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    engine.run(rx).await;

    assert_eq!(leadership_checks(&reg).await, 0);
    assert!(!engine.is_leader());
}

#[tokio::test(start_paused = true)]
async fn test_stop_wins_over_elapsed_tick() {
    let reg = MemoryRegistry::new();
    let mut engine = Engine::new(Arc::new(reg.clone()), machine("m1")).with_config(EngineConfig {
        reconcile_interval: Duration::from_millis(1),
        ..EngineConfig::default()
    });

    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    // A 1ms tick is due before the loop gets going; stop still comes first.
    tokio::time::timeout(Duration::from_secs(1), engine.run(rx))
        .await
        .expect("run should return on the stop signal");

    assert_eq!(reg.calls(RegistryOp::LeaseRole).await, 0);
    assert_eq!(leadership_checks(&reg).await, 0);
    assert!(!engine.is_leader());
}

#[tokio::test(start_paused = true)]
async fn test_stop_waits_for_pass_in_flight() {
    let inner = MemoryRegistry::new();
    let reg = SlowRegistry {
        inner: inner.clone(),
        delay: Duration::from_secs(5),
    };
    let engine = Engine::new(Arc::new(reg), machine("m1")).with_config(quiet_config());
    let trigger = engine.trigger_handle();

    let (stop, handle) = spawn(engine);
    tokio::time::sleep(Duration::from_millis(10)).await;
    trigger.trigger();
    tokio::time::sleep(Duration::from_secs(1)).await;

    stop.send(true).unwrap();
    trigger.trigger();
    let engine = handle.await.unwrap();

    // The pass finished and held leadership; nothing new started.
    assert!(engine.is_leader());
    assert_eq!(inner.calls(RegistryOp::Jobs).await, 1);
    assert_eq!(inner.calls(RegistryOp::Machines).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_stop_sender_ends_loop() {
    let reg = MemoryRegistry::new();
    let mut engine = Engine::new(Arc::new(reg), machine("m1")).with_config(quiet_config());

    let (tx, rx) = watch::channel(false);
    drop(tx);

    tokio::time::timeout(Duration::from_secs(1), engine.run(rx))
        .await
        .expect("run should return once the stop sender is gone");
}

#[tokio::test(start_paused = true)]
async fn test_not_leader_skips_reconcile() {
    let reg = MemoryRegistry::new();
    let _held = reg
        .lease_role(
            &RoleName::from_static(ENGINE_ROLE_NAME),
            &MachineId::parse("m9").unwrap(),
            Duration::from_secs(3600),
        )
        .await
        .unwrap()
        .unwrap();

    let policy = CountingReconciler::default();
    let mut engine = Engine::new(Arc::new(reg.clone()), machine("m1"))
        .with_reconciler(Box::new(policy.clone()));

    engine.reconcile_once().await;
    engine.reconcile_once().await;

    assert!(!engine.is_leader());
    assert_eq!(policy.runs.load(Ordering::SeqCst), 0);
    assert_eq!(reg.calls(RegistryOp::Jobs).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_custom_reconciler_runs_when_leading() {
    let reg = MemoryRegistry::new();
    let policy = CountingReconciler::default();
    let mut engine = Engine::new(Arc::new(reg.clone()), machine("m1"))
        .with_reconciler(Box::new(policy.clone()));

    engine.reconcile_once().await;
    engine.reconcile_once().await;

    assert!(engine.is_leader());
    assert_eq!(policy.runs.load(Ordering::SeqCst), 2);
    // Second pass renewed instead of re-acquiring.
    assert_eq!(reg.calls(RegistryOp::LeaseRole).await, 1);
    assert_eq!(reg.calls(RegistryOp::RenewLease).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_job_target_state_change_triggers_pass() {
    let reg = MemoryRegistry::new();
    let engine = Engine::new(Arc::new(reg.clone()), machine("m1")).with_config(quiet_config());
    let job = JobName::parse("web.service").unwrap();
    engine.handle_job_target_state_change(&Event::for_job(EventType::JobTargetStateChanged, &job));

    let (stop, handle) = spawn(engine);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(reg.calls(RegistryOp::Jobs).await, 1);

    stop.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_purge_releases_lease() {
    let reg = MemoryRegistry::new();
    let role = RoleName::from_static(ENGINE_ROLE_NAME);
    let mut engine = Engine::new(Arc::new(reg.clone()), machine("m1"));

    engine.reconcile_once().await;
    assert_eq!(
        reg.lease_holder(&role).await,
        Some(MachineId::parse("m1").unwrap())
    );

    engine.purge().await;
    assert!(!engine.is_leader());
    assert!(reg.lease_holder(&role).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_purge_swallows_release_failure() {
    let reg = MemoryRegistry::new();
    let role = RoleName::from_static(ENGINE_ROLE_NAME);
    let mut engine = Engine::new(Arc::new(reg.clone()), machine("m1"));

    engine.reconcile_once().await;
    reg.fail(RegistryOp::ReleaseLease).await;
    engine.purge().await;

    assert_eq!(reg.calls(RegistryOp::ReleaseLease).await, 1);
    // Still held in the registry until the TTL runs out.
    assert!(reg.lease_holder(&role).await.is_some());
    tokio::time::advance(engine.config().lease_ttl + Duration::from_secs(1)).await;
    assert!(reg.lease_holder(&role).await.is_none());
}

#[tokio::test]
async fn test_purge_without_lease_is_noop() {
    let reg = MemoryRegistry::new();
    let mut engine = Engine::new(Arc::new(reg.clone()), machine("m1"));

    engine.purge().await;

    assert_eq!(reg.calls(RegistryOp::ReleaseLease).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_falls_back_to_default() {
    let reg = MemoryRegistry::new();
    let engine = Engine::new(Arc::new(reg.clone()), machine("m1")).with_config(EngineConfig {
        reconcile_interval: Duration::ZERO,
        ..EngineConfig::default()
    });
    assert_eq!(engine.config().reconcile_interval, RECONCILE_INTERVAL);

    let (stop, handle) = spawn(engine);
    tokio::time::sleep(RECONCILE_INTERVAL * 2 + Duration::from_millis(500)).await;
    stop.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(reg.calls(RegistryOp::Jobs).await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_join_engine_reports_clean_stop() {
    let reg = MemoryRegistry::new();
    let mut engine = Engine::new(Arc::new(reg), machine("m1")).with_config(quiet_config());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        engine.run(rx).await;
        engine.purge().await;
    });

    tx.send(true).unwrap();
    assert_eq!(join_engine(handle, Duration::from_secs(10)).await, EngineExit::Stopped);
}

#[tokio::test]
async fn test_join_engine_reports_panicked_task() {
    let handle = tokio::spawn(async { panic!("engine blew up") });
    assert_eq!(join_engine(handle, Duration::from_secs(10)).await, EngineExit::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_join_engine_times_out() {
    let handle = tokio::spawn(std::future::pending::<()>());
    assert_eq!(join_engine(handle, Duration::from_secs(10)).await, EngineExit::TimedOut);
}
