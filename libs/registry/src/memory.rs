//! In-memory registry.
//!
//! All state lives behind one mutex, so every operation is atomic with
//! respect to every other. Lease expiry is measured with
//! [`tokio::time::Instant`], which lets paused-clock tests advance time
//! deterministically.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleet_id::{JobName, MachineId, RoleName};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::{
    BidSet, Job, JobOffer, Lease, MachineState, Registry, RegistryError, RegistryResult,
};

/// Registry operations, for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryOp {
    Jobs,
    UnresolvedJobOffers,
    Machines,
    Bids,
    CreateJobOffer,
    ResolveJobOffer,
    ScheduleJob,
    ClearJobTarget,
    LeaseRole,
    RenewLease,
    ReleaseLease,
}

impl RegistryOp {
    /// Returns true for operations that change registry state.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            RegistryOp::CreateJobOffer
                | RegistryOp::ResolveJobOffer
                | RegistryOp::ScheduleJob
                | RegistryOp::ClearJobTarget
        )
    }
}

#[derive(Debug)]
struct LeaseRecord {
    holder: MachineId,
    version: u64,
    expires_at: Instant,
}

impl LeaseRecord {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Default)]
struct Inner {
    jobs: BTreeMap<JobName, Job>,
    offers: BTreeMap<JobName, JobOffer>,
    bids: BTreeMap<JobName, BidSet>,
    machines: BTreeMap<MachineId, MachineState>,
    leases: HashMap<RoleName, LeaseRecord>,
    next_lease_version: u64,
    faults: HashSet<RegistryOp>,
    calls: HashMap<RegistryOp, u64>,
}

impl Inner {
    /// Count the call and fail it if a fault is armed.
    fn enter(&mut self, op: RegistryOp) -> RegistryResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        if self.faults.contains(&op) {
            debug!(?op, "Injected registry failure");
            return Err(RegistryError::Unavailable(format!("injected failure on {op:?}")));
        }
        Ok(())
    }
}

/// Process-local [`Registry`].
///
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Seeding and inspection
    // -------------------------------------------------------------------------

    /// Insert or replace a job.
    pub async fn put_job(&self, job: Job) {
        self.inner.lock().await.jobs.insert(job.name.clone(), job);
    }

    /// Remove a job along with any offer and bids for it.
    pub async fn remove_job(&self, name: &JobName) -> Option<Job> {
        let mut inner = self.inner.lock().await;
        inner.offers.remove(name);
        inner.bids.remove(name);
        inner.jobs.remove(name)
    }

    pub async fn job(&self, name: &JobName) -> Option<Job> {
        self.inner.lock().await.jobs.get(name).cloned()
    }

    pub async fn offer(&self, name: &JobName) -> Option<JobOffer> {
        self.inner.lock().await.offers.get(name).cloned()
    }

    pub async fn add_machine(&self, machine: MachineState) {
        self.inner
            .lock()
            .await
            .machines
            .insert(machine.id.clone(), machine);
    }

    pub async fn remove_machine(&self, id: &MachineId) -> Option<MachineState> {
        self.inner.lock().await.machines.remove(id)
    }

    /// Record a bid from `machine` on the open offer for `job`.
    pub async fn submit_bid(&self, job: &JobName, machine: MachineId) -> RegistryResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.offers.contains_key(job) {
            return Err(RegistryError::NotFound {
                kind: "job offer",
                name: job.to_string(),
            });
        }
        inner.bids.entry(job.clone()).or_default().insert(machine);
        Ok(())
    }

    /// Current live holder of `role`, if any.
    pub async fn lease_holder(&self, role: &RoleName) -> Option<MachineId> {
        let inner = self.inner.lock().await;
        inner
            .leases
            .get(role)
            .filter(|rec| rec.is_live(Instant::now()))
            .map(|rec| rec.holder.clone())
    }

    // -------------------------------------------------------------------------
    // Fault injection and accounting
    // -------------------------------------------------------------------------

    /// Make every subsequent call of `op` fail until [`heal`](Self::heal).
    pub async fn fail(&self, op: RegistryOp) {
        self.inner.lock().await.faults.insert(op);
    }

    pub async fn heal(&self, op: RegistryOp) {
        self.inner.lock().await.faults.remove(&op);
    }

    /// Number of calls made to `op`, failed ones included.
    pub async fn calls(&self, op: RegistryOp) -> u64 {
        self.inner
            .lock()
            .await
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Number of calls made to any write operation.
    pub async fn write_calls(&self) -> u64 {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter(|(op, _)| op.is_write())
            .map(|(_, n)| *n)
            .sum()
    }

    pub async fn reset_calls(&self) {
        self.inner.lock().await.calls.clear();
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn jobs(&self) -> RegistryResult<Vec<Job>> {
        let mut inner = self.inner.lock().await;
        inner.enter(RegistryOp::Jobs)?;
        Ok(inner.jobs.values().cloned().collect())
    }

    async fn unresolved_job_offers(&self) -> RegistryResult<Vec<JobOffer>> {
        let mut inner = self.inner.lock().await;
        inner.enter(RegistryOp::UnresolvedJobOffers)?;
        Ok(inner.offers.values().cloned().collect())
    }

    async fn machines(&self) -> RegistryResult<Vec<MachineState>> {
        let mut inner = self.inner.lock().await;
        inner.enter(RegistryOp::Machines)?;
        Ok(inner.machines.values().cloned().collect())
    }

    async fn bids(&self, job: &JobName) -> RegistryResult<BidSet> {
        let mut inner = self.inner.lock().await;
        inner.enter(RegistryOp::Bids)?;
        Ok(inner.bids.get(job).cloned().unwrap_or_default())
    }

    async fn create_job_offer(&self, offer: &JobOffer) -> RegistryResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(RegistryOp::CreateJobOffer)?;
        if inner.offers.contains_key(offer.name()) {
            return Err(RegistryError::Conflict(format!(
                "offer for {} already exists",
                offer.name()
            )));
        }
        inner.offers.insert(offer.name().clone(), offer.clone());
        Ok(())
    }

    async fn resolve_job_offer(&self, job: &JobName) -> RegistryResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(RegistryOp::ResolveJobOffer)?;
        if inner.offers.remove(job).is_none() {
            return Err(RegistryError::NotFound {
                kind: "job offer",
                name: job.to_string(),
            });
        }
        inner.bids.remove(job);
        Ok(())
    }

    async fn schedule_job(&self, job: &JobName, machine: &MachineId) -> RegistryResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(RegistryOp::ScheduleJob)?;
        let Some(record) = inner.jobs.get_mut(job) else {
            return Err(RegistryError::NotFound {
                kind: "job",
                name: job.to_string(),
            });
        };
        record.target_machine = Some(machine.clone());
        Ok(())
    }

    async fn clear_job_target(&self, job: &JobName, machine: &MachineId) -> RegistryResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(RegistryOp::ClearJobTarget)?;
        // Only clear when the target still matches; anything else is a no-op.
        if let Some(record) = inner.jobs.get_mut(job) {
            if record.target_machine.as_ref() == Some(machine) {
                record.target_machine = None;
            }
        }
        Ok(())
    }

    async fn lease_role(
        &self,
        role: &RoleName,
        holder: &MachineId,
        ttl: Duration,
    ) -> RegistryResult<Option<Box<dyn Lease>>> {
        let mut inner = self.inner.lock().await;
        inner.enter(RegistryOp::LeaseRole)?;

        let now = Instant::now();
        if inner.leases.get(role).is_some_and(|rec| rec.is_live(now)) {
            return Ok(None);
        }

        inner.next_lease_version += 1;
        let version = inner.next_lease_version;
        inner.leases.insert(
            role.clone(),
            LeaseRecord {
                holder: holder.clone(),
                version,
                expires_at: now + ttl,
            },
        );

        let lease: Box<dyn Lease> = Box::new(MemoryLease {
            registry: Arc::clone(&self.inner),
            role: role.clone(),
            holder: holder.clone(),
            version,
        });
        Ok(Some(lease))
    }
}

/// Lease handed out by [`MemoryRegistry`].
#[derive(Debug)]
pub struct MemoryLease {
    registry: Arc<Mutex<Inner>>,
    role: RoleName,
    holder: MachineId,
    version: u64,
}

impl MemoryLease {
    fn lost(&self) -> RegistryError {
        RegistryError::LeaseLost {
            role: self.role.to_string(),
        }
    }

    fn owns(&self, rec: &LeaseRecord) -> bool {
        rec.holder == self.holder && rec.version == self.version
    }
}

#[async_trait]
impl Lease for MemoryLease {
    fn role(&self) -> &RoleName {
        &self.role
    }

    fn machine_id(&self) -> &MachineId {
        &self.holder
    }

    fn version(&self) -> u64 {
        self.version
    }

    async fn renew(&self, ttl: Duration) -> RegistryResult<()> {
        let mut inner = self.registry.lock().await;
        inner.enter(RegistryOp::RenewLease)?;

        let now = Instant::now();
        match inner.leases.get_mut(&self.role) {
            Some(rec) if self.owns(rec) && rec.is_live(now) => {
                rec.expires_at = now + ttl;
                Ok(())
            }
            _ => Err(self.lost()),
        }
    }

    async fn release(&self) -> RegistryResult<()> {
        let mut inner = self.registry.lock().await;
        inner.enter(RegistryOp::ReleaseLease)?;

        let owned = inner
            .leases
            .get(&self.role)
            .is_some_and(|rec| self.owns(rec));
        if !owned {
            return Err(self.lost());
        }
        inner.leases.remove(&self.role);
        Ok(())
    }
}
