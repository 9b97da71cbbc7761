//! Role lease contract.

use std::time::Duration;

use async_trait::async_trait;
use fleet_id::{MachineId, RoleName};

use crate::RegistryResult;

/// A time-bounded exclusive claim on a named role.
///
/// A lease is owned by whoever acquired it. If it is neither renewed nor
/// released it expires once its TTL elapses.
#[async_trait]
pub trait Lease: Send + Sync + std::fmt::Debug {
    /// Role this lease is held on.
    fn role(&self) -> &RoleName;

    /// Machine holding the lease.
    fn machine_id(&self) -> &MachineId;

    /// Acquisition generation; unchanged by renewal.
    fn version(&self) -> u64;

    /// Extend the lease so it expires `ttl` from now.
    async fn renew(&self, ttl: Duration) -> RegistryResult<()>;

    /// Give the lease up.
    async fn release(&self) -> RegistryResult<()>;
}
