//! Engine leadership.
//!
//! At most one engine in the cluster reconciles at a time. Leadership is a
//! lease on a well-known role in the registry; the holder renews it every
//! pass and anyone else keeps trying to acquire it.

use std::time::Duration;

use fleet_id::{MachineId, RoleName};
use fleet_registry::{Lease, Registry};
use tracing::{debug, error, info};

/// Acquires and renews the leader lease.
#[derive(Debug, Clone)]
pub struct LeadershipManager {
    role: RoleName,
    lease_ttl: Duration,
}

impl LeadershipManager {
    pub fn new(role: RoleName, lease_ttl: Duration) -> Self {
        Self { role, lease_ttl }
    }

    /// Renew `prev` if held, otherwise (or if renewal fails) try to acquire
    /// the role. Returns the lease this machine holds afterwards, if any.
    ///
    /// A failed renewal is not taken to mean the lease is gone; acquisition
    /// simply runs next and reports whoever holds the role. There is no
    /// retry here: the next pass is the retry.
    pub async fn ensure_leader(
        &self,
        prev: Option<Box<dyn Lease>>,
        registry: &dyn Registry,
        machine: &MachineId,
    ) -> Option<Box<dyn Lease>> {
        if let Some(lease) = prev {
            match lease.renew(self.lease_ttl).await {
                Ok(()) => return Some(lease),
                Err(e) => {
                    error!(role = %self.role, error = %e, "Engine leadership could not be renewed");
                }
            }
        }

        match registry.lease_role(&self.role, machine, self.lease_ttl).await {
            Ok(Some(lease)) => {
                info!(
                    role = %self.role,
                    machine = %machine,
                    version = lease.version(),
                    "Acquired engine leadership"
                );
                Some(lease)
            }
            Ok(None) => {
                debug!(role = %self.role, "Unable to acquire engine leadership");
                None
            }
            Err(e) => {
                error!(role = %self.role, error = %e, "Failed acquiring engine leadership");
                None
            }
        }
    }
}
