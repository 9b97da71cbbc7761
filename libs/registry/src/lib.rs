//! # fleet-registry
//!
//! The registry is the cluster's shared store of jobs, job offers, bids,
//! machines and role leases. The engine never talks to storage directly;
//! it goes through the [`Registry`] and [`Lease`] traits defined here.
//!
//! The registry is expected to provide atomic lease acquisition and
//! renewal. Reads of jobs, offers and machines are independent calls and
//! are not required to be mutually consistent.
//!
//! [`MemoryRegistry`] is a process-local implementation with TTL leases,
//! call accounting and fault injection.

mod error;
mod lease;
mod machine;
pub mod memory;
mod model;
mod registry;

pub use error::{RegistryError, RegistryResult};
pub use lease::Lease;
pub use machine::{LocalMachine, StaticMachine};
pub use memory::{MemoryRegistry, RegistryOp};
pub use model::*;
pub use registry::Registry;
