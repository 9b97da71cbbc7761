//! # fleet-id
//!
//! Validated names for the things the engine schedules and the cluster
//! members it schedules onto.
//!
//! ## Design Principles
//!
//! - Names are opaque to the engine: it compares and orders them, never
//!   interprets them
//! - Every name has one canonical string form with strict parsing
//! - Names are typed so a job name can never be passed where a machine ID
//!   is expected
//! - Ordering is lexicographic on the canonical string, which is what the
//!   scheduler relies on for deterministic tie-breaks
//!
//! ## Name Format
//!
//! A name is 1..=255 bytes drawn from `[A-Za-z0-9._@-]`, and may not start
//! with `.` or `-`. Examples:
//!
//! - `web@1.service` (job)
//! - `b7a3f2c1` (machine)
//! - `engine-leader` (role)

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Maximum length of any name, in bytes.
pub const MAX_NAME_LEN: usize = 255;
