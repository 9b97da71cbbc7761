//! # fleet-events
//!
//! Event definitions for the cluster event stream.
//!
//! ## Design Principles
//!
//! - Events are notifications, not state: a handler re-reads the registry
//!   rather than trusting the event
//! - Every event names exactly one subject (a job or a machine)
//! - Handlers must not block the dispatcher
//!
//! ## Event Types
//!
//! - `job.target_state_changed`: a job's desired state changed
//! - `machine.removed`: a machine left the cluster

mod envelope;
mod error;
mod handler;

pub use envelope::*;
pub use error::EventError;
pub use handler::EventHandler;
