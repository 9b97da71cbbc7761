//! fleet engine library.
//!
//! This crate ships the `fleet-engine` binary, but the engine itself is
//! exposed as a library so it can be embedded in a larger agent and driven
//! from integration tests.

pub mod config;
pub mod engine;

pub use engine::{
    join_engine, Engine, EngineConfig, EngineExit, LeadershipManager, RegistryScheduler, TriggerHandle,
    ENGINE_ROLE_LEASE_PERIOD, ENGINE_ROLE_NAME, RECONCILE_INTERVAL,
};
