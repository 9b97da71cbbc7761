//! Process configuration.

use anyhow::{Context, Result};
use fleet_id::MachineId;
use fleet_registry::MachineState;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => anyhow::bail!("unknown log format '{other}' (expected json or pretty)"),
        }
    }
}

/// Engine process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Identity of this machine; used as the leader lease holder.
    pub machine_id: MachineId,

    /// Address other members can reach this machine on.
    pub public_ip: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Machine ID can be provided or derived from the host name
        let raw_id = lookup("FLEET_MACHINE_ID")
            .or_else(|| lookup("HOSTNAME"))
            .unwrap_or_else(|| "local".to_string());
        let machine_id = MachineId::parse(&raw_id)
            .with_context(|| format!("invalid machine ID '{raw_id}'"))?;

        let public_ip = lookup("FLEET_PUBLIC_IP").filter(|s| !s.is_empty());

        let log_level = lookup("FLEET_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_format = match lookup("FLEET_LOG_FORMAT") {
            Some(s) => LogFormat::parse(&s)?,
            None => LogFormat::default(),
        };

        Ok(Self {
            machine_id,
            public_ip,
            log_level,
            log_format,
        })
    }

    /// State this machine publishes to the registry.
    pub fn machine_state(&self) -> MachineState {
        let mut state = MachineState::new(self.machine_id.clone());
        state.public_ip = self.public_ip.clone();
        state
    }
}
