use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use xck_reconcile::ReconcileConfig;

/// What the reporter does when a Missing or Mismatched verdict arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyPolicy {
    /// Log and keep running.
    #[default]
    Log,
    /// Log, then stop the monitor (the process exits non-zero).
    Halt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReporterConfig {
    pub on_anomaly: AnomalyPolicy,
    /// Emit a debug line for every consistent settlement.
    pub log_consistent: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            on_anomaly: AnomalyPolicy::Log,
            log_consistent: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub addr: String,
    pub heartbeat_ms: u64,
    pub bus_capacity: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8898".to_string(),
            heartbeat_ms: 1_000,
            bus_capacity: 1024,
        }
    }
}

impl DaemonConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.addr
            .parse()
            .with_context(|| format!("invalid daemon.addr: {}", self.addr))
    }
}

/// Typed monitor configuration. Every section is optional and defaults sanely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub reconcile: ReconcileConfig,
    pub reporter: ReporterConfig,
    pub daemon: DaemonConfig,
}

impl MonitorConfig {
    /// Deserialize from a merged config document and validate it.
    ///
    /// Unknown top-level sections are tolerated here; they surface through
    /// [`crate::report_unused_keys`] instead.
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: MonitorConfig =
            serde_json::from_value(v.clone()).context("CONFIG_INVALID: monitor config shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.reconcile
            .validate()
            .map_err(|e| anyhow!("CONFIG_INVALID: reconcile: {e}"))?;
        if self.daemon.heartbeat_ms == 0 {
            bail!("CONFIG_INVALID: daemon.heartbeat_ms must be > 0");
        }
        if self.daemon.bus_capacity == 0 {
            bail!("CONFIG_INVALID: daemon.bus_capacity must be > 0");
        }
        self.daemon.socket_addr()?;
        Ok(())
    }
}
