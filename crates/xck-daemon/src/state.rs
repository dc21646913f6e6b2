//! Shared runtime state for xck-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The reconciler lives
//! behind one mutex; every merge and every sweep holds it, so a sweep never
//! sees a half-merged record.
//!
//! Lock order is always `engine` before `status`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use uuid::Uuid;
use xck_config::MonitorConfig;
use xck_reconcile::{Reconciler, Verdict};

use crate::reporter::{reporter_from_config, VerdictReporter};

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    Verdict(VerdictEvent),
    LogLine { level: String, msg: String },
}

/// A verdict plus where it came from, as delivered to reporters.
#[derive(Clone, Debug, Serialize)]
pub struct VerdictEvent {
    /// Monotonic per daemon session, starting at 1.
    pub seq: u64,
    /// Block number of the tick whose sweep produced the verdict.
    pub block_number: u64,
    /// Block the flagged event was included in, when any channel reported it.
    pub event_block: Option<u64>,
    pub verdict: Verdict,
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the monitor, returned by GET /v1/status and carried
/// inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub session_id: Uuid,
    /// "watching" | "halted"
    pub state: String,
    pub halt_reason: Option<String>,
    pub config_hash: Option<String>,
    pub last_block: Option<u64>,
    /// Records in the store right now (pending or retained).
    pub open_records: usize,
    pub sightings_accepted: u64,
    pub sightings_rejected: u64,
    pub consistent_settled: u64,
    pub verdicts_missing: u64,
    pub verdicts_mismatched: u64,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub config: Arc<MonitorConfig>,
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// The only owner of reconciliation state.
    pub engine: Arc<Mutex<Reconciler>>,
    pub reporter: Arc<dyn VerdictReporter>,
    /// Flips to `true` once a reporter asks for a halt. Never flips back.
    pub halted: watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: MonitorConfig, config_hash: Option<String>) -> anyhow::Result<Self> {
        let reconciler = Reconciler::new(config.reconcile.clone())
            .map_err(|e| anyhow::anyhow!("CONFIG_INVALID: reconcile: {e}"))?;
        let (bus, _rx) = broadcast::channel::<BusMsg>(config.daemon.bus_capacity);
        let reporter = reporter_from_config(&config, bus.clone());
        Ok(Self::with_reporter(config, config_hash, reconciler, bus, reporter))
    }

    /// Same as [`AppState::new`] with a caller-supplied reporter chain.
    pub fn with_reporter(
        config: MonitorConfig,
        config_hash: Option<String>,
        reconciler: Reconciler,
        bus: broadcast::Sender<BusMsg>,
        reporter: Arc<dyn VerdictReporter>,
    ) -> Self {
        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            session_id: Uuid::new_v4(),
            state: "watching".to_string(),
            halt_reason: None,
            config_hash,
            last_block: None,
            open_records: 0,
            sightings_accepted: 0,
            sightings_rejected: 0,
            consistent_settled: 0,
            verdicts_missing: 0,
            verdicts_mismatched: 0,
        };
        let (halted, _) = watch::channel(false);

        Self {
            bus,
            build: BuildInfo {
                service: "xck-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            config: Arc::new(config),
            status: Arc::new(RwLock::new(initial_status)),
            engine: Arc::new(Mutex::new(reconciler)),
            reporter,
            halted,
        }
    }

    pub fn is_halted(&self) -> bool {
        *self.halted.borrow()
    }

    /// Resolves once the monitor has halted.
    pub async fn wait_for_halt(&self) {
        let mut rx = self.halted.subscribe();
        // Err means the sender is gone, which only happens at teardown.
        let _ = rx.wait_for(|h| *h).await;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let _ = bus.send(BusMsg::Heartbeat {
                ts_millis: now_millis(),
            });
        }
    });
}
