//! Request and response types for all xck-daemon HTTP endpoints.
//!
//! No business logic lives here.

use serde::{Deserialize, Serialize};
use xck_reconcile::{ChannelId, EventKey, Sighting, SightingValue, Verdict};

use crate::monitor::RejectedSighting;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Refusal (409) once halted
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltedResponse {
    pub error: String,
    pub halt_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// POST /v1/sightings
// ---------------------------------------------------------------------------

/// One sighting as posted by an adapter. `observed_at_ms` defaults to the
/// daemon's receive time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SightingIn {
    pub key: EventKey,
    pub channel: ChannelId,
    pub value: SightingValue,
    #[serde(default)]
    pub observed_at_ms: Option<i64>,
    /// Block the event was included in, if the channel knows it.
    #[serde(default)]
    pub block_number: Option<u64>,
}

impl SightingIn {
    pub fn into_sighting(self, received_at_ms: i64) -> Sighting {
        let mut s = Sighting::new(
            self.key,
            self.channel,
            self.value,
            self.observed_at_ms.unwrap_or(received_at_ms),
        );
        s.block_number = self.block_number;
        s
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SightingsRequest {
    pub sightings: Vec<SightingIn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SightingsResponse {
    pub accepted: usize,
    pub rejected: Vec<RejectedSighting>,
    pub open_records: usize,
}

// ---------------------------------------------------------------------------
// POST /v1/tick
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickRequest {
    pub block_number: u64,
    /// Defaults to the daemon's wall clock.
    #[serde(default)]
    pub now_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickResponse {
    pub block_number: u64,
    pub now_ms: i64,
    pub verdicts: Vec<Verdict>,
    pub consistent: usize,
    pub pending: usize,
    pub halted: bool,
}
