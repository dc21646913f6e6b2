//! xck-reconcile
//!
//! Multi-channel event reconciliation engine.
//!
//! Architectural decisions:
//! - One aggregate record per logical event key, merged from every channel
//! - Merge is last-write-wins per channel, commutative across channels
//! - Nothing is judged before the settlement window has elapsed
//! - Settled records are Consistent (evicted), Missing, or Mismatched
//! - Invalid sightings are rejected at the boundary, never merged
//!
//! Pure deterministic logic. No IO, no wall-clock. The caller provides `now_ms`
//! on every tick and decides what to do with the verdicts.

mod config;
mod error;
mod keys;
mod reconciler;
mod store;
mod sweep;
mod types;

pub use config::{AfterReport, ReconcileConfig, SettlementAnchor, SightingMode};
pub use error::{ConfigError, SightingError};
pub use keys::{BlockWindow, KeySource, SyncEvent};
pub use reconciler::{FeedEvent, Reconciler};
pub use store::ReconcileStore;
pub use sweep::{SettlementSweeper, SweepOutcome};
pub use types::*;
