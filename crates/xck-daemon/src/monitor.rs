//! Monitor operations: ingestion, ticks, and the in-process feed task.
//!
//! All three paths funnel into the same two methods on [`AppState`], which
//! take the engine lock for the whole state transition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use xck_reconcile::{FeedEvent, Sighting, SweepOutcome, VerdictKind};

use crate::reporter::ReportAction;
use crate::state::{AppState, BusMsg, VerdictEvent};

/// Returned when the monitor has already halted; nothing is merged or swept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorHalted {
    pub reason: Option<String>,
}

impl std::fmt::Display for MonitorHalted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            Some(r) => write!(f, "monitor halted: {r}"),
            None => write!(f, "monitor halted"),
        }
    }
}

impl std::error::Error for MonitorHalted {}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RejectedSighting {
    /// Position in the submitted batch.
    pub index: usize,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub accepted: usize,
    pub rejected: Vec<RejectedSighting>,
}

impl IngestSummary {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct TickSummary {
    pub block_number: u64,
    pub outcome: SweepOutcome,
    /// True when this tick's verdicts made the monitor halt.
    pub halted: bool,
}

impl AppState {
    async fn halted_error(&self) -> MonitorHalted {
        MonitorHalted {
            reason: self.status.read().await.halt_reason.clone(),
        }
    }

    /// Validate and merge a batch. Invalid sightings are skipped and listed;
    /// the valid ones are still merged.
    pub async fn ingest(&self, batch: Vec<Sighting>) -> Result<IngestSummary, MonitorHalted> {
        if self.is_halted() {
            return Err(self.halted_error().await);
        }

        let mut summary = IngestSummary::default();
        let mut engine = self.engine.lock().await;
        // A tick queued ahead of us on the lock may have halted the monitor.
        if self.is_halted() {
            return Err(self.halted_error().await);
        }
        for (index, s) in batch.into_iter().enumerate() {
            let channel = s.channel.clone();
            let key = s.key.clone();
            match engine.ingest(s) {
                Ok(()) => {
                    debug!(%channel, %key, "sighting merged");
                    summary.accepted += 1;
                }
                Err(e) => {
                    warn!(index, "{e}");
                    summary.rejected.push(RejectedSighting {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut st = self.status.write().await;
        st.sightings_accepted += summary.accepted as u64;
        st.sightings_rejected += summary.rejected.len() as u64;
        st.open_records = engine.store().len();
        Ok(summary)
    }

    /// One external tick: sweep, report verdicts in order, apply halt policy.
    pub async fn tick(&self, block_number: u64, now_ms: i64) -> Result<TickSummary, MonitorHalted> {
        if self.is_halted() {
            return Err(self.halted_error().await);
        }

        let mut engine = self.engine.lock().await;
        if self.is_halted() {
            return Err(self.halted_error().await);
        }
        let outcome = engine.on_tick(block_number, now_ms);
        debug!(
            block = block_number,
            verdicts = outcome.verdicts.len(),
            consistent = outcome.consistent.len(),
            pending = outcome.pending,
            "tick swept"
        );
        if self.config.reporter.log_consistent {
            for key in &outcome.consistent {
                debug!(%key, "settled consistent");
            }
        }

        let mut st = self.status.write().await;
        st.last_block = engine.last_block();
        st.open_records = engine.store().len();
        st.consistent_settled += outcome.consistent.len() as u64;

        let mut halt = false;
        for v in &outcome.verdicts {
            match v.kind {
                VerdictKind::Missing => st.verdicts_missing += 1,
                VerdictKind::Mismatched => st.verdicts_mismatched += 1,
            }
            let ev = VerdictEvent {
                seq: st.verdicts_missing + st.verdicts_mismatched,
                block_number,
                event_block: v.event_block(),
                verdict: v.clone(),
            };
            if self.reporter.report(&ev) == ReportAction::Halt {
                halt = true;
            }
        }

        if halt {
            let reason = format!(
                "anomaly at block {block_number}: {} missing, {} mismatched",
                outcome.count(VerdictKind::Missing),
                outcome.count(VerdictKind::Mismatched)
            );
            error!("{reason}; halting monitor");
            st.state = "halted".to_string();
            st.halt_reason = Some(reason.clone());
            let _ = self.bus.send(BusMsg::LogLine {
                level: "ERROR".to_string(),
                msg: reason,
            });
            self.halted.send_replace(true);
        }

        Ok(TickSummary {
            block_number,
            outcome,
            halted: halt,
        })
    }

    /// Route one recorded event to [`ingest`](Self::ingest) or [`tick`](Self::tick).
    pub async fn apply(&self, ev: FeedEvent) -> Result<(), MonitorHalted> {
        match ev {
            FeedEvent::Sighting(s) => self.ingest(vec![s]).await.map(|_| ()),
            FeedEvent::Tick {
                block_number,
                now_ms,
            } => self.tick(block_number, now_ms).await.map(|_| ()),
        }
    }
}

/// Spawn the confinement task for in-process adapters.
///
/// Events are applied strictly in arrival order. The task ends when every
/// sender is dropped or the monitor halts.
pub fn spawn_feed(state: Arc<AppState>, mut rx: mpsc::Receiver<FeedEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("feed task started");
        while let Some(ev) = rx.recv().await {
            if let Err(e) = state.apply(ev).await {
                warn!("feed task stopping: {e}");
                return;
            }
            if state.is_halted() {
                warn!("feed task stopping: monitor halted");
                return;
            }
        }
        info!("feed task finished: all senders dropped");
    })
}
