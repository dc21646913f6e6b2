use crate::{
    AfterReport, AggregateRecord, EventKey, ReconcileConfig, ReconcileStore, SettlementAnchor,
    SightingMode, Verdict, VerdictKind,
};

/// Per-record classification (internal; only Missing/Mismatched escape as verdicts).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Settlement {
    Pending,
    Consistent,
    Flagged(VerdictKind),
}

/// Full result of one sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Verdicts in snapshot order.
    pub verdicts: Vec<Verdict>,
    /// Keys settled as consistent and evicted during this sweep.
    pub consistent: Vec<EventKey>,
    /// Records still inside their settlement window.
    pub pending: usize,
}

impl SweepOutcome {
    pub fn is_clean(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn count(&self, kind: VerdictKind) -> usize {
        self.verdicts.iter().filter(|v| v.kind == kind).count()
    }
}

/// Applies the settlement policy to a store on each tick.
#[derive(Clone, Debug)]
pub struct SettlementSweeper {
    cfg: ReconcileConfig,
}

impl SettlementSweeper {
    pub fn new(cfg: ReconcileConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.cfg
    }

    /// Judge every settled record and return the verdicts.
    pub fn sweep(&self, store: &mut ReconcileStore, now_ms: i64) -> Vec<Verdict> {
        self.sweep_outcome(store, now_ms).verdicts
    }

    /// Same as [`sweep`](Self::sweep), also reporting consistent and pending keys.
    pub fn sweep_outcome(&self, store: &mut ReconcileStore, now_ms: i64) -> SweepOutcome {
        let mut out = SweepOutcome::default();

        for (key, record) in store.snapshot() {
            match self.classify(&record, now_ms) {
                Settlement::Pending => out.pending += 1,
                Settlement::Consistent => {
                    store.delete(&key);
                    out.consistent.push(key);
                }
                Settlement::Flagged(kind) => {
                    if self.cfg.after_report == AfterReport::Evict {
                        store.delete(&key);
                    }
                    out.verdicts.push(Verdict { kind, key, record });
                }
            }
        }

        out
    }

    fn anchor_ms(&self, record: &AggregateRecord) -> i64 {
        match self.cfg.anchor {
            SettlementAnchor::FirstSeen => record.first_seen_at_ms,
            SettlementAnchor::LastUpdated => record.last_updated_at_ms,
        }
    }

    fn classify(&self, record: &AggregateRecord, now_ms: i64) -> Settlement {
        // Inside the window: partial data is expected, judge nothing.
        if now_ms.saturating_sub(self.anchor_ms(record)) < self.cfg.settlement_window_ms {
            return Settlement::Pending;
        }

        let mut slots = Vec::with_capacity(self.cfg.required_channels.len());
        for ch in &self.cfg.required_channels {
            match record.slot(ch) {
                Some(v) => slots.push(*v),
                None => return Settlement::Flagged(VerdictKind::Missing),
            }
        }

        if self.cfg.mode == SightingMode::Count {
            let mut counts = slots.iter().map(|v| v.count());
            let first = counts.next().flatten();
            if counts.any(|c| c != first) {
                return Settlement::Flagged(VerdictKind::Mismatched);
            }
        }

        Settlement::Consistent
    }
}
