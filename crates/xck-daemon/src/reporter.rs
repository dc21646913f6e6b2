//! Verdict reporters.
//!
//! The engine only classifies. What a verdict *does* (a log line, an SSE
//! event, stopping the monitor) is decided here, per configuration.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, warn};
use xck_config::{AnomalyPolicy, MonitorConfig};
use xck_reconcile::{ChannelId, VerdictKind};

use crate::state::{BusMsg, VerdictEvent};

/// What the monitor should do after a verdict was reported.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReportAction {
    Continue,
    Halt,
}

pub trait VerdictReporter: Send + Sync {
    fn report(&self, ev: &VerdictEvent) -> ReportAction;
}

/// One structured log line per verdict.
pub struct LogReporter {
    channels: Vec<ChannelId>,
    required: BTreeSet<ChannelId>,
}

impl LogReporter {
    /// `channels` fixes the slot order in log lines; `required` names the
    /// channels a missing verdict is checked against.
    pub fn new(channels: Vec<ChannelId>, required: BTreeSet<ChannelId>) -> Self {
        Self { channels, required }
    }

    /// Required channels absent from the verdict's record, comma-joined.
    pub fn absent_channels(&self, ev: &VerdictEvent) -> String {
        ev.verdict
            .record
            .missing_channels(&self.required)
            .iter()
            .map(ChannelId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl VerdictReporter for LogReporter {
    fn report(&self, ev: &VerdictEvent) -> ReportAction {
        let v = &ev.verdict;
        let slots = v.describe_slots(&self.channels);
        match v.kind {
            VerdictKind::Missing => warn!(
                seq = ev.seq,
                block = ev.block_number,
                event_block = ?ev.event_block,
                key = %v.key,
                absent = %self.absent_channels(ev),
                first_seen_at_ms = v.record.first_seen_at_ms,
                "found missing event: {slots}"
            ),
            VerdictKind::Mismatched => error!(
                seq = ev.seq,
                block = ev.block_number,
                event_block = ?ev.event_block,
                key = %v.key,
                first_seen_at_ms = v.record.first_seen_at_ms,
                "channel counts disagree: {slots}"
            ),
        }
        ReportAction::Continue
    }
}

/// Publishes every verdict on the SSE bus.
pub struct BusReporter {
    bus: broadcast::Sender<BusMsg>,
}

impl BusReporter {
    pub fn new(bus: broadcast::Sender<BusMsg>) -> Self {
        Self { bus }
    }
}

impl VerdictReporter for BusReporter {
    fn report(&self, ev: &VerdictEvent) -> ReportAction {
        // No subscribers is fine.
        let _ = self.bus.send(BusMsg::Verdict(ev.clone()));
        ReportAction::Continue
    }
}

/// Fans out to every inner reporter, then applies the anomaly policy.
///
/// Inner reporters always all run; the strongest action wins.
pub struct CompositeReporter {
    inner: Vec<Box<dyn VerdictReporter>>,
    policy: AnomalyPolicy,
}

impl CompositeReporter {
    pub fn new(inner: Vec<Box<dyn VerdictReporter>>, policy: AnomalyPolicy) -> Self {
        Self { inner, policy }
    }
}

impl VerdictReporter for CompositeReporter {
    fn report(&self, ev: &VerdictEvent) -> ReportAction {
        let mut action = match self.policy {
            AnomalyPolicy::Log => ReportAction::Continue,
            AnomalyPolicy::Halt => ReportAction::Halt,
        };
        for r in &self.inner {
            if r.report(ev) == ReportAction::Halt {
                action = ReportAction::Halt;
            }
        }
        action
    }
}

/// Log + bus, with the configured anomaly policy.
pub fn reporter_from_config(
    cfg: &MonitorConfig,
    bus: broadcast::Sender<BusMsg>,
) -> Arc<dyn VerdictReporter> {
    let channels: Vec<ChannelId> = cfg.reconcile.known_channels().cloned().collect();
    Arc::new(CompositeReporter::new(
        vec![
            Box::new(LogReporter::new(
                channels,
                cfg.reconcile.required_channels.clone(),
            )),
            Box::new(BusReporter::new(bus)),
        ],
        cfg.reporter.on_anomaly,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xck_reconcile::{AggregateRecord, EventKey, Sighting, Verdict};

    struct Counting(Arc<AtomicUsize>);

    impl VerdictReporter for Counting {
        fn report(&self, _ev: &VerdictEvent) -> ReportAction {
            self.0.fetch_add(1, Ordering::SeqCst);
            ReportAction::Continue
        }
    }

    fn event() -> VerdictEvent {
        let s = Sighting::present(EventKey::reserves(1, 2), ChannelId::new("push"), 0);
        VerdictEvent {
            seq: 1,
            block_number: 9,
            event_block: Some(4),
            verdict: Verdict {
                kind: VerdictKind::Missing,
                key: s.key.clone(),
                record: AggregateRecord::from_sighting(&s.clone().with_block(4)),
            },
        }
    }

    #[test]
    fn log_policy_continues_and_runs_every_reporter() {
        let hits = Arc::new(AtomicUsize::new(0));
        let r = CompositeReporter::new(
            vec![
                Box::new(Counting(hits.clone())),
                Box::new(Counting(hits.clone())),
            ],
            AnomalyPolicy::Log,
        );
        assert_eq!(r.report(&event()), ReportAction::Continue);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn halt_policy_halts_after_reporting() {
        let hits = Arc::new(AtomicUsize::new(0));
        let r = CompositeReporter::new(vec![Box::new(Counting(hits.clone()))], AnomalyPolicy::Halt);
        assert_eq!(r.report(&event()), ReportAction::Halt);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn log_reporter_names_absent_required_channels() {
        let required = ["push", "query", "poll"].into_iter().map(ChannelId::new).collect();
        let r = LogReporter::new(Vec::new(), required);
        assert_eq!(r.absent_channels(&event()), "poll,query");
        assert_eq!(r.report(&event()), ReportAction::Continue);
    }

    #[test]
    fn bus_reporter_publishes_verdict() {
        let (bus, mut rx) = broadcast::channel(4);
        BusReporter::new(bus).report(&event());
        match rx.try_recv() {
            Ok(BusMsg::Verdict(ev)) => {
                assert_eq!(ev.seq, 1);
                assert_eq!(ev.event_block, Some(4));
            }
            other => panic!("expected verdict, got {other:?}"),
        }
    }
}
