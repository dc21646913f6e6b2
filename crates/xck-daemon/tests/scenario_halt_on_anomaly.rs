//! The anomaly policy is a reporter decision: `log` keeps watching, `halt`
//! stops ingestion and ticks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use xck_config::{AnomalyPolicy, MonitorConfig};
use xck_daemon::{monitor::spawn_feed, state::AppState, state::BusMsg};
use xck_reconcile::{ChannelId, EventKey, FeedEvent, Sighting, SightingMode, VerdictKind};

fn count_config(policy: AnomalyPolicy) -> MonitorConfig {
    let mut cfg = MonitorConfig::default();
    cfg.reconcile.required_channels = ["poller-A", "poller-B"]
        .into_iter()
        .map(ChannelId::new)
        .collect();
    cfg.reconcile.mode = SightingMode::Count;
    cfg.reconcile.settlement_window_ms = 1_000;
    cfg.reporter.on_anomaly = policy;
    cfg
}

async fn seed_mismatch(st: &AppState) {
    let k = EventKey::block(77);
    let summary = st
        .ingest(vec![
            Sighting::count(k.clone(), ChannelId::new("poller-A"), 5, 0),
            Sighting::count(k, ChannelId::new("poller-B"), 6, 0),
        ])
        .await
        .unwrap();
    assert_eq!(summary.accepted, 2);
}

#[tokio::test]
async fn log_policy_keeps_watching() {
    let st = AppState::new(count_config(AnomalyPolicy::Log), None).unwrap();
    seed_mismatch(&st).await;

    let tick = st.tick(78, 1_000).await.unwrap();
    assert_eq!(tick.outcome.count(VerdictKind::Mismatched), 1);
    assert!(!tick.halted);
    assert!(!st.is_halted());

    // Still accepting input.
    assert!(st.tick(79, 2_000).await.is_ok());
    assert_eq!(st.status.read().await.verdicts_mismatched, 1);
}

#[tokio::test]
async fn halt_policy_stops_the_monitor() {
    let st = AppState::new(count_config(AnomalyPolicy::Halt), None).unwrap();
    let mut bus = st.bus.subscribe();
    seed_mismatch(&st).await;

    let tick = st.tick(78, 1_000).await.unwrap();
    assert!(tick.halted);
    assert!(st.is_halted());

    let snap = st.status.read().await.clone();
    assert_eq!(snap.state, "halted");
    assert!(snap.halt_reason.unwrap().contains("block 78"));

    // Verdict first, then the halt log line.
    match bus.recv().await.unwrap() {
        BusMsg::Verdict(ev) => {
            assert_eq!(ev.seq, 1);
            assert_eq!(ev.block_number, 78);
            assert_eq!(ev.verdict.kind, VerdictKind::Mismatched);
        }
        other => panic!("expected verdict, got {other:?}"),
    }
    match bus.recv().await.unwrap() {
        BusMsg::LogLine { level, .. } => assert_eq!(level, "ERROR"),
        other => panic!("expected log line, got {other:?}"),
    }

    let err = st.tick(79, 2_000).await.unwrap_err();
    assert!(err.to_string().contains("monitor halted"));
    assert!(st
        .ingest(vec![Sighting::count(EventKey::block(80), ChannelId::new("poller-A"), 1, 0)])
        .await
        .is_err());

    // wait_for_halt resolves immediately once halted.
    tokio::time::timeout(Duration::from_secs(1), st.wait_for_halt())
        .await
        .expect("halt already signalled");
}

#[tokio::test]
async fn feed_task_applies_events_in_order_and_stops_on_halt() {
    let st = Arc::new(AppState::new(count_config(AnomalyPolicy::Halt), None).unwrap());
    let (tx, rx) = mpsc::channel(16);
    let handle = spawn_feed(Arc::clone(&st), rx);

    let k = EventKey::block(5);
    for ev in [
        FeedEvent::Sighting(Sighting::count(k.clone(), ChannelId::new("poller-A"), 2, 0)),
        FeedEvent::Tick { block_number: 5, now_ms: 500 },
        FeedEvent::Sighting(Sighting::count(k, ChannelId::new("poller-B"), 3, 600)),
        FeedEvent::Tick { block_number: 6, now_ms: 1_000 },
    ] {
        tx.send(ev).await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("feed task stops after halt")
        .unwrap();

    assert!(st.is_halted());
    let snap = st.status.read().await.clone();
    assert_eq!(snap.verdicts_mismatched, 1);
    assert_eq!(snap.last_block, Some(6));
}

#[tokio::test]
async fn feed_task_ends_when_senders_drop() {
    let st = Arc::new(AppState::new(MonitorConfig::default(), None).unwrap());
    let (tx, rx) = mpsc::channel(4);
    let handle = spawn_feed(Arc::clone(&st), rx);

    tx.send(FeedEvent::Tick { block_number: 1, now_ms: 0 }).await.unwrap();
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("feed task ends")
        .unwrap();
    assert!(!st.is_halted());
    assert_eq!(st.status.read().await.last_block, Some(1));
}

/// Calls already queued on the engine lock when a tick halts the monitor must
/// be refused, not merged or swept.
#[tokio::test]
async fn calls_queued_behind_a_halting_tick_are_refused() {
    let st = Arc::new(AppState::new(count_config(AnomalyPolicy::Halt), None).unwrap());
    seed_mismatch(&st).await;
    let pending_key = EventKey::block(90);
    st.ingest(vec![Sighting::count(pending_key.clone(), ChannelId::new("poller-A"), 1, 900)])
        .await
        .unwrap();

    let guard = st.engine.lock().await;

    let halting = tokio::spawn({
        let st = Arc::clone(&st);
        async move { st.tick(10, 1_000).await.map(|t| t.halted) }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let late_ingest = tokio::spawn({
        let st = Arc::clone(&st);
        async move {
            st.ingest(vec![Sighting::count(EventKey::block(91), ChannelId::new("poller-A"), 1, 0)])
                .await
                .map(|s| s.accepted)
        }
    });
    let late_tick = tokio::spawn({
        let st = Arc::clone(&st);
        async move { st.tick(11, 10_000).await.map(|t| t.outcome.verdicts.len()) }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(guard);

    assert_eq!(halting.await.unwrap(), Ok(true));
    assert!(late_ingest.await.unwrap().is_err());
    assert!(late_tick.await.unwrap().is_err());

    assert!(st.is_halted());
    let engine = st.engine.lock().await;
    // Only the still-pending record survives; nothing merged or swept after the halt.
    assert_eq!(engine.store().len(), 1);
    assert!(engine.store().get(&pending_key).is_some());
    assert_eq!(engine.last_block(), Some(10));
    drop(engine);
    assert_eq!(st.status.read().await.verdicts_mismatched, 1);
}
