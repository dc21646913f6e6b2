use xck_reconcile::*;

const WINDOW: i64 = 30_000;

#[test]
fn scenario_consistent_key_is_not_resurrected() {
    let mut rc = Reconciler::new(ReconcileConfig::new(
        ["push", "query"],
        WINDOW,
        SightingMode::Presence,
    ))
    .expect("valid config");
    let k = EventKey::reserves(9, 9);

    rc.ingest(Sighting::present(k.clone(), ChannelId::new("push"), 0)).expect("valid");
    rc.ingest(Sighting::present(k.clone(), ChannelId::new("query"), 0)).expect("valid");
    assert_eq!(rc.on_tick(1, WINDOW).consistent, vec![k.clone()]);

    // A late duplicate from one channel starts a brand new record.
    rc.ingest(Sighting::present(k.clone(), ChannelId::new("push"), 100_000))
        .expect("valid");
    let rec = rc.store().get(&k).expect("fresh record");
    assert_eq!(rec.first_seen_at_ms, 100_000);
    assert_eq!(rec.per_channel.len(), 1);
    assert!(rec.slot(&ChannelId::new("query")).is_none());

    // And it is judged on its own window.
    assert!(rc.on_tick(2, 100_000 + WINDOW - 1).is_clean());
    assert_eq!(rc.on_tick(3, 100_000 + WINDOW).count(VerdictKind::Missing), 1);
}
