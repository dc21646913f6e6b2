use xck_reconcile::*;

#[test]
fn scenario_unknown_channel_is_rejected_and_not_merged() {
    let mut rc = Reconciler::new(ReconcileConfig::new(
        ["push", "query"],
        30_000,
        SightingMode::Presence,
    ))
    .expect("valid config");
    let k = EventKey::reserves(1, 2);

    let err = rc
        .ingest(Sighting::present(k.clone(), ChannelId::new("poller-A"), 0))
        .expect_err("unknown channel");
    assert!(matches!(err, SightingError::UnknownChannel { .. }));
    assert!(err.to_string().starts_with("INVALID_SIGHTING"));
    assert!(rc.store().is_empty());
}

#[test]
fn scenario_count_in_presence_deployment_is_rejected() {
    let mut rc = Reconciler::new(ReconcileConfig::new(
        ["push", "query"],
        30_000,
        SightingMode::Presence,
    ))
    .expect("valid config");

    let err = rc
        .ingest(Sighting::count(EventKey::block(1), ChannelId::new("push"), 3, 0))
        .expect_err("mode mismatch");
    assert_eq!(
        err,
        SightingError::ModeMismatch {
            channel: ChannelId::new("push"),
            key: EventKey::block(1),
            expected: SightingMode::Presence,
        }
    );
    assert!(rc.store().is_empty());
}

#[test]
fn scenario_presence_in_count_deployment_is_rejected() {
    let mut rc = Reconciler::new(ReconcileConfig::new(["a", "b"], 1_000, SightingMode::Count))
        .expect("valid config");
    let k = EventKey::block(1);
    rc.ingest(Sighting::count(k.clone(), ChannelId::new("a"), 3, 0)).expect("valid");

    assert!(rc.ingest(Sighting::present(k.clone(), ChannelId::new("b"), 0)).is_err());
    // The existing record is untouched.
    let rec = rc.store().get(&k).expect("record");
    assert_eq!(rec.per_channel.len(), 1);
}

#[test]
fn scenario_bad_configs_are_refused() {
    let one = ReconcileConfig::new(["push"], 1_000, SightingMode::Presence);
    assert_eq!(
        Reconciler::new(one).err(),
        Some(ConfigError::TooFewRequiredChannels { got: 1 })
    );

    let zero_window = ReconcileConfig::new(["a", "b"], 0, SightingMode::Presence);
    assert_eq!(
        Reconciler::new(zero_window).err(),
        Some(ConfigError::NonPositiveWindow { got_ms: 0 })
    );

    let overlap = ReconcileConfig::new(["a", "b"], 1, SightingMode::Presence).with_optional(["b"]);
    assert_eq!(
        Reconciler::new(overlap).err(),
        Some(ConfigError::ChannelBothRequiredAndOptional(ChannelId::new("b")))
    );
}
