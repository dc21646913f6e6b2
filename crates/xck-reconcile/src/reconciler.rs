use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, ReconcileConfig, ReconcileStore, SettlementSweeper, Sighting, SightingError,
    SightingMode, SightingValue, SweepOutcome,
};

/// One input to the engine, as recorded by adapters or replay files.
///
/// Externally tagged: `{"tick": {...}}` or `{"sighting": {...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedEvent {
    Tick { block_number: u64, now_ms: i64 },
    Sighting(Sighting),
}

/// Store + sweeper + the boundary checks, owned by one caller.
///
/// Callers that share a `Reconciler` across tasks wrap it in a single lock;
/// every method takes `&mut self` so merges and sweeps never interleave.
#[derive(Clone, Debug)]
pub struct Reconciler {
    store: ReconcileStore,
    sweeper: SettlementSweeper,
    last_block: Option<u64>,
}

impl Reconciler {
    pub fn new(cfg: ReconcileConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            store: ReconcileStore::new(),
            sweeper: SettlementSweeper::new(cfg),
            last_block: None,
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        self.sweeper.config()
    }

    pub fn store(&self) -> &ReconcileStore {
        &self.store
    }

    /// Block number of the most recent tick, if any.
    pub fn last_block(&self) -> Option<u64> {
        self.last_block
    }

    /// Check a sighting against the deployment without merging it.
    pub fn check(&self, s: &Sighting) -> Result<(), SightingError> {
        let cfg = self.config();
        if !cfg.is_known_channel(&s.channel) {
            return Err(SightingError::UnknownChannel {
                channel: s.channel.clone(),
                key: s.key.clone(),
            });
        }
        let fits = matches!(
            (cfg.mode, s.value),
            (SightingMode::Presence, SightingValue::Present)
                | (SightingMode::Count, SightingValue::Count(_))
        );
        if !fits {
            return Err(SightingError::ModeMismatch {
                channel: s.channel.clone(),
                key: s.key.clone(),
                expected: cfg.mode,
            });
        }
        Ok(())
    }

    /// Validate and merge. An invalid sighting leaves the store untouched.
    pub fn ingest(&mut self, s: Sighting) -> Result<(), SightingError> {
        self.check(&s)?;
        self.store.merge(s);
        Ok(())
    }

    /// One external tick: sweep everything settled as of `now_ms`.
    pub fn on_tick(&mut self, block_number: u64, now_ms: i64) -> SweepOutcome {
        self.last_block = Some(block_number);
        self.sweeper.sweep_outcome(&mut self.store, now_ms)
    }

    /// Route a recorded event. Ticks return their sweep outcome.
    pub fn apply(&mut self, ev: FeedEvent) -> Result<Option<SweepOutcome>, SightingError> {
        match ev {
            FeedEvent::Sighting(s) => self.ingest(s).map(|_| None),
            FeedEvent::Tick {
                block_number,
                now_ms,
            } => Ok(Some(self.on_tick(block_number, now_ms))),
        }
    }
}
