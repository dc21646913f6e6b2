//! Key derivation for decoded event payloads.
//!
//! Decoding logs is the adapter's job; once it has a typed payload it asks the
//! payload for its [`EventKey`]. Derivation must be deterministic and distinct
//! events inside one settlement window must not share a key.

use serde::{Deserialize, Serialize};

use crate::{ChannelId, EventKey, Sighting};

pub trait KeySource {
    fn event_key(&self) -> EventKey;
}

/// A decoded `Sync(uint112 reserve0, uint112 reserve1)` log.
///
/// Identity is the reserve pair only. `block_number` is not part of the key;
/// it rides on the sighting so verdicts can name the block to re-fetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub reserve0: u128,
    pub reserve1: u128,
    pub block_number: u64,
}

impl KeySource for SyncEvent {
    fn event_key(&self) -> EventKey {
        EventKey::reserves(self.reserve0, self.reserve1)
    }
}

impl SyncEvent {
    /// Presence sighting for `channel`, carrying this log's block.
    pub fn sighting(&self, channel: ChannelId, observed_at_ms: i64) -> Sighting {
        Sighting::present(self.event_key(), channel, observed_at_ms).with_block(self.block_number)
    }
}

/// A per-block counting window (count-mode deployments).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    pub block_number: u64,
}

impl KeySource for BlockWindow {
    fn event_key(&self) -> EventKey {
        EventKey::block(self.block_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_key_ignores_block_number() {
        let a = SyncEvent {
            reserve0: 1,
            reserve1: 23,
            block_number: 100,
        };
        let b = SyncEvent {
            block_number: 101,
            ..a.clone()
        };
        assert_eq!(a.event_key(), b.event_key());
    }

    #[test]
    fn reserve_pairs_do_not_collide_on_digit_boundaries() {
        assert_ne!(EventKey::reserves(1, 23), EventKey::reserves(12, 3));
        assert_eq!(EventKey::reserves(1, 23).to_string(), "(1,23)");
    }

    #[test]
    fn sync_sighting_carries_block() {
        let ev = SyncEvent {
            reserve0: 7,
            reserve1: 8,
            block_number: 4_321,
        };
        let s = ev.sighting(ChannelId::new("push"), 10);
        assert_eq!(s.key, EventKey::reserves(7, 8));
        assert_eq!(s.block_number, Some(4_321));
    }

    #[test]
    fn block_window_key() {
        assert_eq!(BlockWindow { block_number: 7 }.event_key(), EventKey::block(7));
    }
}
