use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known channel labels.
pub const PUSH_SUBSCRIPTION: &str = "push-subscription";
pub const RANGE_QUERY: &str = "range-query";
pub const RAW_LOG_FETCH: &str = "raw-log-fetch";

/// Identifies a sighting source (deterministic ordering for tests/logs).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured identity of one logical event.
///
/// Equality is field-by-field, so `(1, 23)` and `(12, 3)` never collide.
/// Values are unsigned and wide enough for `uint112` reserves.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKey(pub Vec<u128>);

impl EventKey {
    pub fn new(parts: impl Into<Vec<u128>>) -> Self {
        Self(parts.into())
    }

    /// Key of a `Sync(reserve0, reserve1)` log.
    pub fn reserves(reserve0: u128, reserve1: u128) -> Self {
        Self(vec![reserve0, reserve1])
    }

    /// Key of a per-block counting window.
    pub fn block(number: u64) -> Self {
        Self(vec![u128::from(number)])
    }

    pub fn parts(&self) -> &[u128] {
        &self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(")")
    }
}

/// What one channel reported for a key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "count", rename_all = "snake_case")]
pub enum SightingValue {
    /// The channel saw the event; no further data.
    Present,
    /// The channel saw this many matching items in the window.
    Count(u64),
}

impl SightingValue {
    pub fn count(&self) -> Option<u64> {
        match self {
            SightingValue::Present => None,
            SightingValue::Count(n) => Some(*n),
        }
    }
}

impl fmt::Display for SightingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SightingValue::Present => f.write_str("present"),
            SightingValue::Count(n) => write!(f, "{n}"),
        }
    }
}

/// One channel's report for one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sighting {
    pub key: EventKey,
    pub channel: ChannelId,
    pub value: SightingValue,
    /// Epoch millis at which the channel observed the event (adapter-supplied).
    pub observed_at_ms: i64,
    /// Block the event was included in, when the channel knows it. Lets a
    /// verdict drive a follow-up fetch of that block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

impl Sighting {
    pub fn new(key: EventKey, channel: ChannelId, value: SightingValue, observed_at_ms: i64) -> Self {
        Self {
            key,
            channel,
            value,
            observed_at_ms,
            block_number: None,
        }
    }

    pub fn with_block(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number);
        self
    }

    pub fn present(key: EventKey, channel: ChannelId, observed_at_ms: i64) -> Self {
        Self::new(key, channel, SightingValue::Present, observed_at_ms)
    }

    pub fn count(key: EventKey, channel: ChannelId, count: u64, observed_at_ms: i64) -> Self {
        Self::new(key, channel, SightingValue::Count(count), observed_at_ms)
    }
}

/// Everything known about one key across all channels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub key: EventKey,
    /// Absent channel = no entry.
    pub per_channel: BTreeMap<ChannelId, SightingValue>,
    /// Earliest observation merged into this record. Never moves later, but a
    /// late sighting with an older `observed_at_ms` moves it earlier.
    pub first_seen_at_ms: i64,
    /// Latest observation merged into this record.
    pub last_updated_at_ms: i64,
    /// Lowest block number any channel reported for this event.
    #[serde(default)]
    pub event_block: Option<u64>,
}

impl AggregateRecord {
    pub fn from_sighting(s: &Sighting) -> Self {
        let mut per_channel = BTreeMap::new();
        per_channel.insert(s.channel.clone(), s.value);
        Self {
            key: s.key.clone(),
            per_channel,
            first_seen_at_ms: s.observed_at_ms,
            last_updated_at_ms: s.observed_at_ms,
            event_block: s.block_number,
        }
    }

    /// Fold one more sighting's block into `event_block`. Order-independent.
    pub fn note_block(&mut self, block_number: Option<u64>) {
        self.event_block = match (self.event_block, block_number) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    pub fn slot(&self, channel: &ChannelId) -> Option<&SightingValue> {
        self.per_channel.get(channel)
    }

    /// Required channels with no slot, in channel order.
    pub fn missing_channels(&self, required: &BTreeSet<ChannelId>) -> Vec<ChannelId> {
        required
            .iter()
            .filter(|c| !self.per_channel.contains_key(*c))
            .cloned()
            .collect()
    }
}

/// Classification of a settled record that needs attention.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    /// A required channel never reported within the window.
    Missing,
    /// All required channels reported, counts disagree.
    Mismatched,
}

impl VerdictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::Missing => "MISSING",
            VerdictKind::Mismatched => "MISMATCHED",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub key: EventKey,
    pub record: AggregateRecord,
}

impl Verdict {
    /// Block to re-fetch when following up on this verdict.
    pub fn event_block(&self) -> Option<u64> {
        self.record.event_block
    }

    /// Render slots for every channel in `channels` as `name:value|absent`.
    pub fn describe_slots<'a>(&self, channels: impl IntoIterator<Item = &'a ChannelId>) -> String {
        channels
            .into_iter()
            .map(|c| match self.record.slot(c) {
                Some(v) => format!("{c}:{v}"),
                None => format!("{c}:absent"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
