use std::collections::BTreeMap;

use crate::{AggregateRecord, EventKey, Sighting};

/// Keyed aggregate state for every event with at least one sighting.
///
/// The store does no validation; [`crate::Reconciler::ingest`] rejects invalid
/// sightings before they get here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStore {
    records: BTreeMap<EventKey, AggregateRecord>,
}

impl ReconcileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one sighting into its key's record, creating the record if needed.
    ///
    /// The channel's slot is overwritten unconditionally. Timestamps widen to
    /// cover the observation, so merge order across channels does not matter.
    pub fn merge(&mut self, sighting: Sighting) {
        match self.records.get_mut(&sighting.key) {
            Some(rec) => {
                rec.per_channel.insert(sighting.channel, sighting.value);
                rec.first_seen_at_ms = rec.first_seen_at_ms.min(sighting.observed_at_ms);
                rec.last_updated_at_ms = rec.last_updated_at_ms.max(sighting.observed_at_ms);
                rec.note_block(sighting.block_number);
            }
            None => {
                let rec = AggregateRecord::from_sighting(&sighting);
                self.records.insert(sighting.key, rec);
            }
        }
    }

    /// Point-in-time copy of all records, in key order.
    pub fn snapshot(&self) -> Vec<(EventKey, AggregateRecord)> {
        self.records
            .iter()
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect()
    }

    /// Remove a record. Absent keys are a no-op.
    pub fn delete(&mut self, key: &EventKey) {
        self.records.remove(key);
    }

    pub fn get(&self, key: &EventKey) -> Option<&AggregateRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
