use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ChannelId, ConfigError, PUSH_SUBSCRIPTION, RANGE_QUERY};

/// Default grace period before a record is judged.
pub const DEFAULT_SETTLEMENT_WINDOW_MS: i64 = 30_000;

/// Which kind of `SightingValue` a deployment accepts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SightingMode {
    #[default]
    Presence,
    Count,
}

/// Which record timestamp the settlement window is measured from.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementAnchor {
    #[default]
    FirstSeen,
    /// Every merge restarts the window.
    LastUpdated,
}

/// What happens to a Missing/Mismatched record once its verdict is emitted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterReport {
    /// Delete the record; a later sighting starts a fresh one.
    #[default]
    Evict,
    /// Keep the record; it is re-reported on every tick until it becomes
    /// consistent or is deleted externally.
    Retain,
}

/// Policy config for reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    /// Channels that must all report for a record to be consistent.
    pub required_channels: BTreeSet<ChannelId>,
    /// Channels accepted for merge but never required (e.g. a follow-up raw log fetch).
    pub optional_channels: BTreeSet<ChannelId>,
    pub settlement_window_ms: i64,
    pub mode: SightingMode,
    pub anchor: SettlementAnchor,
    pub after_report: AfterReport,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            required_channels: [ChannelId::new(PUSH_SUBSCRIPTION), ChannelId::new(RANGE_QUERY)]
                .into_iter()
                .collect(),
            optional_channels: BTreeSet::new(),
            settlement_window_ms: DEFAULT_SETTLEMENT_WINDOW_MS,
            mode: SightingMode::Presence,
            anchor: SettlementAnchor::FirstSeen,
            after_report: AfterReport::Evict,
        }
    }
}

impl ReconcileConfig {
    pub fn new<I, S>(required: I, settlement_window_ms: i64, mode: SightingMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_channels: required.into_iter().map(ChannelId::new).collect(),
            settlement_window_ms,
            mode,
            ..Self::default()
        }
    }

    pub fn with_optional<I, S>(mut self, optional: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_channels = optional.into_iter().map(ChannelId::new).collect();
        self
    }

    pub fn with_anchor(mut self, anchor: SettlementAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_after_report(mut self, after_report: AfterReport) -> Self {
        self.after_report = after_report;
        self
    }

    pub fn is_known_channel(&self, channel: &ChannelId) -> bool {
        self.required_channels.contains(channel) || self.optional_channels.contains(channel)
    }

    /// Required first, then optional.
    pub fn known_channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.required_channels
            .iter()
            .chain(self.optional_channels.iter())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.required_channels.len() < 2 {
            return Err(ConfigError::TooFewRequiredChannels {
                got: self.required_channels.len(),
            });
        }
        if let Some(c) = self
            .optional_channels
            .intersection(&self.required_channels)
            .next()
        {
            return Err(ConfigError::ChannelBothRequiredAndOptional(c.clone()));
        }
        if self.known_channels().any(|c| c.as_str().trim().is_empty()) {
            return Err(ConfigError::EmptyChannelName);
        }
        if self.settlement_window_ms <= 0 {
            return Err(ConfigError::NonPositiveWindow {
                got_ms: self.settlement_window_ms,
            });
        }
        Ok(())
    }
}
