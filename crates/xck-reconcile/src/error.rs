use std::fmt;

use crate::{ChannelId, EventKey, SightingMode};

// ---------------------------------------------------------------------------
// Sighting rejection
// ---------------------------------------------------------------------------

/// Reasons a sighting is refused at the boundary.
///
/// A refused sighting is never merged; the rest of the stream keeps flowing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SightingError {
    /// The channel is neither required nor optional in this deployment.
    UnknownChannel { channel: ChannelId, key: EventKey },
    /// A count arrived in a presence deployment, or the reverse.
    ModeMismatch {
        channel: ChannelId,
        key: EventKey,
        expected: SightingMode,
    },
}

impl fmt::Display for SightingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SightingError::UnknownChannel { channel, key } => {
                write!(f, "INVALID_SIGHTING unknown channel={channel} key={key}")
            }
            SightingError::ModeMismatch {
                channel,
                key,
                expected,
            } => {
                write!(
                    f,
                    "INVALID_SIGHTING mode mismatch channel={channel} key={key} expected={expected:?}"
                )
            }
        }
    }
}

impl std::error::Error for SightingError {}

// ---------------------------------------------------------------------------
// Config validation
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    TooFewRequiredChannels { got: usize },
    ChannelBothRequiredAndOptional(ChannelId),
    EmptyChannelName,
    NonPositiveWindow { got_ms: i64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TooFewRequiredChannels { got } => {
                write!(f, "at least 2 required channels needed, got {got}")
            }
            ConfigError::ChannelBothRequiredAndOptional(c) => {
                write!(f, "channel {c} is listed as both required and optional")
            }
            ConfigError::EmptyChannelName => write!(f, "channel names must not be empty"),
            ConfigError::NonPositiveWindow { got_ms } => {
                write!(f, "settlement_window_ms must be > 0, got {got_ms}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
