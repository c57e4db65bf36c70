//! Correctable divergence between the cache and the remote platform.

use crate::{ChannelId, GuildId, OperationKey, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A drift condition recorded for the reconciliation sweeper.
///
/// Drift is never escalated as an error; the sweeper drains these records
/// and corrects them against the next remote snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum DriftCondition {
    /// A command failed terminally.
    #[display("terminal failure on {}: {}", key, reason)]
    TerminalFailure {
        /// Operation that failed
        key: OperationKey,
        /// Failure description
        reason: String,
        /// When it happened
        at: DateTime<Utc>,
    },
    /// A command ran out of retries and was cancelled.
    #[display("retry budget exhausted on {} after {} attempts", key, attempts)]
    RetryBudgetExhausted {
        /// Operation that was cancelled
        key: OperationKey,
        /// Attempts made
        attempts: u32,
        /// When it happened
        at: DateTime<Utc>,
    },
    /// A freshly created channel could not receive its owner.
    #[display("could not move {} into {} in guild {}", user, channel, guild)]
    MoveFailed {
        /// Guild of the channel
        guild: GuildId,
        /// Created channel
        channel: ChannelId,
        /// Member who should have been moved
        user: UserId,
    },
    /// A tracked channel was deleted by someone else.
    #[display("channel {} in guild {} deleted externally", channel, guild)]
    DeletedExternally {
        /// Guild of the channel
        guild: GuildId,
        /// Deleted channel
        channel: ChannelId,
    },
}

impl DriftCondition {
    /// Guild the condition belongs to.
    pub fn guild(&self) -> GuildId {
        match self {
            Self::TerminalFailure { key, .. } | Self::RetryBudgetExhausted { key, .. } => {
                key.guild()
            }
            Self::MoveFailed { guild, .. } | Self::DeletedExternally { guild, .. } => *guild,
        }
    }
}
