//! In-flight operation guards and their outcomes.

use crate::{ChannelId, GuildId, ManagedChannel, UserId};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resource a pending operation is keyed by.
///
/// Creation is keyed by the `(guild, user)` slot before the channel exists;
/// every later operation is keyed by the channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum OperationKey {
    /// Creation slot of a user in a guild.
    #[display("create:{}:{}", guild, user)]
    Creation {
        /// Guild of the slot
        guild: GuildId,
        /// User the channel is created for
        user: UserId,
    },
    /// An existing channel.
    #[display("channel:{}:{}", guild, channel)]
    Channel {
        /// Guild of the channel
        guild: GuildId,
        /// Target channel
        channel: ChannelId,
    },
}

impl OperationKey {
    /// Key for a creation slot.
    pub fn creation(guild: GuildId, user: UserId) -> Self {
        Self::Creation { guild, user }
    }

    /// Key for a channel.
    pub fn channel(guild: GuildId, channel: ChannelId) -> Self {
        Self::Channel { guild, channel }
    }

    /// Guild the key belongs to.
    pub fn guild(&self) -> GuildId {
        match self {
            Self::Creation { guild, .. } | Self::Channel { guild, .. } => *guild,
        }
    }
}

/// What a pending operation is doing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    /// Creating a channel.
    Create,
    /// Deleting a channel.
    Delete,
    /// Changing a permission overwrite.
    UpdatePermissions,
    /// Renaming or limiting a channel.
    Edit,
    /// Moving or disconnecting a member of a channel.
    Move,
}

/// An in-flight, guarded mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct PendingOperation {
    /// Unique id of this attempt
    id: Uuid,
    /// Guarded resource
    key: OperationKey,
    /// Kind of mutation
    kind: OperationKind,
    /// When the guard was taken
    started_at: DateTime<Utc>,
}

impl PendingOperation {
    /// Create a new pending operation with a fresh id.
    pub fn new(key: OperationKey, kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            kind,
            started_at: Utc::now(),
        }
    }

    /// Idempotency key carried by every command issued for this operation.
    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey(format!("{}#{}", self.key, self.id))
    }
}

/// Key that lets the dispatcher recognise a resubmitted command.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Wrap an arbitrary key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a sub-key for a follow-up command of the same operation.
    pub fn child(&self, suffix: &str) -> Self {
        Self(format!("{}/{}", self.0, suffix))
    }

    /// Borrow the key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result applied to the cache when an operation completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The channel was created and should be tracked.
    Created(ManagedChannel),
    /// The channel was deleted remotely.
    Deleted,
    /// The channel turned out to be gone already.
    ChannelGone,
    /// A mutation succeeded; the record was updated in place.
    Applied,
    /// A terminal failure; the guard is released and drift recorded.
    Failed {
        /// Human-readable reason
        reason: String,
    },
    /// The retry budget ran out; the guard is released and drift recorded.
    Cancelled {
        /// Attempts made before giving up
        attempts: u32,
    },
}
