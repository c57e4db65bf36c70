//! Results of the cache's atomic primitives.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::Serialize;
use speakhub_core::{ChannelId, GuildId, ManagedChannel, PendingOperation};
use std::time::Duration;

/// Outcome of trying to claim a user's creation slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationGate {
    /// The slot was claimed; the caller must complete the operation.
    Acquired(PendingOperation),
    /// A creation for this user is already in flight.
    AlreadyPending,
    /// The user already owns a managed channel.
    AlreadyOwns(ChannelId),
    /// The user created a channel too recently.
    CoolingDown(Duration),
}

/// Outcome of trying to claim a channel for deletion.
///
/// Eligibility is evaluated against live occupancy at the moment of the
/// call, not at the time the deletion was scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionGate {
    /// The channel was claimed; the caller must complete the operation.
    Acquired(PendingOperation),
    /// The channel is not (or no longer) managed.
    NotManaged,
    /// Another operation on the channel is in flight.
    Busy,
    /// Members are in the channel.
    Occupied(usize),
    /// The channel has not been empty for the full grace window.
    NotExpired(Duration),
}

/// Effect of a presence update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceChange {
    /// False when the update was older than the stored presence
    pub applied: bool,
    /// Channel the user was in before
    pub previous: Option<ChannelId>,
    /// Channel the user is in now
    pub current: Option<ChannelId>,
    /// Source timestamp of the stored presence after the update
    pub at: DateTime<Utc>,
}

impl PresenceChange {
    /// True if the user moved between channels.
    pub fn moved(&self) -> bool {
        self.applied && self.previous != self.current
    }
}

/// Consistent read of a guild's managed channels and guards.
#[derive(Debug, Clone, Serialize, Getters)]
pub struct GuildSnapshot {
    /// Guild the snapshot describes
    guild_id: GuildId,
    /// Every managed channel
    channels: Vec<ManagedChannel>,
    /// Every in-flight operation
    #[serde(skip)]
    pending: Vec<PendingOperation>,
}

impl GuildSnapshot {
    pub(crate) fn new(
        guild_id: GuildId,
        channels: Vec<ManagedChannel>,
        pending: Vec<PendingOperation>,
    ) -> Self {
        Self {
            guild_id,
            channels,
            pending,
        }
    }

    /// Look up a managed channel.
    pub fn channel(&self, id: ChannelId) -> Option<&ManagedChannel> {
        self.channels.iter().find(|c| *c.channel_id() == id)
    }

    /// True if any creation is in flight.
    pub fn has_pending_creation(&self) -> bool {
        self.pending
            .iter()
            .any(|op| matches!(op.key(), speakhub_core::OperationKey::Creation { .. }))
    }
}
