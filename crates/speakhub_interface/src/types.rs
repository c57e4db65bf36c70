//! Remote state snapshots.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use speakhub_core::{ChannelId, GuildId, UserId};
use std::collections::BTreeMap;

/// A voice channel as seen on the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RemoteChannel {
    /// Channel identifier
    id: ChannelId,
    /// Current name
    name: String,
    /// Parent category
    parent_id: Option<ChannelId>,
    /// Creation time
    created_at: DateTime<Utc>,
}

impl RemoteChannel {
    /// Create a remote channel description.
    pub fn new(
        id: ChannelId,
        name: impl Into<String>,
        parent_id: Option<ChannelId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            created_at,
        }
    }
}

/// Full view of a guild's voice channels and voice states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RemoteSnapshot {
    /// Guild the snapshot describes
    guild_id: GuildId,
    /// Every voice channel in the guild
    channels: Vec<RemoteChannel>,
    /// Channel each connected member is in
    voice_states: BTreeMap<UserId, ChannelId>,
    /// When the snapshot was taken
    taken_at: DateTime<Utc>,
}

impl RemoteSnapshot {
    /// Assemble a snapshot.
    pub fn new(
        guild_id: GuildId,
        channels: Vec<RemoteChannel>,
        voice_states: BTreeMap<UserId, ChannelId>,
        taken_at: DateTime<Utc>,
    ) -> Self {
        Self {
            guild_id,
            channels,
            voice_states,
            taken_at,
        }
    }

    /// Look up a channel by id.
    pub fn channel(&self, id: ChannelId) -> Option<&RemoteChannel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Members currently in a channel, in id order.
    pub fn occupants(&self, channel: ChannelId) -> Vec<UserId> {
        self.voice_states
            .iter()
            .filter(|(_, c)| **c == channel)
            .map(|(u, _)| *u)
            .collect()
    }
}
