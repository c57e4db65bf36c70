//! Inbound event shapes and the normalized vocabulary.

use crate::{ChannelId, GuildId, UserId};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Source-provided delivery identifier used for deduplication.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct DeliveryId(pub u64);

/// Type of a raw inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RawEventKind {
    /// A member's voice state changed.
    VoiceStateUpdate,
    /// A channel was deleted.
    ChannelDelete,
    /// A member left the guild.
    GuildMemberRemove,
}

/// A decoded event as delivered by the inbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), build_fn(error = "speakhub_error::BuilderError"))]
pub struct RawEvent {
    /// Event type
    kind: RawEventKind,
    /// Guild the event belongs to
    guild_id: GuildId,
    /// Member the event is about
    #[builder(default)]
    user_id: Option<UserId>,
    /// Channel the member is now in, or the deleted channel
    #[builder(default)]
    channel_id: Option<ChannelId>,
    /// Channel the member was in before, when the transport knows it
    #[builder(default)]
    previous_channel_id: Option<ChannelId>,
    /// Display name of the member
    #[builder(default, setter(into, strip_option))]
    display_name: Option<String>,
    /// Whether the member is a bot account
    #[builder(default)]
    is_bot: bool,
    /// Source timestamp
    timestamp: DateTime<Utc>,
    /// Delivery identifier
    delivery_id: DeliveryId,
}

impl RawEvent {
    /// Start building a raw event.
    pub fn builder() -> RawEventBuilder {
        RawEventBuilder::default()
    }
}

/// The closed vocabulary consumed by the lifecycle orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum NormalizedEvent {
    /// A member is now in a voice channel.
    #[display("{} entered {} in {}", user, channel, guild)]
    UserEnteredChannel {
        /// Guild of the channel
        guild: GuildId,
        /// Member who entered
        user: UserId,
        /// Channel entered
        channel: ChannelId,
        /// Member display name
        display_name: String,
        /// Source timestamp
        at: DateTime<Utc>,
        /// Delivery that carried the event
        delivery_id: DeliveryId,
    },
    /// A member is no longer in any voice channel of the guild.
    #[display("{} left voice in {}", user, guild)]
    UserLeftChannel {
        /// Guild of the channel
        guild: GuildId,
        /// Member who left
        user: UserId,
        /// Channel left, when known
        channel: Option<ChannelId>,
        /// Source timestamp
        at: DateTime<Utc>,
    },
    /// A channel was deleted by something other than speakhub.
    #[display("channel {} deleted in {}", channel, guild)]
    ChannelDeletedExternally {
        /// Guild of the channel
        guild: GuildId,
        /// Deleted channel
        channel: ChannelId,
        /// Source timestamp
        at: DateTime<Utc>,
    },
}

impl NormalizedEvent {
    /// Guild the event belongs to.
    pub fn guild(&self) -> GuildId {
        match self {
            Self::UserEnteredChannel { guild, .. }
            | Self::UserLeftChannel { guild, .. }
            | Self::ChannelDeletedExternally { guild, .. } => *guild,
        }
    }

    /// Source timestamp of the event.
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::UserEnteredChannel { at, .. }
            | Self::UserLeftChannel { at, .. }
            | Self::ChannelDeletedExternally { at, .. } => *at,
        }
    }
}
