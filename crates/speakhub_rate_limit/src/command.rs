//! Outbound commands.

use crate::{BucketClass, BucketKey};
use speakhub_core::{
    ChannelEdit, ChannelId, ChannelSpec, GuildId, IdempotencyKey, OverwriteTarget,
    PermissionOverwrite, UserId,
};

/// Resource whose commands must execute in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ResourceKey {
    /// A channel.
    #[display("channel:{}:{}", _0, _1)]
    Channel(GuildId, ChannelId),
    /// A user's creation slot.
    #[display("slot:{}:{}", _0, _1)]
    CreationSlot(GuildId, UserId),
    /// A member's voice connection.
    #[display("member:{}:{}", _0, _1)]
    Member(GuildId, UserId),
}

/// A mutating call against the platform.
///
/// Every command carries the idempotency key of the operation that issued
/// it; resubmitting a completed key replays the stored result.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    /// Create a voice channel.
    CreateChannel {
        /// Target guild
        guild: GuildId,
        /// Channel to create
        spec: ChannelSpec,
        /// Idempotency key
        key: IdempotencyKey,
    },
    /// Delete a channel.
    DeleteChannel {
        /// Target guild
        guild: GuildId,
        /// Channel to delete
        channel: ChannelId,
        /// Idempotency key
        key: IdempotencyKey,
    },
    /// Replace a permission overwrite.
    SetPermissions {
        /// Target guild
        guild: GuildId,
        /// Target channel
        channel: ChannelId,
        /// Member or @everyone
        target: OverwriteTarget,
        /// New overwrite
        overwrite: PermissionOverwrite,
        /// Idempotency key
        key: IdempotencyKey,
    },
    /// Move or disconnect a member.
    MoveMember {
        /// Target guild
        guild: GuildId,
        /// Member to move
        user: UserId,
        /// Destination, `None` disconnects
        target: Option<ChannelId>,
        /// Idempotency key
        key: IdempotencyKey,
    },
    /// Rename or limit a channel.
    EditChannel {
        /// Target guild
        guild: GuildId,
        /// Target channel
        channel: ChannelId,
        /// Changes to apply
        edit: ChannelEdit,
        /// Idempotency key
        key: IdempotencyKey,
    },
}

impl Command {
    /// Guild the command targets.
    pub fn guild(&self) -> GuildId {
        match self {
            Self::CreateChannel { guild, .. }
            | Self::DeleteChannel { guild, .. }
            | Self::SetPermissions { guild, .. }
            | Self::MoveMember { guild, .. }
            | Self::EditChannel { guild, .. } => *guild,
        }
    }

    /// Idempotency key of the command.
    pub fn key(&self) -> &IdempotencyKey {
        match self {
            Self::CreateChannel { key, .. }
            | Self::DeleteChannel { key, .. }
            | Self::SetPermissions { key, .. }
            | Self::MoveMember { key, .. }
            | Self::EditChannel { key, .. } => key,
        }
    }

    /// Bucket the command draws tokens from.
    pub fn bucket(&self) -> BucketKey {
        let class = match self {
            Self::CreateChannel { .. } | Self::DeleteChannel { .. } => {
                BucketClass::ChannelLifecycle
            }
            Self::SetPermissions { .. } | Self::EditChannel { .. } => BucketClass::ChannelEdit,
            Self::MoveMember { .. } => BucketClass::MemberMove,
        };
        BucketKey {
            guild: self.guild(),
            class,
        }
    }

    /// Resource the command is ordered against.
    pub fn resource(&self) -> ResourceKey {
        match self {
            Self::CreateChannel { guild, spec, .. } => {
                ResourceKey::CreationSlot(*guild, *spec.owner())
            }
            Self::DeleteChannel { guild, channel, .. }
            | Self::SetPermissions { guild, channel, .. }
            | Self::EditChannel { guild, channel, .. } => ResourceKey::Channel(*guild, *channel),
            Self::MoveMember { guild, user, .. } => ResourceKey::Member(*guild, *user),
        }
    }
}

/// Successful result of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutput {
    /// A channel was created.
    Created(ChannelId),
    /// The command completed without a value.
    Completed,
}

impl CommandOutput {
    /// Channel id of a creation result.
    pub fn channel_id(&self) -> Option<ChannelId> {
        match self {
            Self::Created(id) => Some(*id),
            Self::Completed => None,
        }
    }
}
