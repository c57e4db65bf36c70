//! The outbound command interface.

use crate::RemoteSnapshot;
use async_trait::async_trait;
use speakhub_core::{
    ChannelEdit, ChannelId, ChannelSpec, GuildId, IdempotencyKey, OverwriteTarget,
    PermissionOverwrite, UserId,
};
use speakhub_error::PlatformResult;

/// Mutating calls and snapshots against the remote voice platform.
///
/// Implementations never retry on their own; throttling and transient
/// network failures are returned as retryable [`speakhub_error::PlatformError`]s
/// and handled by the dispatcher.
#[async_trait]
pub trait VoicePlatform: Send + Sync {
    /// Create a voice channel and apply its permission template.
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        spec: &ChannelSpec,
        key: &IdempotencyKey,
    ) -> PlatformResult<ChannelId>;

    /// Find a channel an earlier attempt of the create keyed `key` made.
    ///
    /// Called before a create is retried: a transient failure may be
    /// reported after the platform already applied the request.
    async fn find_created_channel(
        &self,
        guild: GuildId,
        spec: &ChannelSpec,
        key: &IdempotencyKey,
    ) -> PlatformResult<Option<ChannelId>>;

    /// Delete a channel.
    async fn delete_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        key: &IdempotencyKey,
    ) -> PlatformResult<()>;

    /// Replace the overwrite for one target on a channel.
    async fn set_permission_overwrite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        target: OverwriteTarget,
        overwrite: &PermissionOverwrite,
    ) -> PlatformResult<()>;

    /// Move a member to a voice channel, or disconnect them with `None`.
    async fn move_member(
        &self,
        guild: GuildId,
        user: UserId,
        target: Option<ChannelId>,
    ) -> PlatformResult<()>;

    /// Rename a channel or change its member limit.
    async fn edit_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        edit: &ChannelEdit,
    ) -> PlatformResult<()>;

    /// Fetch every voice channel and voice state of a guild.
    async fn fetch_snapshot(&self, guild: GuildId) -> PlatformResult<RemoteSnapshot>;

    /// Platform name (e.g., "discord", "memory").
    fn platform_name(&self) -> &'static str;
}
