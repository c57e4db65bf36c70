//! Voice platform over serenity's HTTP client.

use super::conversions::{
    channel_id, created_at, guild_id, overwrite, overwrite_kind, platform_error, user_id,
};
use async_trait::async_trait;
use serenity::all::{ChannelType, CreateChannel, EditChannel};
use serenity::cache::Cache;
use serenity::http::Http;
use speakhub_core::{
    ChannelEdit, ChannelId, ChannelSpec, GuildId, IdempotencyKey, OverwriteTarget,
    PermissionOverwrite, UserId,
};
use speakhub_error::{PlatformError, PlatformErrorKind, PlatformResult};
use speakhub_interface::{RemoteChannel, RemoteSnapshot, VoicePlatform};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// How far back a channel made by an earlier create attempt may date.
const RECENT_CREATE_SECS: i64 = 300;

/// Discord implementation of [`VoicePlatform`].
///
/// Mutations go through serenity's HTTP client. Discord has no endpoint
/// listing voice states, so snapshots combine the channel list fetched over
/// HTTP with the voice states held by the gateway cache.
///
/// Discord does not deduplicate creates. A channel left behind by an
/// attempt that reported failure is recognised by its name, category and
/// owner overwrite.
#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl std::fmt::Debug for SerenityPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerenityPlatform").finish_non_exhaustive()
    }
}

impl SerenityPlatform {
    /// Wrap a client's HTTP handle and gateway cache.
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    fn http(&self) -> &Http {
        &self.http
    }

    fn voice_states(&self, guild: GuildId) -> PlatformResult<BTreeMap<UserId, ChannelId>> {
        let cached = self.cache.guild(guild_id(guild)?).ok_or_else(|| {
            PlatformError::new(PlatformErrorKind::Network(format!(
                "guild {} not in gateway cache yet",
                guild
            )))
        })?;
        Ok(cached
            .voice_states
            .iter()
            .filter_map(|(user, state)| {
                state
                    .channel_id
                    .map(|channel| (UserId(user.get()), ChannelId(channel.get())))
            })
            .collect())
    }
}

#[async_trait]
impl VoicePlatform for SerenityPlatform {
    #[instrument(skip(self, spec, key), fields(guild = %guild, name = %spec.name()))]
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        spec: &ChannelSpec,
        key: &IdempotencyKey,
    ) -> PlatformResult<ChannelId> {
        let reason = format!("speakhub {}", key);
        let overwrites = vec![
            overwrite(
                guild,
                OverwriteTarget::Member(*spec.owner()),
                spec.template().owner(),
            )?,
            overwrite(guild, OverwriteTarget::Everyone, spec.template().everyone())?,
        ];
        let mut builder = CreateChannel::new(spec.name().clone())
            .kind(ChannelType::Voice)
            .permissions(overwrites)
            .audit_log_reason(&reason);
        if let Some(category) = spec.category() {
            builder = builder.category(channel_id(*category)?);
        }
        if let Some(limit) = spec.user_limit() {
            builder = builder.user_limit(*limit);
        }

        let created = guild_id(guild)?
            .create_channel(self.http(), builder)
            .await
            .map_err(platform_error)?;
        debug!(channel = %created.id, "Created voice channel");
        Ok(ChannelId(created.id.get()))
    }

    #[instrument(skip(self, spec, key), fields(guild = %guild, name = %spec.name()))]
    async fn find_created_channel(
        &self,
        guild: GuildId,
        spec: &ChannelSpec,
        key: &IdempotencyKey,
    ) -> PlatformResult<Option<ChannelId>> {
        let owner = overwrite(
            guild,
            OverwriteTarget::Member(*spec.owner()),
            spec.template().owner(),
        )?;
        let category = (*spec.category()).map(channel_id).transpose()?;
        let recent = chrono::Utc::now() - chrono::Duration::seconds(RECENT_CREATE_SECS);

        let channels = guild_id(guild)?
            .channels(self.http())
            .await
            .map_err(platform_error)?;
        let found = channels
            .into_values()
            .filter(|c| {
                c.kind == ChannelType::Voice
                    && c.name == *spec.name()
                    && c.parent_id == category
                    && created_at(c.id) >= recent
                    && c
                        .permission_overwrites
                        .iter()
                        .any(|o| o.kind == owner.kind && o.allow == owner.allow)
            })
            .max_by_key(|c| c.id)
            .map(|c| ChannelId(c.id.get()));
        if let Some(channel) = found {
            debug!(%channel, %key, "Found channel made by an earlier attempt");
        }
        Ok(found)
    }

    #[instrument(skip(self, _key), fields(guild = %guild, channel = %channel))]
    async fn delete_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        _key: &IdempotencyKey,
    ) -> PlatformResult<()> {
        channel_id(channel)?
            .delete(self.http())
            .await
            .map_err(platform_error)?;
        debug!(%guild, %channel, "Deleted voice channel");
        Ok(())
    }

    #[instrument(skip(self, overwrite_spec), fields(guild = %guild, channel = %channel))]
    async fn set_permission_overwrite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        target: OverwriteTarget,
        overwrite_spec: &PermissionOverwrite,
    ) -> PlatformResult<()> {
        let channel = channel_id(channel)?;
        if overwrite_spec.allow().is_empty() && overwrite_spec.deny().is_empty() {
            return channel
                .delete_permission(self.http(), overwrite_kind(guild, target)?)
                .await
                .map_err(platform_error);
        }
        channel
            .create_permission(self.http(), overwrite(guild, target, overwrite_spec)?)
            .await
            .map_err(platform_error)
    }

    #[instrument(skip(self), fields(guild = %guild, user = %user))]
    async fn move_member(
        &self,
        guild: GuildId,
        user: UserId,
        target: Option<ChannelId>,
    ) -> PlatformResult<()> {
        let discord_guild = guild_id(guild)?;
        let discord_user = user_id(user)?;
        match target {
            Some(channel) => discord_guild
                .move_member(self.http(), discord_user, channel_id(channel)?)
                .await
                .map_err(platform_error)?,
            None => discord_guild
                .disconnect_member(self.http(), discord_user)
                .await
                .map_err(platform_error)?,
        };
        Ok(())
    }

    #[instrument(skip(self, edit), fields(guild = %guild, channel = %channel))]
    async fn edit_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        edit: &ChannelEdit,
    ) -> PlatformResult<()> {
        let mut builder = EditChannel::new();
        if let Some(name) = edit.name() {
            builder = builder.name(name.clone());
        }
        if let Some(limit) = edit.user_limit() {
            builder = builder.user_limit(*limit);
        }
        channel_id(channel)?
            .edit(self.http(), builder)
            .await
            .map_err(platform_error)?;
        debug!(%guild, %channel, "Edited voice channel");
        Ok(())
    }

    #[instrument(skip(self), fields(guild = %guild))]
    async fn fetch_snapshot(&self, guild: GuildId) -> PlatformResult<RemoteSnapshot> {
        let channels = guild_id(guild)?
            .channels(self.http())
            .await
            .map_err(platform_error)?;
        let taken_at = chrono::Utc::now();
        let voice_states = self.voice_states(guild)?;

        let channels: Vec<_> = channels
            .into_values()
            .filter(|c| c.kind == ChannelType::Voice)
            .map(|c| {
                RemoteChannel::new(
                    ChannelId(c.id.get()),
                    c.name,
                    c.parent_id.map(|p| ChannelId(p.get())),
                    created_at(c.id),
                )
            })
            .collect();
        debug!(
            channels = channels.len(),
            voice_states = voice_states.len(),
            "Fetched snapshot"
        );
        Ok(RemoteSnapshot::new(guild, channels, voice_states, taken_at))
    }

    fn platform_name(&self) -> &'static str {
        "discord"
    }
}
