//! Mapping between speakhub and serenity types.

use chrono::{DateTime, Utc};
use serenity::all::{
    ChannelId as DiscordChannelId, GuildId as DiscordGuildId, PermissionOverwrite as DiscordOverwrite,
    PermissionOverwriteType, Permissions, RoleId, UserId as DiscordUserId,
};
use serenity::http::HttpError;
use speakhub_core::{
    ChannelId, GuildId, OverwriteTarget, Permission, PermissionOverwrite, UserId,
};
use speakhub_error::{PlatformError, PlatformErrorKind, PlatformResult};
use std::num::NonZeroU64;

fn non_zero(id: u64, what: &str) -> PlatformResult<NonZeroU64> {
    NonZeroU64::new(id).ok_or_else(|| {
        PlatformError::new(PlatformErrorKind::Rejected(format!("{} id must not be zero", what)))
    })
}

pub(crate) fn guild_id(guild: GuildId) -> PlatformResult<DiscordGuildId> {
    non_zero(guild.get(), "guild").map(DiscordGuildId::from)
}

pub(crate) fn channel_id(channel: ChannelId) -> PlatformResult<DiscordChannelId> {
    non_zero(channel.get(), "channel").map(DiscordChannelId::from)
}

pub(crate) fn user_id(user: UserId) -> PlatformResult<DiscordUserId> {
    non_zero(user.get(), "user").map(DiscordUserId::from)
}

/// Creation time encoded in a snowflake.
pub(crate) fn created_at(channel: DiscordChannelId) -> DateTime<Utc> {
    DateTime::from_timestamp(channel.created_at().unix_timestamp(), 0).unwrap_or_else(Utc::now)
}

fn permission_bits(permission: Permission) -> Permissions {
    match permission {
        Permission::ViewChannel => Permissions::VIEW_CHANNEL,
        Permission::Connect => Permissions::CONNECT,
        Permission::Speak => Permissions::SPEAK,
        Permission::ManageChannels => Permissions::MANAGE_CHANNELS,
        Permission::MoveMembers => Permissions::MOVE_MEMBERS,
        Permission::MuteMembers => Permissions::MUTE_MEMBERS,
        Permission::DeafenMembers => Permissions::DEAFEN_MEMBERS,
    }
}

pub(crate) fn permissions<'a>(set: impl IntoIterator<Item = &'a Permission>) -> Permissions {
    set.into_iter()
        .fold(Permissions::empty(), |bits, p| bits | permission_bits(*p))
}

/// Overwrite kind for a target; @everyone is the role sharing the guild's id.
pub(crate) fn overwrite_kind(
    guild: GuildId,
    target: OverwriteTarget,
) -> PlatformResult<PermissionOverwriteType> {
    Ok(match target {
        OverwriteTarget::Member(user) => PermissionOverwriteType::Member(user_id(user)?),
        OverwriteTarget::Everyone => {
            PermissionOverwriteType::Role(non_zero(guild.get(), "guild").map(RoleId::from)?)
        }
    })
}

pub(crate) fn overwrite(
    guild: GuildId,
    target: OverwriteTarget,
    overwrite: &PermissionOverwrite,
) -> PlatformResult<DiscordOverwrite> {
    Ok(DiscordOverwrite {
        allow: permissions(overwrite.allow()),
        deny: permissions(overwrite.deny()),
        kind: overwrite_kind(guild, target)?,
    })
}

/// Classify a serenity error for the dispatcher's retry logic.
///
/// HTTP responses are mapped by status code; transport and gateway
/// failures are retryable network errors; anything else is a rejection.
pub fn platform_error(err: serenity::Error) -> PlatformError {
    let kind = match &err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            PlatformErrorKind::from_status(
                response.status_code.as_u16(),
                response.error.message.clone(),
            )
        }
        serenity::Error::Http(HttpError::Request(e)) => PlatformErrorKind::Network(e.to_string()),
        serenity::Error::Gateway(_) | serenity::Error::Io(_) => {
            PlatformErrorKind::Network(err.to_string())
        }
        _ => PlatformErrorKind::Rejected(err.to_string()),
    };
    PlatformError::new(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_sets_fold_into_bits() {
        let overwrite = PermissionOverwrite::new(
            [Permission::Connect, Permission::ManageChannels],
            [Permission::Speak],
        );

        let mapped = super::overwrite(GuildId(10), OverwriteTarget::Member(UserId(7)), &overwrite)
            .unwrap();

        assert_eq!(mapped.allow, Permissions::CONNECT | Permissions::MANAGE_CHANNELS);
        assert_eq!(mapped.deny, Permissions::SPEAK);
        assert_eq!(
            mapped.kind,
            PermissionOverwriteType::Member(DiscordUserId::new(7))
        );
    }

    #[test]
    fn test_everyone_is_the_guild_role() {
        let kind = overwrite_kind(GuildId(10), OverwriteTarget::Everyone).unwrap();
        assert_eq!(kind, PermissionOverwriteType::Role(RoleId::new(10)));
    }

    #[test]
    fn test_zero_ids_are_rejected() {
        let err = channel_id(ChannelId(0)).unwrap_err();
        assert!(matches!(err.kind, PlatformErrorKind::Rejected(_)));
        assert!(guild_id(GuildId(0)).is_err());
    }

    #[test]
    fn test_snowflake_creation_time() {
        // Discord epoch (2015-01-01) shifted 22 bits left.
        let id = DiscordChannelId::new(1 << 22);
        assert_eq!(created_at(id).timestamp(), 1_420_070_400);
    }
}
