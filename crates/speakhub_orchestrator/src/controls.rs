//! Owner controls for managed channels.

use crate::Orchestrator;
use speakhub_core::{
    ChannelEdit, GuildId, GuildSettings, ManagedChannel, OperationKind, OverwriteTarget,
    Permission, PermissionOverwrite, UserId,
};
use speakhub_error::{LifecycleError, LifecycleErrorKind};
use speakhub_rate_limit::Command;
use tracing::{info, instrument};

const MAX_USER_LIMIT: u32 = 99;
const MAX_NAME_LEN: usize = 100;

fn invalid(message: impl Into<String>) -> LifecycleError {
    LifecycleError::new(LifecycleErrorKind::InvalidArgument(message.into()))
}

/// Operations a channel owner may run on their managed channel.
///
/// Every operation resolves the actor's channel first and fails with
/// [`LifecycleErrorKind::NotOwner`] if they own none. Commands go through
/// the dispatcher under the channel's operation guard, so two controls on
/// the same channel never interleave.
#[derive(Debug, Clone)]
pub struct OwnerControls {
    orchestrator: Orchestrator,
}

impl OwnerControls {
    /// Create controls on top of an orchestrator.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    fn owned(
        &self,
        guild: GuildId,
        actor: UserId,
    ) -> Result<(&GuildSettings, ManagedChannel), LifecycleError> {
        let settings = self.orchestrator.guild_settings(guild)?;
        let channel = self
            .orchestrator
            .cache()
            .owned_channel(guild, actor)
            .ok_or_else(|| LifecycleError::new(LifecycleErrorKind::NotOwner(actor.get())))?;
        Ok((settings, channel))
    }

    fn require_other(actor: UserId, target: UserId) -> Result<(), LifecycleError> {
        if actor == target {
            return Err(invalid("target must be another member"));
        }
        Ok(())
    }

    fn require_occupant(
        &self,
        channel: &ManagedChannel,
        target: UserId,
    ) -> Result<(), LifecycleError> {
        let present = self
            .orchestrator
            .cache()
            .presence(*channel.guild_id(), target);
        if present != Some(*channel.channel_id()) {
            return Err(LifecycleError::new(LifecycleErrorKind::NotInChannel(
                target.get(),
            )));
        }
        Ok(())
    }

    /// Hand the channel to another occupant.
    #[instrument(skip(self), fields(guild = %guild, actor = %actor, new_owner = %new_owner))]
    pub async fn transfer_ownership(
        &self,
        guild: GuildId,
        actor: UserId,
        new_owner: UserId,
    ) -> Result<ManagedChannel, LifecycleError> {
        let (settings, channel) = self.owned(guild, actor)?;
        Self::require_other(actor, new_owner)?;
        self.require_occupant(&channel, new_owner)?;
        self.orchestrator
            .transfer(settings, *channel.channel_id(), actor, new_owner)
            .await
    }

    /// Set the member limit; `0` removes it.
    #[instrument(skip(self), fields(guild = %guild, actor = %actor))]
    pub async fn set_user_limit(
        &self,
        guild: GuildId,
        actor: UserId,
        limit: u32,
    ) -> Result<ManagedChannel, LifecycleError> {
        if limit > MAX_USER_LIMIT {
            return Err(invalid(format!(
                "user limit must be between 0 and {}",
                MAX_USER_LIMIT
            )));
        }
        let (_, channel) = self.owned(guild, actor)?;
        let id = *channel.channel_id();

        let updated = self
            .orchestrator
            .with_channel_guard(
                guild,
                id,
                OperationKind::Edit,
                |key| async move {
                    self.orchestrator
                        .submit(Command::EditChannel {
                            guild,
                            channel: id,
                            edit: ChannelEdit::default().with_user_limit(limit),
                            key,
                        })
                        .await
                        .map(|_| ())
                },
                |managed| managed.set_user_limit(limit),
            )
            .await?;
        info!(channel = %id, limit, "Set user limit");
        Ok(updated)
    }

    /// Deny or restore connect for @everyone.
    #[instrument(skip(self), fields(guild = %guild, actor = %actor))]
    pub async fn set_locked(
        &self,
        guild: GuildId,
        actor: UserId,
        locked: bool,
    ) -> Result<ManagedChannel, LifecycleError> {
        let (settings, channel) = self.owned(guild, actor)?;
        let id = *channel.channel_id();
        let everyone = settings.permissions().everyone();
        let overwrite = if locked {
            PermissionOverwrite::new(
                everyone
                    .allow()
                    .iter()
                    .copied()
                    .filter(|p| *p != Permission::Connect),
                everyone
                    .deny()
                    .iter()
                    .copied()
                    .chain([Permission::Connect]),
            )
        } else {
            everyone.clone()
        };

        let updated = self
            .orchestrator
            .with_channel_guard(
                guild,
                id,
                OperationKind::UpdatePermissions,
                |key| async move {
                    self.orchestrator
                        .submit(Command::SetPermissions {
                            guild,
                            channel: id,
                            target: OverwriteTarget::Everyone,
                            overwrite,
                            key,
                        })
                        .await
                        .map(|_| ())
                },
                |managed| managed.set_locked(locked),
            )
            .await?;
        info!(channel = %id, locked, "Changed lock");
        Ok(updated)
    }

    /// Rename the channel.
    ///
    /// The managed-channel marker is prepended when missing so the sweeper
    /// still recognizes the channel.
    #[instrument(skip(self, name), fields(guild = %guild, actor = %actor))]
    pub async fn rename(
        &self,
        guild: GuildId,
        actor: UserId,
        name: &str,
    ) -> Result<ManagedChannel, LifecycleError> {
        let (settings, channel) = self.owned(guild, actor)?;
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(invalid("name must not be empty"));
        }
        let marker = settings.marker();
        let full = if trimmed.starts_with(marker) {
            trimmed.to_string()
        } else {
            format!("{}{}", marker, trimmed)
        };
        if full.chars().count() > MAX_NAME_LEN {
            return Err(invalid(format!(
                "name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }

        let id = *channel.channel_id();
        let edit = ChannelEdit::default().with_name(full.clone());
        let updated = self
            .orchestrator
            .with_channel_guard(
                guild,
                id,
                OperationKind::Edit,
                |key| async move {
                    self.orchestrator
                        .submit(Command::EditChannel {
                            guild,
                            channel: id,
                            edit,
                            key,
                        })
                        .await
                        .map(|_| ())
                },
                |managed| managed.set_name(full),
            )
            .await?;
        info!(channel = %id, name = %updated.name(), "Renamed channel");
        Ok(updated)
    }

    /// Disconnect an occupant.
    #[instrument(skip(self), fields(guild = %guild, actor = %actor, target = %target))]
    pub async fn kick(
        &self,
        guild: GuildId,
        actor: UserId,
        target: UserId,
    ) -> Result<(), LifecycleError> {
        let (_, channel) = self.owned(guild, actor)?;
        Self::require_other(actor, target)?;
        self.require_occupant(&channel, target)?;
        let id = *channel.channel_id();

        self.orchestrator
            .with_channel_guard(
                guild,
                id,
                OperationKind::Move,
                |key| async move {
                    self.orchestrator
                        .submit(Command::MoveMember {
                            guild,
                            user: target,
                            target: None,
                            key,
                        })
                        .await
                        .map(|_| ())
                },
                |_| {},
            )
            .await?;
        info!(channel = %id, "Kicked member");
        Ok(())
    }

    /// Deny a member connect, disconnecting them if present.
    #[instrument(skip(self), fields(guild = %guild, actor = %actor, target = %target))]
    pub async fn block(
        &self,
        guild: GuildId,
        actor: UserId,
        target: UserId,
    ) -> Result<ManagedChannel, LifecycleError> {
        let (_, channel) = self.owned(guild, actor)?;
        Self::require_other(actor, target)?;
        let id = *channel.channel_id();
        let connected = self.orchestrator.cache().presence(guild, target) == Some(id);

        let updated = self
            .orchestrator
            .with_channel_guard(
                guild,
                id,
                OperationKind::UpdatePermissions,
                |key| async move {
                    self.orchestrator
                        .submit(Command::SetPermissions {
                            guild,
                            channel: id,
                            target: OverwriteTarget::Member(target),
                            overwrite: PermissionOverwrite::deny_only([Permission::Connect]),
                            key: key.child("deny"),
                        })
                        .await?;
                    if connected {
                        self.orchestrator
                            .submit(Command::MoveMember {
                                guild,
                                user: target,
                                target: None,
                                key: key.child("disconnect"),
                            })
                            .await?;
                    }
                    Ok(())
                },
                |managed| {
                    managed.block(target);
                },
            )
            .await?;
        info!(channel = %id, disconnected = connected, "Blocked member");
        Ok(updated)
    }

    /// Clear a member's block.
    #[instrument(skip(self), fields(guild = %guild, actor = %actor, target = %target))]
    pub async fn unblock(
        &self,
        guild: GuildId,
        actor: UserId,
        target: UserId,
    ) -> Result<ManagedChannel, LifecycleError> {
        let (_, channel) = self.owned(guild, actor)?;
        if !channel.blocked().contains(&target) {
            return Err(invalid(format!("user {} is not blocked", target)));
        }
        let id = *channel.channel_id();

        let updated = self
            .orchestrator
            .with_channel_guard(
                guild,
                id,
                OperationKind::UpdatePermissions,
                |key| async move {
                    self.orchestrator
                        .submit(Command::SetPermissions {
                            guild,
                            channel: id,
                            target: OverwriteTarget::Member(target),
                            overwrite: PermissionOverwrite::default(),
                            key,
                        })
                        .await
                        .map(|_| ())
                },
                |managed| {
                    managed.unblock(target);
                },
            )
            .await?;
        info!(channel = %id, "Unblocked member");
        Ok(updated)
    }

    /// Allow a member to connect, even while the channel is locked.
    ///
    /// The same invite may only be repeated after the guild's invite
    /// cooldown.
    #[instrument(skip(self), fields(guild = %guild, actor = %actor, target = %target))]
    pub async fn invite(
        &self,
        guild: GuildId,
        actor: UserId,
        target: UserId,
    ) -> Result<ManagedChannel, LifecycleError> {
        let (settings, channel) = self.owned(guild, actor)?;
        Self::require_other(actor, target)?;
        let id = *channel.channel_id();
        let cache = self.orchestrator.cache();

        if let Err(remaining) =
            cache.check_invite(guild, actor, target, id, settings.invite_cooldown())
        {
            return Err(LifecycleError::new(LifecycleErrorKind::InviteCooldown {
                remaining_secs: remaining.as_secs().max(1),
            }));
        }

        let result = self
            .orchestrator
            .with_channel_guard(
                guild,
                id,
                OperationKind::UpdatePermissions,
                |key| async move {
                    self.orchestrator
                        .submit(Command::SetPermissions {
                            guild,
                            channel: id,
                            target: OverwriteTarget::Member(target),
                            overwrite: PermissionOverwrite::allow_only([Permission::Connect]),
                            key,
                        })
                        .await
                        .map(|_| ())
                },
                |managed| {
                    managed.unblock(target);
                },
            )
            .await;
        if result.is_err() {
            cache.forget_invite(guild, actor, target, id);
        }
        let updated = result?;
        info!(channel = %id, "Invited member");
        Ok(updated)
    }
}
