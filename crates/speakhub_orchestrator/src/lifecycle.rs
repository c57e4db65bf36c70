//! The lifecycle state machine.
//!
//! Each creation slot moves `Idle → Creating → Active → Tearing Down → Idle`.
//! The transitions are driven by [`Orchestrator::handle`]; the guards that
//! make them at-most-once live in the [`StateCache`].

use crate::LifecycleMetrics;
use parking_lot::Mutex;
use speakhub_cache::{CreationGate, DeletionGate, StateCache};
use speakhub_core::{
    ChannelId, ChannelSpec, CreationSource, DeliveryId, DriftCondition, GuildId, GuildSettings,
    IdempotencyKey, ManagedChannel, NormalizedEvent, OperationKey, OperationKind,
    OperationOutcome, OverwriteTarget, OwnerLeavePolicy, PendingOperation, UserId,
};
use speakhub_error::{DispatchError, DispatchErrorKind, LifecycleError, LifecycleErrorKind};
use speakhub_rate_limit::{Command, CommandDispatcher, CommandOutput};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Why a creation trigger was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// A creation for the member is already in flight.
    AlreadyPending,
    /// The member already owns this channel.
    AlreadyOwns(ChannelId),
    /// The member created a channel too recently.
    CoolingDown(Duration),
}

/// A state transition taken in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A creation trigger was dropped as a benign duplicate.
    CreationSuppressed {
        /// Member who triggered it
        user: UserId,
        /// Why it was dropped
        reason: Suppression,
    },
    /// A channel was created for `owner`.
    ///
    /// When `moved` is false the channel is empty and its teardown is
    /// already scheduled.
    Created {
        /// The new channel
        channel: ChannelId,
        /// Its owner
        owner: UserId,
        /// Whether the owner was moved into it
        moved: bool,
    },
    /// The creation failed and the slot is idle again.
    CreationFailed {
        /// Member the channel was for
        user: UserId,
    },
    /// An empty channel will be re-evaluated for deletion.
    TeardownScheduled {
        /// The empty channel
        channel: ChannelId,
        /// Delay before the re-evaluation
        after: Duration,
    },
    /// Ownership passed to another occupant.
    OwnershipTransferred {
        /// The channel
        channel: ChannelId,
        /// Previous owner
        from: UserId,
        /// New owner
        to: UserId,
    },
    /// An owner who re-entered the join channel was moved back into the
    /// channel they already own.
    Returned {
        /// The owned channel
        channel: ChannelId,
        /// Its owner
        owner: UserId,
    },
    /// A channel deleted elsewhere was dropped from the cache.
    Purged {
        /// The deleted channel
        channel: ChannelId,
    },
}

/// Result of evaluating a channel for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// The channel was deleted.
    Deleted,
    /// The channel was already gone remotely.
    Gone,
    /// The delete command failed; drift was recorded.
    Failed,
    /// The channel is empty but its grace window has not elapsed.
    Deferred(Duration),
    /// The channel is occupied, untracked or busy.
    Kept,
}

/// Map a dispatcher failure to the outcome recorded on the guard.
fn failure_outcome(err: &DispatchError) -> OperationOutcome {
    match &err.kind {
        DispatchErrorKind::RetriesExhausted { attempts, .. } => OperationOutcome::Cancelled {
            attempts: *attempts,
        },
        kind => OperationOutcome::Failed {
            reason: kind.to_string(),
        },
    }
}

struct OrchestratorInner {
    settings: HashMap<GuildId, GuildSettings>,
    cache: Arc<StateCache>,
    dispatcher: Arc<CommandDispatcher>,
    metrics: LifecycleMetrics,
    timers: Mutex<JoinSet<()>>,
}

/// Maps normalized events to lifecycle transitions.
///
/// Cheap to clone; clones share the cache, the dispatcher and the grace
/// timers. Events of one guild must be handed in one at a time (the
/// [`EventRouter`](crate::EventRouter) does this); different guilds may be
/// handled concurrently.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use speakhub_cache::StateCache;
/// use speakhub_core::{ChannelId, DeliveryId, GuildId, GuildSettingsBuilder, NormalizedEvent, UserId};
/// use speakhub_interface::InMemoryPlatform;
/// use speakhub_orchestrator::{LifecycleMetrics, Orchestrator, Transition};
/// use speakhub_rate_limit::{CommandDispatcher, DispatcherConfig};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let platform = Arc::new(InMemoryPlatform::new());
/// platform.set_voice_state(GuildId(1), UserId(7), Some(ChannelId(2)));
/// let settings = GuildSettingsBuilder::default()
///     .guild_id(GuildId(1))
///     .join_channel_id(ChannelId(2))
///     .build()
///     .unwrap();
/// let orchestrator = Orchestrator::new(
///     [settings],
///     Arc::new(StateCache::new()),
///     Arc::new(CommandDispatcher::new(platform, DispatcherConfig::default())),
///     LifecycleMetrics::new(),
/// );
///
/// let transitions = orchestrator
///     .handle(NormalizedEvent::UserEnteredChannel {
///         guild: GuildId(1),
///         user: UserId(7),
///         channel: ChannelId(2),
///         display_name: "Ada".to_string(),
///         at: Utc::now(),
///         delivery_id: DeliveryId(1),
///     })
///     .await
///     .unwrap();
/// assert!(matches!(transitions[0], Transition::Created { moved: true, .. }));
/// # }
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("guilds", &self.inner.settings.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator for the configured guilds.
    pub fn new(
        settings: impl IntoIterator<Item = GuildSettings>,
        cache: Arc<StateCache>,
        dispatcher: Arc<CommandDispatcher>,
        metrics: LifecycleMetrics,
    ) -> Self {
        let settings = settings
            .into_iter()
            .map(|s| (*s.guild_id(), s))
            .collect();
        Self {
            inner: Arc::new(OrchestratorInner {
                settings,
                cache,
                dispatcher,
                metrics,
                timers: Mutex::new(JoinSet::new()),
            }),
        }
    }

    /// Settings of a configured guild.
    pub fn guild_settings(&self, guild: GuildId) -> Result<&GuildSettings, LifecycleError> {
        self.inner
            .settings
            .get(&guild)
            .ok_or_else(|| LifecycleError::new(LifecycleErrorKind::UnknownGuild(guild.get())))
    }

    /// Every configured guild, in id order.
    pub fn guilds(&self) -> Vec<GuildId> {
        let mut guilds: Vec<_> = self.inner.settings.keys().copied().collect();
        guilds.sort();
        guilds
    }

    /// The shared state cache.
    pub fn cache(&self) -> &Arc<StateCache> {
        &self.inner.cache
    }

    /// The shared command dispatcher.
    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.inner.dispatcher
    }

    /// The shared metrics collector.
    pub fn metrics(&self) -> &LifecycleMetrics {
        &self.inner.metrics
    }

    /// Abort every pending grace timer.
    pub fn shutdown(&self) {
        let mut timers = self.inner.timers.lock();
        debug!(count = timers.len(), "Aborting grace timers");
        timers.abort_all();
    }

    /// Apply one normalized event.
    ///
    /// Returns the transitions taken, which may be none. Only an event for
    /// an unconfigured guild is an error; command failures are recorded as
    /// drift and reported through the returned transitions.
    #[instrument(skip(self, event), fields(guild = %event.guild()))]
    pub async fn handle(&self, event: NormalizedEvent) -> Result<Vec<Transition>, LifecycleError> {
        let settings = self.guild_settings(event.guild())?;
        match event {
            NormalizedEvent::UserEnteredChannel {
                user,
                channel,
                display_name,
                at,
                delivery_id,
                ..
            } => {
                let change = self
                    .inner
                    .cache
                    .record_presence(*settings.guild_id(), user, Some(channel), at);
                if !change.applied {
                    // A sweep may have recorded the member in the join
                    // channel before this event was handled.
                    if channel == *settings.join_channel_id() && change.current == Some(channel) {
                        return Ok(vec![
                            self.create_for(settings, user, &display_name, change.at, delivery_id)
                                .await,
                        ]);
                    }
                    return Ok(Vec::new());
                }

                let mut transitions = Vec::new();
                if let Some(previous) = change.previous
                    && previous != channel
                    && let Some(transition) = self.on_departure(settings, user, previous).await
                {
                    transitions.push(transition);
                }
                if channel == *settings.join_channel_id() {
                    transitions.push(
                        self.create_for(settings, user, &display_name, at, delivery_id)
                            .await,
                    );
                }
                Ok(transitions)
            }
            NormalizedEvent::UserLeftChannel { user, at, .. } => {
                let change = self
                    .inner
                    .cache
                    .record_presence(*settings.guild_id(), user, None, at);
                let Some(previous) = change.previous.filter(|_| change.applied) else {
                    return Ok(Vec::new());
                };
                Ok(self
                    .on_departure(settings, user, previous)
                    .await
                    .into_iter()
                    .collect())
            }
            NormalizedEvent::ChannelDeletedExternally { channel, .. } => {
                Ok(self.on_channel_deleted(settings, channel).into_iter().collect())
            }
        }
    }

    #[instrument(skip(self, settings, display_name, at), fields(guild = %settings.guild_id()))]
    async fn create_for(
        &self,
        settings: &GuildSettings,
        user: UserId,
        display_name: &str,
        at: chrono::DateTime<chrono::Utc>,
        delivery_id: DeliveryId,
    ) -> Transition {
        let guild = *settings.guild_id();
        let cache = &self.inner.cache;
        let metrics = &self.inner.metrics;

        let op = match cache.try_begin_creation(guild, user, settings.creation_cooldown()) {
            CreationGate::Acquired(op) => op,
            CreationGate::AlreadyPending => {
                return self.suppressed(user, Suppression::AlreadyPending);
            }
            CreationGate::AlreadyOwns(channel) => {
                if self.return_owner(guild, user, channel, at).await {
                    return Transition::Returned {
                        channel,
                        owner: user,
                    };
                }
                return self.suppressed(user, Suppression::AlreadyOwns(channel));
            }
            CreationGate::CoolingDown(remaining) => {
                return self.suppressed(user, Suppression::CoolingDown(remaining));
            }
        };

        let name = settings.render_name(display_name, user);
        let spec = match ChannelSpec::builder()
            .name(name.clone())
            .category(*settings.category_id())
            .owner(user)
            .template(settings.permissions().clone())
            .build()
        {
            Ok(spec) => spec,
            Err(err) => {
                error!(%err, "Could not describe channel");
                cache.complete_operation(
                    &op,
                    OperationOutcome::Failed {
                        reason: err.to_string(),
                    },
                );
                metrics.record_creation_failure();
                return Transition::CreationFailed { user };
            }
        };

        let key = op.idempotency_key();
        let created = self
            .inner
            .dispatcher
            .submit(Command::CreateChannel {
                guild,
                spec,
                key: key.clone(),
            })
            .await;
        let channel = match created.map(|output| output.channel_id()) {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                error!("Platform returned no channel id");
                cache.complete_operation(
                    &op,
                    OperationOutcome::Failed {
                        reason: "no channel id returned".to_string(),
                    },
                );
                metrics.record_creation_failure();
                return Transition::CreationFailed { user };
            }
            Err(err) => {
                error!(%err, "Channel creation failed");
                cache.complete_operation(&op, failure_outcome(&err));
                metrics.record_creation_failure();
                return Transition::CreationFailed { user };
            }
        };

        let record = ManagedChannel::new(
            guild,
            channel,
            user,
            name,
            CreationSource::JoinEvent {
                join_channel: *settings.join_channel_id(),
                delivery_id,
            },
        );
        cache.complete_operation(&op, OperationOutcome::Created(record));
        metrics.record_creation();
        info!(%channel, owner = %user, "Created channel");

        let moved = self
            .inner
            .dispatcher
            .submit(Command::MoveMember {
                guild,
                user,
                target: Some(channel),
                key: key.child("move"),
            })
            .await;
        match moved {
            Ok(_) => {
                // One tick after the trigger: a redelivered trigger stays
                // stale while any later leave event still applies.
                cache.record_presence(
                    guild,
                    user,
                    Some(channel),
                    at + chrono::Duration::milliseconds(1),
                );
                Transition::Created {
                    channel,
                    owner: user,
                    moved: true,
                }
            }
            Err(err) => {
                warn!(%err, %channel, "Could not move owner into new channel");
                cache.record_drift(DriftCondition::MoveFailed {
                    guild,
                    channel,
                    user,
                });
                metrics.record_move_failure();
                self.schedule_teardown(guild, channel, settings.grace_window());
                Transition::Created {
                    channel,
                    owner: user,
                    moved: false,
                }
            }
        }
    }

    /// Move an owner who re-entered the join channel back into their channel.
    async fn return_owner(
        &self,
        guild: GuildId,
        user: UserId,
        channel: ChannelId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        let moved = self
            .with_channel_guard(
                guild,
                channel,
                OperationKind::Move,
                |key| async move {
                    self.submit(Command::MoveMember {
                        guild,
                        user,
                        target: Some(channel),
                        key: key.child("return"),
                    })
                    .await
                    .map(|_| ())
                },
                |_| {},
            )
            .await;
        match moved {
            Ok(_) => {
                self.inner.cache.record_presence(
                    guild,
                    user,
                    Some(channel),
                    at + chrono::Duration::milliseconds(1),
                );
                info!(%channel, owner = %user, "Returned owner to their channel");
                true
            }
            Err(err) => {
                warn!(%err, %channel, owner = %user, "Could not return owner to their channel");
                false
            }
        }
    }

    fn suppressed(&self, user: UserId, reason: Suppression) -> Transition {
        debug!(%user, ?reason, "Creation suppressed");
        self.inner.metrics.record_suppressed();
        Transition::CreationSuppressed { user, reason }
    }

    /// React to `user` leaving `channel`.
    async fn on_departure(
        &self,
        settings: &GuildSettings,
        user: UserId,
        channel: ChannelId,
    ) -> Option<Transition> {
        let guild = *settings.guild_id();
        let managed = self.inner.cache.channel(guild, channel)?;

        if *managed.occupancy() == 0 {
            let grace = settings.grace_window();
            self.schedule_teardown(guild, channel, grace);
            return Some(Transition::TeardownScheduled {
                channel,
                after: grace,
            });
        }

        if *managed.owner_id() != user
            || *settings.owner_leave_policy() != OwnerLeavePolicy::Transfer
        {
            return None;
        }
        let successor = *self.inner.cache.occupants(guild, channel).first()?;
        match self.transfer(settings, channel, user, successor).await {
            Ok(_) => Some(Transition::OwnershipTransferred {
                channel,
                from: user,
                to: successor,
            }),
            Err(err) => {
                warn!(%err, %channel, "Ownership transfer failed");
                None
            }
        }
    }

    fn on_channel_deleted(&self, settings: &GuildSettings, channel: ChannelId) -> Option<Transition> {
        let guild = *settings.guild_id();
        if channel == *settings.join_channel_id() {
            warn!(%channel, "Join-to-create channel was deleted");
            return None;
        }

        let ours = self
            .inner
            .cache
            .is_pending(&OperationKey::channel(guild, channel));
        self.inner.cache.purge_channel(guild, channel)?;
        if ours {
            debug!(%channel, "Observed deletion of a channel being torn down");
        } else {
            self.inner
                .cache
                .record_drift(DriftCondition::DeletedExternally { guild, channel });
            self.inner.metrics.record_external_deletion();
        }
        Some(Transition::Purged { channel })
    }

    /// Re-evaluate `channel` for deletion after `delay`.
    ///
    /// The timer re-checks live occupancy when it fires, so a member who
    /// joins in the meantime keeps the channel alive.
    pub fn schedule_teardown(&self, guild: GuildId, channel: ChannelId, delay: Duration) {
        let this = self.clone();
        let mut timers = self.inner.timers.lock();
        while timers.try_join_next().is_some() {}
        timers.spawn(async move {
            tokio::time::sleep(delay).await;
            this.teardown_when_expired(guild, channel).await;
        });
    }

    async fn teardown_when_expired(&self, guild: GuildId, channel: ChannelId) {
        loop {
            match self.try_teardown(guild, channel).await {
                TeardownOutcome::Deferred(remaining) if !remaining.is_zero() => {
                    tokio::time::sleep(remaining).await;
                }
                outcome => {
                    debug!(%guild, %channel, ?outcome, "Grace timer finished");
                    return;
                }
            }
        }
    }

    /// Delete `channel` if it is still tracked, empty and past its grace
    /// window.
    #[instrument(skip(self), fields(guild = %guild, channel = %channel))]
    pub async fn try_teardown(&self, guild: GuildId, channel: ChannelId) -> TeardownOutcome {
        let Ok(settings) = self.guild_settings(guild) else {
            return TeardownOutcome::Kept;
        };
        match self
            .inner
            .cache
            .try_begin_deletion(guild, channel, settings.grace_window())
        {
            DeletionGate::Acquired(op) => self.delete(op, guild, channel).await,
            DeletionGate::NotExpired(remaining) => TeardownOutcome::Deferred(remaining),
            DeletionGate::Occupied(occupancy) => {
                debug!(occupancy, "Channel in use again, keeping it");
                TeardownOutcome::Kept
            }
            DeletionGate::Busy => {
                debug!("Another operation holds the channel");
                TeardownOutcome::Kept
            }
            DeletionGate::NotManaged => TeardownOutcome::Kept,
        }
    }

    /// Delete a remote channel the cache does not track.
    pub(crate) async fn delete_untracked(&self, guild: GuildId, channel: ChannelId) -> TeardownOutcome {
        match self
            .inner
            .cache
            .try_begin_operation(OperationKey::channel(guild, channel), OperationKind::Delete)
        {
            Some(op) => self.delete(op, guild, channel).await,
            None => TeardownOutcome::Kept,
        }
    }

    async fn delete(&self, op: PendingOperation, guild: GuildId, channel: ChannelId) -> TeardownOutcome {
        let result = self
            .inner
            .dispatcher
            .submit(Command::DeleteChannel {
                guild,
                channel,
                key: op.idempotency_key(),
            })
            .await;
        match result {
            Ok(_) => {
                self.inner
                    .cache
                    .complete_operation(&op, OperationOutcome::Deleted);
                self.inner.metrics.record_deletion();
                info!(%guild, %channel, "Deleted channel");
                TeardownOutcome::Deleted
            }
            Err(err) if err.is_not_found() => {
                self.inner
                    .cache
                    .complete_operation(&op, OperationOutcome::ChannelGone);
                debug!(%guild, %channel, "Channel already gone");
                TeardownOutcome::Gone
            }
            Err(err) => {
                error!(%err, %guild, %channel, "Channel deletion failed");
                self.inner.cache.complete_operation(&op, failure_outcome(&err));
                self.inner.metrics.record_deletion_failure();
                TeardownOutcome::Failed
            }
        }
    }

    /// Hand ownership of `channel` from `from` to `to`.
    ///
    /// The new owner receives the owner overwrite, the previous owner keeps
    /// connect only.
    pub(crate) async fn transfer(
        &self,
        settings: &GuildSettings,
        channel: ChannelId,
        from: UserId,
        to: UserId,
    ) -> Result<ManagedChannel, LifecycleError> {
        let guild = *settings.guild_id();
        let owner = settings.permissions().owner().clone();
        let former = settings.permissions().former_owner();

        let updated = self
            .with_channel_guard(
                guild,
                channel,
                OperationKind::UpdatePermissions,
                |key| async move {
                    self.submit(Command::SetPermissions {
                        guild,
                        channel,
                        target: OverwriteTarget::Member(to),
                        overwrite: owner,
                        key: key.child("owner"),
                    })
                    .await?;
                    self.submit(Command::SetPermissions {
                        guild,
                        channel,
                        target: OverwriteTarget::Member(from),
                        overwrite: former,
                        key: key.child("former"),
                    })
                    .await?;
                    Ok(())
                },
                |managed| managed.set_owner(to),
            )
            .await?;

        self.inner.metrics.record_transfer();
        info!(%guild, %channel, %from, %to, "Transferred ownership");
        Ok(updated)
    }

    pub(crate) async fn submit(&self, command: Command) -> Result<CommandOutput, DispatchError> {
        self.inner.dispatcher.submit(command).await
    }

    /// Run commands against a managed channel under its operation guard.
    ///
    /// `apply` updates the cached record once every command succeeded; the
    /// updated record is returned. A channel reported missing by the
    /// platform is purged from the cache.
    pub(crate) async fn with_channel_guard<F, Fut, A>(
        &self,
        guild: GuildId,
        channel: ChannelId,
        kind: OperationKind,
        run: F,
        apply: A,
    ) -> Result<ManagedChannel, LifecycleError>
    where
        F: FnOnce(IdempotencyKey) -> Fut,
        Fut: Future<Output = Result<(), DispatchError>>,
        A: FnOnce(&mut ManagedChannel),
    {
        let cache = &self.inner.cache;
        let op = cache
            .try_begin_operation(OperationKey::channel(guild, channel), kind)
            .ok_or_else(|| LifecycleError::new(LifecycleErrorKind::Busy(channel.get())))?;

        match run(op.idempotency_key()).await {
            Ok(()) => {
                let updated = cache.update_channel(guild, channel, apply);
                cache.complete_operation(&op, OperationOutcome::Applied);
                updated.ok_or_else(|| LifecycleError::new(LifecycleErrorKind::NotManaged(channel.get())))
            }
            Err(err) if err.is_not_found() && kind != OperationKind::Move => {
                warn!(%guild, %channel, "Channel vanished during {}", kind);
                cache.complete_operation(&op, OperationOutcome::ChannelGone);
                Err(LifecycleError::new(LifecycleErrorKind::NotManaged(channel.get())))
            }
            Err(err) => {
                cache.complete_operation(&op, failure_outcome(&err));
                Err(err.into())
            }
        }
    }
}
