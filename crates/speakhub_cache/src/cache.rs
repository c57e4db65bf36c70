//! State cache implementation.

use crate::state::GuildState;
use crate::{CreationGate, DeletionGate, GuildSnapshot, PresenceChange};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use speakhub_core::{
    ChannelId, DriftCondition, GuildId, ManagedChannel, OperationKey, OperationKind,
    OperationOutcome, PendingOperation, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Cache of managed channels, guards and presence, scoped per guild.
///
/// Each guild has its own lock; operations on different guilds never
/// contend. No lock is ever held across an `.await`.
///
/// # Example
///
/// ```
/// use speakhub_cache::{CreationGate, StateCache};
/// use speakhub_core::{GuildId, UserId};
/// use std::time::Duration;
///
/// let cache = StateCache::new();
/// let first = cache.try_begin_creation(GuildId(1), UserId(7), Duration::ZERO);
/// let second = cache.try_begin_creation(GuildId(1), UserId(7), Duration::ZERO);
///
/// assert!(matches!(first, CreationGate::Acquired(_)));
/// assert_eq!(second, CreationGate::AlreadyPending);
/// ```
#[derive(Debug, Default)]
pub struct StateCache {
    guilds: RwLock<HashMap<GuildId, Arc<Mutex<GuildState>>>>,
}

impl StateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn guild(&self, id: GuildId) -> Arc<Mutex<GuildState>> {
        if let Some(state) = self.guilds.read().get(&id) {
            return state.clone();
        }
        self.guilds.write().entry(id).or_default().clone()
    }

    /// Guilds the cache has state for.
    pub fn guilds(&self) -> Vec<GuildId> {
        let mut ids: Vec<_> = self.guilds.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Atomically claim a user's creation slot.
    ///
    /// Succeeds only if no creation is pending for the user, the user owns
    /// no managed channel and the creation cooldown has passed.
    pub fn try_begin_creation(
        &self,
        guild: GuildId,
        user: UserId,
        cooldown: Duration,
    ) -> CreationGate {
        let state = self.guild(guild);
        let mut state = state.lock();
        let key = OperationKey::creation(guild, user);

        if state.pending.contains_key(&key) {
            debug!(%guild, %user, "Creation already pending");
            return CreationGate::AlreadyPending;
        }
        if let Some(owned) = state.owned_by(user) {
            return CreationGate::AlreadyOwns(*owned.channel_id());
        }
        let now = Instant::now();
        if let Some(last) = state.last_creation.get(&user) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < cooldown {
                return CreationGate::CoolingDown(cooldown - elapsed);
            }
        }

        let op = PendingOperation::new(key, OperationKind::Create);
        state.pending.insert(key, op.clone());
        state.last_creation.insert(user, now);
        CreationGate::Acquired(op)
    }

    /// Atomically claim an arbitrary operation key.
    ///
    /// Returns `None` if an operation with the same key is in flight.
    pub fn try_begin_operation(
        &self,
        key: OperationKey,
        kind: OperationKind,
    ) -> Option<PendingOperation> {
        let state = self.guild(key.guild());
        let mut state = state.lock();
        if state.pending.contains_key(&key) {
            debug!(%key, %kind, "Operation already pending");
            return None;
        }
        let op = PendingOperation::new(key, kind);
        state.pending.insert(key, op.clone());
        Some(op)
    }

    /// Atomically claim a channel for deletion if it is still eligible.
    pub fn try_begin_deletion(
        &self,
        guild: GuildId,
        channel: ChannelId,
        grace: Duration,
    ) -> DeletionGate {
        let state = self.guild(guild);
        let mut state = state.lock();
        let key = OperationKey::channel(guild, channel);

        let Some(managed) = state.channels.get(&channel) else {
            return DeletionGate::NotManaged;
        };
        if *managed.occupancy() > 0 {
            return DeletionGate::Occupied(*managed.occupancy());
        }
        let now = Instant::now();
        if !managed.is_expired(now, grace) {
            let elapsed = managed
                .empty_since()
                .map(|since| now.saturating_duration_since(since))
                .unwrap_or_default();
            return DeletionGate::NotExpired(grace.saturating_sub(elapsed));
        }
        if state.pending.contains_key(&key) {
            return DeletionGate::Busy;
        }

        let op = PendingOperation::new(key, OperationKind::Delete);
        state.pending.insert(key, op.clone());
        DeletionGate::Acquired(op)
    }

    /// True if an operation with this key is in flight.
    pub fn is_pending(&self, key: &OperationKey) -> bool {
        self.guild(key.guild()).lock().pending.contains_key(key)
    }

    /// True if any creation is in flight in the guild.
    pub fn has_pending_creation(&self, guild: GuildId) -> bool {
        self.guild(guild).lock().has_pending_creation()
    }

    /// Clear an operation's guard and apply its outcome.
    pub fn complete_operation(&self, op: &PendingOperation, outcome: OperationOutcome) {
        let key = *op.key();
        let state = self.guild(key.guild());
        let mut state = state.lock();

        match state.pending.get(&key) {
            Some(current) if current.id() == op.id() => {
                state.pending.remove(&key);
            }
            Some(_) => warn!(%key, "Guard held by a different operation, leaving it"),
            None => debug!(%key, "Guard already released"),
        }

        let now = Instant::now();
        match outcome {
            OperationOutcome::Created(channel) => {
                let id = *channel.channel_id();
                info!(guild = %channel.guild_id(), channel = %id, owner = %channel.owner_id(), "Tracking new channel");
                state.channels.insert(id, channel);
                state.refresh_occupancy(id, now);
            }
            OperationOutcome::Deleted | OperationOutcome::ChannelGone => {
                if let OperationKey::Channel { channel, .. } = key
                    && state.channels.remove(&channel).is_some()
                {
                    info!(%key, "Purged channel record");
                }
            }
            OperationOutcome::Applied => {}
            OperationOutcome::Failed { reason } => {
                warn!(%key, %reason, "Operation failed terminally, recording drift");
                state.drift.push(DriftCondition::TerminalFailure {
                    key,
                    reason,
                    at: Utc::now(),
                });
            }
            OperationOutcome::Cancelled { attempts } => {
                warn!(%key, attempts, "Operation cancelled, recording drift");
                state.drift.push(DriftCondition::RetryBudgetExhausted {
                    key,
                    attempts,
                    at: Utc::now(),
                });
            }
        }
    }

    /// Record where a user is as of `at`.
    ///
    /// Updates older than the stored presence are ignored.
    pub fn record_presence(
        &self,
        guild: GuildId,
        user: UserId,
        channel: Option<ChannelId>,
        at: DateTime<Utc>,
    ) -> PresenceChange {
        let state = self.guild(guild);
        let mut state = state.lock();
        let (applied, previous, stamp) = state.set_presence(user, channel, at);
        if !applied {
            debug!(%guild, %user, "Ignoring stale presence update");
            return PresenceChange {
                applied,
                previous,
                current: previous,
                at: stamp,
            };
        }

        let now = Instant::now();
        for affected in [previous, channel].into_iter().flatten() {
            state.refresh_occupancy(affected, now);
        }
        PresenceChange {
            applied,
            previous,
            current: channel,
            at: stamp,
        }
    }

    /// Re-derive presence from a full remote snapshot taken at `taken_at`.
    ///
    /// Users whose stored presence is newer than the snapshot keep it.
    /// Returns the number of users whose channel changed.
    pub fn resync_presence(
        &self,
        guild: GuildId,
        voice_states: &BTreeMap<UserId, ChannelId>,
        taken_at: DateTime<Utc>,
    ) -> usize {
        let state = self.guild(guild);
        let mut state = state.lock();
        let mut corrected = 0;

        for (user, channel) in voice_states {
            let (applied, previous, _) = state.set_presence(*user, Some(*channel), taken_at);
            if applied && previous != Some(*channel) {
                corrected += 1;
            }
        }
        let departed: Vec<_> = state
            .presence
            .iter()
            .filter(|(user, p)| p.channel.is_some() && !voice_states.contains_key(user))
            .map(|(user, _)| *user)
            .collect();
        for user in departed {
            let (applied, ..) = state.set_presence(user, None, taken_at);
            if applied {
                corrected += 1;
            }
        }

        state.refresh_all(Instant::now());
        corrected
    }

    /// Drop bookkeeping for members who are gone.
    ///
    /// Disconnected members whose last update is older than `cutoff` are
    /// forgotten, as are creation cooldowns older than `cooldown`.
    /// Returns the number of members forgotten.
    pub fn prune(&self, guild: GuildId, cutoff: DateTime<Utc>, cooldown: Duration) -> usize {
        let state = self.guild(guild);
        let pruned = state.lock().prune(cutoff, cooldown, Instant::now());
        if pruned > 0 {
            debug!(%guild, pruned, "Forgot disconnected members");
        }
        pruned
    }

    /// Channel a user is in, according to the cache.
    pub fn presence(&self, guild: GuildId, user: UserId) -> Option<ChannelId> {
        self.guild(guild)
            .lock()
            .presence
            .get(&user)
            .and_then(|p| p.channel)
    }

    /// Users in a channel, longest-present first.
    pub fn occupants(&self, guild: GuildId, channel: ChannelId) -> Vec<UserId> {
        self.guild(guild).lock().occupants(channel)
    }

    /// A managed channel record.
    pub fn channel(&self, guild: GuildId, channel: ChannelId) -> Option<ManagedChannel> {
        self.guild(guild).lock().channels.get(&channel).cloned()
    }

    /// The managed channel a user owns.
    pub fn owned_channel(&self, guild: GuildId, user: UserId) -> Option<ManagedChannel> {
        self.guild(guild).lock().owned_by(user).cloned()
    }

    /// Consistent read of all managed channels and guards of a guild.
    pub fn snapshot(&self, guild: GuildId) -> GuildSnapshot {
        let state = self.guild(guild);
        let state = state.lock();
        GuildSnapshot::new(
            guild,
            state.channels.values().cloned().collect(),
            state.pending.values().cloned().collect(),
        )
    }

    /// Every managed channel across guilds.
    pub fn all_channels(&self) -> Vec<ManagedChannel> {
        self.guilds()
            .into_iter()
            .flat_map(|guild| self.snapshot(guild).channels().clone())
            .collect()
    }

    /// Remove a channel record without a guard.
    ///
    /// Used when the platform reports the channel deleted.
    pub fn purge_channel(&self, guild: GuildId, channel: ChannelId) -> Option<ManagedChannel> {
        let removed = self.guild(guild).lock().channels.remove(&channel);
        if removed.is_some() {
            info!(%guild, %channel, "Purged channel record");
        }
        removed
    }

    /// Track a channel found remotely. Returns false if already tracked.
    pub fn adopt_channel(&self, channel: ManagedChannel) -> bool {
        let guild = *channel.guild_id();
        let id = *channel.channel_id();
        let state = self.guild(guild);
        let mut state = state.lock();
        if state.channels.contains_key(&id) {
            return false;
        }
        info!(%guild, channel = %id, owner = %channel.owner_id(), "Adopting channel");
        state.channels.insert(id, channel);
        state.refresh_occupancy(id, Instant::now());
        true
    }

    /// Seed the cache with persisted channel records.
    pub fn restore(&self, channels: impl IntoIterator<Item = ManagedChannel>) -> usize {
        channels
            .into_iter()
            .filter(|channel| self.adopt_channel(channel.clone()))
            .count()
    }

    /// Mutate a channel record in place and return the updated copy.
    pub fn update_channel<F>(
        &self,
        guild: GuildId,
        channel: ChannelId,
        f: F,
    ) -> Option<ManagedChannel>
    where
        F: FnOnce(&mut ManagedChannel),
    {
        let state = self.guild(guild);
        let mut state = state.lock();
        let managed = state.channels.get_mut(&channel)?;
        f(managed);
        Some(managed.clone())
    }

    /// Record a drift condition for the sweeper.
    pub fn record_drift(&self, condition: DriftCondition) {
        warn!(%condition, "Drift detected");
        self.guild(condition.guild()).lock().drift.push(condition);
    }

    /// Drain recorded drift conditions of a guild.
    pub fn take_drift(&self, guild: GuildId) -> Vec<DriftCondition> {
        std::mem::take(&mut self.guild(guild).lock().drift)
    }

    /// Check and record an invite against the invite cooldown.
    ///
    /// Returns the remaining cooldown if the same invite was sent too
    /// recently.
    pub fn check_invite(
        &self,
        guild: GuildId,
        inviter: UserId,
        invitee: UserId,
        channel: ChannelId,
        cooldown: Duration,
    ) -> Result<(), Duration> {
        let state = self.guild(guild);
        let mut state = state.lock();
        let now = Instant::now();
        state
            .invites
            .retain(|_, sent| now.saturating_duration_since(*sent) < cooldown);
        let key = (inviter, invitee, channel);
        if let Some(sent) = state.invites.get(&key) {
            return Err(cooldown - now.saturating_duration_since(*sent));
        }
        state.invites.insert(key, now);
        Ok(())
    }

    /// Forget an invite so it may be sent again.
    pub fn forget_invite(
        &self,
        guild: GuildId,
        inviter: UserId,
        invitee: UserId,
        channel: ChannelId,
    ) {
        self.guild(guild)
            .lock()
            .invites
            .remove(&(inviter, invitee, channel));
    }
}
