//! In-memory voice platform.

use crate::{RemoteChannel, RemoteSnapshot, VoicePlatform};
use async_trait::async_trait;
use chrono::Utc;
use derive_getters::Getters;
use parking_lot::Mutex;
use speakhub_core::{
    ChannelEdit, ChannelId, ChannelSpec, GuildId, IdempotencyKey, OverwriteTarget,
    PermissionOverwrite, UserId,
};
use speakhub_error::{PlatformError, PlatformErrorKind, PlatformResult};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

const FIRST_CHANNEL_ID: u64 = 1_000;

/// Kind of a recorded platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum CallKind {
    /// `create_voice_channel`
    CreateChannel,
    /// `delete_channel`
    DeleteChannel,
    /// `set_permission_overwrite`
    SetPermissionOverwrite,
    /// `move_member`
    MoveMember,
    /// `edit_channel`
    EditChannel,
    /// `fetch_snapshot`
    FetchSnapshot,
    /// `find_created_channel`
    FindCreated,
}

/// A call made against the in-memory platform, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct RecordedCall {
    /// Which method was called
    kind: CallKind,
    /// Guild argument
    guild: GuildId,
    /// Channel argument, if any
    channel: Option<ChannelId>,
    /// Member argument, if any
    user: Option<UserId>,
    /// Idempotency key, if any
    key: Option<IdempotencyKey>,
    /// Tokio instant of the call
    at: Instant,
    /// Whether the call succeeded
    succeeded: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    channels: BTreeMap<GuildId, BTreeMap<ChannelId, RemoteChannel>>,
    voice_states: BTreeMap<GuildId, BTreeMap<UserId, ChannelId>>,
    overwrites: HashMap<(ChannelId, OverwriteTarget), PermissionOverwrite>,
    user_limits: HashMap<ChannelId, u32>,
    created: HashMap<IdempotencyKey, ChannelId>,
    failures: VecDeque<(CallKind, PlatformError)>,
    failures_after_create: VecDeque<PlatformError>,
    calls: Vec<RecordedCall>,
}

impl MemoryState {
    fn take_failure(&mut self, kind: CallKind) -> Option<PlatformError> {
        let index = self.failures.iter().position(|(k, _)| *k == kind)?;
        self.failures.remove(index).map(|(_, err)| err)
    }

    fn channel_exists(&self, guild: GuildId, channel: ChannelId) -> bool {
        self.channels
            .get(&guild)
            .is_some_and(|channels| channels.contains_key(&channel))
    }

    fn record(
        &mut self,
        kind: CallKind,
        guild: GuildId,
        channel: Option<ChannelId>,
        user: Option<UserId>,
        key: Option<&IdempotencyKey>,
        succeeded: bool,
    ) {
        self.calls.push(RecordedCall {
            kind,
            guild,
            channel,
            user,
            key: key.cloned(),
            at: Instant::now(),
            succeeded,
        });
    }
}

fn not_found(channel: ChannelId) -> PlatformError {
    PlatformError::new(PlatformErrorKind::NotFound(format!("channel {}", channel)))
}

/// A voice platform kept entirely in memory.
///
/// Channel ids are allocated from 1000 upwards. Scripted failures queued
/// with [`fail_next`](Self::fail_next) are consumed by the next call of the
/// matching kind; every call, failed or not, is recorded with the tokio
/// instant it was made at.
///
/// Like Discord, creates are not deduplicated: repeating a create makes a
/// second channel. Channels made under a key can be looked up with
/// [`find_created_channel`](VoicePlatform::find_created_channel).
///
/// # Examples
///
/// ```
/// use speakhub_core::{ChannelId, GuildId, UserId};
/// use speakhub_interface::{CallKind, InMemoryPlatform, VoicePlatform};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let platform = InMemoryPlatform::new();
/// platform.set_voice_state(GuildId(1), UserId(5), Some(ChannelId(2)));
/// platform.move_member(GuildId(1), UserId(5), None).await.unwrap();
/// assert_eq!(platform.count(CallKind::MoveMember), 1);
/// assert_eq!(platform.voice_state(GuildId(1), UserId(5)), None);
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryPlatform {
    state: Mutex<MemoryState>,
    latency: Mutex<Duration>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    /// Create an empty platform.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_id: FIRST_CHANNEL_ID,
                ..MemoryState::default()
            }),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Delay every call by `latency` before it takes effect.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Make the next call of `kind` fail with `error`.
    pub fn fail_next(&self, kind: CallKind, error: PlatformError) {
        self.state.lock().failures.push_back((kind, error));
    }

    /// Make the next create take effect and then fail with `error`.
    pub fn fail_after_next_create(&self, error: PlatformError) {
        self.state.lock().failures_after_create.push_back(error);
    }

    /// Add a channel that speakhub did not create.
    pub fn insert_channel(&self, guild: GuildId, channel: RemoteChannel) {
        let mut state = self.state.lock();
        state
            .channels
            .entry(guild)
            .or_default()
            .insert(*channel.id(), channel);
    }

    /// Remove a channel behind speakhub's back.
    pub fn remove_channel(&self, guild: GuildId, channel: ChannelId) {
        let mut state = self.state.lock();
        if let Some(channels) = state.channels.get_mut(&guild) {
            channels.remove(&channel);
        }
        if let Some(states) = state.voice_states.get_mut(&guild) {
            states.retain(|_, c| *c != channel);
        }
    }

    /// Connect, move or disconnect a member without recording a call.
    pub fn set_voice_state(&self, guild: GuildId, user: UserId, channel: Option<ChannelId>) {
        let mut state = self.state.lock();
        let states = state.voice_states.entry(guild).or_default();
        match channel {
            Some(channel) => {
                states.insert(user, channel);
            }
            None => {
                states.remove(&user);
            }
        }
    }

    /// Channel a member is connected to.
    pub fn voice_state(&self, guild: GuildId, user: UserId) -> Option<ChannelId> {
        self.state
            .lock()
            .voice_states
            .get(&guild)
            .and_then(|states| states.get(&user).copied())
    }

    /// Every channel of a guild.
    pub fn channels(&self, guild: GuildId) -> Vec<RemoteChannel> {
        self.state
            .lock()
            .channels
            .get(&guild)
            .map(|channels| channels.values().cloned().collect())
            .unwrap_or_default()
    }

    /// True if the channel exists.
    pub fn has_channel(&self, guild: GuildId, channel: ChannelId) -> bool {
        self.state.lock().channel_exists(guild, channel)
    }

    /// Current overwrite for a target on a channel.
    pub fn overwrite(
        &self,
        channel: ChannelId,
        target: OverwriteTarget,
    ) -> Option<PermissionOverwrite> {
        self.state.lock().overwrites.get(&(channel, target)).cloned()
    }

    /// Current member limit of a channel.
    pub fn user_limit(&self, channel: ChannelId) -> Option<u32> {
        self.state.lock().user_limits.get(&channel).copied()
    }

    /// Every recorded call in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Recorded calls of one kind.
    pub fn calls_of(&self, kind: CallKind) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of recorded calls of one kind.
    pub fn count(&self, kind: CallKind) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl VoicePlatform for InMemoryPlatform {
    #[tracing::instrument(skip(self, spec), fields(guild = %guild, name = %spec.name()))]
    async fn create_voice_channel(
        &self,
        guild: GuildId,
        spec: &ChannelSpec,
        key: &IdempotencyKey,
    ) -> PlatformResult<ChannelId> {
        self.delay().await;
        let mut state = self.state.lock();
        if let Some(err) = state.take_failure(CallKind::CreateChannel) {
            state.record(CallKind::CreateChannel, guild, None, Some(*spec.owner()), Some(key), false);
            return Err(err);
        }
        let id = ChannelId(state.next_id);
        state.next_id += 1;
        let channel = RemoteChannel::new(id, spec.name().clone(), *spec.category(), Utc::now());
        state.channels.entry(guild).or_default().insert(id, channel);
        state.overwrites.insert(
            (id, OverwriteTarget::Member(*spec.owner())),
            spec.template().owner().clone(),
        );
        state
            .overwrites
            .insert((id, OverwriteTarget::Everyone), spec.template().everyone().clone());
        if let Some(limit) = spec.user_limit() {
            state.user_limits.insert(id, *limit);
        }
        state.created.insert(key.clone(), id);
        if let Some(err) = state.failures_after_create.pop_front() {
            state.record(CallKind::CreateChannel, guild, Some(id), Some(*spec.owner()), Some(key), false);
            return Err(err);
        }
        state.record(CallKind::CreateChannel, guild, Some(id), Some(*spec.owner()), Some(key), true);
        tracing::debug!(channel = %id, "Created in-memory channel");
        Ok(id)
    }

    async fn find_created_channel(
        &self,
        guild: GuildId,
        spec: &ChannelSpec,
        key: &IdempotencyKey,
    ) -> PlatformResult<Option<ChannelId>> {
        self.delay().await;
        let mut state = self.state.lock();
        if let Some(err) = state.take_failure(CallKind::FindCreated) {
            state.record(CallKind::FindCreated, guild, None, Some(*spec.owner()), Some(key), false);
            return Err(err);
        }
        let found = state
            .created
            .get(key)
            .copied()
            .filter(|id| state.channel_exists(guild, *id));
        state.record(CallKind::FindCreated, guild, found, Some(*spec.owner()), Some(key), true);
        Ok(found)
    }

    async fn delete_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        key: &IdempotencyKey,
    ) -> PlatformResult<()> {
        self.delay().await;
        let mut state = self.state.lock();
        let result = match state.take_failure(CallKind::DeleteChannel) {
            Some(err) => Err(err),
            None if !state.channel_exists(guild, channel) => Err(not_found(channel)),
            None => {
                if let Some(channels) = state.channels.get_mut(&guild) {
                    channels.remove(&channel);
                }
                if let Some(states) = state.voice_states.get_mut(&guild) {
                    states.retain(|_, c| *c != channel);
                }
                state.overwrites.retain(|(c, _), _| *c != channel);
                Ok(())
            }
        };
        state.record(CallKind::DeleteChannel, guild, Some(channel), None, Some(key), result.is_ok());
        result
    }

    async fn set_permission_overwrite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        target: OverwriteTarget,
        overwrite: &PermissionOverwrite,
    ) -> PlatformResult<()> {
        self.delay().await;
        let mut state = self.state.lock();
        let user = match target {
            OverwriteTarget::Member(user) => Some(user),
            OverwriteTarget::Everyone => None,
        };
        let result = match state.take_failure(CallKind::SetPermissionOverwrite) {
            Some(err) => Err(err),
            None if !state.channel_exists(guild, channel) => Err(not_found(channel)),
            None => {
                state.overwrites.insert((channel, target), overwrite.clone());
                Ok(())
            }
        };
        state.record(CallKind::SetPermissionOverwrite, guild, Some(channel), user, None, result.is_ok());
        result
    }

    async fn move_member(
        &self,
        guild: GuildId,
        user: UserId,
        target: Option<ChannelId>,
    ) -> PlatformResult<()> {
        self.delay().await;
        let mut state = self.state.lock();
        let connected = state
            .voice_states
            .get(&guild)
            .is_some_and(|states| states.contains_key(&user));
        let result = match state.take_failure(CallKind::MoveMember) {
            Some(err) => Err(err),
            None if !connected => Err(PlatformError::new(PlatformErrorKind::Rejected(format!(
                "user {} is not connected to voice",
                user
            )))),
            None => match target {
                Some(channel) if !state.channel_exists(guild, channel) => Err(not_found(channel)),
                Some(channel) => {
                    state.voice_states.entry(guild).or_default().insert(user, channel);
                    Ok(())
                }
                None => {
                    state.voice_states.entry(guild).or_default().remove(&user);
                    Ok(())
                }
            },
        };
        state.record(CallKind::MoveMember, guild, target, Some(user), None, result.is_ok());
        result
    }

    async fn edit_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        edit: &ChannelEdit,
    ) -> PlatformResult<()> {
        self.delay().await;
        let mut state = self.state.lock();
        let result = match state.take_failure(CallKind::EditChannel) {
            Some(err) => Err(err),
            None if !state.channel_exists(guild, channel) => Err(not_found(channel)),
            None => {
                if let Some(name) = edit.name() {
                    let renamed = state
                        .channels
                        .get(&guild)
                        .and_then(|channels| channels.get(&channel))
                        .map(|c| RemoteChannel::new(channel, name.clone(), *c.parent_id(), *c.created_at()));
                    if let Some(renamed) = renamed {
                        state.channels.entry(guild).or_default().insert(channel, renamed);
                    }
                }
                match edit.user_limit() {
                    Some(0) => {
                        state.user_limits.remove(&channel);
                    }
                    Some(limit) => {
                        state.user_limits.insert(channel, *limit);
                    }
                    None => {}
                }
                Ok(())
            }
        };
        state.record(CallKind::EditChannel, guild, Some(channel), None, None, result.is_ok());
        result
    }

    async fn fetch_snapshot(&self, guild: GuildId) -> PlatformResult<RemoteSnapshot> {
        self.delay().await;
        let mut state = self.state.lock();
        if let Some(err) = state.take_failure(CallKind::FetchSnapshot) {
            state.record(CallKind::FetchSnapshot, guild, None, None, None, false);
            return Err(err);
        }
        let channels = state
            .channels
            .get(&guild)
            .map(|channels| channels.values().cloned().collect())
            .unwrap_or_default();
        let voice_states = state.voice_states.get(&guild).cloned().unwrap_or_default();
        state.record(CallKind::FetchSnapshot, guild, None, None, None, true);
        Ok(RemoteSnapshot::new(guild, channels, voice_states, Utc::now()))
    }

    fn platform_name(&self) -> &'static str {
        "memory"
    }
}
