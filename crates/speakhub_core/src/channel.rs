//! Managed channel records and outbound channel descriptions.

use crate::{ChannelId, DeliveryId, GuildId, PermissionTemplate, UserId};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;

/// How a managed channel came to be tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum CreationSource {
    /// Created in response to a user entering the join-to-create channel.
    JoinEvent {
        /// The join-to-create channel the user entered
        join_channel: ChannelId,
        /// Delivery that triggered the creation
        delivery_id: DeliveryId,
    },
    /// Found by the reconciliation sweeper and adopted into the cache.
    Adopted,
    /// Loaded from the persistence collaborator at startup.
    Restored,
}

/// A temporary voice channel whose lifecycle speakhub owns.
///
/// Occupancy is a projection of the presence map kept by the state cache;
/// `empty_since` is the monotonic instant occupancy last dropped to zero
/// and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ManagedChannel {
    /// Remote channel identifier
    channel_id: ChannelId,
    /// Owning guild
    guild_id: GuildId,
    /// Current channel owner
    owner_id: UserId,
    /// Channel name as last set by speakhub
    name: String,
    /// When the channel was created (or first tracked)
    created_at: DateTime<Utc>,
    /// Where the record came from
    source: CreationSource,
    /// Current occupant count
    #[serde(default)]
    occupancy: usize,
    /// When occupancy last reached zero
    #[serde(skip)]
    empty_since: Option<Instant>,
    /// Whether @everyone is denied connect
    #[serde(default)]
    locked: bool,
    /// Member limit, `None` for unlimited
    #[serde(default)]
    user_limit: Option<u32>,
    /// Members denied connect by the owner
    #[serde(default)]
    blocked: BTreeSet<UserId>,
}

impl ManagedChannel {
    /// Create a record for a freshly created, still empty channel.
    pub fn new(
        guild_id: GuildId,
        channel_id: ChannelId,
        owner_id: UserId,
        name: impl Into<String>,
        source: CreationSource,
    ) -> Self {
        Self {
            channel_id,
            guild_id,
            owner_id,
            name: name.into(),
            created_at: Utc::now(),
            source,
            occupancy: 0,
            empty_since: None,
            locked: false,
            user_limit: None,
            blocked: BTreeSet::new(),
        }
    }

    /// Override the creation timestamp (used when adopting remote channels).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Update occupancy, starting or clearing the empty clock.
    pub fn set_occupancy(&mut self, occupancy: usize, now: Instant) {
        self.occupancy = occupancy;
        if occupancy == 0 {
            self.empty_since.get_or_insert(now);
        } else {
            self.empty_since = None;
        }
    }

    /// True once the channel has been empty for at least `grace`.
    pub fn is_expired(&self, now: Instant, grace: Duration) -> bool {
        self.occupancy == 0
            && self
                .empty_since
                .is_some_and(|since| now.saturating_duration_since(since) >= grace)
    }

    /// Change the owner.
    pub fn set_owner(&mut self, owner_id: UserId) {
        self.owner_id = owner_id;
    }

    /// Change the recorded name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Set or clear the lock flag.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Set the member limit; zero clears it.
    pub fn set_user_limit(&mut self, limit: u32) {
        self.user_limit = (limit > 0).then_some(limit);
    }

    /// Record a blocked member. Returns false if already blocked.
    pub fn block(&mut self, user: UserId) -> bool {
        self.blocked.insert(user)
    }

    /// Remove a blocked member. Returns false if not blocked.
    pub fn unblock(&mut self, user: UserId) -> bool {
        self.blocked.remove(&user)
    }
}

/// Everything the platform needs to create a managed channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into), build_fn(error = "speakhub_error::BuilderError"))]
pub struct ChannelSpec {
    /// Rendered channel name
    name: String,
    /// Parent category, if any
    #[builder(default)]
    category: Option<ChannelId>,
    /// Member who receives the owner overwrite
    owner: UserId,
    /// Overwrites applied at creation
    #[builder(default)]
    template: PermissionTemplate,
    /// Member limit at creation
    #[builder(default)]
    user_limit: Option<u32>,
}

impl ChannelSpec {
    /// Start building a channel spec.
    pub fn builder() -> ChannelSpecBuilder {
        ChannelSpecBuilder::default()
    }
}

/// Partial edit of a channel's name or member limit.
///
/// A `user_limit` of `Some(0)` removes the limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option, into)]
pub struct ChannelEdit {
    /// New channel name
    name: Option<String>,
    /// New member limit
    user_limit: Option<u32>,
}

impl ChannelEdit {
    /// True if the edit changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.user_limit.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ManagedChannel {
        ManagedChannel::new(
            GuildId(1),
            ChannelId(10),
            UserId(100),
            "voice",
            CreationSource::Adopted,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_clock_starts_once() {
        let mut ch = channel();
        let t0 = Instant::now();
        ch.set_occupancy(0, t0);
        tokio::time::advance(Duration::from_secs(5)).await;
        ch.set_occupancy(0, Instant::now());
        assert_eq!(ch.empty_since(), &Some(t0));
        assert!(ch.is_expired(Instant::now(), Duration::from_secs(5)));
        assert!(!ch.is_expired(Instant::now(), Duration::from_secs(6)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_clears_empty_clock() {
        let mut ch = channel();
        ch.set_occupancy(0, Instant::now());
        ch.set_occupancy(2, Instant::now());
        assert!(ch.empty_since().is_none());
        assert!(!ch.is_expired(Instant::now(), Duration::ZERO));
    }

    #[test]
    fn test_zero_limit_clears() {
        let mut ch = channel();
        ch.set_user_limit(5);
        assert_eq!(ch.user_limit(), &Some(5));
        ch.set_user_limit(0);
        assert_eq!(ch.user_limit(), &None);
    }

    #[test]
    fn test_spec_builder_requires_owner() {
        let result = ChannelSpec::builder().name("voice").build();
        assert!(result.is_err());
    }
}
