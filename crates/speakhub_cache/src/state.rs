//! Per-guild state held under the guild lock.

use chrono::{DateTime, Utc};
use speakhub_core::{
    ChannelId, DriftCondition, ManagedChannel, OperationKey, PendingOperation, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

/// Where a user is, according to the newest event seen for them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Presence {
    pub channel: Option<ChannelId>,
    /// Source timestamp of the newest applied update
    pub at: DateTime<Utc>,
    /// When the user entered `channel`
    pub since: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub(crate) struct GuildState {
    pub channels: BTreeMap<ChannelId, ManagedChannel>,
    pub pending: HashMap<OperationKey, PendingOperation>,
    pub presence: HashMap<UserId, Presence>,
    pub drift: Vec<DriftCondition>,
    pub last_creation: HashMap<UserId, Instant>,
    pub invites: HashMap<(UserId, UserId, ChannelId), Instant>,
}

impl GuildState {
    pub fn occupants(&self, channel: ChannelId) -> Vec<UserId> {
        let mut present: Vec<_> = self
            .presence
            .iter()
            .filter(|(_, p)| p.channel == Some(channel))
            .map(|(user, p)| (p.since, *user))
            .collect();
        present.sort();
        present.into_iter().map(|(_, user)| user).collect()
    }

    pub fn refresh_occupancy(&mut self, channel: ChannelId, now: Instant) {
        let count = self
            .presence
            .values()
            .filter(|p| p.channel == Some(channel))
            .count();
        if let Some(managed) = self.channels.get_mut(&channel) {
            managed.set_occupancy(count, now);
        }
    }

    pub fn refresh_all(&mut self, now: Instant) {
        let ids: Vec<_> = self.channels.keys().copied().collect();
        for id in ids {
            self.refresh_occupancy(id, now);
        }
    }

    /// Apply a presence update unless a newer one is already stored.
    ///
    /// Returns `(applied, previous, stamp)` where `stamp` is the source
    /// timestamp of the presence stored afterwards.
    pub fn set_presence(
        &mut self,
        user: UserId,
        channel: Option<ChannelId>,
        at: DateTime<Utc>,
    ) -> (bool, Option<ChannelId>, DateTime<Utc>) {
        match self.presence.get_mut(&user) {
            Some(existing) if existing.at > at => (false, existing.channel, existing.at),
            Some(existing) => {
                let previous = existing.channel;
                if previous != channel {
                    existing.since = at;
                }
                existing.channel = channel;
                existing.at = at;
                (true, previous, at)
            }
            None => {
                self.presence.insert(
                    user,
                    Presence {
                        channel,
                        at,
                        since: at,
                    },
                );
                (true, None, at)
            }
        }
    }

    /// Forget disconnected members last seen before `cutoff` and creation
    /// cooldowns that have run out.
    ///
    /// Returns the number of presence entries dropped.
    pub fn prune(&mut self, cutoff: DateTime<Utc>, cooldown: Duration, now: Instant) -> usize {
        let before = self.presence.len();
        self.presence
            .retain(|_, p| p.channel.is_some() || p.at >= cutoff);
        self.last_creation
            .retain(|_, last| now.saturating_duration_since(*last) < cooldown);
        before - self.presence.len()
    }

    pub fn owned_by(&self, user: UserId) -> Option<&ManagedChannel> {
        self.channels.values().find(|c| *c.owner_id() == user)
    }

    pub fn has_pending_creation(&self) -> bool {
        self.pending
            .keys()
            .any(|key| matches!(key, OperationKey::Creation { .. }))
    }
}
