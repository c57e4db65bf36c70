//! Per-guild token buckets with platform-driven freezes.

use crate::DispatcherConfig;
use crate::config::quota;
use governor::{DefaultDirectRateLimiter, RateLimiter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use speakhub_core::GuildId;
use std::time::Duration;
use tokio::time::Instant;

/// Resource class a bucket limits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum BucketClass {
    /// Channel creation and deletion.
    ChannelLifecycle,
    /// Permission overwrites and channel edits.
    ChannelEdit,
    /// Moving or disconnecting members.
    MemberMove,
}

/// Key of one token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{}/{}", guild, class)]
pub struct BucketKey {
    /// Guild the bucket belongs to
    pub guild: GuildId,
    /// Limited resource class
    pub class: BucketClass,
}

/// A GCRA limiter that can be frozen by a retry-after signal.
///
/// The freeze only ever extends: a shorter retry-after arriving while a
/// longer freeze is active does not shorten it.
pub struct Bucket {
    limiter: DefaultDirectRateLimiter,
    frozen_until: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("frozen_until", &*self.frozen_until.lock())
            .finish()
    }
}

impl Bucket {
    /// Create the bucket for a class using the configured quota.
    pub fn new(class: BucketClass, config: &DispatcherConfig) -> Self {
        let quota = match class {
            BucketClass::ChannelLifecycle => {
                quota(*config.lifecycle_per_second(), *config.lifecycle_burst())
            }
            BucketClass::ChannelEdit => quota(*config.edit_per_second(), *config.edit_burst()),
            BucketClass::MemberMove => quota(*config.move_per_second(), *config.move_burst()),
        };
        Self {
            limiter: RateLimiter::direct(quota),
            frozen_until: Mutex::new(None),
        }
    }

    /// Freeze the bucket for `retry_after` from now.
    pub fn freeze(&self, retry_after: Duration) {
        let until = Instant::now() + retry_after;
        let mut frozen = self.frozen_until.lock();
        if frozen.is_none_or(|current| current < until) {
            *frozen = Some(until);
        }
    }

    /// Instant the current freeze ends, if one is active.
    pub fn frozen_until(&self) -> Option<Instant> {
        let frozen = *self.frozen_until.lock();
        frozen.filter(|until| *until > Instant::now())
    }

    /// Wait out any freeze, then for a token.
    pub async fn ready(&self) {
        while let Some(until) = self.frozen_until() {
            tokio::time::sleep_until(until).await;
        }
        self.limiter.until_ready().await;
    }
}
