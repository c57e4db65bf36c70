//! Dispatcher configuration.
//!
//! Loaded as the `[dispatcher]` table of `speakhub.toml`. Every field has a
//! default, so an empty table is valid.
//!
//! ```toml
//! [dispatcher]
//! global_per_second = 50
//! lifecycle_per_second = 2
//! lifecycle_burst = 5
//! max_attempts = 5
//! submit_timeout_secs = 60
//! ```

use derive_getters::Getters;
use governor::Quota;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

/// Rate limits, retry policy and bookkeeping bounds of the dispatcher.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default, build_fn(error = "speakhub_error::BuilderError"))]
pub struct DispatcherConfig {
    /// Commands per second across every bucket
    #[serde(default = "default_global_per_second")]
    global_per_second: u32,

    /// Channel create/delete calls per second, per guild
    #[serde(default = "default_lifecycle_per_second")]
    lifecycle_per_second: u32,

    /// Burst size of the channel create/delete bucket
    #[serde(default = "default_lifecycle_burst")]
    lifecycle_burst: u32,

    /// Overwrite and edit calls per second, per guild
    #[serde(default = "default_edit_per_second")]
    edit_per_second: u32,

    /// Burst size of the edit bucket
    #[serde(default = "default_edit_burst")]
    edit_burst: u32,

    /// Member move calls per second, per guild
    #[serde(default = "default_move_per_second")]
    move_per_second: u32,

    /// Burst size of the member move bucket
    #[serde(default = "default_move_burst")]
    move_burst: u32,

    /// Attempts per command, including the first
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,

    /// First retry delay (milliseconds)
    #[serde(default = "default_initial_backoff_ms")]
    initial_backoff_ms: u64,

    /// Backoff growth factor
    #[serde(default = "default_backoff_factor")]
    backoff_factor: u64,

    /// Upper bound on a single retry delay (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    max_backoff_ms: u64,

    /// Upper bound on one submission, including queueing and retries (seconds)
    #[serde(default = "default_submit_timeout_secs")]
    submit_timeout_secs: u64,

    /// How long completed results are replayed for a repeated key (seconds)
    #[serde(default = "default_idempotency_window_secs")]
    idempotency_window_secs: u64,

    /// Maximum number of remembered results
    #[serde(default = "default_idempotency_capacity")]
    idempotency_capacity: usize,
}

fn default_global_per_second() -> u32 {
    50
}

fn default_lifecycle_per_second() -> u32 {
    2
}

fn default_lifecycle_burst() -> u32 {
    5
}

fn default_edit_per_second() -> u32 {
    2
}

fn default_edit_burst() -> u32 {
    5
}

fn default_move_per_second() -> u32 {
    5
}

fn default_move_burst() -> u32 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_backoff_factor() -> u64 {
    2
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_submit_timeout_secs() -> u64 {
    60
}

fn default_idempotency_window_secs() -> u64 {
    300
}

fn default_idempotency_capacity() -> usize {
    1024
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            global_per_second: default_global_per_second(),
            lifecycle_per_second: default_lifecycle_per_second(),
            lifecycle_burst: default_lifecycle_burst(),
            edit_per_second: default_edit_per_second(),
            edit_burst: default_edit_burst(),
            move_per_second: default_move_per_second(),
            move_burst: default_move_burst(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_factor: default_backoff_factor(),
            max_backoff_ms: default_max_backoff_ms(),
            submit_timeout_secs: default_submit_timeout_secs(),
            idempotency_window_secs: default_idempotency_window_secs(),
            idempotency_capacity: default_idempotency_capacity(),
        }
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

pub(crate) fn quota(per_second: u32, burst: u32) -> Quota {
    Quota::per_second(non_zero(per_second)).allow_burst(non_zero(burst.max(1)))
}

impl DispatcherConfig {
    /// Quota shared by every bucket.
    pub fn global_quota(&self) -> Quota {
        quota(self.global_per_second, self.global_per_second)
    }

    /// Submission timeout as a duration.
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    /// Idempotency window as a duration.
    pub fn idempotency_window(&self) -> Duration {
        Duration::from_secs(self.idempotency_window_secs)
    }

    /// Number of retries after the first attempt.
    pub fn max_retries(&self) -> usize {
        self.max_attempts.saturating_sub(1) as usize
    }
}
