//! Rate-limited command dispatcher.
//!
//! This module provides the [`CommandDispatcher`], which executes commands
//! against a [`VoicePlatform`] while enforcing:
//! - Governor (GCRA) quotas per `(guild, class)` bucket and globally
//! - Bucket freezes when the platform reports a retry-after
//! - Exponential backoff with jitter for transient failures (tokio-retry2)
//! - Submission order per target resource (fair tokio mutex per resource)
//! - Replay of completed results for repeated idempotency keys
//! - Lookup of channels an earlier, seemingly failed create attempt made

use crate::{
    Bucket, BucketKey, Command, CommandOutput, DispatcherConfig, IdempotencyWindow, ResourceKey,
};
use governor::{DefaultDirectRateLimiter, RateLimiter};
use parking_lot::Mutex;
use speakhub_error::{DispatchError, DispatchErrorKind, PlatformError, RetryableError};
use speakhub_interface::VoicePlatform;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, instrument, warn};

/// Executes platform commands under rate limits and retry policy.
///
/// The dispatcher is an explicit value: each instance owns its buckets,
/// so independent instances (e.g., under test) never share quota.
///
/// # Example
///
/// ```
/// use speakhub_core::{ChannelSpec, GuildId, IdempotencyKey, UserId};
/// use speakhub_interface::InMemoryPlatform;
/// use speakhub_rate_limit::{Command, CommandDispatcher, DispatcherConfig};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let platform = Arc::new(InMemoryPlatform::new());
/// let dispatcher = CommandDispatcher::new(platform, DispatcherConfig::default());
///
/// let spec = ChannelSpec::builder().name("room").owner(UserId(7)).build().unwrap();
/// let output = dispatcher
///     .submit(Command::CreateChannel {
///         guild: GuildId(1),
///         spec,
///         key: IdempotencyKey::new("create:1:7#x"),
///     })
///     .await
///     .unwrap();
/// assert!(output.channel_id().is_some());
/// # }
/// ```
pub struct CommandDispatcher {
    platform: Arc<dyn VoicePlatform>,
    config: DispatcherConfig,
    global: DefaultDirectRateLimiter,
    buckets: Mutex<HashMap<BucketKey, Arc<Bucket>>>,
    resources: Mutex<HashMap<ResourceKey, Arc<tokio::sync::Mutex<()>>>>,
    completed: Mutex<IdempotencyWindow>,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("platform", &self.platform.platform_name())
            .field("config", &self.config)
            .field("buckets", &self.buckets.lock().len())
            .finish()
    }
}

impl CommandDispatcher {
    /// Create a dispatcher for a platform.
    pub fn new(platform: Arc<dyn VoicePlatform>, config: DispatcherConfig) -> Self {
        tracing::debug!(
            platform = platform.platform_name(),
            global_per_second = config.global_per_second(),
            max_attempts = config.max_attempts(),
            "Creating CommandDispatcher"
        );
        let global = RateLimiter::direct(config.global_quota());
        let completed = IdempotencyWindow::new(
            config.idempotency_window(),
            *config.idempotency_capacity(),
        );
        Self {
            platform,
            config,
            global,
            buckets: Mutex::new(HashMap::new()),
            resources: Mutex::new(HashMap::new()),
            completed: Mutex::new(completed),
        }
    }

    /// The platform commands are executed against.
    pub fn platform(&self) -> &Arc<dyn VoicePlatform> {
        &self.platform
    }

    /// Dispatcher configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Bucket for a key, created on first use.
    pub fn bucket(&self, key: BucketKey) -> Arc<Bucket> {
        self.buckets
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(Bucket::new(key.class, &self.config)))
            .clone()
    }

    /// Execute a command, waiting for quota and retrying transient failures.
    ///
    /// Suspends until the command succeeds, fails terminally, exhausts its
    /// retry budget or exceeds the submission timeout.
    ///
    /// # Errors
    ///
    /// - `Platform` for terminal platform errors (not retried)
    /// - `RetriesExhausted` when every attempt failed transiently
    /// - `Timeout` when the submission timeout elapsed first
    #[instrument(skip(self, command), fields(command = %command, guild = %command.guild(), key = %command.key()))]
    pub async fn submit(&self, command: Command) -> Result<CommandOutput, DispatchError> {
        let replay = self.completed.lock().get(command.key());
        if let Some(output) = replay {
            debug!("Replaying completed command");
            return Ok(output);
        }

        let timeout = self.config.submit_timeout();
        let result = tokio::time::timeout(timeout, self.execute_in_order(&command))
            .await
            .unwrap_or_else(|_| {
                warn!(timeout_secs = timeout.as_secs(), "Command timed out");
                Err(DispatchError::new(DispatchErrorKind::Timeout(timeout)))
            });

        self.prune_resources();
        result
    }

    async fn execute_in_order(&self, command: &Command) -> Result<CommandOutput, DispatchError> {
        let resource = command.resource();
        let lock = self
            .resources
            .lock()
            .entry(resource)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _turn = lock.lock().await;

        // An identical command may have completed while this one was queued.
        let replay = self.completed.lock().get(command.key());
        if let Some(output) = replay {
            debug!(%resource, "Replaying command completed while queued");
            return Ok(output);
        }

        let result = self.execute_with_retry(command).await;
        if let Ok(output) = &result {
            self.completed.lock().insert(command.key().clone(), *output);
        }
        result
    }

    async fn execute_with_retry(&self, command: &Command) -> Result<CommandOutput, DispatchError> {
        let bucket = self.bucket(command.bucket());
        let attempts = AtomicU32::new(0);

        let retry_strategy = ExponentialBackoff::from_millis(*self.config.initial_backoff_ms())
            .factor(*self.config.backoff_factor())
            .max_delay(Duration::from_millis(*self.config.max_backoff_ms()))
            .map(jitter)
            .take(self.config.max_retries());

        let result = Retry::spawn(retry_strategy, || {
            let bucket = bucket.clone();
            let attempts = &attempts;
            async move {
                bucket.ready().await;
                self.global.until_ready().await;

                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                let result = if attempt > 1 {
                    self.call_platform_again(command).await
                } else {
                    self.call_platform(command).await
                };
                match result {
                    Ok(output) => Ok(output),
                    Err(e) if e.is_retryable() => {
                        let retry_after = e.retry_after();
                        if let Some(wait) = retry_after {
                            bucket.freeze(wait);
                        }
                        warn!(
                            attempt,
                            error = %e,
                            retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                            "Transient error, will retry"
                        );
                        Err(RetryError::Transient { err: e, retry_after })
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "Permanent error, failing immediately");
                        Err(RetryError::Permanent(e))
                    }
                }
            }
        })
        .await;

        result.map_err(|e: PlatformError| {
            if e.is_retryable() {
                DispatchError::new(DispatchErrorKind::RetriesExhausted {
                    attempts: attempts.load(Ordering::SeqCst),
                    last: e,
                })
            } else {
                DispatchError::new(DispatchErrorKind::Platform(e))
            }
        })
    }

    /// Retry a command, first checking whether a create already took effect.
    async fn call_platform_again(&self, command: &Command) -> Result<CommandOutput, PlatformError> {
        if let Command::CreateChannel { guild, spec, key } = command
            && let Some(channel) = self.platform.find_created_channel(*guild, spec, key).await?
        {
            debug!(%channel, "Earlier attempt created the channel");
            return Ok(CommandOutput::Created(channel));
        }
        self.call_platform(command).await
    }

    async fn call_platform(&self, command: &Command) -> Result<CommandOutput, PlatformError> {
        match command {
            Command::CreateChannel { guild, spec, key } => self
                .platform
                .create_voice_channel(*guild, spec, key)
                .await
                .map(CommandOutput::Created),
            Command::DeleteChannel {
                guild,
                channel,
                key,
            } => self
                .platform
                .delete_channel(*guild, *channel, key)
                .await
                .map(|_| CommandOutput::Completed),
            Command::SetPermissions {
                guild,
                channel,
                target,
                overwrite,
                ..
            } => self
                .platform
                .set_permission_overwrite(*guild, *channel, *target, overwrite)
                .await
                .map(|_| CommandOutput::Completed),
            Command::MoveMember {
                guild,
                user,
                target,
                ..
            } => self
                .platform
                .move_member(*guild, *user, *target)
                .await
                .map(|_| CommandOutput::Completed),
            Command::EditChannel {
                guild,
                channel,
                edit,
                ..
            } => self
                .platform
                .edit_channel(*guild, *channel, edit)
                .await
                .map(|_| CommandOutput::Completed),
        }
    }

    fn prune_resources(&self) {
        self.resources
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
