//! Raw event normalization and redelivery suppression.

use derive_getters::Getters;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use speakhub_core::{DeliveryId, NormalizedEvent, RawEvent, RawEventKind};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// The `[normalizer]` configuration section.
///
/// ```toml
/// [normalizer]
/// dedupe_window_secs = 300
/// dedupe_capacity = 4096
/// ignore_bots = true
/// queue_capacity = 256
/// ```
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
pub struct NormalizerConfig {
    /// How long a delivery id is remembered (seconds)
    #[serde(default = "default_dedupe_window_secs")]
    dedupe_window_secs: u64,

    /// Maximum number of remembered delivery ids
    #[serde(default = "default_dedupe_capacity")]
    dedupe_capacity: usize,

    /// Drop voice events of bot accounts
    #[serde(default = "default_ignore_bots")]
    ignore_bots: bool,

    /// Events buffered per guild worker
    #[serde(default = "default_queue_capacity")]
    queue_capacity: usize,
}

fn default_dedupe_window_secs() -> u64 {
    300
}

fn default_dedupe_capacity() -> usize {
    4096
}

fn default_ignore_bots() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            dedupe_window_secs: default_dedupe_window_secs(),
            dedupe_capacity: default_dedupe_capacity(),
            ignore_bots: default_ignore_bots(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl NormalizerConfig {
    /// Dedupe window as a duration.
    pub fn dedupe_window(&self) -> Duration {
        Duration::from_secs(self.dedupe_window_secs)
    }
}

/// Result of normalizing one raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// The event maps to the internal vocabulary.
    Event(NormalizedEvent),
    /// The delivery id was seen inside the dedupe window.
    Duplicate(DeliveryId),
    /// The event carries nothing the orchestrator acts on.
    Ignored(&'static str),
}

#[derive(Debug)]
struct DeliveryWindow {
    ttl: Duration,
    capacity: usize,
    seen: HashMap<DeliveryId, Instant>,
    order: VecDeque<DeliveryId>,
}

impl DeliveryWindow {
    fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns false if `id` was already seen inside the window.
    fn record(&mut self, id: DeliveryId) -> bool {
        let now = Instant::now();
        while let Some(front) = self.order.front().copied() {
            let expired = self
                .seen
                .get(&front)
                .is_none_or(|at| now.saturating_duration_since(*at) >= self.ttl);
            if !expired {
                break;
            }
            self.order.pop_front();
            self.seen.remove(&front);
        }

        if self.seen.contains_key(&id) {
            return false;
        }
        while self.seen.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.seen.remove(&oldest);
                }
                None => break,
            }
        }
        self.seen.insert(id, now);
        self.order.push_back(id);
        true
    }
}

/// Converts raw transport events into [`NormalizedEvent`]s.
///
/// Delivery ids are remembered for a bounded window; a redelivered event is
/// reported as [`Normalized::Duplicate`] and must not be processed again.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use speakhub_core::{ChannelId, DeliveryId, GuildId, RawEvent, RawEventKind, UserId};
/// use speakhub_orchestrator::{EventNormalizer, Normalized, NormalizerConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let normalizer = EventNormalizer::new(NormalizerConfig::default());
/// let raw = RawEvent::builder()
///     .kind(RawEventKind::VoiceStateUpdate)
///     .guild_id(GuildId(1))
///     .user_id(UserId(7))
///     .channel_id(ChannelId(2))
///     .timestamp(Utc::now())
///     .delivery_id(DeliveryId(99))
///     .build()
///     .unwrap();
///
/// assert!(matches!(normalizer.normalize(&raw), Normalized::Event(_)));
/// assert_eq!(normalizer.normalize(&raw), Normalized::Duplicate(DeliveryId(99)));
/// # }
/// ```
#[derive(Debug)]
pub struct EventNormalizer {
    config: NormalizerConfig,
    window: Mutex<DeliveryWindow>,
}

impl EventNormalizer {
    /// Create a normalizer.
    pub fn new(config: NormalizerConfig) -> Self {
        let window = DeliveryWindow::new(config.dedupe_window(), config.dedupe_capacity);
        Self {
            config,
            window: Mutex::new(window),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize one raw event.
    pub fn normalize(&self, raw: &RawEvent) -> Normalized {
        let delivery_id = *raw.delivery_id();
        if !self.window.lock().record(delivery_id) {
            debug!(%delivery_id, kind = %raw.kind(), "Dropping redelivered event");
            return Normalized::Duplicate(delivery_id);
        }

        let normalized = self.map(raw);
        if let Normalized::Ignored(reason) = &normalized {
            trace!(%delivery_id, kind = %raw.kind(), reason, "Ignoring event");
        }
        normalized
    }

    fn map(&self, raw: &RawEvent) -> Normalized {
        let guild = *raw.guild_id();
        let at = *raw.timestamp();

        match raw.kind() {
            RawEventKind::VoiceStateUpdate => {
                let Some(user) = *raw.user_id() else {
                    return Normalized::Ignored("voice state without member");
                };
                if *raw.is_bot() && self.config.ignore_bots {
                    return Normalized::Ignored("bot account");
                }
                match (*raw.channel_id(), *raw.previous_channel_id()) {
                    (Some(current), Some(previous)) if current == previous => {
                        Normalized::Ignored("voice state change within a channel")
                    }
                    (Some(channel), _) => Normalized::Event(NormalizedEvent::UserEnteredChannel {
                        guild,
                        user,
                        channel,
                        display_name: raw
                            .display_name()
                            .clone()
                            .unwrap_or_else(|| user.to_string()),
                        at,
                        delivery_id: *raw.delivery_id(),
                    }),
                    (None, previous) => Normalized::Event(NormalizedEvent::UserLeftChannel {
                        guild,
                        user,
                        channel: previous,
                        at,
                    }),
                }
            }
            RawEventKind::ChannelDelete => match *raw.channel_id() {
                Some(channel) => Normalized::Event(NormalizedEvent::ChannelDeletedExternally {
                    guild,
                    channel,
                    at,
                }),
                None => Normalized::Ignored("channel delete without channel"),
            },
            RawEventKind::GuildMemberRemove => {
                let Some(user) = *raw.user_id() else {
                    return Normalized::Ignored("member removal without member");
                };
                if *raw.is_bot() && self.config.ignore_bots {
                    return Normalized::Ignored("bot account");
                }
                Normalized::Event(NormalizedEvent::UserLeftChannel {
                    guild,
                    user,
                    channel: None,
                    at,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_window_forgets_after_ttl() {
        let mut window = DeliveryWindow::new(Duration::from_secs(10), 16);
        assert!(window.record(DeliveryId(1)));
        assert!(!window.record(DeliveryId(1)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(window.record(DeliveryId(1)));
    }

    #[test]
    fn test_window_evicts_oldest_at_capacity() {
        let mut window = DeliveryWindow::new(Duration::from_secs(60), 2);
        assert!(window.record(DeliveryId(1)));
        assert!(window.record(DeliveryId(2)));
        assert!(window.record(DeliveryId(3)));

        assert!(window.record(DeliveryId(1)));
        assert!(!window.record(DeliveryId(3)));
    }
}
