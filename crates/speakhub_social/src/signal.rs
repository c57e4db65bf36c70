//! Messages from the gateway to the composition root.

use speakhub_core::{DeliveryId, GuildId, RawEvent};
use std::sync::atomic::{AtomicU64, Ordering};

/// What the gateway handler reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewaySignal {
    /// A decoded inbound event
    Event(RawEvent),
    /// The gateway cache holds these guilds; a full sweep is now meaningful
    CacheReady(Vec<GuildId>),
}

/// Allocates delivery ids for events that carry none of their own.
///
/// The high bits hold the process start time in seconds so ids do not
/// repeat across restarts.
///
/// ```
/// use speakhub_social::DeliverySequence;
///
/// let sequence = DeliverySequence::starting_at(1_700_000_000);
/// let first = sequence.next_id();
/// assert!(sequence.next_id() > first);
/// ```
#[derive(Debug)]
pub struct DeliverySequence {
    next: AtomicU64,
}

impl DeliverySequence {
    /// Start a sequence for a process started at `unix_secs`.
    pub fn starting_at(unix_secs: u64) -> Self {
        Self {
            next: AtomicU64::new(unix_secs << 24),
        }
    }

    /// Start a sequence for the current process.
    pub fn new() -> Self {
        let secs = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        Self::starting_at(secs)
    }

    /// Hand out the next id.
    pub fn next_id(&self) -> DeliveryId {
        DeliveryId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for DeliverySequence {
    fn default() -> Self {
        Self::new()
    }
}
