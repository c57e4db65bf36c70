//! Counters for lifecycle activity.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics collector for the lifecycle core.
///
/// Cheap to clone; clones share the same counters.
#[derive(Debug, Clone)]
pub struct LifecycleMetrics {
    inner: Arc<LifecycleMetricsInner>,
}

#[derive(Debug, Default)]
struct LifecycleMetricsInner {
    // Inbound events
    events_received: AtomicU64,
    events_duplicate: AtomicU64,
    events_ignored: AtomicU64,

    // Lifecycle transitions
    channels_created: AtomicU64,
    creations_suppressed: AtomicU64,
    creation_failures: AtomicU64,
    move_failures: AtomicU64,
    channels_deleted: AtomicU64,
    deletion_failures: AtomicU64,
    ownership_transfers: AtomicU64,
    external_deletions: AtomicU64,

    // Reconciliation
    sweeps: AtomicU64,
    sweep_failures: AtomicU64,
    drift_corrections: AtomicU64,
    last_sweep: parking_lot::Mutex<Option<Instant>>,
}

impl Default for LifecycleMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl LifecycleMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LifecycleMetricsInner::default()),
        }
    }

    /// Records an inbound raw event.
    pub fn record_event(&self) {
        bump(&self.inner.events_received);
    }

    /// Records a redelivered event dropped by deduplication.
    pub fn record_duplicate(&self) {
        bump(&self.inner.events_duplicate);
    }

    /// Records an event that maps to nothing in the internal vocabulary.
    pub fn record_ignored(&self) {
        bump(&self.inner.events_ignored);
    }

    /// Records a created channel.
    pub fn record_creation(&self) {
        bump(&self.inner.channels_created);
    }

    /// Records a creation trigger dropped by a held guard or cooldown.
    pub fn record_suppressed(&self) {
        bump(&self.inner.creations_suppressed);
    }

    /// Records a creation that failed or was cancelled.
    pub fn record_creation_failure(&self) {
        bump(&self.inner.creation_failures);
    }

    /// Records an owner that could not be moved into their new channel.
    pub fn record_move_failure(&self) {
        bump(&self.inner.move_failures);
    }

    /// Records a deleted channel.
    pub fn record_deletion(&self) {
        bump(&self.inner.channels_deleted);
    }

    /// Records a deletion that failed or was cancelled.
    pub fn record_deletion_failure(&self) {
        bump(&self.inner.deletion_failures);
    }

    /// Records an ownership transfer.
    pub fn record_transfer(&self) {
        bump(&self.inner.ownership_transfers);
    }

    /// Records a tracked channel deleted by someone else.
    pub fn record_external_deletion(&self) {
        bump(&self.inner.external_deletions);
    }

    /// Records a completed sweep and the corrections it made.
    pub fn record_sweep(&self, corrections: u64) {
        bump(&self.inner.sweeps);
        self.inner
            .drift_corrections
            .fetch_add(corrections, Ordering::Relaxed);
        *self.inner.last_sweep.lock() = Some(Instant::now());
    }

    /// Records a sweep that could not fetch remote state.
    pub fn record_sweep_failure(&self) {
        bump(&self.inner.sweep_failures);
    }

    /// Gets created channel count.
    pub fn channels_created(&self) -> u64 {
        self.inner.channels_created.load(Ordering::Relaxed)
    }

    /// Gets deleted channel count.
    pub fn channels_deleted(&self) -> u64 {
        self.inner.channels_deleted.load(Ordering::Relaxed)
    }

    /// Gets suppressed creation count.
    pub fn creations_suppressed(&self) -> u64 {
        self.inner.creations_suppressed.load(Ordering::Relaxed)
    }

    /// Gets duplicate event count.
    pub fn events_duplicate(&self) -> u64 {
        self.inner.events_duplicate.load(Ordering::Relaxed)
    }

    /// Gets sweep count.
    pub fn sweeps(&self) -> u64 {
        self.inner.sweeps.load(Ordering::Relaxed)
    }

    /// Gets time since the last completed sweep.
    pub fn time_since_sweep(&self) -> Option<std::time::Duration> {
        self.inner.last_sweep.lock().map(|instant| instant.elapsed())
    }

    /// Creates a serializable snapshot of current metrics.
    pub fn snapshot(&self) -> LifecycleMetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let inner = &self.inner;
        LifecycleMetricsSnapshot {
            events: EventMetricSnapshot {
                received: load(&inner.events_received),
                duplicate: load(&inner.events_duplicate),
                ignored: load(&inner.events_ignored),
            },
            channels: ChannelMetricSnapshot {
                created: load(&inner.channels_created),
                creations_suppressed: load(&inner.creations_suppressed),
                creation_failures: load(&inner.creation_failures),
                move_failures: load(&inner.move_failures),
                deleted: load(&inner.channels_deleted),
                deletion_failures: load(&inner.deletion_failures),
                ownership_transfers: load(&inner.ownership_transfers),
                external_deletions: load(&inner.external_deletions),
            },
            reconciliation: ReconciliationMetricSnapshot {
                sweeps: load(&inner.sweeps),
                failures: load(&inner.sweep_failures),
                drift_corrections: load(&inner.drift_corrections),
                seconds_since_sweep: self.time_since_sweep().map(|d| d.as_secs()),
            },
        }
    }
}

/// Serializable snapshot of lifecycle metrics.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleMetricsSnapshot {
    /// Inbound event counters
    pub events: EventMetricSnapshot,
    /// Channel lifecycle counters
    pub channels: ChannelMetricSnapshot,
    /// Sweeper counters
    pub reconciliation: ReconciliationMetricSnapshot,
}

/// Inbound event counters.
#[derive(Debug, Clone, Serialize)]
pub struct EventMetricSnapshot {
    /// Raw events received
    pub received: u64,
    /// Redeliveries dropped
    pub duplicate: u64,
    /// Events with no internal meaning
    pub ignored: u64,
}

/// Channel lifecycle counters.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelMetricSnapshot {
    /// Channels created
    pub created: u64,
    /// Creation triggers dropped
    pub creations_suppressed: u64,
    /// Creations that failed
    pub creation_failures: u64,
    /// Owners not moved into their channel
    pub move_failures: u64,
    /// Channels deleted
    pub deleted: u64,
    /// Deletions that failed
    pub deletion_failures: u64,
    /// Ownership transfers
    pub ownership_transfers: u64,
    /// Channels deleted by someone else
    pub external_deletions: u64,
}

/// Sweeper counters.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationMetricSnapshot {
    /// Completed sweeps
    pub sweeps: u64,
    /// Sweeps that could not fetch remote state
    pub failures: u64,
    /// Corrections made across all sweeps
    pub drift_corrections: u64,
    /// Seconds since the last completed sweep
    pub seconds_since_sweep: Option<u64>,
}
