//! Periodic reconciliation against remote snapshots.

use crate::{Orchestrator, TeardownOutcome};
use chrono::Utc;
use serde::Serialize;
use speakhub_core::{ChannelId, CreationSource, GuildId, ManagedChannel, OperationKey};
use speakhub_error::{DispatchError, DispatchErrorKind, LifecycleError};
use tracing::{debug, info, instrument, warn};

/// How long a disconnected member's last update is kept for ordering.
const DEPARTED_RETENTION_SECS: i64 = 600;

/// What one sweep of a guild corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Guild that was swept
    pub guild: GuildId,
    /// Drift records consumed
    pub drift_consumed: usize,
    /// Members whose cached voice channel was wrong
    pub presence_corrections: usize,
    /// Disconnected members dropped from the presence map
    pub members_forgotten: usize,
    /// Tracked channels missing remotely, dropped from the cache
    pub purged: Vec<ChannelId>,
    /// Occupied untracked channels now tracked
    pub adopted: Vec<ChannelId>,
    /// Empty untracked channels deleted
    pub orphans_deleted: Vec<ChannelId>,
    /// Tracked channels past their grace window, deleted
    pub expired_deleted: Vec<ChannelId>,
    /// Empty tracked channels still inside their grace window
    pub teardowns_scheduled: Vec<ChannelId>,
    /// Corrective commands that failed
    pub failures: usize,
}

impl SweepReport {
    fn new(guild: GuildId) -> Self {
        Self {
            guild,
            drift_consumed: 0,
            presence_corrections: 0,
            members_forgotten: 0,
            purged: Vec::new(),
            adopted: Vec::new(),
            orphans_deleted: Vec::new(),
            expired_deleted: Vec::new(),
            teardowns_scheduled: Vec::new(),
            failures: 0,
        }
    }

    /// Number of corrections made to the cache or the remote side.
    pub fn corrections(&self) -> usize {
        self.presence_corrections
            + self.purged.len()
            + self.adopted.len()
            + self.orphans_deleted.len()
            + self.expired_deleted.len()
    }
}

/// Backstop against missed events, restarts and terminal failures.
///
/// A sweep fetches the guild's remote snapshot and diffs it against the
/// cache: presence is re-derived, tracked channels missing remotely are
/// purged, untracked channels carrying the naming marker are adopted when
/// occupied or deleted when empty, and empty tracked channels past their
/// grace window are deleted. It shares the operation guards with live
/// event handling, so it may run at any time.
#[derive(Debug, Clone)]
pub struct Sweeper {
    orchestrator: Orchestrator,
}

impl Sweeper {
    /// Create a sweeper on top of an orchestrator.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Sweep every configured guild, one after another.
    pub async fn run_all(&self) -> Vec<Result<SweepReport, LifecycleError>> {
        let mut reports = Vec::new();
        for guild in self.orchestrator.guilds() {
            reports.push(self.run(guild).await);
        }
        reports
    }

    /// Sweep one guild.
    #[instrument(skip(self), fields(guild = %guild))]
    pub async fn run(&self, guild: GuildId) -> Result<SweepReport, LifecycleError> {
        let orchestrator = &self.orchestrator;
        let settings = orchestrator.guild_settings(guild)?;
        let cache = orchestrator.cache();
        let metrics = orchestrator.metrics();

        let remote = match orchestrator
            .dispatcher()
            .platform()
            .fetch_snapshot(guild)
            .await
        {
            Ok(remote) => remote,
            Err(err) => {
                warn!(%err, "Could not fetch remote snapshot");
                metrics.record_sweep_failure();
                return Err(DispatchError::new(DispatchErrorKind::Platform(err)).into());
            }
        };
        let mut report = SweepReport::new(guild);

        let drift = cache.take_drift(guild);
        for condition in &drift {
            debug!(%condition, "Reconciling drift");
        }
        report.drift_consumed = drift.len();

        report.presence_corrections =
            cache.resync_presence(guild, remote.voice_states(), *remote.taken_at());
        report.members_forgotten = cache.prune(
            guild,
            *remote.taken_at() - chrono::Duration::seconds(DEPARTED_RETENTION_SECS),
            settings.creation_cooldown(),
        );

        let local = cache.snapshot(guild);
        for managed in local.channels() {
            let id = *managed.channel_id();
            if remote.channel(id).is_some()
                || *managed.created_at() > *remote.taken_at()
                || cache.is_pending(&OperationKey::channel(guild, id))
            {
                continue;
            }
            if cache.purge_channel(guild, id).is_some() {
                report.purged.push(id);
            }
        }

        let creation_pending = local.has_pending_creation();
        for channel in remote.channels() {
            let id = *channel.id();
            if id == *settings.join_channel_id()
                || local.channel(id).is_some()
                || !settings.is_managed_name(channel.name(), *channel.parent_id())
            {
                continue;
            }

            if let Some(owner) = remote.occupants(id).first() {
                let record = ManagedChannel::new(
                    guild,
                    id,
                    *owner,
                    channel.name().clone(),
                    CreationSource::Adopted,
                )
                .with_created_at(*channel.created_at());
                if cache.adopt_channel(record) {
                    report.adopted.push(id);
                }
                continue;
            }

            if creation_pending {
                debug!(channel = %id, "Creation in flight, leaving empty orphan for now");
                continue;
            }
            let age = (Utc::now() - *channel.created_at())
                .to_std()
                .unwrap_or_default();
            if age < settings.grace_window() {
                continue;
            }
            match orchestrator.delete_untracked(guild, id).await {
                TeardownOutcome::Deleted | TeardownOutcome::Gone => report.orphans_deleted.push(id),
                TeardownOutcome::Failed => report.failures += 1,
                TeardownOutcome::Deferred(_) | TeardownOutcome::Kept => {}
            }
        }

        for managed in cache.snapshot(guild).channels() {
            if *managed.occupancy() > 0 {
                continue;
            }
            let id = *managed.channel_id();
            match orchestrator.try_teardown(guild, id).await {
                TeardownOutcome::Deleted | TeardownOutcome::Gone => report.expired_deleted.push(id),
                TeardownOutcome::Deferred(remaining) => {
                    orchestrator.schedule_teardown(guild, id, remaining);
                    report.teardowns_scheduled.push(id);
                }
                TeardownOutcome::Failed => report.failures += 1,
                TeardownOutcome::Kept => {}
            }
        }

        metrics.record_sweep(report.corrections() as u64);
        info!(
            corrections = report.corrections(),
            failures = report.failures,
            drift = report.drift_consumed,
            "Sweep complete"
        );
        Ok(report)
    }
}
