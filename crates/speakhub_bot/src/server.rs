//! Long-running voice server.
//!
//! Gateway signals are pumped into the event router while one sweep ticker
//! per configured guild reconciles state. Managed channels are saved after
//! every sweep.

use crate::SpeakhubConfig;
use parking_lot::Mutex;
use speakhub_cache::StateCache;
use speakhub_core::{GuildId, RawEvent};
use speakhub_error::{LifecycleError, SpeakhubResult};
use speakhub_interface::VoicePlatform;
use speakhub_orchestrator::{
    EventNormalizer, EventRouter, LifecycleMetrics, Orchestrator, OwnerControls, SweepReport,
    Sweeper,
};
use speakhub_rate_limit::CommandDispatcher;
use speakhub_social::GatewaySignal;
use speakhub_storage::{ChannelStore, JsonChannelStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, warn};

/// Voice server that wires every speakhub component together.
///
/// Owns the orchestrator, the per-guild event router, the sweeper and the
/// optional channel store. Inbound gateway signals are fed through
/// [`VoiceServer::run_signals`]; each guild gets its own reconciliation
/// ticker once [`VoiceServer::start`] is called.
pub struct VoiceServer {
    config: SpeakhubConfig,
    orchestrator: Orchestrator,
    router: EventRouter,
    sweeper: Sweeper,
    controls: OwnerControls,
    store: Option<Arc<dyn ChannelStore>>,
    tickers: Mutex<JoinSet<()>>,
}

impl VoiceServer {
    /// Build a server on top of a platform.
    ///
    /// A `[storage]` section in the configuration selects a JSON store.
    pub fn new(config: SpeakhubConfig, platform: Arc<dyn VoicePlatform>) -> Self {
        let dispatcher = Arc::new(CommandDispatcher::new(
            platform,
            config.dispatcher().clone(),
        ));
        let orchestrator = Orchestrator::new(
            config.guilds().clone(),
            Arc::new(StateCache::new()),
            dispatcher,
            LifecycleMetrics::new(),
        );
        let router = EventRouter::new(
            EventNormalizer::new(config.normalizer().clone()),
            orchestrator.clone(),
        );
        let store = config.storage().as_ref().map(|storage| {
            Arc::new(JsonChannelStore::from_config(storage)) as Arc<dyn ChannelStore>
        });

        Self {
            sweeper: Sweeper::new(orchestrator.clone()),
            controls: OwnerControls::new(orchestrator.clone()),
            config,
            orchestrator,
            router,
            store,
            tickers: Mutex::new(JoinSet::new()),
        }
    }

    /// Replace the configured store.
    pub fn with_store(mut self, store: Arc<dyn ChannelStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The configuration the server was built from.
    pub fn config(&self) -> &SpeakhubConfig {
        &self.config
    }

    /// The lifecycle orchestrator.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// The per-guild event router.
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Owner controls bound to the same orchestrator.
    pub fn controls(&self) -> &OwnerControls {
        &self.controls
    }

    /// Lifecycle counters.
    pub fn metrics(&self) -> &LifecycleMetrics {
        self.orchestrator.metrics()
    }

    /// Seed the state cache from the store.
    ///
    /// Returns the number of records restored. Records of guilds that are no
    /// longer configured are skipped.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> SpeakhubResult<usize> {
        let Some(store) = &self.store else {
            debug!("No channel store configured");
            return Ok(0);
        };

        let records = store.load().await?;
        let total = records.len();
        let known: Vec<_> = records
            .into_iter()
            .filter(|record| self.orchestrator.guild_settings(*record.guild_id()).is_ok())
            .collect();
        let restored = self.orchestrator.cache().restore(known);
        info!(
            backend = store.backend_name(),
            total, restored, "Restored managed channels"
        );
        Ok(restored)
    }

    /// Write every tracked channel to the store.
    #[instrument(skip(self))]
    pub async fn save(&self) -> SpeakhubResult<()> {
        if let Some(store) = &self.store {
            let channels = self.orchestrator.cache().all_channels();
            store.save(&channels).await?;
            debug!(count = channels.len(), "Saved managed channels");
        }
        Ok(())
    }

    /// Sweep one guild and persist the result.
    ///
    /// A failed save is logged; the sweep report is still returned.
    #[instrument(skip(self), fields(guild = %guild))]
    pub async fn sweep(&self, guild: GuildId) -> Result<SweepReport, LifecycleError> {
        let report = self.sweeper.run(guild).await?;
        if let Err(e) = self.save().await {
            warn!(error = %e, "Could not save managed channels after sweep");
        }
        Ok(report)
    }

    /// Sweep every configured guild.
    pub async fn sweep_all(&self) -> Vec<Result<SweepReport, LifecycleError>> {
        let mut reports = Vec::new();
        for guild in self.orchestrator.guilds() {
            reports.push(self.sweep(guild).await);
        }
        reports
    }

    /// Route one raw event. Returns true if it was queued.
    pub async fn route(&self, raw: RawEvent) -> bool {
        self.router.route(raw).await
    }

    /// Apply one gateway signal.
    pub async fn handle_signal(&self, signal: GatewaySignal) {
        match signal {
            GatewaySignal::Event(raw) => {
                self.route(raw).await;
            }
            GatewaySignal::CacheReady(guilds) => {
                info!(count = guilds.len(), "Gateway cache ready, sweeping");
                for guild in guilds {
                    if self.orchestrator.guild_settings(guild).is_err() {
                        continue;
                    }
                    if let Err(e) = self.sweep(guild).await {
                        error!(%guild, error = %e, "Initial sweep failed");
                    }
                }
            }
        }
    }

    /// Apply gateway signals until the sender side is dropped.
    #[instrument(skip(self, rx))]
    pub async fn run_signals(&self, mut rx: mpsc::Receiver<GatewaySignal>) {
        info!("Signal pump started");
        while let Some(signal) = rx.recv().await {
            self.handle_signal(signal).await;
        }
        info!("Signal pump stopped");
    }

    /// Restore from the store and start one reconciliation ticker per guild.
    ///
    /// The first sweep of each ticker runs one interval after startup; an
    /// immediate sweep is left to [`GatewaySignal::CacheReady`] or
    /// [`VoiceServer::sweep_all`].
    #[instrument(skip(self))]
    pub async fn start(self: &Arc<Self>) -> SpeakhubResult<()> {
        let restored = self.restore().await?;
        info!(
            guilds = self.orchestrator.guilds().len(),
            restored, "Starting voice server"
        );

        let mut tickers = self.tickers.lock();
        for guild in self.orchestrator.guilds() {
            let period = self.orchestrator.guild_settings(guild)?.reconcile_interval();
            tickers.spawn(Self::sweep_ticker(Arc::clone(self), guild, period));
        }
        Ok(())
    }

    async fn sweep_ticker(server: Arc<Self>, guild: GuildId, period: Duration) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(%guild, period_secs = period.as_secs(), "Sweep ticker started");
        loop {
            ticker.tick().await;
            match server.sweep(guild).await {
                Ok(report) if report.corrections() > 0 => {
                    info!(%guild, corrections = report.corrections(), "Sweep corrected drift");
                }
                Ok(_) => {}
                Err(e) => warn!(%guild, error = %e, "Sweep failed"),
            }
        }
    }

    /// Stop tickers, drain the router, cancel grace timers and save.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> SpeakhubResult<()> {
        let mut tickers = std::mem::take(&mut *self.tickers.lock());
        tickers.shutdown().await;
        self.router.shutdown().await;
        self.orchestrator.shutdown();
        self.save().await?;
        info!("Voice server stopped");
        Ok(())
    }
}
