//! Per-guild event workers.

use crate::{EventNormalizer, Normalized, Orchestrator};
use parking_lot::Mutex;
use speakhub_core::{GuildId, NormalizedEvent, RawEvent};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Message types for a guild worker.
#[derive(Debug)]
enum WorkerMessage {
    /// Apply an event
    Event(NormalizedEvent),
    /// Reply once every earlier message was processed
    Flush(oneshot::Sender<()>),
}

/// Applies the events of one guild in arrival order.
struct GuildWorker {
    guild: GuildId,
    orchestrator: Orchestrator,
    rx: mpsc::Receiver<WorkerMessage>,
}

impl GuildWorker {
    #[instrument(skip(self), fields(guild = %self.guild))]
    async fn run(mut self) {
        debug!("Guild worker started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                WorkerMessage::Event(event) => {
                    debug!(%event, "Handling event");
                    match self.orchestrator.handle(event).await {
                        Ok(transitions) if !transitions.is_empty() => {
                            debug!(?transitions, "Event applied");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Event handling failed"),
                    }
                }
                WorkerMessage::Flush(reply) => {
                    let _ = reply.send(());
                }
            }
        }

        debug!("Guild worker stopped");
    }
}

/// Routes raw events to one worker task per guild.
///
/// Events are normalized and deduplicated first, then queued on the
/// guild's bounded channel; a full queue applies backpressure to the
/// caller. Guilds are processed in parallel, events of one guild strictly
/// in arrival order.
pub struct EventRouter {
    normalizer: EventNormalizer,
    orchestrator: Orchestrator,
    workers: Mutex<HashMap<GuildId, mpsc::Sender<WorkerMessage>>>,
    tasks: Mutex<JoinSet<()>>,
}

impl EventRouter {
    /// Create a router. Workers are spawned lazily per guild.
    pub fn new(normalizer: EventNormalizer, orchestrator: Orchestrator) -> Self {
        Self {
            normalizer,
            orchestrator,
            workers: Mutex::new(HashMap::new()),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// The orchestrator events are applied to.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    fn sender(&self, guild: GuildId) -> mpsc::Sender<WorkerMessage> {
        let mut workers = self.workers.lock();
        if let Some(tx) = workers.get(&guild)
            && !tx.is_closed()
        {
            return tx.clone();
        }

        let capacity = (*self.normalizer.config().queue_capacity()).max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let worker = GuildWorker {
            guild,
            orchestrator: self.orchestrator.clone(),
            rx,
        };
        self.tasks.lock().spawn(worker.run());
        workers.insert(guild, tx.clone());
        info!(%guild, "Spawned guild worker");
        tx
    }

    /// Normalize a raw event and queue it for its guild.
    ///
    /// Returns true if the event was queued.
    pub async fn route(&self, raw: RawEvent) -> bool {
        let metrics = self.orchestrator.metrics();
        metrics.record_event();

        let event = match self.normalizer.normalize(&raw) {
            Normalized::Event(event) => event,
            Normalized::Duplicate(_) => {
                metrics.record_duplicate();
                return false;
            }
            Normalized::Ignored(_) => {
                metrics.record_ignored();
                return false;
            }
        };

        let guild = event.guild();
        if self.orchestrator.guild_settings(guild).is_err() {
            debug!(%guild, "Event for unconfigured guild");
            metrics.record_ignored();
            return false;
        }

        let tx = self.sender(guild);
        if tx.send(WorkerMessage::Event(event)).await.is_err() {
            error!(%guild, "Guild worker channel closed");
            self.workers.lock().remove(&guild);
            return false;
        }
        true
    }

    /// Wait until every event queued so far has been applied.
    pub async fn flush(&self) {
        let senders: Vec<_> = self.workers.lock().values().cloned().collect();
        for tx in senders {
            let (reply, done) = oneshot::channel();
            if tx.send(WorkerMessage::Flush(reply)).await.is_ok() {
                let _ = done.await;
            }
        }
    }

    /// Stop accepting events and wait for workers to drain their queues.
    pub async fn shutdown(&self) {
        self.workers.lock().clear();
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Guild worker ended abnormally");
            }
        }
        info!("Event router stopped");
    }
}
