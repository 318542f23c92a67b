//! The event delivery pipeline
//!
//! `Tracker` is the explicit context object producers hold: created once at
//! SDK initialization, cloned freely, torn down with `shutdown()`. All
//! mutable pipeline state (queue, flush deadline, stats, durable log handle)
//! lives inside a single task; producer calls serialize through a command
//! channel, so re-entrant callers cannot corrupt state and no lock exists.
//!
//! Control flow: `track` → queue → scheduler decision → on flush, the queue
//! snapshot goes to the delivery strategy → on failure, to the offline
//! store → at the next initialization the store is drained and re-attempted.

use tokio::sync::{mpsc, oneshot};

use crate::config::PipelineConfig;
use crate::delivery::{DeliveryOutcome, DeliveryStrategy, HttpTransport, Transport};
use crate::error::{Error, Result};
use crate::event::{Batch, TrackedEvent};
use crate::queue::EventQueue;
use crate::scheduler::{FlushDecision, FlushReason, FlushScheduler};
use crate::store::OfflineStore;

/// Receives every event accepted by the pipeline, before delivery.
///
/// Subscribers are isolated from each other: an error from one is logged
/// and the rest still run.
pub trait EventSubscriber: Send + 'static {
    fn on_event(
        &self,
        event: &TrackedEvent,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Pipeline counters, in the spirit of delivery-side bookkeeping.
#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    /// Events accepted from producers
    pub events_tracked: u64,
    /// Batches that reached the endpoint (or the beacon tier)
    pub batches_delivered: u64,
    /// Batches that failed both tiers and went to the durable log
    pub delivery_failures: u64,
    /// Events dropped to the queue capacity cap
    pub events_evicted: u64,
}

enum Command {
    Track(TrackedEvent),
    Flush(FlushReason, Option<oneshot::Sender<()>>),
    Subscribe(Box<dyn EventSubscriber>),
    Stats(oneshot::Sender<PipelineStats>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the delivery pipeline.
///
/// Cheap to clone; every clone talks to the same pipeline task. Once
/// `shutdown()` completes (or the task is gone), `track` fails fast with
/// [`Error::Shutdown`] — tracking without a live pipeline is an integration
/// bug, not a runtime condition to paper over.
#[derive(Clone, Debug)]
pub struct Tracker {
    tx: mpsc::UnboundedSender<Command>,
}

impl Tracker {
    /// Build the pipeline against the real HTTP transport and start it.
    ///
    /// Validates the configuration (the endpoint URL is required), spawns
    /// the pipeline task, and re-attempts any batches left in the durable
    /// log by a previous session. Must be called within a tokio runtime.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, transport)
    }

    /// Build the pipeline over a caller-supplied transport.
    pub fn with_transport<T: Transport>(config: PipelineConfig, transport: T) -> Result<Self> {
        config.validate()?;

        let pipeline = Pipeline {
            queue: EventQueue::new(config.queue_cap),
            scheduler: FlushScheduler::new(
                config.batch_limit,
                tokio::time::Duration::from_millis(config.time_limit_ms),
            ),
            strategy: DeliveryStrategy::new(transport),
            store: OfflineStore::new(config.store_path(), config.store_cap),
            subscribers: Vec::new(),
            stats: PipelineStats::default(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pipeline.run(rx));

        Ok(Self { tx })
    }

    /// Track one event. The timestamp is stamped here, at enqueue time.
    pub fn track(&self, event_type: impl Into<String>, payload: serde_json::Value) -> Result<()> {
        let event = TrackedEvent::new(event_type, payload);
        self.tx
            .send(Command::Track(event))
            .map_err(|_| Error::Shutdown)
    }

    /// Force a flush and wait for it to complete.
    pub async fn flush_now(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(FlushReason::Forced, Some(ack_tx)))
            .map_err(|_| Error::Shutdown)?;
        ack_rx.await.map_err(|_| Error::Shutdown)
    }

    /// Signal that the page went hidden (or the host is about to unload).
    ///
    /// Cancels any pending flush timer and forces an immediate flush. Fire
    /// and forget, matching how little time an unload handler has.
    pub fn page_hidden(&self) -> Result<()> {
        self.tx
            .send(Command::Flush(FlushReason::Lifecycle, None))
            .map_err(|_| Error::Shutdown)
    }

    /// Register a subscriber for every subsequently tracked event.
    pub fn subscribe(&self, subscriber: Box<dyn EventSubscriber>) -> Result<()> {
        self.tx
            .send(Command::Subscribe(subscriber))
            .map_err(|_| Error::Shutdown)
    }

    /// Current pipeline counters.
    pub async fn stats(&self) -> Result<PipelineStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Stats(reply_tx))
            .map_err(|_| Error::Shutdown)?;
        reply_rx.await.map_err(|_| Error::Shutdown)
    }

    /// Flush what remains and stop the pipeline task.
    pub async fn shutdown(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(ack_tx))
            .map_err(|_| Error::Shutdown)?;
        ack_rx.await.map_err(|_| Error::Shutdown)
    }
}

enum Wakeup {
    Command(Option<Command>),
    TimerFired,
}

struct Pipeline<T> {
    queue: EventQueue,
    scheduler: FlushScheduler,
    strategy: DeliveryStrategy<T>,
    store: OfflineStore,
    subscribers: Vec<Box<dyn EventSubscriber>>,
    stats: PipelineStats,
}

impl<T: Transport> Pipeline<T> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        // Session start: re-attempt whatever the last session left behind
        self.drain_and_retry().await;

        loop {
            let wakeup = if let Some(deadline) = self.scheduler.deadline() {
                tokio::select! {
                    command = rx.recv() => Wakeup::Command(command),
                    _ = tokio::time::sleep_until(deadline) => Wakeup::TimerFired,
                }
            } else {
                Wakeup::Command(rx.recv().await)
            };

            match wakeup {
                Wakeup::TimerFired => self.flush(FlushReason::Timer).await,
                Wakeup::Command(Some(command)) => {
                    if self.handle_command(command).await {
                        break;
                    }
                }
                Wakeup::Command(None) => {
                    // Every handle dropped without an explicit shutdown;
                    // flush what is left before exiting
                    self.flush(FlushReason::Forced).await;
                    break;
                }
            }
        }

        tracing::debug!(
            tracked = self.stats.events_tracked,
            delivered = self.stats.batches_delivered,
            failures = self.stats.delivery_failures,
            "Pipeline stopped"
        );
    }

    /// Returns true when the pipeline should stop.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Track(event) => {
                self.handle_track(event).await;
                false
            }
            Command::Flush(reason, ack) => {
                self.flush(reason).await;
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
                false
            }
            Command::Subscribe(subscriber) => {
                self.subscribers.push(subscriber);
                false
            }
            Command::Stats(reply) => {
                let mut stats = self.stats.clone();
                stats.events_evicted = self.queue.evicted();
                let _ = reply.send(stats);
                false
            }
            Command::Shutdown(ack) => {
                self.flush(FlushReason::Forced).await;
                let _ = ack.send(());
                true
            }
        }
    }

    async fn handle_track(&mut self, event: TrackedEvent) {
        self.dispatch_to_subscribers(&event);
        self.queue.enqueue(event);
        self.stats.events_tracked += 1;

        if self.scheduler.on_enqueue(self.queue.len()) == FlushDecision::FlushNow {
            self.flush(FlushReason::Size).await;
        }
    }

    /// Drain the queue and attempt delivery. Cancels any armed timer first,
    /// so a size or lifecycle flush can never be followed by a timer flush
    /// of the same window. A no-op on an empty queue.
    async fn flush(&mut self, reason: FlushReason) {
        self.scheduler.on_flush();

        let Some(batch) = self.queue.drain_all() else {
            return;
        };

        tracing::debug!(
            events = batch.len(),
            reason = reason.as_str(),
            "Flushing batch"
        );
        self.deliver_or_store(batch).await;
    }

    async fn deliver_or_store(&mut self, batch: Batch) {
        match self.strategy.deliver(batch).await {
            DeliveryOutcome::Delivered => {
                self.stats.batches_delivered += 1;
            }
            DeliveryOutcome::Failed(batch) => {
                self.stats.delivery_failures += 1;
                // Storage errors are logged and swallowed; telemetry is
                // best-effort and producers never see delivery internals
                if let Err(e) = self.store.save(batch) {
                    tracing::warn!(error = %e, "Failed to persist undelivered batch");
                }
            }
        }
    }

    /// Re-attempt everything the durable log holds from earlier sessions.
    ///
    /// All records are flattened into one combined batch in stored order,
    /// losing per-batch boundaries and captured timestamps. Resubmitting
    /// record by record would be kinder to the backend on a large backlog;
    /// kept as-is to match established collector behavior.
    async fn drain_and_retry(&mut self) {
        let records = match self.store.drain() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to drain durable log");
                return;
            }
        };
        if records.is_empty() {
            return;
        }

        let events: Vec<TrackedEvent> = records
            .into_iter()
            .flat_map(|record| record.events)
            .collect();
        let Some(batch) = Batch::from_events(events) else {
            return;
        };

        tracing::info!(events = batch.len(), "Retrying stored batches");
        self.deliver_or_store(batch).await;
    }

    fn dispatch_to_subscribers(&self, event: &TrackedEvent) {
        for (index, subscriber) in self.subscribers.iter().enumerate() {
            // One failing subscriber must not block the others
            if let Err(e) = subscriber.on_event(event) {
                tracing::warn!(
                    subscriber = index,
                    event_type = %event.event_type,
                    error = %e,
                    "Subscriber failed handling event"
                );
            }
        }
    }
}
