use super::destinations::{ConsoleEventSink, EventSinkKind, HttpEventSink};
use super::shutdown::Completion;
use super::{DeliveryError, EventSink};
use crate::config::{Destination, WatchConfig};
use crate::domain::{EmitContext, Level, LogEvent, LogEventBatch, LogRecord, WatchError};
use crate::logger::Logger;
use crate::reliability::{CircuitBreaker, CircuitConfig, CriticalBuffer};
use crate::sender::{BatchSerializer, BatchTransmitter, HttpClient};
use crate::switch::{
    LocalSwitchSource, RemoteSwitchSource, SwitchError, SwitchRegistry, SwitchSource,
};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SinkOptions {
    pub domain: String,
    pub batch_size: usize,
    /// Upper bound on how long a cycle keeps topping up its batch.
    pub flush_interval: Duration,
    pub circuit: CircuitConfig,
    pub max_critical_buffer_size: usize,
    pub shutdown_grace_period: Duration,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            domain: String::new(),
            batch_size: 100,
            flush_interval: Duration::from_millis(100),
            circuit: CircuitConfig::default(),
            max_critical_buffer_size: 1000,
            shutdown_grace_period: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SinkStats {
    emitted: AtomicU64,
    filtered: AtomicU64,
    delivered: AtomicU64,
    discarded: AtomicU64,
    batches_sent: AtomicU64,
    batches_failed: AtomicU64,
    batches_diverted: AtomicU64,
}

impl SinkStats {
    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Point-in-time view of the engine for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkHealth {
    pub circuit_open: bool,
    pub consecutive_failures: u32,
    pub critical_buffered: usize,
    pub dropped_event_count: u64,
    pub events_emitted: u64,
    pub events_filtered: u64,
    pub events_delivered: u64,
    /// Events below `Warning` lost while the collector was unreachable.
    pub events_discarded: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub batches_diverted: u64,
    pub switch_version: u64,
}

struct Envelope {
    record: LogRecord,
    context: EmitContext,
}

struct Shared {
    closed: AtomicBool,
    switches: Arc<dyn SwitchSource>,
    stats: SinkStats,
    breaker: CircuitBreaker,
    critical: CriticalBuffer,
}

impl Shared {
    fn health(&self) -> SinkHealth {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        SinkHealth {
            circuit_open: self.breaker.is_open(),
            consecutive_failures: self.breaker.consecutive_failures(),
            critical_buffered: self.critical.len(),
            dropped_event_count: self.critical.dropped_count(),
            events_emitted: load(&self.stats.emitted),
            events_filtered: load(&self.stats.filtered),
            events_delivered: load(&self.stats.delivered),
            events_discarded: load(&self.stats.discarded),
            batches_sent: load(&self.stats.batches_sent),
            batches_failed: load(&self.stats.batches_failed),
            batches_diverted: load(&self.stats.batches_diverted),
            switch_version: self.switches.version(),
        }
    }
}

/// Cheap, cloneable producer handle onto a running [`WatchSink`].
#[derive(Clone)]
pub struct Emitter {
    tx: UnboundedSender<Envelope>,
    shared: Arc<Shared>,
}

impl Emitter {
    /// Enqueues a record. Never blocks and never fails; once shutdown has
    /// begun the record is dropped.
    pub fn emit(&self, record: LogRecord, context: EmitContext) {
        if self.shared.closed.load(Ordering::Acquire) {
            return;
        }
        self.shared.stats.emitted.fetch_add(1, Ordering::Relaxed);
        // The receiver only goes away during shutdown
        let _ = self.tx.send(Envelope { record, context });
    }

    pub fn is_enabled(&self, category: &str, level: Level) -> bool {
        self.shared
            .switches
            .lookup(category)
            .is_ok_and(|switch| switch.is_enabled(level))
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn switches(&self) -> &Arc<dyn SwitchSource> {
        &self.shared.switches
    }

    pub fn logger(
        &self,
        category: impl Into<String>,
        context: EmitContext,
    ) -> Result<Logger, SwitchError> {
        Logger::new(category, context, self.clone())
    }

    pub fn health(&self) -> SinkHealth {
        self.shared.health()
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Asynchronous, batching, failure-tolerant delivery of log records to an
/// [`EventSink`].
pub struct WatchSink<S: EventSink> {
    emitter: Emitter,
    sink: Arc<S>,
    options: SinkOptions,
    cancel: CancellationToken,
    completion: Arc<Completion>,
    released: AtomicBool,
}

impl<S: EventSink> WatchSink<S> {
    /// Starts the switch source, the sink and the flush loop. Must be called
    /// from within a tokio runtime.
    pub fn start(
        options: SinkOptions,
        sink: S,
        switches: Arc<dyn SwitchSource>,
    ) -> Result<Self, WatchError> {
        let handle = Handle::try_current().map_err(|e| WatchError::Runtime(e.to_string()))?;

        switches.start()?;
        if let Err(e) = sink.start() {
            switches.stop();
            return Err(e.into());
        }

        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            switches,
            stats: SinkStats::default(),
            breaker: CircuitBreaker::new(options.circuit.clone()),
            critical: CriticalBuffer::new(options.max_critical_buffer_size),
        });
        let sink = Arc::new(sink);
        let cancel = CancellationToken::new();
        let completion = Arc::new(Completion::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let flush_loop = FlushLoop {
            rx,
            shared: Arc::clone(&shared),
            sink: Arc::clone(&sink),
            domain: options.domain.clone(),
            batch_size: options.batch_size.max(1),
            flush_interval: options.flush_interval,
            cancel: cancel.clone(),
            completion: Arc::clone(&completion),
        };

        info!(
            "Starting sink for domain '{}' (batch_size={}, flush_interval={:?})",
            options.domain, flush_loop.batch_size, options.flush_interval
        );
        handle.spawn(flush_loop.run());

        Ok(Self {
            emitter: Emitter { tx, shared },
            sink,
            options,
            cancel,
            completion,
            released: AtomicBool::new(false),
        })
    }

    pub fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    pub fn emit(&self, record: LogRecord, context: EmitContext) {
        self.emitter.emit(record, context);
    }

    pub fn logger(
        &self,
        category: impl Into<String>,
        context: EmitContext,
    ) -> Result<Logger, SwitchError> {
        self.emitter.logger(category, context)
    }

    pub fn health(&self) -> SinkHealth {
        self.emitter.health()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn switches(&self) -> &Arc<dyn SwitchSource> {
        self.emitter.switches()
    }

    pub fn options(&self) -> &SinkOptions {
        &self.options
    }

    /// Stops ingestion and waits, up to the grace period, for queued records
    /// to be flushed. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.begin_shutdown();
        if !self
            .completion
            .wait(self.options.shutdown_grace_period)
            .await
        {
            warn!(
                "Sink did not drain within {:?}",
                self.options.shutdown_grace_period
            );
        }
        self.release();
    }

    /// Blocking variant of [`WatchSink::shutdown`]. Must not be called from a
    /// runtime thread the flush loop depends on.
    pub fn close(&self) {
        self.begin_shutdown();
        if !self
            .completion
            .wait_blocking(self.options.shutdown_grace_period)
        {
            warn!(
                "Sink did not drain within {:?}",
                self.options.shutdown_grace_period
            );
        }
        self.release();
    }

    pub fn is_closed(&self) -> bool {
        self.emitter.is_closed()
    }

    fn begin_shutdown(&self) {
        self.emitter.shared.closed.store(true, Ordering::Release);
        self.cancel.cancel();
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.emitter.shared.switches.stop();
        self.sink.stop();
        info!("Sink for domain '{}' stopped", self.options.domain);
    }
}

impl<S: EventSink> Drop for WatchSink<S> {
    fn drop(&mut self) {
        self.begin_shutdown();
    }
}

impl WatchSink<EventSinkKind> {
    /// Wires HTTP client, switch source and destination from configuration.
    pub fn from_config(config: &WatchConfig) -> Result<Self, WatchError> {
        config.validate()?;

        let client = HttpClient::new(config.client_config())?;

        let registry = SwitchRegistry::new(config.default_level, config.match_mode);
        if !config.switches.is_empty() {
            registry.update(&config.switches)?;
        }

        let switches: Arc<dyn SwitchSource> = if config.remote_switches {
            Arc::new(RemoteSwitchSource::new(
                client.clone(),
                &config.domain,
                registry,
                config.poller_options(),
            )?)
        } else {
            Arc::new(LocalSwitchSource::new(registry))
        };

        let sink = match config.destination {
            Destination::Http => EventSinkKind::Http(HttpEventSink::new(BatchTransmitter::new(
                client,
                BatchSerializer::new(config.wire_format),
            ))),
            Destination::Console => EventSinkKind::Console(ConsoleEventSink),
        };

        Self::start(config.sink_options(), sink, switches)
    }
}

/// The single consumer of the ingestion queue.
struct FlushLoop<S> {
    rx: UnboundedReceiver<Envelope>,
    shared: Arc<Shared>,
    sink: Arc<S>,
    domain: String,
    batch_size: usize,
    flush_interval: Duration,
    cancel: CancellationToken,
    completion: Arc<Completion>,
}

impl<S: EventSink> FlushLoop<S> {
    async fn run(mut self) {
        loop {
            let first = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                item = self.rx.recv() => match item {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let mut pending = Vec::with_capacity(self.batch_size);
            pending.push(first);
            let cancelled = self.top_up(&mut pending).await;

            self.process_cycle(pending).await;
            if cancelled {
                break;
            }
        }

        self.drain().await;
        debug!("Flush loop for domain '{}' finished", self.domain);
        self.completion.complete();
    }

    /// Fills `pending` until the batch is full or the flush interval has
    /// elapsed. Returns true if cancellation was observed.
    async fn top_up(&mut self, pending: &mut Vec<Envelope>) -> bool {
        let deadline = Instant::now() + self.flush_interval;

        while pending.len() < self.batch_size {
            match self.rx.try_recv() {
                Ok(envelope) => {
                    pending.push(envelope);
                    continue;
                }
                Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => {}
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return true,
                item = tokio::time::timeout_at(deadline, self.rx.recv()) => match item {
                    Ok(Some(envelope)) => pending.push(envelope),
                    Ok(None) | Err(_) => return false,
                },
            }
        }
        false
    }

    /// Flushes whatever is still queued once shutdown has begun.
    async fn drain(&mut self) {
        self.rx.close();

        loop {
            let mut pending = Vec::with_capacity(self.batch_size);
            while pending.len() < self.batch_size {
                match self.rx.try_recv() {
                    Ok(envelope) => pending.push(envelope),
                    Err(_) => break,
                }
            }
            if pending.is_empty() {
                break;
            }
            self.process_cycle(pending).await;
        }

        // Last chance for events held back by an earlier outage
        if !self.shared.critical.is_empty() && !self.shared.breaker.is_open() {
            self.deliver(Vec::new()).await;
        }
    }

    async fn process_cycle(&self, pending: Vec<Envelope>) {
        let mut events = Vec::with_capacity(pending.len());
        for Envelope { record, context } in pending {
            match self.shared.switches.lookup(&record.category) {
                Ok(switch) if record.passes(&switch) => {
                    events.push(record.into_event(&switch, &context));
                }
                _ => {
                    self.shared.stats.filtered.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        self.deliver(events).await;
    }

    async fn deliver(&self, events: Vec<LogEvent>) {
        if self.shared.breaker.is_open() {
            if !events.is_empty() {
                self.shared
                    .stats
                    .batches_diverted
                    .fetch_add(1, Ordering::Relaxed);
                self.rebuffer(events);
            }
            return;
        }

        let mut batch_events = self.shared.critical.drain();
        let replayed = batch_events.len();
        batch_events.extend(events);
        if batch_events.is_empty() {
            return;
        }

        let batch = LogEventBatch::new(self.domain.clone(), batch_events);
        let outcome = AssertUnwindSafe(self.sink.accept(&batch))
            .catch_unwind()
            .await
            .unwrap_or(Err(DeliveryError::Panicked));

        match outcome {
            Ok(()) => {
                let was_failing = self.shared.breaker.consecutive_failures() > 0;
                self.shared.breaker.record_success();
                SinkStats::add(&self.shared.stats.delivered, batch.len());
                self.shared.stats.batches_sent.fetch_add(1, Ordering::Relaxed);
                if was_failing {
                    info!(
                        "Collector reachable again, delivered {} events ({} replayed)",
                        batch.len(),
                        replayed
                    );
                }
            }
            Err(e) => {
                self.shared.stats.batches_failed.fetch_add(1, Ordering::Relaxed);
                match self.shared.breaker.record_failure() {
                    Some(delay) => warn!(
                        "Delivery failed, holding back events for {:?}: {}",
                        delay, e
                    ),
                    None => debug!("Delivery failed: {}", e),
                }
                self.rebuffer(batch.into_events());
            }
        }
    }

    fn rebuffer(&self, events: Vec<LogEvent>) {
        let total = events.len();
        let kept = self.shared.critical.extend(events);
        SinkStats::add(&self.shared.stats.discarded, total - kept);
    }
}
