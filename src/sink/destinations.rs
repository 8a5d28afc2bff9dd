use super::{DeliveryError, EventSink};
use crate::domain::{Level, LogEvent, LogEventBatch};
use crate::sender::BatchTransmitter;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Delivers batches to the remote collector.
#[derive(Debug, Clone)]
pub struct HttpEventSink {
    transmitter: BatchTransmitter,
}

impl HttpEventSink {
    pub fn new(transmitter: BatchTransmitter) -> Self {
        Self { transmitter }
    }

    pub fn transmitter(&self) -> &BatchTransmitter {
        &self.transmitter
    }
}

impl EventSink for HttpEventSink {
    async fn accept(&self, batch: &LogEventBatch) -> Result<(), DeliveryError> {
        let result = self.transmitter.send_batch(batch).await?;
        if result.success {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                status: result.status_code,
            })
        }
    }
}

/// Writes one line per event to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleEventSink;

impl ConsoleEventSink {
    pub fn format_event(event: &LogEvent) -> String {
        let mut line = format!(
            "{} {:<7} {} {}",
            event.occurred.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            Level::clamped(event.level).as_str().to_uppercase(),
            event.category,
            event.title
        );
        if !event.correlation_id.is_empty() {
            line.push_str(&format!(" [{}]", event.correlation_id));
        }
        if !event.payload.is_empty() {
            for payload_line in event.payload.lines() {
                line.push_str("\n    ");
                line.push_str(payload_line);
            }
        }
        line
    }
}

impl EventSink for ConsoleEventSink {
    async fn accept(&self, batch: &LogEventBatch) -> Result<(), DeliveryError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for event in &batch.events {
            writeln!(out, "{}", Self::format_event(event))?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Keeps accepted batches in memory. Failures can be scripted, which makes it
/// the sink of choice for exercising the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    batches: Mutex<Vec<LogEventBatch>>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
    failing: AtomicBool,
    started: AtomicBool,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `count` deliveries.
    pub fn fail_next(&self, count: usize) {
        self.inner.fail_next.store(count, Ordering::SeqCst);
    }

    /// Fails every delivery until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `accept` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<LogEventBatch> {
        self.inner.batches.lock().clone()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.inner
            .batches
            .lock()
            .iter()
            .flat_map(|batch| batch.events.iter().cloned())
            .collect()
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        if self.inner.failing.load(Ordering::SeqCst) {
            return true;
        }
        self.inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl EventSink for MemoryEventSink {
    fn start(&self) -> Result<(), DeliveryError> {
        self.inner.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.inner.started.store(false, Ordering::SeqCst);
    }

    async fn accept(&self, batch: &LogEventBatch) -> Result<(), DeliveryError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            return Err(DeliveryError::Unavailable("scripted failure".to_string()));
        }
        self.inner.batches.lock().push(batch.clone());
        Ok(())
    }
}

/// Destination chosen from configuration.
#[derive(Debug, Clone)]
pub enum EventSinkKind {
    Http(HttpEventSink),
    Console(ConsoleEventSink),
    Memory(MemoryEventSink),
}

impl EventSink for EventSinkKind {
    fn start(&self) -> Result<(), DeliveryError> {
        match self {
            EventSinkKind::Http(sink) => sink.start(),
            EventSinkKind::Console(sink) => sink.start(),
            EventSinkKind::Memory(sink) => sink.start(),
        }
    }

    fn stop(&self) {
        match self {
            EventSinkKind::Http(sink) => sink.stop(),
            EventSinkKind::Console(sink) => sink.stop(),
            EventSinkKind::Memory(sink) => sink.stop(),
        }
    }

    async fn accept(&self, batch: &LogEventBatch) -> Result<(), DeliveryError> {
        match self {
            EventSinkKind::Http(sink) => sink.accept(batch).await,
            EventSinkKind::Console(sink) => sink.accept(batch).await,
            EventSinkKind::Memory(sink) => sink.accept(batch).await,
        }
    }
}
