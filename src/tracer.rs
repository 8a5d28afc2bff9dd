use crate::domain::{Level, LogRecord, PayloadType};
use crate::logger::Logger;
use serde_json::json;
use std::time::{Duration, Instant};

/// Scope guard pairing an "entering" record with an "exiting" one.
///
/// The exit is only emitted if `Trace` is enabled for the category when the
/// scope ends; a switch change in between is honoured.
#[derive(Debug)]
#[must_use = "the exiting record is emitted when the tracer is finished or dropped"]
pub struct MethodTracer {
    logger: Logger,
    method: String,
    started: Instant,
    finished: bool,
}

impl MethodTracer {
    pub(crate) fn new(logger: Logger, method: String) -> Self {
        Self {
            logger,
            method,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn finish(&mut self) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        if !self.logger.is_enabled(Level::Trace) {
            return;
        }

        let elapsed_ms = self.elapsed().as_secs_f64() * 1000.0;
        let payload = json!({
            "method": self.method,
            "elapsed_ms": elapsed_ms,
        });
        let record = LogRecord::new(
            self.logger.category(),
            Level::Trace,
            format!("Exiting {} ({:.3} ms)", self.method, elapsed_ms),
        )
        .with_nesting(-1)
        .with_payload(PayloadType::Json, payload.to_string());

        self.logger.emit(record);
    }
}

impl Drop for MethodTracer {
    fn drop(&mut self) {
        self.finish();
    }
}
