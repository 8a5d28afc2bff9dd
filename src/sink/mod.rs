//! Delivery engine: ingestion queue, batch assembly, circuit breaker and the
//! pluggable destinations batches are handed to.

pub mod destinations;
pub mod engine;
pub mod shutdown;

pub use destinations::{ConsoleEventSink, EventSinkKind, HttpEventSink, MemoryEventSink};
pub use engine::{Emitter, SinkHealth, SinkOptions, WatchSink};
pub use shutdown::Completion;

use crate::domain::LogEventBatch;
use crate::sender::{SerializationError, TransmissionError};
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Transmission failed: {0}")]
    Transmission(#[from] TransmissionError),
    #[error("Collector rejected batch with HTTP {status}")]
    Rejected { status: u16 },
    #[error("Serialization failed: {0}")]
    Serialization(#[from] SerializationError),
    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
    #[error("Sink panicked while accepting a batch")]
    Panicked,
}

/// A destination for assembled batches.
///
/// `accept` reports failure through its result only; the engine turns every
/// error into a circuit-breaker transition.
pub trait EventSink: Send + Sync + 'static {
    fn start(&self) -> Result<(), DeliveryError> {
        Ok(())
    }

    fn stop(&self) {}

    fn accept(
        &self,
        batch: &LogEventBatch,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}
