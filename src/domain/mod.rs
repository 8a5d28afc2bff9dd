//! Domain layer for fabrica-watch.
//!
//! Contains the canonical types shared across all modules:
//! - `LogRecord` / `EmitContext`: what producers hand to the sink
//! - `LogEvent` / `LogEventBatch`: what travels to the collector
//! - `Level` / `PayloadType`: wire integers with typed views
//! - `WatchError`: Top-level error type

pub mod error;
pub mod log_event;
pub mod log_level;
pub mod record;

pub use error::WatchError;
pub use log_event::{LogEvent, LogEventBatch};
pub use log_level::{Level, PayloadType};
pub use record::{EmitContext, ErrorInfo, LogRecord};
