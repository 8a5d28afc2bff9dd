#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Durations in milliseconds fit in u64
    clippy::cast_possible_wrap,       // Level discriminants are tiny
    clippy::cast_precision_loss,      // Elapsed milliseconds for display
    clippy::cast_sign_loss,           // Nesting is clamped before use
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,  // e.g. SwitchError in switch module
    clippy::must_use_candidate,
    clippy::doc_markdown
)]

//! Client-side telemetry pipeline: switch-filtered log records are batched and
//! shipped to a remote collector, with a circuit breaker and a bounded buffer
//! for high-severity events while the collector is unreachable.

pub mod bridge;
pub mod config;
pub mod domain;
pub mod logger;
pub mod logging;
pub mod reliability;
pub mod sender;
pub mod sink;
pub mod switch;
pub mod tracer;

pub use bridge::WatchLayer;
pub use config::{Destination, WatchConfig};
pub use domain::{
    EmitContext, ErrorInfo, Level, LogEvent, LogEventBatch, LogRecord, PayloadType, WatchError,
};
pub use logger::Logger;
pub use logging::LoggingSystem;
pub use sink::{
    ConsoleEventSink, Emitter, EventSink, EventSinkKind, HttpEventSink, MemoryEventSink,
    SinkHealth, SinkOptions, WatchSink,
};
pub use switch::{
    LocalSwitchSource, MatchMode, RemoteSwitchSource, Switch, SwitchDef, SwitchError,
    SwitchRegistry, SwitchSource,
};
pub use tracer::MethodTracer;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
