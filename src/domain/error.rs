use thiserror::Error;

/// Top-level error type for the telemetry pipeline.
///
/// Delivery and switch-fetch failures are absorbed inside the pipeline and never
/// reach producers; this type surfaces construction and caller-misuse failures.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Switch error: {0}")]
    Switch(#[from] crate::switch::SwitchError),

    #[error("HTTP client error: {0}")]
    Client(#[from] crate::sender::ClientError),

    #[error("Event sink error: {0}")]
    Delivery(#[from] crate::sink::DeliveryError),

    #[error("No tokio runtime available: {0}")]
    Runtime(String),
}
