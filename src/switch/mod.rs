//! Category-scoped filtering policies.
//!
//! A [`SwitchSource`] maps a dotted category onto the [`Switch`] with the
//! longest matching pattern, and swaps in new policy generations without ever
//! blocking readers.

pub mod remote;
pub mod source;
pub mod switch;

pub use remote::{PollerOptions, PollerStats, RemoteSwitchSource};
pub use source::{LocalSwitchSource, MatchMode, SwitchRegistry, SwitchSource, SwitchTable};
pub use switch::{DEFAULT_COLOR, Switch, SwitchDef};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("Category must not be empty or blank")]
    BlankCategory,
    #[error("Switch pattern must not be empty or blank")]
    BlankPattern,
    #[error("Switch '{pattern}' has undefined level {level}")]
    InvalidLevel { pattern: String, level: i32 },
    #[error("Switch request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Switch authority answered HTTP {status}")]
    Status { status: u16 },
    #[error("Switch definitions could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid switch endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Background refresh needs a tokio runtime: {0}")]
    Runtime(String),
}
