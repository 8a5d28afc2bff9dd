use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log record, and the threshold a switch filters at.
///
/// The discriminants are the integer values carried on the wire. `Quiet` is the
/// maximum defined level; a switch at `Quiet` lets nothing through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    #[default]
    Warning = 3,
    Error = 4,
    Quiet = 5,
}

impl Level {
    pub const MAX: Level = Level::Quiet;

    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Level::Trace),
            1 => Some(Level::Debug),
            2 => Some(Level::Info),
            3 => Some(Level::Warning),
            4 => Some(Level::Error),
            5 => Some(Level::Quiet),
            _ => None,
        }
    }

    /// Maps any integer onto a defined level, saturating at both ends.
    pub fn clamped(value: i32) -> Self {
        Self::from_i32(value.clamp(Level::Trace.as_i32(), Level::MAX.as_i32()))
            .unwrap_or(Level::MAX)
    }

    /// Events at or above `Warning` survive collector outages in the critical buffer.
    pub fn is_critical(self) -> bool {
        self >= Level::Warning
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Quiet => "quiet",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "quiet" => Ok(Level::Quiet),
            other => Err(format!("unknown level '{other}'")),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        if level == tracing::Level::ERROR {
            Level::Error
        } else if level == tracing::Level::WARN {
            Level::Warning
        } else if level == tracing::Level::INFO {
            Level::Info
        } else if level == tracing::Level::DEBUG {
            Level::Debug
        } else {
            Level::Trace
        }
    }
}

/// How `LogEvent::payload` should be interpreted by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PayloadType {
    #[default]
    None = 0,
    Text = 1,
    Json = 2,
    Sql = 3,
    Xml = 4,
    Yaml = 5,
}

impl PayloadType {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(PayloadType::None),
            1 => Some(PayloadType::Text),
            2 => Some(PayloadType::Json),
            3 => Some(PayloadType::Sql),
            4 => Some(PayloadType::Xml),
            5 => Some(PayloadType::Yaml),
            _ => None,
        }
    }
}
