use super::log_level::{Level, PayloadType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A filtered, fully populated log event ready for batching and transmission.
///
/// Field names are PascalCase on the wire. `skip_serializing_if` is deliberately
/// absent: the binary codec is positional and needs every field present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogEvent {
    pub category: String,
    pub correlation_id: String,
    pub title: String,
    pub tenant: String,
    pub subject: String,
    pub tag: String,

    pub level: i32,
    pub color: u32,
    pub nesting: i32,
    #[serde(rename = "Type")]
    pub payload_type: i32,

    pub occurred: DateTime<Utc>,
    pub payload: String,
    #[serde(default)]
    pub error_type: Option<String>,
}

impl LogEvent {
    pub fn severity(&self) -> Level {
        Level::clamped(self.level)
    }

    pub fn payload_kind(&self) -> PayloadType {
        PayloadType::from_i32(self.payload_type).unwrap_or_default()
    }

    pub fn is_critical(&self) -> bool {
        self.severity().is_critical()
    }
}

/// The unit of delivery: every event of one flush cycle for a single domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogEventBatch {
    pub domain: String,
    pub events: Vec<LogEvent>,
}

impl LogEventBatch {
    pub fn new(domain: impl Into<String>, events: Vec<LogEvent>) -> Self {
        Self {
            domain: domain.into(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<LogEvent> {
        self.events
    }
}
