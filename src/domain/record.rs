use super::log_event::LogEvent;
use super::log_level::{Level, PayloadType};
use crate::switch::Switch;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::error::Error as StdError;
use uuid::Uuid;

/// Correlation values threaded explicitly through every emit call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitContext {
    pub correlation_id: String,
    pub tenant: String,
    pub subject: String,
}

impl EmitContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ..Self::default()
        }
    }

    /// A context carrying a freshly generated correlation id.
    pub fn correlated() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }
}

/// An error captured at the emission site, rendered eagerly so the record stays `Send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
    pub causes: Vec<String>,
}

impl ErrorInfo {
    /// `kind` is the static type name of `E`. Behind a trait object such as
    /// `&*Box<dyn Error>` that is the trait object itself, so callers holding
    /// erased errors should name the kind with [`ErrorInfo::with_kind`].
    pub fn from_error<E>(error: &E) -> Self
    where
        E: StdError + ?Sized,
    {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            kind: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            causes,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn render(&self) -> String {
        let mut rendered = format!("{}: {}", self.kind, self.message);
        for cause in &self.causes {
            rendered.push_str("\nCaused by: ");
            rendered.push_str(cause);
        }
        rendered
    }
}

/// A record as handed over by the upstream logging framework.
///
/// Attached errors and properties live here only until conversion into a
/// [`LogEvent`]; they are never serialized in their original form.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub category: String,
    pub level: Level,
    pub title: String,
    pub error: Option<ErrorInfo>,
    pub properties: Option<Map<String, Value>>,
    pub payload_type: PayloadType,
    pub payload: Option<String>,
    pub nesting: i32,
    pub occurred: DateTime<Utc>,
}

impl LogRecord {
    pub fn new(category: impl Into<String>, level: Level, title: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            level,
            title: title.into(),
            error: None,
            properties: None,
            payload_type: PayloadType::None,
            payload: None,
            nesting: 0,
            occurred: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_payload(mut self, payload_type: PayloadType, payload: impl Into<String>) -> Self {
        self.payload_type = payload_type;
        self.payload = Some(payload.into());
        self
    }

    pub fn with_nesting(mut self, nesting: i32) -> Self {
        self.nesting = nesting;
        self
    }

    pub fn occurred_at(mut self, occurred: DateTime<Utc>) -> Self {
        self.occurred = occurred;
        self
    }

    /// Whether `switch` lets this record through.
    pub fn passes(&self, switch: &Switch) -> bool {
        !switch.is_quiet() && self.level >= switch.level()
    }

    /// Builds the wire event. An explicit payload wins over a captured error,
    /// which wins over structured properties.
    pub fn into_event(self, switch: &Switch, context: &EmitContext) -> LogEvent {
        let error_type = self.error.as_ref().map(|e| e.kind.clone());

        let (payload_type, payload) = match (self.payload, self.error, self.properties) {
            (Some(payload), _, _) => (self.payload_type, payload),
            (None, Some(error), _) => (PayloadType::Text, error.render()),
            (None, None, Some(properties)) => (
                PayloadType::Json,
                Value::Object(properties).to_string(),
            ),
            (None, None, None) => (PayloadType::None, String::new()),
        };

        LogEvent {
            category: self.category,
            correlation_id: context.correlation_id.clone(),
            title: self.title,
            tenant: context.tenant.clone(),
            subject: context.subject.clone(),
            tag: switch.tag().to_string(),
            level: self.level.as_i32(),
            color: switch.color(),
            nesting: self.nesting,
            payload_type: payload_type.as_i32(),
            occurred: self.occurred,
            payload,
            error_type,
        }
    }
}
