use crate::domain::{EmitContext, Level, LogRecord};
use crate::sink::Emitter;
use serde_json::{Map, Value};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

// Events from these targets are never forwarded; shipping them would feed
// back into the delivery path that produced them.
const IGNORED_TARGETS: &[&str] = &[env!("CARGO_CRATE_NAME"), "hyper", "reqwest", "h2", "rustls"];

/// Forwards `tracing` events into the sink as [`LogRecord`]s.
///
/// The event target becomes the category with `::` replaced by `.`; the
/// `message` field becomes the title and any other fields are carried as
/// JSON properties.
#[derive(Debug, Clone)]
pub struct WatchLayer {
    emitter: Emitter,
    context: EmitContext,
}

impl WatchLayer {
    pub fn new(emitter: Emitter) -> Self {
        Self::with_context(emitter, EmitContext::default())
    }

    pub fn with_context(emitter: Emitter, context: EmitContext) -> Self {
        Self { emitter, context }
    }

    pub fn category_for(target: &str) -> String {
        target.replace("::", ".")
    }

    fn is_ignored(target: &str) -> bool {
        IGNORED_TARGETS.iter().any(|ignored| {
            target
                .strip_prefix(ignored)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
    }
}

impl<S: Subscriber> Layer<S> for WatchLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if Self::is_ignored(metadata.target()) {
            return;
        }

        let category = Self::category_for(metadata.target());
        let level = Level::from(*metadata.level());
        if !self.emitter.is_enabled(&category, level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(category, level, visitor.message.unwrap_or_default());
        if !visitor.properties.is_empty() {
            record.properties = Some(visitor.properties);
        }
        self.emitter.emit(record, self.context.clone());
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    properties: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.properties.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}
