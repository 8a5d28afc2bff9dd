use crate::domain::{EmitContext, ErrorInfo, Level, LogRecord, PayloadType};
use crate::sink::Emitter;
use crate::switch::SwitchError;
use crate::tracer::MethodTracer;
use serde::Serialize;
use std::error::Error as StdError;
use std::sync::Arc;

/// Category-bound front end over an [`Emitter`].
///
/// Level checks go through the switch registry on every call, so a switch
/// update takes effect for existing loggers immediately.
#[derive(Debug, Clone)]
pub struct Logger {
    category: Arc<str>,
    context: EmitContext,
    emitter: Emitter,
}

impl Logger {
    pub fn new(
        category: impl Into<String>,
        context: EmitContext,
        emitter: Emitter,
    ) -> Result<Self, SwitchError> {
        let category = category.into();
        if category.trim().is_empty() {
            return Err(SwitchError::BlankCategory);
        }

        Ok(Self {
            category: Arc::from(category),
            context,
            emitter,
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn context(&self) -> &EmitContext {
        &self.context
    }

    /// Same category, different correlation values.
    pub fn with_context(&self, context: EmitContext) -> Self {
        Self {
            category: Arc::clone(&self.category),
            context,
            emitter: self.emitter.clone(),
        }
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        self.emitter.is_enabled(&self.category, level)
    }

    pub fn log(&self, level: Level, title: impl Into<String>) {
        if self.is_enabled(level) {
            self.emit(self.record(level, title));
        }
    }

    pub fn trace(&self, title: impl Into<String>) {
        self.log(Level::Trace, title);
    }

    pub fn debug(&self, title: impl Into<String>) {
        self.log(Level::Debug, title);
    }

    pub fn info(&self, title: impl Into<String>) {
        self.log(Level::Info, title);
    }

    pub fn warning(&self, title: impl Into<String>) {
        self.log(Level::Warning, title);
    }

    pub fn error(&self, title: impl Into<String>) {
        self.log(Level::Error, title);
    }

    /// Logs at `Error` with the error's type and source chain as text payload.
    pub fn error_with<E>(&self, title: impl Into<String>, error: &E)
    where
        E: StdError + ?Sized,
    {
        if self.is_enabled(Level::Error) {
            let record = self
                .record(Level::Error, title)
                .with_error(ErrorInfo::from_error(error));
            self.emit(record);
        }
    }

    /// Logs `value` as a JSON payload.
    pub fn object<T>(&self, level: Level, title: impl Into<String>, value: &T)
    where
        T: Serialize + ?Sized,
    {
        if !self.is_enabled(level) {
            return;
        }

        let record = self.record(level, title);
        let record = match serde_json::to_string(value) {
            Ok(json) => record.with_payload(PayloadType::Json, json),
            Err(e) => record.with_error(ErrorInfo::from_error(&e)),
        };
        self.emit(record);
    }

    /// Hands a prepared record to the sink. The record's category is replaced
    /// by this logger's.
    pub fn emit(&self, mut record: LogRecord) {
        if record.category != *self.category {
            record.category = self.category.to_string();
        }
        self.emitter.emit(record, self.context.clone());
    }

    /// Emits an entering record and returns a guard that emits the matching
    /// exiting record when finished or dropped.
    pub fn enter_method(&self, method: impl Into<String>) -> MethodTracer {
        let method = method.into();
        if self.is_enabled(Level::Trace) {
            let record = self
                .record(Level::Trace, format!("Entering {}", method))
                .with_nesting(1);
            self.emit(record);
        }
        MethodTracer::new(self.clone(), method)
    }

    fn record(&self, level: Level, title: impl Into<String>) -> LogRecord {
        LogRecord::new(self.category.as_ref(), level, title)
    }
}
