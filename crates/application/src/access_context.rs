use chrono::{DateTime, Utc};
use serde::Serialize;
use tablegate_core::{CallerIdentity, RequestId};
use tablegate_domain::OperationType;

use crate::operation_log_service::truncate_with_marker;

/// Upper bound on serialized call arguments kept in an access context.
pub const METHOD_ARGS_MAX_LEN: usize = 2_000;

/// Placeholder stored when call arguments cannot be serialized.
const UNSERIALIZABLE_ARGS: &str = "<unserializable>";

/// Ephemeral descriptor of one intercepted data-layer call.
///
/// Built once per call, completed exactly once by the guard, never reused.
#[derive(Debug, Clone)]
pub struct AccessContext {
    /// Identifier correlating the call with its audit record.
    pub request_id: RequestId,
    /// Caller microservice identity.
    pub service_name: String,
    /// Target table.
    pub table_name: String,
    /// Operation class of the call.
    pub operation_type: OperationType,
    /// Data-access method the call entered through.
    pub method_name: String,
    /// Ambient caller data.
    pub identity: CallerIdentity,
    /// Serialized, size-bounded call arguments.
    pub method_args: Option<String>,
    /// Sanitized statement as supplied by the caller.
    pub sql_statement: Option<String>,
    /// Capture time of the context, taken at construction.
    pub started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    execution_time_ms: Option<i64>,
}

impl AccessContext {
    /// Creates a context for one intercepted call, capturing the start time.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        table_name: impl Into<String>,
        operation_type: OperationType,
        method_name: impl Into<String>,
        identity: CallerIdentity,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            service_name: service_name.into(),
            table_name: table_name.into(),
            operation_type,
            method_name: method_name.into(),
            identity,
            method_args: None,
            sql_statement: None,
            started_at: Utc::now(),
            completed_at: None,
            execution_time_ms: None,
        }
    }

    /// Attaches pre-serialized call arguments.
    #[must_use]
    pub fn with_method_args(mut self, method_args: Option<String>) -> Self {
        self.method_args = method_args;
        self
    }

    /// Attaches the statement the call site is about to execute.
    #[must_use]
    pub fn with_sql_statement(mut self, sql_statement: Option<String>) -> Self {
        self.sql_statement = sql_statement;
        self
    }

    /// Marks the call completed, fixing its execution time.
    ///
    /// Only the first completion takes effect; the measured duration spans
    /// from context construction to this call.
    pub fn complete(&mut self) {
        if self.completed_at.is_some() {
            return;
        }

        let completed_at = Utc::now();
        let elapsed_ms = completed_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0);
        self.completed_at = Some(completed_at);
        self.execution_time_ms = Some(elapsed_ms);
    }

    /// Returns the completion timestamp, if the call has completed.
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the measured call duration in milliseconds, zero until completed.
    #[must_use]
    pub fn execution_time_ms(&self) -> i64 {
        self.execution_time_ms.unwrap_or(0)
    }
}

/// Serializes call arguments defensively for audit capture.
///
/// Serialization failures substitute a placeholder instead of failing the
/// call; oversized payloads are truncated to [`METHOD_ARGS_MAX_LEN`].
pub fn serialize_arguments<T: Serialize>(args: &T) -> String {
    match serde_json::to_string(args) {
        Ok(serialized) => truncate_with_marker(&serialized, METHOD_ARGS_MAX_LEN),
        Err(_) => UNSERIALIZABLE_ARGS.to_owned(),
    }
}
