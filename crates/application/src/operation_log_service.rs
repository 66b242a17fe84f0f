use std::sync::Arc;

use tablegate_core::AppError;
use tablegate_domain::AccessStatus;

use crate::access_context::AccessContext;
use crate::access_ports::{OperationLogEntry, OperationLogRepository};

/// Upper bound on persisted error messages, including the truncation marker.
pub const ERROR_MESSAGE_MAX_LEN: usize = 500;

const TRUNCATION_MARKER: &str = "...";

/// Durable audit sink for completed data-layer calls.
///
/// Every method is best-effort: a failing audit insert is logged at error
/// severity and swallowed, so the audit path can never change the outcome
/// of the business call it describes.
#[derive(Clone)]
pub struct OperationLogService {
    repository: Arc<dyn OperationLogRepository>,
}

impl OperationLogService {
    /// Creates a log service over an audit sink implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn OperationLogRepository>) -> Self {
        Self { repository }
    }

    /// Records a successful call, with affected rows for writes.
    pub async fn log_success(&self, context: &AccessContext, affected_rows: Option<i64>) {
        let mut entry = entry_from_context(context, AccessStatus::Success);
        entry.affected_rows = affected_rows;
        self.append(entry).await;
    }

    /// Records an authorized call that raised, keeping a truncated message.
    pub async fn log_failure(&self, context: &AccessContext, error: &AppError) {
        let mut entry = entry_from_context(context, AccessStatus::Failed);
        entry.error_message = Some(truncate_with_marker(
            &error.to_string(),
            ERROR_MESSAGE_MAX_LEN,
        ));
        self.append(entry).await;
    }

    /// Records a call rejected by policy before it ran.
    pub async fn log_denied(&self, context: &AccessContext, reason: &str) {
        let mut entry = entry_from_context(context, AccessStatus::Denied);
        entry.error_message = Some(truncate_with_marker(reason, ERROR_MESSAGE_MAX_LEN));
        self.append(entry).await;
    }

    /// Records a successful write that opted into change capture.
    ///
    /// Snapshots are persisted as serialized by the caller; no field-level
    /// redaction is applied here.
    pub async fn log_with_data_change(
        &self,
        context: &AccessContext,
        before_data: Option<String>,
        after_data: Option<String>,
        affected_rows: Option<i64>,
    ) {
        let mut entry = entry_from_context(context, AccessStatus::Success);
        entry.affected_rows = affected_rows;
        entry.before_data = before_data;
        entry.after_data = after_data;
        self.append(entry).await;
    }

    /// Records a successful call together with the statement it executed.
    ///
    /// The statement is persisted as supplied; callers are responsible for
    /// parameter redaction before submission.
    pub async fn log_sql_execution(
        &self,
        context: &AccessContext,
        sql_statement: &str,
        affected_rows: Option<i64>,
    ) {
        let mut entry = entry_from_context(context, AccessStatus::Success);
        entry.affected_rows = affected_rows;
        entry.sql_statement = Some(sql_statement.to_owned());
        self.append(entry).await;
    }

    async fn append(&self, entry: OperationLogEntry) {
        if let Err(error) = self.repository.append_entry(entry).await {
            tracing::error!(%error, "failed to append data access log entry");
        }
    }
}

fn entry_from_context(context: &AccessContext, status: AccessStatus) -> OperationLogEntry {
    OperationLogEntry {
        request_id: context.request_id,
        service_name: context.service_name.clone(),
        table_name: context.table_name.clone(),
        operation_type: context.operation_type,
        user_id: context.identity.user_id().map(str::to_owned),
        status,
        affected_rows: None,
        execution_time_ms: context.execution_time_ms(),
        error_message: None,
        sql_statement: context.sql_statement.clone(),
        before_data: None,
        after_data: None,
        ip_address: context.identity.ip_address().map(str::to_owned),
        user_agent: context.identity.user_agent().map(str::to_owned),
    }
}

/// Truncates a value to `max_len` characters, ending in a marker when cut.
///
/// The returned value is exactly `max_len` characters long whenever the
/// input exceeds the bound, marker included.
pub(crate) fn truncate_with_marker(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_owned();
    }

    let kept: String = value
        .chars()
        .take(max_len.saturating_sub(TRUNCATION_MARKER.chars().count()))
        .collect();
    format!("{kept}{TRUNCATION_MARKER}")
}
