use std::collections::BTreeSet;
use std::future::Future;

use serde::Serialize;
use tablegate_core::{AccessDeniedError, AppError, AppResult, CallerIdentity};
use tablegate_domain::OperationType;

use crate::access_context::{AccessContext, serialize_arguments};
use crate::operation_log_service::OperationLogService;
use crate::permission_check_service::{AccessDecision, PermissionCheckService};

#[cfg(test)]
mod tests;

/// Read calls slower than this many milliseconds are flagged as slow queries.
pub const SLOW_QUERY_THRESHOLD_MS: i64 = 1_000;

tokio::task_local! {
    static GUARD_SCOPE: ();
}

/// Runtime configuration for the access guard.
#[derive(Debug, Clone)]
pub struct AccessGuardConfig {
    /// Globally disables enforcement when false; calls proceed unguarded.
    pub enabled: bool,
    /// Caller services exempt from enforcement.
    pub excluded_services: BTreeSet<String>,
    /// Tables owned by this subsystem, never gated against themselves.
    pub internal_tables: BTreeSet<String>,
    /// Slow-query threshold applied to read entry points.
    pub slow_query_threshold_ms: i64,
}

impl Default for AccessGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            excluded_services: BTreeSet::new(),
            internal_tables: BTreeSet::from([
                "permission_records".to_owned(),
                "data_access_logs".to_owned(),
            ]),
            slow_query_threshold_ms: SLOW_QUERY_THRESHOLD_MS,
        }
    }
}

/// Identity of one guarded call-site invocation.
///
/// Carries everything the host framework knows about the data operation it
/// is about to run; the guard derives the access context from it.
#[derive(Debug, Clone)]
pub struct GuardedCall {
    service_name: String,
    table_name: String,
    method_name: String,
    operation_type: Option<OperationType>,
    identity: CallerIdentity,
    method_args: Option<String>,
    sql_statement: Option<String>,
}

impl GuardedCall {
    /// Describes a call by caller service, target table and method name.
    ///
    /// The operation class is inferred from the method name prefix unless
    /// [`Self::with_operation`] sets it explicitly.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        table_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            table_name: table_name.into(),
            method_name: method_name.into(),
            operation_type: None,
            identity: CallerIdentity::system(),
            method_args: None,
            sql_statement: None,
        }
    }

    /// Sets the operation class explicitly, overriding inference.
    #[must_use]
    pub fn with_operation(mut self, operation_type: OperationType) -> Self {
        self.operation_type = Some(operation_type);
        self
    }

    /// Attaches the ambient caller identity.
    #[must_use]
    pub fn with_identity(mut self, identity: CallerIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Attaches the call arguments, serialized defensively for audit.
    #[must_use]
    pub fn with_args<T: Serialize>(mut self, args: &T) -> Self {
        self.method_args = Some(serialize_arguments(args));
        self
    }

    /// Attaches the statement the call site is about to execute.
    ///
    /// Recorded as supplied; redact parameters before passing it in.
    #[must_use]
    pub fn with_sql_statement(mut self, sql_statement: impl Into<String>) -> Self {
        self.sql_statement = Some(sql_statement.into());
        self
    }

    fn into_context(self) -> AppResult<AccessContext> {
        let operation_type = self
            .operation_type
            .or_else(|| OperationType::from_method_name(&self.method_name))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "cannot infer operation type from method name '{}'",
                    self.method_name
                ))
            })?;

        Ok(AccessContext::new(
            self.service_name,
            self.table_name,
            operation_type,
            self.method_name,
            self.identity,
        )
        .with_method_args(self.method_args)
        .with_sql_statement(self.sql_statement))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    General,
    Read,
    Write,
}

struct DataChange {
    before_data: String,
    after_data: String,
}

/// Single enforcement point wrapping every data-layer call.
///
/// Builds the access context, applies the re-entrancy and bypass rules,
/// asks the checker for a verdict, runs or denies the wrapped operation,
/// measures it, and writes exactly one audit record per call. The wrapped
/// operation's result or error always reaches the caller unchanged.
#[derive(Clone)]
pub struct AccessGuard {
    checker: PermissionCheckService,
    logger: OperationLogService,
    config: AccessGuardConfig,
}

impl AccessGuard {
    /// Creates a guard over a checker, a logger and its configuration.
    #[must_use]
    pub fn new(
        checker: PermissionCheckService,
        logger: OperationLogService,
        config: AccessGuardConfig,
    ) -> Self {
        Self {
            checker,
            logger,
            config,
        }
    }

    /// Guards a general data operation.
    pub async fn execute<T, F, Fut>(&self, call: GuardedCall, operation: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.run(call, CallKind::General, None, |_| None, operation)
            .await
    }

    /// Guards a read operation, flagging slow queries.
    ///
    /// The slow-query signal is purely observational: it is emitted at
    /// warn level after the call completes and never blocks or retries.
    pub async fn execute_read<T, F, Fut>(&self, call: GuardedCall, operation: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.run(call, CallKind::Read, None, |_| None, operation)
            .await
    }

    /// Guards a write operation, capturing its affected-row count.
    pub async fn execute_write<F, Fut>(&self, call: GuardedCall, operation: F) -> AppResult<u64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<u64>>,
    {
        self.run(
            call,
            CallKind::Write,
            None,
            |rows: &u64| i64::try_from(*rows).ok(),
            operation,
        )
        .await
    }

    /// Guards a write operation that opted into change capture.
    ///
    /// Snapshots are serialized defensively up front and recorded with the
    /// audit entry on success.
    pub async fn execute_write_with_change<B, A, F, Fut>(
        &self,
        call: GuardedCall,
        before: &B,
        after: &A,
        operation: F,
    ) -> AppResult<u64>
    where
        B: Serialize,
        A: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<u64>>,
    {
        let change = DataChange {
            before_data: serialize_arguments(before),
            after_data: serialize_arguments(after),
        };
        self.run(
            call,
            CallKind::Write,
            Some(change),
            |rows: &u64| i64::try_from(*rows).ok(),
            operation,
        )
        .await
    }

    async fn run<T, F, Fut, R>(
        &self,
        call: GuardedCall,
        kind: CallKind,
        change: Option<DataChange>,
        rows_of: R,
        operation: F,
    ) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
        R: Fn(&T) -> Option<i64>,
    {
        if self.bypasses_enforcement(&call) {
            return operation().await;
        }

        // A set scope means this call originates from the checker's or
        // logger's own data access; gating it would loop forever.
        if GUARD_SCOPE.try_with(|_| ()).is_ok() {
            return operation().await;
        }

        GUARD_SCOPE
            .scope((), self.pipeline(call, kind, change, rows_of, operation))
            .await
    }

    fn bypasses_enforcement(&self, call: &GuardedCall) -> bool {
        !self.config.enabled
            || self.config.excluded_services.contains(&call.service_name)
            || self.config.internal_tables.contains(&call.table_name)
    }

    async fn pipeline<T, F, Fut, R>(
        &self,
        call: GuardedCall,
        kind: CallKind,
        change: Option<DataChange>,
        rows_of: R,
        operation: F,
    ) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
        R: Fn(&T) -> Option<i64>,
    {
        let mut context = call.into_context()?;

        if let AccessDecision::Denied { reason } = self.checker.check_access(&context).await {
            context.complete();
            self.logger.log_denied(&context, &reason).await;
            return Err(AppError::AccessDenied(AccessDeniedError {
                service_name: context.service_name.clone(),
                table_name: context.table_name.clone(),
                operation_type: context.operation_type.as_str().to_owned(),
                reason,
            }));
        }

        let outcome = operation().await;
        context.complete();

        if kind == CallKind::Read {
            let elapsed_ms = context.execution_time_ms();
            if is_slow_query(elapsed_ms, self.config.slow_query_threshold_ms) {
                tracing::warn!(
                    service_name = %context.service_name,
                    table_name = %context.table_name,
                    method_name = %context.method_name,
                    elapsed_ms,
                    threshold_ms = self.config.slow_query_threshold_ms,
                    "slow query detected"
                );
            }
        }

        match outcome {
            Ok(value) => {
                let affected_rows = rows_of(&value);
                match change {
                    Some(change) => {
                        self.logger
                            .log_with_data_change(
                                &context,
                                Some(change.before_data),
                                Some(change.after_data),
                                affected_rows,
                            )
                            .await;
                    }
                    None => self.logger.log_success(&context, affected_rows).await,
                }
                Ok(value)
            }
            Err(error) => {
                self.logger.log_failure(&context, &error).await;
                Err(error)
            }
        }
    }
}

pub(crate) fn is_slow_query(elapsed_ms: i64, threshold_ms: i64) -> bool {
    elapsed_ms > threshold_ms
}
