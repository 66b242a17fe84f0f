//! Shared primitives for all Rust crates in Tablegate.

#![forbid(unsafe_code)]

/// Caller identity primitives shared across services.
pub mod identity;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use identity::CallerIdentity;

/// Result type used across Tablegate crates.
pub type AppResult<T> = Result<T, AppError>;

/// Identifier correlating one intercepted data-layer call with its audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a random request identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a request identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Structured payload describing one denied data-layer call.
///
/// Raised synchronously when policy rejects a call, so calling code can
/// distinguish "you are not allowed" from "something broke".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDeniedError {
    /// Caller microservice identity.
    pub service_name: String,
    /// Target table.
    pub table_name: String,
    /// Stable storage value of the attempted operation.
    pub operation_type: String,
    /// Human-readable denial reason suitable for audit and support use.
    pub reason: String,
}

impl Display for AccessDeniedError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.reason)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Call was evaluated against the permission matrix and rejected.
    #[error("access denied: {0}")]
    AccessDenied(AccessDeniedError),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{AccessDeniedError, AppError, RequestId};

    #[test]
    fn request_id_formats_as_uuid() {
        let request_id = RequestId::new();
        assert_eq!(request_id.to_string().len(), 36);
    }

    #[test]
    fn access_denied_error_displays_reason() {
        let error = AppError::AccessDenied(AccessDeniedError {
            service_name: "lead-service".to_owned(),
            table_name: "deals".to_owned(),
            operation_type: "SELECT".to_owned(),
            reason: "service 'lead-service' has no permission for SELECT on table 'deals'"
                .to_owned(),
        });

        assert_eq!(
            error.to_string(),
            "access denied: service 'lead-service' has no permission for SELECT on table 'deals'"
        );
    }
}
