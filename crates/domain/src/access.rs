use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablegate_core::AppError;
use uuid::Uuid;

/// Data-layer operation classes enforced by the permission matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// Read operation.
    Select,
    /// Row creation.
    Insert,
    /// Row mutation.
    Update,
    /// Row removal.
    Delete,
    /// Wildcard matching any of the four concrete operations.
    All,
}

impl OperationType {
    /// Returns a stable storage value for this operation type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::All => "ALL",
        }
    }

    /// Returns whether a record with this operation type covers the requested one.
    ///
    /// `ALL` covers every concrete operation; a concrete operation covers
    /// only itself.
    #[must_use]
    pub fn covers(&self, requested: OperationType) -> bool {
        *self == Self::All || *self == requested
    }

    /// Returns whether this operation mutates rows.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete)
    }

    /// Infers the operation type from a data-access method name.
    ///
    /// Methods prefixed `select`/`find`/`get` map to SELECT, `insert` to
    /// INSERT, `update` to UPDATE and `delete` to DELETE. Returns `None`
    /// for any other prefix.
    #[must_use]
    pub fn from_method_name(method_name: &str) -> Option<Self> {
        let name = method_name.trim().to_ascii_lowercase();
        if name.starts_with("select") || name.starts_with("find") || name.starts_with("get") {
            return Some(Self::Select);
        }
        if name.starts_with("insert") {
            return Some(Self::Insert);
        }
        if name.starts_with("update") {
            return Some(Self::Update);
        }
        if name.starts_with("delete") {
            return Some(Self::Delete);
        }

        None
    }
}

impl FromStr for OperationType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SELECT" => Ok(Self::Select),
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "ALL" => Ok(Self::All),
            _ => Err(AppError::Validation(format!(
                "unknown operation type value '{value}'"
            ))),
        }
    }
}

/// Permission levels a matrix record can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    /// Allow unconditionally.
    Full,
    /// Allow only when the record's conditions hold for the call.
    Restricted,
    /// Reject unconditionally.
    Denied,
}

impl PermissionLevel {
    /// Returns a stable storage value for this permission level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Restricted => "RESTRICTED",
            Self::Denied => "DENIED",
        }
    }
}

impl FromStr for PermissionLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "FULL" => Ok(Self::Full),
            "RESTRICTED" => Ok(Self::Restricted),
            "DENIED" => Ok(Self::Denied),
            _ => Err(AppError::Validation(format!(
                "unknown permission level value '{value}'"
            ))),
        }
    }
}

/// Outcome classes recorded for one completed data-layer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessStatus {
    /// The wrapped call completed normally.
    Success,
    /// The wrapped call raised after being authorized.
    Failed,
    /// Policy rejected the call before it ran.
    Denied,
}

impl AccessStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Denied => "DENIED",
        }
    }
}

impl FromStr for AccessStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "DENIED" => Ok(Self::Denied),
            _ => Err(AppError::Validation(format!(
                "unknown access status value '{value}'"
            ))),
        }
    }
}

/// Row-level condition map attached to RESTRICTED records.
///
/// Keys name access-context fields, values carry an optional `==`/`!=`
/// operator prefix followed by the comparison literal.
pub type ConditionMap = BTreeMap<String, String>;

/// One authorization rule of the permission matrix.
///
/// At most one enabled record per `(service_name, table_name,
/// operation_type)` triple is authoritative, and a record with a concrete
/// operation type takes precedence over an `ALL` record for the same
/// service and table. Records are written by the administrative path only;
/// the enforcement path never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// Stable record identifier.
    pub id: Uuid,
    /// Caller microservice identity the rule applies to.
    pub service_name: String,
    /// Target table the rule applies to.
    pub table_name: String,
    /// Operation class the rule applies to.
    pub operation_type: OperationType,
    /// Granted permission level.
    pub permission_level: PermissionLevel,
    /// Row-level conditions, used only when the level is RESTRICTED.
    pub conditions: ConditionMap,
    /// A disabled record behaves as if it does not exist.
    pub is_enabled: bool,
    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last record update timestamp.
    pub updated_at: DateTime<Utc>,
}
