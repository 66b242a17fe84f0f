//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access;

pub use access::{
    AccessStatus, ConditionMap, OperationType, PermissionLevel, PermissionRecord,
};
