use std::collections::{BTreeMap, BTreeSet};

use tablegate_domain::OperationType;

/// Injected read-only matrix of baseline service grants.
///
/// Keeps well-known services working before their dynamic permission
/// records are populated. The checker consults it only when the store has
/// no record for a triple; an explicit dynamic record of any level always
/// wins over a fallback grant.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionMatrix {
    grants: BTreeMap<String, BTreeMap<String, BTreeSet<OperationType>>>,
}

impl StaticPermissionMatrix {
    /// Creates an empty matrix that grants nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a baseline grant for one service and table.
    #[must_use]
    pub fn with_grant(
        mut self,
        service_name: impl Into<String>,
        table_name: impl Into<String>,
        operations: impl IntoIterator<Item = OperationType>,
    ) -> Self {
        self.grants
            .entry(service_name.into())
            .or_default()
            .entry(table_name.into())
            .or_default()
            .extend(operations);
        self
    }

    /// Returns whether the matrix grants the requested operation.
    #[must_use]
    pub fn allows(
        &self,
        service_name: &str,
        table_name: &str,
        operation_type: OperationType,
    ) -> bool {
        self.grants
            .get(service_name)
            .and_then(|tables| tables.get(table_name))
            .is_some_and(|operations| {
                operations
                    .iter()
                    .any(|granted| granted.covers(operation_type))
            })
    }

    /// Baseline grants for the core services of the sales backend.
    ///
    /// Mirrors the minimum each service needs on day one; note the absence
    /// of DELETE grants outside each service's own working tables.
    #[must_use]
    pub fn baseline() -> Self {
        use OperationType::{Delete, Insert, Select, Update};

        Self::new()
            .with_grant("auth-service", "users", [Select, Insert, Update])
            .with_grant("auth-service", "user_sessions", [Select, Insert, Update, Delete])
            .with_grant("lead-service", "leads", [Select, Insert, Update])
            .with_grant("lead-service", "lead_assignments", [Select, Insert, Update])
            .with_grant("lead-service", "users", [Select])
            .with_grant("promotion-service", "promotions", [Select, Insert, Update])
            .with_grant("promotion-service", "promotion_usages", [Select, Insert])
            .with_grant("reward-service", "rewards", [Select, Insert, Update])
            .with_grant("reward-service", "reward_payouts", [Select, Insert])
            .with_grant("settlement-service", "settlements", [Select, Insert, Update])
            .with_grant("settlement-service", "reward_payouts", [Select])
    }
}

#[cfg(test)]
mod tests {
    use tablegate_domain::OperationType;

    use super::StaticPermissionMatrix;

    #[test]
    fn empty_matrix_grants_nothing() {
        let matrix = StaticPermissionMatrix::new();
        assert!(!matrix.allows("auth-service", "users", OperationType::Select));
    }

    #[test]
    fn grants_cover_listed_operations_only() {
        let matrix = StaticPermissionMatrix::baseline();
        assert!(matrix.allows("auth-service", "users", OperationType::Select));
        assert!(matrix.allows("auth-service", "users", OperationType::Update));
        assert!(!matrix.allows("auth-service", "users", OperationType::Delete));
        assert!(!matrix.allows("auth-service", "leads", OperationType::Select));
    }

    #[test]
    fn all_grant_covers_every_operation() {
        let matrix =
            StaticPermissionMatrix::new().with_grant("ops-service", "jobs", [OperationType::All]);
        assert!(matrix.allows("ops-service", "jobs", OperationType::Delete));
        assert!(matrix.allows("ops-service", "jobs", OperationType::Select));
    }
}
