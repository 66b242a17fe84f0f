use tablegate_domain::ConditionMap;

use crate::access_context::AccessContext;

/// Evaluates a RESTRICTED record's conditions against one call.
///
/// The grammar is deliberately minimal: each entry names a context field
/// and a literal with an optional `==` or `!=` prefix (a bare literal means
/// equality), and entries combine with AND. A key that names no known
/// context field, or a field the call did not supply, is skipped — the
/// check fails open at this step only. That fallback is an intentional,
/// documented choice for half-configured RESTRICTED records; record lookup
/// itself stays fail-closed. Do not widen this into an expression language.
pub(crate) fn evaluate_conditions(conditions: &ConditionMap, context: &AccessContext) -> bool {
    conditions
        .iter()
        .all(|(key, expression)| match context_field(context, key) {
            Some(actual) => matches_expression(&actual, expression),
            None => true,
        })
}

fn matches_expression(actual: &str, expression: &str) -> bool {
    if let Some(expected) = expression.strip_prefix("!=") {
        return actual != expected.trim();
    }
    if let Some(expected) = expression.strip_prefix("==") {
        return actual == expected.trim();
    }

    actual == expression.trim()
}

fn context_field(context: &AccessContext, key: &str) -> Option<String> {
    match key {
        "user_id" => context.identity.user_id().map(str::to_owned),
        "ip_address" => context.identity.ip_address().map(str::to_owned),
        "service_name" => Some(context.service_name.clone()),
        "table_name" => Some(context.table_name.clone()),
        "operation_type" => Some(context.operation_type.as_str().to_owned()),
        "method_name" => Some(context.method_name.clone()),
        _ => None,
    }
}
