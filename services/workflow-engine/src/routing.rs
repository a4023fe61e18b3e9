//! Routing rule evaluation.
//!
//! Rules are checked in definition order against the submitted form data;
//! the first rule whose field value matches assigns the request.

use std::collections::HashMap;

use riva_models::{RoutingRule, UserRef};

/// Pick the assignee for a submission, first match wins.
pub fn evaluate_routing(
    rules: &[RoutingRule],
    form_data: &HashMap<String, serde_json::Value>,
) -> Option<UserRef> {
    rules
        .iter()
        .find(|rule| {
            form_data
                .get(&rule.field)
                .and_then(|value| value.as_str())
                .map(|value| value == rule.value)
                .unwrap_or(false)
        })
        .map(|rule| UserRef {
            id: rule.assignee_id,
            name: rule.assignee_name.clone(),
        })
}
