//! SLA evaluation and resolution-time derivation.

use std::collections::HashMap;

use serde::Serialize;

use riva_models::{SlaRule, WorkflowDefinition, WorkflowRequest};

use crate::business_days::business_days_between;
use crate::classify::is_terminal_status;

/// Business-day target for a submission: first rule whose field value
/// matches wins, otherwise the definition's default.
pub fn sla_days(
    rules: &[SlaRule],
    default_days: i64,
    form_data: &HashMap<String, serde_json::Value>,
) -> i64 {
    rules
        .iter()
        .find(|rule| {
            form_data
                .get(&rule.field)
                .and_then(|value| value.as_str())
                .map(|value| value == rule.value)
                .unwrap_or(false)
        })
        .map(|rule| rule.days)
        .unwrap_or(default_days)
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionOutcome {
    pub business_days: i64,
    pub sla_days: i64,
    pub within_sla: bool,
}

/// Resolution time for a finished request, or None while it is still live.
pub fn resolution(
    definition: &WorkflowDefinition,
    request: &WorkflowRequest,
) -> Option<ResolutionOutcome> {
    if !is_terminal_status(Some(definition), &request.status) {
        return None;
    }

    let business_days = business_days_between(request.last_updated_at, request.submitted_at);
    let sla_days = sla_days(
        &definition.sla_rules,
        definition.default_sla_days,
        &request.form_data,
    );

    Some(ResolutionOutcome {
        business_days,
        sla_days,
        within_sla: business_days <= sla_days,
    })
}
