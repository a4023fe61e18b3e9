//! Workflow definition models for the RIVA Connect portal.
//!
//! A definition is the template for one request type: the form fields a
//! requester fills in, the ordered status list the request moves through,
//! routing rules that pick an initial assignee, and SLA rules that set the
//! business-day target for resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Sentinel entry in `allowed_user_ids` granting access to every collaborator.
pub const ALL_USERS: &str = "all";

/// Legacy vocabulary used to infer terminality from a status label when the
/// definition carries no explicit `terminal` flag. Matching is a
/// case-insensitive substring check.
pub const TERMINAL_VOCABULARY: [&str; 5] = [
    "aprovado",
    "reprovado",
    "concluído",
    "finalizado",
    "cancelado",
];

/// Template describing a request type: its form, status lifecycle, routing,
/// SLA policy, and access list.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Definition name must be between 1 and 255 characters"))]
    pub name: String,
    pub icon: String,
    #[validate(length(min = 1, max = 100, message = "Owning area is required"))]
    pub area_id: String,
    #[validate(email(message = "Owner email must be a valid email address"))]
    pub owner_email: String,
    pub fields: Vec<FormField>,
    #[validate(length(min = 1, message = "A definition needs at least one status"), custom = "validate_status_ids")]
    pub statuses: Vec<StatusDef>,
    pub routing_rules: Vec<RoutingRule>,
    pub sla_rules: Vec<SlaRule>,
    #[validate(range(min = 1, max = 365, message = "Default SLA must be between 1 and 365 business days"))]
    pub default_sla_days: i64,
    pub allowed_user_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One form field descriptor. Field IDs key the submitted `form_data` map;
/// duplicate IDs collapse at submission time, last position wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormField {
    pub id: String,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    Date,
    DateRange,
    File,
    Select,
    Number,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Date => write!(f, "date"),
            Self::DateRange => write!(f, "date-range"),
            Self::File => write!(f, "file"),
            Self::Select => write!(f, "select"),
            Self::Number => write!(f, "number"),
        }
    }
}

/// One entry in the ordered status list. Index 0 is the initial ("open")
/// state of every request created from the definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusDef {
    pub id: String,
    pub label: String,
    /// Explicit terminality. When absent, terminality falls back to the
    /// legacy label-vocabulary match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<bool>,
}

impl StatusDef {
    /// Whether a request in this status counts as finished.
    pub fn is_terminal(&self) -> bool {
        match self.terminal {
            Some(flag) => flag,
            None => label_matches_terminal_vocabulary(&self.label),
        }
    }
}

/// Case-insensitive substring match against [`TERMINAL_VOCABULARY`].
pub fn label_matches_terminal_vocabulary(label: &str) -> bool {
    let lowered = label.to_lowercase();
    TERMINAL_VOCABULARY.iter().any(|word| lowered.contains(word))
}

/// Routing rule: when a submitted `form_data[field]` equals `value`, the
/// request is assigned to the given collaborator. Rules are evaluated in
/// order, first match wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingRule {
    pub field: String,
    pub value: String,
    pub assignee_id: Uuid,
    pub assignee_name: String,
}

/// SLA rule: when a submitted `form_data[field]` equals `value`, the request
/// must resolve within `days` business days. Evaluated in order, first match
/// wins; `default_sla_days` is the fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlaRule {
    pub field: String,
    pub value: String,
    pub days: i64,
}

impl WorkflowDefinition {
    pub fn new(name: String, area_id: String, owner_email: String, statuses: Vec<StatusDef>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            icon: String::new(),
            area_id,
            owner_email,
            fields: Vec::new(),
            statuses,
            routing_rules: Vec::new(),
            sla_rules: Vec::new(),
            default_sla_days: 5,
            allowed_user_ids: vec![ALL_USERS.to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    /// The initial status every new request starts in.
    pub fn initial_status(&self) -> Option<&StatusDef> {
        self.statuses.first()
    }

    /// Look up a status by ID.
    pub fn status(&self, status_id: &str) -> Option<&StatusDef> {
        self.statuses.iter().find(|s| s.id == status_id)
    }

    /// Whether the collaborator may submit requests against this definition.
    pub fn allows_user(&self, user_id: Uuid) -> bool {
        let id = user_id.to_string();
        self.allowed_user_ids
            .iter()
            .any(|entry| entry == ALL_USERS || *entry == id)
    }
}

fn validate_status_ids(statuses: &[StatusDef]) -> Result<(), ValidationError> {
    for status in statuses {
        if status.id.trim().is_empty() {
            return Err(ValidationError::new("empty_status_id"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses() -> Vec<StatusDef> {
        vec![
            StatusDef { id: "em-aberto".into(), label: "Em Aberto".into(), terminal: None },
            StatusDef { id: "em-analise".into(), label: "Em Análise".into(), terminal: None },
            StatusDef { id: "finalizado".into(), label: "Finalizado".into(), terminal: None },
        ]
    }

    #[test]
    fn test_initial_status_is_first_entry() {
        let def = WorkflowDefinition::new(
            "Reembolso".into(),
            "financeiro".into(),
            "owner@riva.com".into(),
            statuses(),
        );
        assert_eq!(def.initial_status().map(|s| s.id.as_str()), Some("em-aberto"));
    }

    #[test]
    fn test_terminal_vocabulary_is_case_insensitive_substring() {
        assert!(label_matches_terminal_vocabulary("Finalizado"));
        assert!(label_matches_terminal_vocabulary("Pedido APROVADO pela diretoria"));
        assert!(label_matches_terminal_vocabulary("Concluído"));
        assert!(!label_matches_terminal_vocabulary("Em Análise"));
        assert!(!label_matches_terminal_vocabulary("Aguardando aprovação"));
    }

    #[test]
    fn test_explicit_terminal_flag_overrides_vocabulary() {
        let tagged = StatusDef { id: "done".into(), label: "Encerrado".into(), terminal: Some(true) };
        assert!(tagged.is_terminal());

        let untagged = StatusDef { id: "done".into(), label: "Encerrado".into(), terminal: None };
        assert!(!untagged.is_terminal());

        let overridden = StatusDef { id: "hold".into(), label: "Aprovado com ressalvas".into(), terminal: Some(false) };
        assert!(!overridden.is_terminal());
    }

    #[test]
    fn test_allows_user_honors_sentinel_and_explicit_ids() {
        let mut def = WorkflowDefinition::new(
            "Férias".into(),
            "rh".into(),
            "owner@riva.com".into(),
            statuses(),
        );
        let user = Uuid::new_v4();
        assert!(def.allows_user(user));

        def.allowed_user_ids = vec![user.to_string()];
        assert!(def.allows_user(user));
        assert!(!def.allows_user(Uuid::new_v4()));
    }

    #[test]
    fn test_validation_rejects_empty_status_list() {
        let mut def = WorkflowDefinition::new(
            "Compras".into(),
            "suprimentos".into(),
            "owner@riva.com".into(),
            statuses(),
        );
        assert!(validator::Validate::validate(&def).is_ok());

        def.statuses.clear();
        assert!(validator::Validate::validate(&def).is_err());
    }
}
