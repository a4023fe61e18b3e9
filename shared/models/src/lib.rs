//! # RIVA Connect Core Domain Models
//!
//! Core domain models for the RIVA Connect workflow backend. All models
//! implement serde serialization and, where forms are involved, validation
//! with the validator crate.
//!
//! ## Key Models
//!
//! - **WorkflowDefinition**: template for one request type (form fields,
//!   ordered statuses, routing rules, SLA rules, access list)
//! - **WorkflowRequest**: one submission tracked through a status lifecycle
//!   with an append-only history and per-status action requests
//! - **Collaborator**: portal user with the permission flags that gate
//!   mutating operations
//! - **AuditEntry**: hash-chained audit log record
//!
//! ## Invariants
//!
//! - A definition's status list is non-empty; index 0 is the initial state
//! - A request's `status` always equals its newest history entry's status
//! - History is append-only; requests are archived, never hard-deleted

pub mod audit;
pub mod collaborator;
pub mod definition;
pub mod request;


pub use audit::{verify_chain, AuditAction, AuditEntry};
pub use collaborator::{Collaborator, PermissionSet};
pub use definition::{
    label_matches_terminal_vocabulary, FieldType, FormField, RoutingRule, SlaRule, StatusDef,
    WorkflowDefinition, ALL_USERS, TERMINAL_VOCABULARY,
};
pub use request::{
    map_form_values, ActionRequest, ActionRequestState, HistoryEntry, RequestError, UserRef,
    WorkflowRequest,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_definition() -> WorkflowDefinition {
        WorkflowDefinition::new(
            "Solicitação de Acesso".into(),
            "ti".into(),
            "owner@riva.com".into(),
            vec![
                StatusDef { id: "em-aberto".into(), label: "Em Aberto".into(), terminal: None },
                StatusDef { id: "aprovado".into(), label: "Aprovado".into(), terminal: None },
            ],
        )
    }

    #[test]
    fn test_definition_serde_roundtrip() {
        let def = sample_definition();
        let json = serde_json::to_string(&def).unwrap();
        let back: WorkflowDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(def, back);
    }

    #[test]
    fn test_request_status_mirrors_history() {
        let def = sample_definition();
        let request = WorkflowRequest::new(
            &def,
            &[],
            UserRef { id: Uuid::new_v4(), name: "Ana".into() },
            "REQ-0001".into(),
        )
        .unwrap();
        assert_eq!(Some(request.status.as_str()), request.last_history_status());
    }

    #[test]
    fn test_audit_entry_creation() {
        let entry = AuditEntry::chained(
            AuditAction::DefinitionCreated,
            "workflow_definition",
            Uuid::new_v4(),
            None,
            json!({}),
            None,
        );
        assert!(!entry.hash.is_empty());
        assert!(entry.verify_integrity());
    }
}
