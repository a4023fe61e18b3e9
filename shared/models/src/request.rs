//! Workflow request models.
//!
//! A request is one submission tracked through a definition's status list.
//! Its `history` is append-only and `status` always mirrors the last history
//! entry; mutation helpers here keep that pairing intact.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::definition::{FormField, WorkflowDefinition};

/// Denormalized collaborator reference carried on submissions, history
/// entries, assignments, and action requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    pub id: Uuid,
    pub name: String,
}

/// One submission moving through a definition's statuses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowRequest {
    pub id: Uuid,
    /// Human-readable identifier shown in the portal, e.g. `REQ-3F9A21C4`.
    pub request_id: String,
    /// Definition linkage by *name*, not ID, mirroring the portal's data.
    /// Renaming or deleting the definition orphans the request.
    pub workflow_name: String,
    pub status: String,
    pub form_data: HashMap<String, serde_json::Value>,
    pub submitted_by: UserRef,
    pub submitted_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub assignee: Option<UserRef>,
    pub is_archived: bool,
    pub history: Vec<HistoryEntry>,
    /// Status-ID keyed approval lists. Advisory only: pending entries never
    /// block a transition.
    pub action_requests: HashMap<String, Vec<ActionRequest>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub status: String,
    pub user: UserRef,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRequest {
    pub user: UserRef,
    pub state: ActionRequestState,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionRequestState {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ActionRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Definition '{0}' has no statuses")]
    NoStatuses(String),
    #[error("Required field '{0}' is missing")]
    MissingRequiredField(String),
    #[error("No pending action request for user {user_id} in status '{status_id}'")]
    NoPendingAction { status_id: String, user_id: Uuid },
}

/// Collapse positional form values into the `form_data` map.
///
/// Values are aligned with the definition's field order; when two fields
/// share an ID the later position wins.
pub fn map_form_values(
    fields: &[FormField],
    values: &[serde_json::Value],
) -> HashMap<String, serde_json::Value> {
    let mut form_data = HashMap::new();
    for (field, value) in fields.iter().zip(values.iter()) {
        form_data.insert(field.id.clone(), value.clone());
    }
    form_data
}

impl WorkflowRequest {
    /// Create a request from a submission, seeding history with the
    /// definition's initial status.
    pub fn new(
        definition: &WorkflowDefinition,
        values: &[serde_json::Value],
        submitted_by: UserRef,
        request_id: String,
    ) -> Result<Self, RequestError> {
        let initial = definition
            .initial_status()
            .ok_or_else(|| RequestError::NoStatuses(definition.name.clone()))?;

        for (field, value) in definition.fields.iter().zip(values.iter()) {
            if field.required && value.is_null() {
                return Err(RequestError::MissingRequiredField(field.id.clone()));
            }
        }
        if values.len() < definition.fields.len() {
            if let Some(missing) = definition.fields[values.len()..].iter().find(|f| f.required) {
                return Err(RequestError::MissingRequiredField(missing.id.clone()));
            }
        }

        let now = Utc::now();
        let seed = HistoryEntry {
            status: initial.id.clone(),
            user: submitted_by.clone(),
            timestamp: now,
            notes: None,
        };

        Ok(Self {
            id: Uuid::new_v4(),
            request_id,
            workflow_name: definition.name.clone(),
            status: initial.id.clone(),
            form_data: map_form_values(&definition.fields, values),
            submitted_by,
            submitted_at: now,
            last_updated_at: now,
            assignee: None,
            is_archived: false,
            history: vec![seed],
            action_requests: HashMap::new(),
        })
    }

    /// Status recorded by the newest history entry.
    pub fn last_history_status(&self) -> Option<&str> {
        self.history.last().map(|entry| entry.status.as_str())
    }

    /// Apply a transition in memory: append the entry and mirror its status
    /// into the request head, optionally reassigning.
    pub fn apply_transition(&mut self, entry: HistoryEntry, assignee: Option<UserRef>) {
        self.status = entry.status.clone();
        self.last_updated_at = entry.timestamp;
        if let Some(assignee) = assignee {
            self.assignee = Some(assignee);
        }
        self.history.push(entry);
    }

    /// Pending approvals the given collaborator holds for the current status.
    pub fn pending_actions_for(&self, user_id: Uuid) -> Vec<&ActionRequest> {
        self.action_requests
            .get(&self.status)
            .map(|actions| {
                actions
                    .iter()
                    .filter(|a| a.user.id == user_id && a.state == ActionRequestState::Pending)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Attach pending approval entries to a status.
    pub fn add_action_requests(&mut self, status_id: &str, users: Vec<UserRef>, requested_at: DateTime<Utc>) {
        let actions = self.action_requests.entry(status_id.to_string()).or_default();
        for user in users {
            actions.push(ActionRequest {
                user,
                state: ActionRequestState::Pending,
                requested_at,
                resolved_at: None,
            });
        }
    }

    /// Flip one pending approval to approved/rejected.
    pub fn resolve_action_request(
        &mut self,
        status_id: &str,
        user_id: Uuid,
        approve: bool,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), RequestError> {
        let pending = self
            .action_requests
            .get_mut(status_id)
            .and_then(|actions| {
                actions
                    .iter_mut()
                    .find(|a| a.user.id == user_id && a.state == ActionRequestState::Pending)
            })
            .ok_or_else(|| RequestError::NoPendingAction {
                status_id: status_id.to_string(),
                user_id,
            })?;

        pending.state = if approve {
            ActionRequestState::Approved
        } else {
            ActionRequestState::Rejected
        };
        pending.resolved_at = Some(resolved_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{FieldType, StatusDef};
    use serde_json::json;

    fn definition() -> WorkflowDefinition {
        let mut def = WorkflowDefinition::new(
            "Reembolso".into(),
            "financeiro".into(),
            "owner@riva.com".into(),
            vec![
                StatusDef { id: "em-aberto".into(), label: "Em Aberto".into(), terminal: None },
                StatusDef { id: "em-analise".into(), label: "Em Análise".into(), terminal: None },
                StatusDef { id: "finalizado".into(), label: "Finalizado".into(), terminal: None },
            ],
        );
        def.fields = vec![
            FormField { id: "email".into(), label: "E-mail".into(), field_type: FieldType::Text, required: true },
            FormField { id: "valor".into(), label: "Valor".into(), field_type: FieldType::Number, required: true },
        ];
        def
    }

    fn user(name: &str) -> UserRef {
        UserRef { id: Uuid::new_v4(), name: name.into() }
    }

    #[test]
    fn test_new_request_seeds_history_with_initial_status() {
        let def = definition();
        let request = WorkflowRequest::new(
            &def,
            &[json!("ana@riva.com"), json!(120.5)],
            user("Ana"),
            "REQ-0001".into(),
        )
        .unwrap();

        assert_eq!(request.status, "em-aberto");
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.last_history_status(), Some("em-aberto"));
        assert_eq!(request.form_data["email"], json!("ana@riva.com"));
    }

    #[test]
    fn test_new_request_rejects_missing_required_field() {
        let def = definition();
        let err = WorkflowRequest::new(&def, &[json!("ana@riva.com")], user("Ana"), "REQ-0002".into())
            .unwrap_err();
        assert_eq!(err, RequestError::MissingRequiredField("valor".into()));

        let err = WorkflowRequest::new(
            &def,
            &[json!("ana@riva.com"), serde_json::Value::Null],
            user("Ana"),
            "REQ-0003".into(),
        )
        .unwrap_err();
        assert_eq!(err, RequestError::MissingRequiredField("valor".into()));
    }

    #[test]
    fn test_duplicate_field_ids_collapse_last_position_wins() {
        let fields = vec![
            FormField { id: "email".into(), label: "E-mail".into(), field_type: FieldType::Text, required: true },
            FormField { id: "motivo".into(), label: "Motivo".into(), field_type: FieldType::Text, required: false },
            FormField { id: "valor".into(), label: "Valor".into(), field_type: FieldType::Number, required: false },
            FormField { id: "email".into(), label: "E-mail secundário".into(), field_type: FieldType::Text, required: false },
        ];
        let values = [json!("a@x.com"), json!("viagem"), json!(10), json!("b@x.com")];

        let form_data = map_form_values(&fields, &values);
        assert_eq!(form_data["email"], json!("b@x.com"));
        assert_eq!(form_data.len(), 3);
    }

    #[test]
    fn test_apply_transition_keeps_status_and_history_paired() {
        let def = definition();
        let mut request = WorkflowRequest::new(
            &def,
            &[json!("ana@riva.com"), json!(42)],
            user("Ana"),
            "REQ-0004".into(),
        )
        .unwrap();

        let reviewer = user("Bruno");
        let entry = HistoryEntry {
            status: "em-analise".into(),
            user: reviewer.clone(),
            timestamp: Utc::now(),
            notes: Some("triagem".into()),
        };
        request.apply_transition(entry, Some(reviewer.clone()));

        assert_eq!(request.status, "em-analise");
        assert_eq!(request.last_history_status(), Some("em-analise"));
        assert_eq!(request.status, request.history.last().unwrap().status);
        assert_eq!(request.assignee, Some(reviewer));
        assert_eq!(request.history.len(), 2);
    }

    #[test]
    fn test_pending_actions_scan_current_status_only() {
        let def = definition();
        let mut request = WorkflowRequest::new(
            &def,
            &[json!("ana@riva.com"), json!(42)],
            user("Ana"),
            "REQ-0005".into(),
        )
        .unwrap();

        let approver = user("Carla");
        request.add_action_requests("em-aberto", vec![approver.clone()], Utc::now());
        request.add_action_requests("em-analise", vec![approver.clone()], Utc::now());

        assert_eq!(request.pending_actions_for(approver.id).len(), 1);

        request
            .resolve_action_request("em-aberto", approver.id, true, Utc::now())
            .unwrap();
        assert!(request.pending_actions_for(approver.id).is_empty());

        let err = request
            .resolve_action_request("em-aberto", approver.id, true, Utc::now())
            .unwrap_err();
        assert!(matches!(err, RequestError::NoPendingAction { .. }));
    }
}
