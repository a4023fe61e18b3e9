//! Status Transition Engine
//!
//! Pure validation and construction for status transitions. The engine
//! checks that the target status exists and that the actor may move the
//! request; it deliberately enforces no transition table, so any status may
//! move to any other, including away from terminal states. Sequencing is a
//! caller affordance, not an invariant.

use chrono::Utc;
use thiserror::Error;

use riva_models::{Collaborator, HistoryEntry, UserRef, WorkflowDefinition, WorkflowRequest};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Status '{status_id}' does not exist in workflow '{workflow}'")]
    UnknownStatus { workflow: String, status_id: String },
    #[error("Request {0} is archived and cannot be moved")]
    Archived(String),
    #[error("Request {request} belongs to workflow '{expected}', not '{actual}'")]
    WorkflowMismatch {
        request: String,
        expected: String,
        actual: String,
    },
    #[error("Collaborator '{0}' may not move this request")]
    NotAuthorized(String),
}

/// Server-side authorization: the assignee, the definition owner, and
/// collaborators with request-management permission may transition.
pub fn authorize_actor(
    definition: &WorkflowDefinition,
    request: &WorkflowRequest,
    actor: &Collaborator,
) -> Result<(), TransitionError> {
    let is_assignee = request
        .assignee
        .as_ref()
        .map(|a| a.id == actor.id)
        .unwrap_or(false);
    let is_owner = actor.email.eq_ignore_ascii_case(&definition.owner_email);

    if is_assignee || is_owner || actor.permissions.allows_request_management() {
        Ok(())
    } else {
        Err(TransitionError::NotAuthorized(actor.name.clone()))
    }
}

/// Validate a transition and build the history entry recording it.
///
/// The entry's timestamp is taken at validation time, so appending it keeps
/// the history ordered as long as the caller persists promptly.
pub fn prepare_transition(
    definition: &WorkflowDefinition,
    request: &WorkflowRequest,
    target_status_id: &str,
    actor: &UserRef,
    notes: Option<String>,
) -> Result<HistoryEntry, TransitionError> {
    if request.workflow_name != definition.name {
        return Err(TransitionError::WorkflowMismatch {
            request: request.request_id.clone(),
            expected: request.workflow_name.clone(),
            actual: definition.name.clone(),
        });
    }

    if request.is_archived {
        return Err(TransitionError::Archived(request.request_id.clone()));
    }

    if definition.status(target_status_id).is_none() {
        return Err(TransitionError::UnknownStatus {
            workflow: definition.name.clone(),
            status_id: target_status_id.to_string(),
        });
    }

    Ok(HistoryEntry {
        status: target_status_id.to_string(),
        user: actor.clone(),
        timestamp: Utc::now(),
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use riva_models::{StatusDef, WorkflowRequest};
    use uuid::Uuid;

    fn definition() -> WorkflowDefinition {
        WorkflowDefinition::new(
            "Reembolso".into(),
            "financeiro".into(),
            "owner@riva.com".into(),
            vec![
                StatusDef { id: "em-aberto".into(), label: "Em Aberto".into(), terminal: None },
                StatusDef { id: "em-analise".into(), label: "Em Análise".into(), terminal: None },
                StatusDef { id: "finalizado".into(), label: "Finalizado".into(), terminal: None },
            ],
        )
    }

    fn request(def: &WorkflowDefinition) -> WorkflowRequest {
        WorkflowRequest::new(
            def,
            &[],
            UserRef { id: Uuid::new_v4(), name: "Ana".into() },
            "REQ-0001".into(),
        )
        .unwrap()
    }

    fn collaborator(name: &str, email: &str) -> Collaborator {
        Collaborator::new(name.into(), email.into(), "financeiro".into())
    }

    #[test]
    fn test_transition_keeps_status_equal_to_last_history_entry() {
        let def = definition();
        let mut req = request(&def);
        let actor = UserRef { id: Uuid::new_v4(), name: "Bruno".into() };

        let entry = prepare_transition(&def, &req, "em-analise", &actor, None).unwrap();
        req.apply_transition(entry, None);
        assert_eq!(Some(req.status.as_str()), req.last_history_status());

        let entry = prepare_transition(&def, &req, "finalizado", &actor, Some("ok".into())).unwrap();
        req.apply_transition(entry, None);
        assert_eq!(req.status, "finalizado");
        assert_eq!(Some(req.status.as_str()), req.last_history_status());
        assert_eq!(req.history.len(), 3);
    }

    #[test]
    fn test_unknown_target_status_is_rejected() {
        let def = definition();
        let req = request(&def);
        let actor = UserRef { id: Uuid::new_v4(), name: "Bruno".into() };

        let err = prepare_transition(&def, &req, "inexistente", &actor, None).unwrap_err();
        assert!(matches!(err, TransitionError::UnknownStatus { .. }));
    }

    #[test]
    fn test_archived_requests_cannot_move() {
        let def = definition();
        let mut req = request(&def);
        req.is_archived = true;
        let actor = UserRef { id: Uuid::new_v4(), name: "Bruno".into() };

        let err = prepare_transition(&def, &req, "em-analise", &actor, None).unwrap_err();
        assert_eq!(err, TransitionError::Archived("REQ-0001".into()));
    }

    #[test]
    fn test_no_transition_table_regressions_are_allowed() {
        let def = definition();
        let mut req = request(&def);
        let actor = UserRef { id: Uuid::new_v4(), name: "Bruno".into() };

        let entry = prepare_transition(&def, &req, "finalizado", &actor, None).unwrap();
        req.apply_transition(entry, None);

        // Moving back out of a terminal status is permitted.
        let entry = prepare_transition(&def, &req, "em-aberto", &actor, None).unwrap();
        req.apply_transition(entry, None);
        assert_eq!(req.status, "em-aberto");
    }

    #[test]
    fn test_authorization_accepts_assignee_owner_and_managers() {
        let def = definition();
        let mut req = request(&def);

        let assignee = collaborator("Carla", "carla@riva.com");
        req.assignee = Some(UserRef { id: assignee.id, name: assignee.name.clone() });
        assert!(authorize_actor(&def, &req, &assignee).is_ok());

        let owner = collaborator("Dono", "owner@riva.com");
        assert!(authorize_actor(&def, &req, &owner).is_ok());

        let mut manager = collaborator("Gestora", "gestora@riva.com");
        manager.permissions.can_manage_requests = true;
        assert!(authorize_actor(&def, &req, &manager).is_ok());

        let outsider = collaborator("Visitante", "visitante@riva.com");
        let err = authorize_actor(&def, &req, &outsider).unwrap_err();
        assert_eq!(err, TransitionError::NotAuthorized("Visitante".into()));
    }
}
