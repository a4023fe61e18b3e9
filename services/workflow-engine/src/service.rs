//! Workflow Engine Service
//!
//! Orchestrates definitions, requests, action requests, and the audit
//! trail over the shared repositories. Every mutation publishes a
//! [`RequestEvent`] on the in-process broadcast channel; the SSE endpoint
//! replays those events to connected clients.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use riva_database::{
    AuditRepository, CollaboratorRepository, DefinitionRepository, PostgresPool, RequestFilter,
    RequestRepository,
};
use riva_models::{
    ActionRequest, ActionRequestState, AuditAction, Collaborator, UserRef, WorkflowDefinition,
    WorkflowRequest,
};
use riva_utils::{
    export_definition, import_definition, validate_model, DefinitionImport, RivaError, RivaResult,
    WorkflowConfig,
};

use crate::routing::evaluate_routing;
use crate::transition::{authorize_actor, prepare_transition, TransitionError};

/// Change notification published after every request mutation.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEvent {
    pub kind: RequestEventKind,
    pub request_id: Uuid,
    pub workflow_name: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestEventKind {
    Submitted,
    StatusChanged,
    Archived,
    ActionRequested,
    ActionResolved,
}

#[derive(Clone)]
pub struct WorkflowEngine {
    definitions: DefinitionRepository,
    requests: RequestRepository,
    collaborators: CollaboratorRepository,
    audit: AuditRepository,
    events: broadcast::Sender<RequestEvent>,
    request_id_prefix: String,
}

impl WorkflowEngine {
    pub fn new(pool: PostgresPool, config: &WorkflowConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        Self {
            definitions: DefinitionRepository::new(pool.clone()),
            requests: RequestRepository::new(pool.clone()),
            collaborators: CollaboratorRepository::new(pool.clone()),
            audit: AuditRepository::new(pool),
            events,
            request_id_prefix: config.request_id_prefix.clone(),
        }
    }

    /// Subscribe to request change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RequestEvent> {
        self.events.subscribe()
    }

    // ===== Definitions =====

    pub async fn create_definition(
        &self,
        definition: WorkflowDefinition,
        actor_id: Uuid,
    ) -> RivaResult<WorkflowDefinition> {
        let actor = self.require_collaborator(actor_id).await?;
        self.require_definition_management(&actor)?;
        validate_model(&definition)?;

        if self.definitions.find_by_name(&definition.name).await?.is_some() {
            return Err(RivaError::conflict(format!(
                "A workflow named '{}' already exists",
                definition.name
            )));
        }

        let created = self.definitions.create(&definition).await?;
        self.record_audit(
            AuditAction::DefinitionCreated,
            "workflow_definition",
            created.id,
            Some(actor_id),
            serde_json::json!({ "name": created.name }),
        )
        .await;

        tracing::info!(definition = %created.name, "Workflow definition created");
        Ok(created)
    }

    pub async fn import_definition_json(
        &self,
        json: &str,
        actor_id: Uuid,
    ) -> RivaResult<(WorkflowDefinition, Vec<String>)> {
        let actor = self.require_collaborator(actor_id).await?;
        self.require_definition_management(&actor)?;

        let DefinitionImport {
            definition,
            warnings,
        } = import_definition(json).map_err(RivaError::from)?;

        if self.definitions.find_by_name(&definition.name).await?.is_some() {
            return Err(RivaError::conflict(format!(
                "A workflow named '{}' already exists",
                definition.name
            )));
        }

        let created = self.definitions.create(&definition).await?;
        self.record_audit(
            AuditAction::DefinitionImported,
            "workflow_definition",
            created.id,
            Some(actor_id),
            serde_json::json!({ "name": created.name, "warnings": warnings }),
        )
        .await;

        Ok((created, warnings))
    }

    pub async fn export_definition_json(&self, id: Uuid) -> RivaResult<serde_json::Value> {
        let definition = self
            .definitions
            .find_by_id(id)
            .await?
            .ok_or_else(|| RivaError::not_found("workflow definition"))?;
        Ok(export_definition(&definition))
    }

    pub async fn list_definitions(&self) -> RivaResult<Vec<WorkflowDefinition>> {
        Ok(self.definitions.list().await?)
    }

    pub async fn get_definition(&self, id: Uuid) -> RivaResult<WorkflowDefinition> {
        self.definitions
            .find_by_id(id)
            .await?
            .ok_or_else(|| RivaError::not_found("workflow definition"))
    }

    pub async fn update_definition(
        &self,
        definition: WorkflowDefinition,
        actor_id: Uuid,
    ) -> RivaResult<WorkflowDefinition> {
        let actor = self.require_collaborator(actor_id).await?;
        self.require_definition_management(&actor)?;
        validate_model(&definition)?;

        if !self.definitions.update(&definition).await? {
            return Err(RivaError::not_found("workflow definition"));
        }

        self.record_audit(
            AuditAction::DefinitionUpdated,
            "workflow_definition",
            definition.id,
            Some(actor_id),
            serde_json::json!({ "name": definition.name }),
        )
        .await;

        self.get_definition(definition.id).await
    }

    /// Delete a definition. Its requests remain; no new ones can be created.
    pub async fn delete_definition(&self, id: Uuid, actor_id: Uuid) -> RivaResult<()> {
        let actor = self.require_collaborator(actor_id).await?;
        self.require_definition_management(&actor)?;

        let definition = self.get_definition(id).await?;
        if !self.definitions.delete(id).await? {
            return Err(RivaError::not_found("workflow definition"));
        }

        self.record_audit(
            AuditAction::DefinitionDeleted,
            "workflow_definition",
            id,
            Some(actor_id),
            serde_json::json!({ "name": definition.name }),
        )
        .await;

        tracing::info!(definition = %definition.name, "Workflow definition deleted, requests orphaned");
        Ok(())
    }

    // ===== Requests =====

    pub async fn submit_request(
        &self,
        definition_id: Uuid,
        values: &[serde_json::Value],
        submitted_by: UserRef,
    ) -> RivaResult<WorkflowRequest> {
        let definition = self.get_definition(definition_id).await?;

        if !definition.allows_user(submitted_by.id) {
            return Err(RivaError::authorization(format!(
                "Collaborator '{}' may not submit '{}' requests",
                submitted_by.name, definition.name
            )));
        }

        let request_id = self.next_request_id();
        let mut request = WorkflowRequest::new(&definition, values, submitted_by, request_id)
            .map_err(|e| RivaError::validation("form", e.to_string()))?;

        if let Some(assignee) = evaluate_routing(&definition.routing_rules, &request.form_data) {
            request.assignee = Some(assignee);
        }

        let created = self.requests.create(&request).await?;
        self.record_audit(
            AuditAction::RequestSubmitted,
            "workflow_request",
            created.id,
            Some(created.submitted_by.id),
            serde_json::json!({ "request_id": created.request_id, "workflow": created.workflow_name }),
        )
        .await;
        self.publish(RequestEventKind::Submitted, &created);

        tracing::info!(request = %created.request_id, workflow = %created.workflow_name, "Request submitted");
        Ok(created)
    }

    pub async fn get_request(&self, id: Uuid) -> RivaResult<WorkflowRequest> {
        self.requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| RivaError::not_found("workflow request"))
    }

    pub async fn list_requests(&self, filter: &RequestFilter) -> RivaResult<Vec<WorkflowRequest>> {
        Ok(self.requests.list(filter).await?)
    }

    /// Move a request to another status, optionally reassigning it in the
    /// same write.
    pub async fn transition_request(
        &self,
        id: Uuid,
        target_status_id: &str,
        actor_id: Uuid,
        notes: Option<String>,
        assignee: Option<UserRef>,
    ) -> RivaResult<WorkflowRequest> {
        let request = self.get_request(id).await?;
        let actor = self.require_collaborator(actor_id).await?;
        let definition = self
            .definitions
            .find_by_name(&request.workflow_name)
            .await?
            .ok_or_else(|| RivaError::not_found("workflow definition"))?;

        authorize_actor(&definition, &request, &actor).map_err(map_transition_error)?;

        let actor_ref = UserRef { id: actor.id, name: actor.name.clone() };
        let entry = prepare_transition(&definition, &request, target_status_id, &actor_ref, notes)
            .map_err(map_transition_error)?;

        let previous_status = request.status.clone();
        if !self.requests.apply_transition(id, &entry, assignee.as_ref()).await? {
            return Err(RivaError::not_found("workflow request"));
        }

        let updated = self.get_request(id).await?;
        self.record_audit(
            AuditAction::StatusChanged,
            "workflow_request",
            updated.id,
            Some(actor_id),
            serde_json::json!({
                "request_id": updated.request_id,
                "from": previous_status,
                "to": updated.status,
            }),
        )
        .await;
        self.publish(RequestEventKind::StatusChanged, &updated);

        tracing::info!(
            request = %updated.request_id,
            from = %previous_status,
            to = %updated.status,
            "Request transitioned"
        );
        Ok(updated)
    }

    /// Flip the archive flag. Works for orphaned requests too, so
    /// authorization here does not consult the definition.
    pub async fn archive_request(
        &self,
        id: Uuid,
        actor_id: Uuid,
        archived: bool,
    ) -> RivaResult<WorkflowRequest> {
        let request = self.get_request(id).await?;
        let actor = self.require_collaborator(actor_id).await?;

        let is_assignee = request
            .assignee
            .as_ref()
            .map(|a| a.id == actor.id)
            .unwrap_or(false);
        if !is_assignee && !actor.permissions.allows_request_management() {
            return Err(RivaError::authorization(format!(
                "Collaborator '{}' may not archive this request",
                actor.name
            )));
        }

        if !self.requests.set_archived(id, archived).await? {
            return Err(RivaError::not_found("workflow request"));
        }

        let updated = self.get_request(id).await?;
        self.record_audit(
            AuditAction::RequestArchived,
            "workflow_request",
            updated.id,
            Some(actor_id),
            serde_json::json!({ "request_id": updated.request_id, "archived": archived }),
        )
        .await;
        self.publish(RequestEventKind::Archived, &updated);
        Ok(updated)
    }

    // ===== Action requests =====

    /// Attach pending approvals for specific collaborators to a status.
    pub async fn request_actions(
        &self,
        id: Uuid,
        status_id: &str,
        users: Vec<UserRef>,
        actor_id: Uuid,
    ) -> RivaResult<WorkflowRequest> {
        let request = self.get_request(id).await?;
        let actor = self.require_collaborator(actor_id).await?;

        let is_assignee = request
            .assignee
            .as_ref()
            .map(|a| a.id == actor.id)
            .unwrap_or(false);
        if !is_assignee && !actor.permissions.allows_request_management() {
            return Err(RivaError::authorization(format!(
                "Collaborator '{}' may not request approvals here",
                actor.name
            )));
        }

        // Orphaned requests have no definition left to check the status
        // against; accept the caller's status id in that case.
        if let Some(definition) = self.definitions.find_by_name(&request.workflow_name).await? {
            if definition.status(status_id).is_none() {
                return Err(RivaError::workflow(format!(
                    "Status '{}' does not exist in workflow '{}'",
                    status_id, definition.name
                )));
            }
        }

        let now = chrono::Utc::now();
        let actions: Vec<ActionRequest> = users
            .into_iter()
            .map(|user| ActionRequest {
                user,
                state: ActionRequestState::Pending,
                requested_at: now,
                resolved_at: None,
            })
            .collect();

        if !self.requests.add_action_requests(id, status_id, &actions).await? {
            return Err(RivaError::not_found("workflow request"));
        }

        let updated = self.get_request(id).await?;
        self.record_audit(
            AuditAction::ActionRequestCreated,
            "workflow_request",
            updated.id,
            Some(actor_id),
            serde_json::json!({
                "request_id": updated.request_id,
                "status": status_id,
                "pending": actions.len(),
            }),
        )
        .await;
        self.publish(RequestEventKind::ActionRequested, &updated);
        Ok(updated)
    }

    /// Resolve one pending approval. Collaborators resolve their own tasks;
    /// request managers may resolve on someone's behalf.
    pub async fn resolve_action(
        &self,
        id: Uuid,
        status_id: &str,
        user_id: Uuid,
        approve: bool,
        actor_id: Uuid,
    ) -> RivaResult<WorkflowRequest> {
        let actor = self.require_collaborator(actor_id).await?;
        if actor_id != user_id && !actor.permissions.allows_request_management() {
            return Err(RivaError::authorization(format!(
                "Collaborator '{}' may not resolve another collaborator's task",
                actor.name
            )));
        }

        let resolved = self
            .requests
            .resolve_action_request(id, status_id, user_id, approve, chrono::Utc::now())
            .await?;
        if !resolved {
            return Err(RivaError::not_found("pending action request"));
        }

        let updated = self.get_request(id).await?;
        self.record_audit(
            AuditAction::ActionRequestResolved,
            "workflow_request",
            updated.id,
            Some(actor_id),
            serde_json::json!({
                "request_id": updated.request_id,
                "status": status_id,
                "user_id": user_id,
                "approved": approve,
            }),
        )
        .await;
        self.publish(RequestEventKind::ActionResolved, &updated);
        Ok(updated)
    }

    /// "Minhas Tarefas": live requests whose current status holds a pending
    /// approval for the collaborator.
    pub async fn my_tasks(&self, user_id: Uuid) -> RivaResult<Vec<WorkflowRequest>> {
        let requests = self.requests.list(&RequestFilter::default()).await?;
        Ok(requests
            .into_iter()
            .filter(|request| !request.pending_actions_for(user_id).is_empty())
            .collect())
    }

    // ===== Collaborators =====

    pub async fn create_collaborator(&self, collaborator: Collaborator) -> RivaResult<Collaborator> {
        validate_model(&collaborator)?;
        let created = self.collaborators.create(&collaborator).await?;
        self.record_audit(
            AuditAction::CollaboratorCreated,
            "collaborator",
            created.id,
            None,
            serde_json::json!({ "email": created.email }),
        )
        .await;
        Ok(created)
    }

    pub async fn list_collaborators(&self) -> RivaResult<Vec<Collaborator>> {
        Ok(self.collaborators.list().await?)
    }

    // ===== Internals =====

    async fn require_collaborator(&self, id: Uuid) -> RivaResult<Collaborator> {
        self.collaborators
            .find_by_id(id)
            .await?
            .ok_or_else(|| RivaError::not_found("collaborator"))
    }

    fn require_definition_management(&self, actor: &Collaborator) -> RivaResult<()> {
        if actor.permissions.allows_definition_management() {
            Ok(())
        } else {
            Err(RivaError::authorization(format!(
                "Collaborator '{}' may not manage workflow definitions",
                actor.name
            )))
        }
    }

    fn next_request_id(&self) -> String {
        let token = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}",
            self.request_id_prefix,
            token[..8].to_uppercase()
        )
    }

    async fn record_audit(
        &self,
        action: AuditAction,
        entity_type: &str,
        entity_id: Uuid,
        user_id: Option<Uuid>,
        details: serde_json::Value,
    ) {
        // The mutation already happened; a failed audit write is logged, not
        // surfaced.
        if let Err(error) = self
            .audit
            .append(action, entity_type, entity_id, user_id, details)
            .await
        {
            tracing::warn!(error = %error, action = %action, "Failed to append audit entry");
        }
    }

    fn publish(&self, kind: RequestEventKind, request: &WorkflowRequest) {
        let _ = self.events.send(RequestEvent {
            kind,
            request_id: request.id,
            workflow_name: request.workflow_name.clone(),
            status: request.status.clone(),
        });
    }
}

fn map_transition_error(error: TransitionError) -> RivaError {
    match error {
        TransitionError::NotAuthorized(name) => {
            RivaError::authorization(format!("Collaborator '{}' may not move this request", name))
        }
        TransitionError::Archived(request_id) => {
            RivaError::conflict(format!("Request {} is archived", request_id))
        }
        other => RivaError::workflow(other.to_string()),
    }
}
