//! RIVA Connect Workflow Engine Service
//!
//! Manages workflow definitions and requests: submission, status
//! transitions, action requests, archiving, and live change notifications.

use std::convert::Infallible;
use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, Method, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use riva_database::{initialize_database, DatabaseConfig, RequestFilter};
use riva_models::{
    Collaborator, FormField, PermissionSet, RoutingRule, SlaRule, StatusDef, UserRef,
    WorkflowDefinition, WorkflowRequest, ALL_USERS,
};
use riva_utils::{init_logging, parse_missions_csv, AppConfig, MissionImport, RivaError};

mod routing;
mod service;
mod transition;

use service::WorkflowEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().unwrap_or_else(|_| {
        eprintln!("Failed to load configuration, using defaults");
        AppConfig::default()
    });

    init_logging(&config.logging)?;
    info!("Starting RIVA Connect Workflow Engine");

    let db_config = DatabaseConfig {
        postgres_url: config.database.postgres_url.clone(),
        max_connections: config.database.max_connections,
        connection_timeout: std::time::Duration::from_secs(
            config.database.connection_timeout_seconds,
        ),
    };
    let pool = initialize_database(&db_config).await?;
    info!("Database connection established");

    let engine = WorkflowEngine::new(pool, &config.workflow);

    let app = Router::new()
        .route("/health", get(health_check))
        // Definitions
        .route("/api/v1/definitions", post(create_definition))
        .route("/api/v1/definitions", get(list_definitions))
        .route("/api/v1/definitions/import", post(import_definition))
        .route("/api/v1/definitions/:id", get(get_definition))
        .route("/api/v1/definitions/:id", put(update_definition))
        .route("/api/v1/definitions/:id", delete(delete_definition))
        .route("/api/v1/definitions/:id/export", get(export_definition))
        // Requests
        .route("/api/v1/requests", post(submit_request))
        .route("/api/v1/requests", get(list_requests))
        .route("/api/v1/requests/:id", get(get_request))
        .route("/api/v1/requests/:id/transition", post(transition_request))
        .route("/api/v1/requests/:id/archive", post(archive_request))
        .route("/api/v1/requests/:id/action-requests", post(create_action_requests))
        .route(
            "/api/v1/requests/:id/action-requests/resolve",
            post(resolve_action_request),
        )
        // Tasks and live updates
        .route("/api/v1/tasks/:user_id", get(my_tasks))
        .route("/api/v1/events", get(request_events))
        // Collaborators
        .route("/api/v1/collaborators", post(create_collaborator))
        .route("/api/v1/collaborators", get(list_collaborators))
        // Gamification imports
        .route("/api/v1/missions/import", post(import_missions))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
                )
                .layer(DefaultBodyLimit::max(config.server.max_request_size)),
        )
        .with_state(engine);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(&addr).await?;
    info!("Workflow Engine listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "workflow-engine",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn error_response(error: RivaError) -> (StatusCode, String) {
    let status = StatusCode::from_u16(error.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, error.to_string())
}

// ===== Definition Endpoints =====

#[derive(Debug, Deserialize)]
pub struct CreateDefinitionRequest {
    pub actor_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    pub area_id: String,
    pub owner_email: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
    pub statuses: Vec<StatusDef>,
    #[serde(default)]
    pub routing_rules: Vec<RoutingRule>,
    #[serde(default)]
    pub sla_rules: Vec<SlaRule>,
    pub default_sla_days: i64,
    #[serde(default)]
    pub allowed_user_ids: Vec<String>,
}

impl CreateDefinitionRequest {
    fn into_definition(self) -> WorkflowDefinition {
        let mut definition = WorkflowDefinition::new(
            self.name,
            self.area_id,
            self.owner_email,
            self.statuses,
        );
        definition.icon = self.icon;
        definition.fields = self.fields;
        definition.routing_rules = self.routing_rules;
        definition.sla_rules = self.sla_rules;
        definition.default_sla_days = self.default_sla_days;
        definition.allowed_user_ids = if self.allowed_user_ids.is_empty() {
            vec![ALL_USERS.to_string()]
        } else {
            self.allowed_user_ids
        };
        definition
    }
}

async fn create_definition(
    State(engine): State<WorkflowEngine>,
    Json(request): Json<CreateDefinitionRequest>,
) -> Result<Json<WorkflowDefinition>, (StatusCode, String)> {
    let actor_id = request.actor_id;
    let definition = engine
        .create_definition(request.into_definition(), actor_id)
        .await
        .map_err(error_response)?;

    Ok(Json(definition))
}

async fn list_definitions(
    State(engine): State<WorkflowEngine>,
) -> Result<Json<Vec<WorkflowDefinition>>, (StatusCode, String)> {
    let definitions = engine.list_definitions().await.map_err(error_response)?;
    Ok(Json(definitions))
}

async fn get_definition(
    State(engine): State<WorkflowEngine>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowDefinition>, (StatusCode, String)> {
    let definition = engine.get_definition(id).await.map_err(error_response)?;
    Ok(Json(definition))
}

async fn update_definition(
    State(engine): State<WorkflowEngine>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateDefinitionRequest>,
) -> Result<Json<WorkflowDefinition>, (StatusCode, String)> {
    let actor_id = request.actor_id;
    let mut definition = request.into_definition();
    definition.id = id;

    let updated = engine
        .update_definition(definition, actor_id)
        .await
        .map_err(error_response)?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct DeleteDefinitionQuery {
    pub actor_id: Uuid,
    #[serde(default)]
    pub confirm: bool,
}

async fn delete_definition(
    State(engine): State<WorkflowEngine>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteDefinitionQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    // Destructive call: the client must confirm explicitly.
    if !query.confirm {
        return Err((
            StatusCode::BAD_REQUEST,
            "Definition deletion requires confirm=true".to_string(),
        ));
    }

    engine
        .delete_definition(id, query.actor_id)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
pub struct ImportDefinitionRequest {
    pub actor_id: Uuid,
    /// Raw definition JSON document, exactly as exported.
    pub document: serde_json::Value,
}

async fn import_definition(
    State(engine): State<WorkflowEngine>,
    Json(request): Json<ImportDefinitionRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let (definition, warnings) = engine
        .import_definition_json(&request.document.to_string(), request.actor_id)
        .await
        .map_err(error_response)?;

    Ok(Json(serde_json::json!({
        "definition": definition,
        "warnings": warnings,
    })))
}

async fn export_definition(
    State(engine): State<WorkflowEngine>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let document = engine
        .export_definition_json(id)
        .await
        .map_err(error_response)?;
    Ok(Json(document))
}

// ===== Request Endpoints =====

#[derive(Debug, Deserialize)]
pub struct SubmitRequestRequest {
    pub definition_id: Uuid,
    /// Form values aligned with the definition's field order.
    pub values: Vec<serde_json::Value>,
    pub submitted_by: UserRef,
}

async fn submit_request(
    State(engine): State<WorkflowEngine>,
    Json(request): Json<SubmitRequestRequest>,
) -> Result<Json<WorkflowRequest>, (StatusCode, String)> {
    let created = engine
        .submit_request(request.definition_id, &request.values, request.submitted_by)
        .await
        .map_err(error_response)?;
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    pub workflow: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

async fn list_requests(
    State(engine): State<WorkflowEngine>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<WorkflowRequest>>, (StatusCode, String)> {
    let filter = RequestFilter {
        workflow_name: query.workflow,
        status: query.status,
        include_archived: query.include_archived,
    };
    let requests = engine.list_requests(&filter).await.map_err(error_response)?;
    Ok(Json(requests))
}

async fn get_request(
    State(engine): State<WorkflowEngine>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowRequest>, (StatusCode, String)> {
    let request = engine.get_request(id).await.map_err(error_response)?;
    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequestRequest {
    pub actor_id: Uuid,
    pub target_status: String,
    pub notes: Option<String>,
    pub assignee: Option<UserRef>,
}

async fn transition_request(
    State(engine): State<WorkflowEngine>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequestRequest>,
) -> Result<Json<WorkflowRequest>, (StatusCode, String)> {
    let updated = engine
        .transition_request(
            id,
            &request.target_status,
            request.actor_id,
            request.notes,
            request.assignee,
        )
        .await
        .map_err(error_response)?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct ArchiveRequestRequest {
    pub actor_id: Uuid,
    #[serde(default = "default_archived")]
    pub archived: bool,
}

fn default_archived() -> bool {
    true
}

async fn archive_request(
    State(engine): State<WorkflowEngine>,
    Path(id): Path<Uuid>,
    Json(request): Json<ArchiveRequestRequest>,
) -> Result<Json<WorkflowRequest>, (StatusCode, String)> {
    let updated = engine
        .archive_request(id, request.actor_id, request.archived)
        .await
        .map_err(error_response)?;
    Ok(Json(updated))
}

// ===== Action Request Endpoints =====

#[derive(Debug, Deserialize)]
pub struct CreateActionRequestsRequest {
    pub actor_id: Uuid,
    pub status_id: String,
    pub users: Vec<UserRef>,
}

async fn create_action_requests(
    State(engine): State<WorkflowEngine>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateActionRequestsRequest>,
) -> Result<Json<WorkflowRequest>, (StatusCode, String)> {
    let updated = engine
        .request_actions(id, &request.status_id, request.users, request.actor_id)
        .await
        .map_err(error_response)?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct ResolveActionRequestRequest {
    pub actor_id: Uuid,
    pub status_id: String,
    pub user_id: Uuid,
    pub approve: bool,
}

async fn resolve_action_request(
    State(engine): State<WorkflowEngine>,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveActionRequestRequest>,
) -> Result<Json<WorkflowRequest>, (StatusCode, String)> {
    let updated = engine
        .resolve_action(
            id,
            &request.status_id,
            request.user_id,
            request.approve,
            request.actor_id,
        )
        .await
        .map_err(error_response)?;
    Ok(Json(updated))
}

async fn my_tasks(
    State(engine): State<WorkflowEngine>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<WorkflowRequest>>, (StatusCode, String)> {
    let tasks = engine.my_tasks(user_id).await.map_err(error_response)?;
    Ok(Json(tasks))
}

// ===== Live Updates =====

async fn request_events(
    State(engine): State<WorkflowEngine>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(engine.subscribe()).filter_map(|message| {
        message
            .ok()
            .and_then(|event| Event::default().json_data(&event).ok())
            .map(Ok::<_, Infallible>)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ===== Collaborator Endpoints =====

#[derive(Debug, Deserialize)]
pub struct CreateCollaboratorRequest {
    pub name: String,
    pub email: String,
    pub area_id: String,
    #[serde(default)]
    pub permissions: PermissionSet,
}

async fn create_collaborator(
    State(engine): State<WorkflowEngine>,
    Json(request): Json<CreateCollaboratorRequest>,
) -> Result<Json<Collaborator>, (StatusCode, String)> {
    let mut collaborator = Collaborator::new(request.name, request.email, request.area_id);
    collaborator.permissions = request.permissions;

    let created = engine
        .create_collaborator(collaborator)
        .await
        .map_err(error_response)?;
    Ok(Json(created))
}

async fn list_collaborators(
    State(engine): State<WorkflowEngine>,
) -> Result<Json<Vec<Collaborator>>, (StatusCode, String)> {
    let collaborators = engine.list_collaborators().await.map_err(error_response)?;
    Ok(Json(collaborators))
}

// ===== Mission Import =====

async fn import_missions(body: String) -> Result<Json<MissionImport>, (StatusCode, String)> {
    let import = parse_missions_csv(body.as_bytes())
        .map_err(|e| error_response(RivaError::from(e)))?;
    Ok(Json(import))
}
