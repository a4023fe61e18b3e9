//! RIVA Connect Audit Trail Service
//!
//! Read and verify the hash-chained audit log the workflow engine writes.
//! Entries are immutable; this service only lists, verifies, and exports.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use riva_database::{initialize_database, AuditFilter, AuditRepository, DatabaseConfig};
use riva_models::{verify_chain, AuditEntry};
use riva_utils::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    info!("Starting RIVA Connect Audit Trail Service");

    let config = AppConfig::load().unwrap_or_else(|_| AppConfig::default());
    let db_config = DatabaseConfig {
        postgres_url: config.database.postgres_url.clone(),
        max_connections: config.database.max_connections,
        connection_timeout: std::time::Duration::from_secs(
            config.database.connection_timeout_seconds,
        ),
    };
    let pool = initialize_database(&db_config).await?;

    let repository = AuditRepository::new(pool);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/audit", get(list_audit_entries))
        .route("/api/v1/audit/verify", post(verify_audit_chain))
        .route("/api/v1/audit/export", get(export_audit_trail))
        .route("/api/v1/audit/:id", get(get_audit_entry))
        .route(
            "/api/v1/audit/entity/:entity_type/:entity_id",
            get(get_entity_audit_trail),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(repository);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8083));
    let listener = TcpListener::bind(&addr).await?;
    info!("Audit Trail Service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "audit-trail",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ===== Listing =====

#[derive(Debug, Deserialize)]
pub struct ListAuditQuery {
    pub entity_type: Option<String>,
    pub action: Option<String>,
    pub limit: Option<i64>,
}

async fn list_audit_entries(
    State(repository): State<AuditRepository>,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, (StatusCode, String)> {
    let filter = AuditFilter {
        entity_type: query.entity_type,
        action: query.action,
        limit: query.limit,
    };
    let entries = repository
        .list(&filter)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(entries))
}

async fn get_audit_entry(
    State(repository): State<AuditRepository>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditEntry>, (StatusCode, String)> {
    let entry = repository
        .find_by_id(id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Audit entry not found".to_string()))?;
    Ok(Json(entry))
}

async fn get_entity_audit_trail(
    State(repository): State<AuditRepository>,
    Path((entity_type, entity_id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<AuditEntry>>, (StatusCode, String)> {
    let entries = repository
        .for_entity(&entity_type, entity_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(entries))
}

// ===== Verification =====

#[derive(Debug, Serialize)]
pub struct VerifyChainResponse {
    pub valid: bool,
    pub checked: usize,
    pub first_invalid_index: Option<usize>,
    pub first_invalid_id: Option<Uuid>,
}

async fn verify_audit_chain(
    State(repository): State<AuditRepository>,
) -> Result<Json<VerifyChainResponse>, (StatusCode, String)> {
    let entries = repository
        .all_in_chain_order()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let response = match verify_chain(&entries) {
        Ok(()) => VerifyChainResponse {
            valid: true,
            checked: entries.len(),
            first_invalid_index: None,
            first_invalid_id: None,
        },
        Err(index) => VerifyChainResponse {
            valid: false,
            checked: entries.len(),
            first_invalid_index: Some(index),
            first_invalid_id: entries.get(index).map(|e| e.id),
        },
    };

    Ok(Json(response))
}

// ===== Export =====

async fn export_audit_trail(
    State(repository): State<AuditRepository>,
) -> Result<Response, (StatusCode, String)> {
    let entries = repository
        .all_in_chain_order()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let csv = render_csv(&entries)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        csv,
    )
        .into_response())
}

fn render_csv(entries: &[AuditEntry]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "timestamp",
        "action",
        "entity_type",
        "entity_id",
        "user_id",
        "details",
        "hash",
        "previous_hash",
    ])?;

    for entry in entries {
        writer.write_record([
            entry.id.to_string(),
            entry.timestamp.to_rfc3339(),
            entry.action.to_string(),
            entry.entity_type.clone(),
            entry.entity_id.to_string(),
            entry
                .user_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            entry.details.to_string(),
            entry.hash.clone(),
            entry.previous_hash.clone().unwrap_or_default(),
        ])?;
    }

    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riva_models::AuditAction;

    #[test]
    fn test_csv_export_includes_all_entries() {
        let first = AuditEntry::chained(
            AuditAction::RequestSubmitted,
            "workflow_request",
            Uuid::new_v4(),
            None,
            serde_json::json!({ "request_id": "REQ-0001" }),
            None,
        );
        let second = AuditEntry::chained(
            AuditAction::StatusChanged,
            "workflow_request",
            first.entity_id,
            None,
            serde_json::json!({ "from": "em-aberto", "to": "finalizado" }),
            Some(first.hash.clone()),
        );

        let csv = render_csv(&[first.clone(), second.clone()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,timestamp,action"));
        assert!(lines[1].contains("request_submitted"));
        assert!(lines[2].contains(&first.hash));
    }
}
