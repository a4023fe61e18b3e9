//! RIVA Connect Analytics Service
//!
//! Read-only dashboard derivations over workflow requests: status buckets,
//! resolution time against SLA, and per-status dwell time.

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use riva_database::{initialize_database, DatabaseConfig};
use riva_utils::{AppConfig, RivaError};

mod business_days;
mod classify;
mod service;
mod sla;

use service::{AnalyticsService, DwellReport, SummaryReport, WorkflowResolutionReport};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    info!("Starting RIVA Connect Analytics Service");

    let config = AppConfig::load().unwrap_or_else(|_| AppConfig::default());
    let db_config = DatabaseConfig {
        postgres_url: config.database.postgres_url.clone(),
        max_connections: config.database.max_connections,
        connection_timeout: std::time::Duration::from_secs(
            config.database.connection_timeout_seconds,
        ),
    };
    let pool = initialize_database(&db_config).await?;

    let service = AnalyticsService::new(pool);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/analytics/summary", get(get_summary))
        .route("/api/v1/analytics/resolution", get(get_resolution))
        .route("/api/v1/analytics/status-durations", get(get_status_durations))
        .layer(TraceLayer::new_for_http())
        .with_state(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8082));
    let listener = TcpListener::bind(&addr).await?;
    info!("Analytics Service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "analytics",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn error_response(error: RivaError) -> (StatusCode, String) {
    let status = StatusCode::from_u16(error.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, error.to_string())
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub workflow: Option<String>,
}

async fn get_summary(
    State(service): State<AnalyticsService>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<SummaryReport>, (StatusCode, String)> {
    let report = service
        .summary(query.workflow)
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}

async fn get_resolution(
    State(service): State<AnalyticsService>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<WorkflowResolutionReport>>, (StatusCode, String)> {
    let report = service
        .resolution_report(query.workflow)
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}

async fn get_status_durations(
    State(service): State<AnalyticsService>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<DwellReport>, (StatusCode, String)> {
    let report = service
        .dwell_report(query.workflow)
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}
