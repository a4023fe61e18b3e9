//! Audit Log Repository
//!
//! Append-only persistence for the hash-chained audit log. Appends take an
//! advisory transaction lock so two writers can never chain onto the same
//! predecessor.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use riva_models::{AuditAction, AuditEntry};

// Advisory lock key for audit appends, arbitrary but stable.
const AUDIT_APPEND_LOCK: i64 = 0x52495641;

/// Filters for audit listings.
#[derive(Debug, Default, Clone)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub action: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an entry chained onto the current tail of the log.
    pub async fn append(
        &self,
        action: AuditAction,
        entity_type: &str,
        entity_id: Uuid,
        user_id: Option<Uuid>,
        details: serde_json::Value,
    ) -> Result<AuditEntry> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(AUDIT_APPEND_LOCK)
            .execute(&mut *tx)
            .await
            .context("Failed to acquire audit append lock")?;

        let previous_hash: Option<(String,)> =
            sqlx::query_as("SELECT hash FROM audit_log ORDER BY seq DESC LIMIT 1")
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to read audit chain tail")?;

        let entry = AuditEntry::chained(
            action,
            entity_type,
            entity_id,
            user_id,
            details,
            previous_hash.map(|(hash,)| hash),
        );

        sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, timestamp, action, entity_type, entity_id, user_id,
                 details, hash, previous_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.timestamp)
        .bind(entry.action.to_string())
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.user_id)
        .bind(&entry.details)
        .bind(&entry.hash)
        .bind(&entry.previous_hash)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to append audit entry")?;

        tx.commit().await?;
        Ok(entry)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AuditEntry>> {
        let row: Option<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, timestamp, action, entity_type, entity_id, user_id,
                   details, hash, previous_hash, created_at
            FROM audit_log
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch audit entry by ID")?;

        Ok(row.and_then(|r| r.try_into().ok()))
    }

    /// List entries, newest first.
    pub async fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, timestamp, action, entity_type, entity_id, user_id,
                   details, hash, previous_hash, created_at
            FROM audit_log
            WHERE ($1::varchar IS NULL OR entity_type = $1)
              AND ($2::varchar IS NULL OR action = $2)
            ORDER BY seq DESC
            LIMIT $3
            "#,
        )
        .bind(&filter.entity_type)
        .bind(&filter.action)
        .bind(filter.limit.unwrap_or(100))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list audit entries")?;

        Ok(rows.into_iter().filter_map(|r| r.try_into().ok()).collect())
    }

    /// Trail for one entity, oldest first.
    pub async fn for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, timestamp, action, entity_type, entity_id, user_id,
                   details, hash, previous_hash, created_at
            FROM audit_log
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY seq ASC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch entity audit trail")?;

        Ok(rows.into_iter().filter_map(|r| r.try_into().ok()).collect())
    }

    /// The whole chain, oldest first, for verification and export.
    pub async fn all_in_chain_order(&self) -> Result<Vec<AuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, timestamp, action, entity_type, entity_id, user_id,
                   details, hash, previous_hash, created_at
            FROM audit_log
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch audit chain")?;

        Ok(rows.into_iter().filter_map(|r| r.try_into().ok()).collect())
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    timestamp: DateTime<Utc>,
    action: String,
    entity_type: String,
    entity_id: Uuid,
    user_id: Option<Uuid>,
    details: serde_json::Value,
    hash: String,
    previous_hash: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = anyhow::Error;

    fn try_from(row: AuditRow) -> Result<Self> {
        let action = parse_action(&row.action)
            .with_context(|| format!("Unknown audit action '{}'", row.action))?;

        Ok(Self {
            id: row.id,
            timestamp: row.timestamp,
            action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            user_id: row.user_id,
            details: row.details,
            hash: row.hash,
            previous_hash: row.previous_hash,
            created_at: row.created_at,
        })
    }
}

fn parse_action(value: &str) -> Option<AuditAction> {
    match value {
        "definition_created" => Some(AuditAction::DefinitionCreated),
        "definition_updated" => Some(AuditAction::DefinitionUpdated),
        "definition_deleted" => Some(AuditAction::DefinitionDeleted),
        "definition_imported" => Some(AuditAction::DefinitionImported),
        "request_submitted" => Some(AuditAction::RequestSubmitted),
        "status_changed" => Some(AuditAction::StatusChanged),
        "request_archived" => Some(AuditAction::RequestArchived),
        "action_request_created" => Some(AuditAction::ActionRequestCreated),
        "action_request_resolved" => Some(AuditAction::ActionRequestResolved),
        "collaborator_created" => Some(AuditAction::CollaboratorCreated),
        _ => None,
    }
}
