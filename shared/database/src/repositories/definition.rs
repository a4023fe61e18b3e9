//! Workflow Definition Repository
//!
//! CRUD operations for workflow definitions.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use riva_models::WorkflowDefinition;

#[derive(Clone)]
pub struct DefinitionRepository {
    pool: PgPool,
}

impl DefinitionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find definition by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkflowDefinition>> {
        let row: Option<DefinitionRow> = sqlx::query_as(
            r#"
            SELECT id, name, icon, area_id, owner_email, fields, statuses,
                   routing_rules, sla_rules, default_sla_days, allowed_user_ids,
                   created_at, updated_at
            FROM workflow_definitions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch workflow definition by ID")?;

        Ok(row.map(|r| r.into()))
    }

    /// Find definition by its unique name. Requests link to definitions by
    /// name, so this is the lookup the transition path uses.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<WorkflowDefinition>> {
        let row: Option<DefinitionRow> = sqlx::query_as(
            r#"
            SELECT id, name, icon, area_id, owner_email, fields, statuses,
                   routing_rules, sla_rules, default_sla_days, allowed_user_ids,
                   created_at, updated_at
            FROM workflow_definitions
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch workflow definition by name")?;

        Ok(row.map(|r| r.into()))
    }

    /// List all definitions
    pub async fn list(&self) -> Result<Vec<WorkflowDefinition>> {
        let rows: Vec<DefinitionRow> = sqlx::query_as(
            r#"
            SELECT id, name, icon, area_id, owner_email, fields, statuses,
                   routing_rules, sla_rules, default_sla_days, allowed_user_ids,
                   created_at, updated_at
            FROM workflow_definitions
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list workflow definitions")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Create new definition
    pub async fn create(&self, definition: &WorkflowDefinition) -> Result<WorkflowDefinition> {
        let row: DefinitionRow = sqlx::query_as(
            r#"
            INSERT INTO workflow_definitions
                (id, name, icon, area_id, owner_email, fields, statuses,
                 routing_rules, sla_rules, default_sla_days, allowed_user_ids,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, name, icon, area_id, owner_email, fields, statuses,
                      routing_rules, sla_rules, default_sla_days, allowed_user_ids,
                      created_at, updated_at
            "#,
        )
        .bind(definition.id)
        .bind(&definition.name)
        .bind(&definition.icon)
        .bind(&definition.area_id)
        .bind(&definition.owner_email)
        .bind(serde_json::to_value(&definition.fields)?)
        .bind(serde_json::to_value(&definition.statuses)?)
        .bind(serde_json::to_value(&definition.routing_rules)?)
        .bind(serde_json::to_value(&definition.sla_rules)?)
        .bind(definition.default_sla_days)
        .bind(serde_json::to_value(&definition.allowed_user_ids)?)
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create workflow definition")?;

        Ok(row.into())
    }

    /// Replace a definition's mutable fields
    pub async fn update(&self, definition: &WorkflowDefinition) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_definitions
            SET name = $2, icon = $3, area_id = $4, owner_email = $5,
                fields = $6, statuses = $7, routing_rules = $8, sla_rules = $9,
                default_sla_days = $10, allowed_user_ids = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(definition.id)
        .bind(&definition.name)
        .bind(&definition.icon)
        .bind(&definition.area_id)
        .bind(&definition.owner_email)
        .bind(serde_json::to_value(&definition.fields)?)
        .bind(serde_json::to_value(&definition.statuses)?)
        .bind(serde_json::to_value(&definition.routing_rules)?)
        .bind(serde_json::to_value(&definition.sla_rules)?)
        .bind(definition.default_sla_days)
        .bind(serde_json::to_value(&definition.allowed_user_ids)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to update workflow definition")?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a definition. Requests created from it are left in place.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflow_definitions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete workflow definition")?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct DefinitionRow {
    id: Uuid,
    name: String,
    icon: String,
    area_id: String,
    owner_email: String,
    fields: serde_json::Value,
    statuses: serde_json::Value,
    routing_rules: serde_json::Value,
    sla_rules: serde_json::Value,
    default_sla_days: i64,
    allowed_user_ids: serde_json::Value,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<DefinitionRow> for WorkflowDefinition {
    fn from(row: DefinitionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            icon: row.icon,
            area_id: row.area_id,
            owner_email: row.owner_email,
            fields: serde_json::from_value(row.fields).unwrap_or_default(),
            statuses: serde_json::from_value(row.statuses).unwrap_or_default(),
            routing_rules: serde_json::from_value(row.routing_rules).unwrap_or_default(),
            sla_rules: serde_json::from_value(row.sla_rules).unwrap_or_default(),
            default_sla_days: row.default_sla_days,
            allowed_user_ids: serde_json::from_value(row.allowed_user_ids).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
