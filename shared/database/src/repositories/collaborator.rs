//! Collaborator Repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use riva_models::{Collaborator, PermissionSet};

#[derive(Clone)]
pub struct CollaboratorRepository {
    pool: PgPool,
}

impl CollaboratorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Collaborator>> {
        let row: Option<CollaboratorRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, area_id, permissions, created_at, updated_at
            FROM collaborators
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch collaborator by ID")?;

        Ok(row.map(|r| r.into()))
    }

    pub async fn list(&self) -> Result<Vec<Collaborator>> {
        let rows: Vec<CollaboratorRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, area_id, permissions, created_at, updated_at
            FROM collaborators
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list collaborators")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn create(&self, collaborator: &Collaborator) -> Result<Collaborator> {
        let row: CollaboratorRow = sqlx::query_as(
            r#"
            INSERT INTO collaborators
                (id, name, email, area_id, permissions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, email, area_id, permissions, created_at, updated_at
            "#,
        )
        .bind(collaborator.id)
        .bind(&collaborator.name)
        .bind(&collaborator.email)
        .bind(&collaborator.area_id)
        .bind(serde_json::to_value(collaborator.permissions)?)
        .bind(collaborator.created_at)
        .bind(collaborator.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create collaborator")?;

        Ok(row.into())
    }
}

#[derive(Debug, FromRow)]
struct CollaboratorRow {
    id: Uuid,
    name: String,
    email: String,
    area_id: String,
    permissions: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CollaboratorRow> for Collaborator {
    fn from(row: CollaboratorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            area_id: row.area_id,
            permissions: serde_json::from_value::<PermissionSet>(row.permissions)
                .unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
