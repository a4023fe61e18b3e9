//! Workflow Request Repository
//!
//! Persistence for workflow requests. Transition writes append to the
//! history column in a single statement so concurrent transitions cannot
//! lose entries; action-request resolution runs under a row lock for the
//! same reason.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use riva_models::{ActionRequest, ActionRequestState, HistoryEntry, UserRef, WorkflowRequest};

/// Filters for request listings.
#[derive(Debug, Default, Clone)]
pub struct RequestFilter {
    pub workflow_name: Option<String>,
    pub status: Option<String>,
    pub include_archived: bool,
}

#[derive(Clone)]
pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find request by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkflowRequest>> {
        let row: Option<RequestRow> = sqlx::query_as(
            r#"
            SELECT id, request_id, workflow_name, status, form_data, submitted_by,
                   submitted_at, last_updated_at, assignee, is_archived, history,
                   action_requests
            FROM workflow_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch workflow request by ID")?;

        Ok(row.map(|r| r.into()))
    }

    /// List requests, newest submissions first
    pub async fn list(&self, filter: &RequestFilter) -> Result<Vec<WorkflowRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            r#"
            SELECT id, request_id, workflow_name, status, form_data, submitted_by,
                   submitted_at, last_updated_at, assignee, is_archived, history,
                   action_requests
            FROM workflow_requests
            WHERE ($1::varchar IS NULL OR workflow_name = $1)
              AND ($2::varchar IS NULL OR status = $2)
              AND (is_archived = FALSE OR $3)
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(&filter.workflow_name)
        .bind(&filter.status)
        .bind(filter.include_archived)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list workflow requests")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Create new request
    pub async fn create(&self, request: &WorkflowRequest) -> Result<WorkflowRequest> {
        let row: RequestRow = sqlx::query_as(
            r#"
            INSERT INTO workflow_requests
                (id, request_id, workflow_name, status, form_data, submitted_by,
                 submitted_at, last_updated_at, assignee, is_archived, history,
                 action_requests)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, request_id, workflow_name, status, form_data, submitted_by,
                      submitted_at, last_updated_at, assignee, is_archived, history,
                      action_requests
            "#,
        )
        .bind(request.id)
        .bind(&request.request_id)
        .bind(&request.workflow_name)
        .bind(&request.status)
        .bind(serde_json::to_value(&request.form_data)?)
        .bind(serde_json::to_value(&request.submitted_by)?)
        .bind(request.submitted_at)
        .bind(request.last_updated_at)
        .bind(
            request
                .assignee
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(request.is_archived)
        .bind(serde_json::to_value(&request.history)?)
        .bind(serde_json::to_value(&request.action_requests)?)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create workflow request")?;

        Ok(row.into())
    }

    /// Apply a status transition: append the history entry and mirror its
    /// status into the request head in one atomic statement. A NULL assignee
    /// bind keeps the current assignee.
    pub async fn apply_transition(
        &self,
        id: Uuid,
        entry: &HistoryEntry,
        assignee: Option<&UserRef>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_requests
            SET status = $2,
                last_updated_at = $3,
                assignee = COALESCE($4, assignee),
                history = history || $5::jsonb
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&entry.status)
        .bind(entry.timestamp)
        .bind(assignee.map(serde_json::to_value).transpose()?)
        .bind(serde_json::to_value(entry)?)
        .execute(&self.pool)
        .await
        .context("Failed to apply workflow request transition")?;

        Ok(result.rows_affected() > 0)
    }

    /// Attach pending approval entries to a status, appending atomically.
    pub async fn add_action_requests(
        &self,
        id: Uuid,
        status_id: &str,
        actions: &[ActionRequest],
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_requests
            SET action_requests = jsonb_set(
                    COALESCE(action_requests, '{}'::jsonb),
                    ARRAY[$2],
                    COALESCE(action_requests -> $2, '[]'::jsonb) || $3::jsonb)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status_id)
        .bind(serde_json::to_value(actions)?)
        .execute(&self.pool)
        .await
        .context("Failed to add action requests")?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip one pending approval to approved/rejected under a row lock.
    /// Returns false when no matching pending entry exists.
    pub async fn resolve_action_request(
        &self,
        id: Uuid,
        status_id: &str,
        user_id: Uuid,
        approve: bool,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT action_requests FROM workflow_requests WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to lock workflow request")?;

        let Some((value,)) = current else {
            return Ok(false);
        };

        let mut action_requests: HashMap<String, Vec<ActionRequest>> =
            serde_json::from_value(value).unwrap_or_default();

        let Some(pending) = action_requests.get_mut(status_id).and_then(|actions| {
            actions
                .iter_mut()
                .find(|a| a.user.id == user_id && a.state == ActionRequestState::Pending)
        }) else {
            return Ok(false);
        };

        pending.state = if approve {
            ActionRequestState::Approved
        } else {
            ActionRequestState::Rejected
        };
        pending.resolved_at = Some(resolved_at);

        sqlx::query("UPDATE workflow_requests SET action_requests = $2 WHERE id = $1")
            .bind(id)
            .bind(serde_json::to_value(&action_requests)?)
            .execute(&mut *tx)
            .await
            .context("Failed to persist action request resolution")?;

        tx.commit().await?;
        Ok(true)
    }

    /// Set the archive flag. Requests are never hard-deleted.
    pub async fn set_archived(&self, id: Uuid, archived: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE workflow_requests SET is_archived = $2 WHERE id = $1")
            .bind(id)
            .bind(archived)
            .execute(&self.pool)
            .await
            .context("Failed to update archive flag")?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct RequestRow {
    id: Uuid,
    request_id: String,
    workflow_name: String,
    status: String,
    form_data: serde_json::Value,
    submitted_by: serde_json::Value,
    submitted_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    assignee: Option<serde_json::Value>,
    is_archived: bool,
    history: serde_json::Value,
    action_requests: serde_json::Value,
}

impl From<RequestRow> for WorkflowRequest {
    fn from(row: RequestRow) -> Self {
        Self {
            id: row.id,
            request_id: row.request_id,
            workflow_name: row.workflow_name,
            status: row.status,
            form_data: serde_json::from_value(row.form_data).unwrap_or_default(),
            submitted_by: serde_json::from_value(row.submitted_by).unwrap_or(UserRef {
                id: Uuid::nil(),
                name: String::new(),
            }),
            submitted_at: row.submitted_at,
            last_updated_at: row.last_updated_at,
            assignee: row
                .assignee
                .and_then(|value| serde_json::from_value(value).ok()),
            is_archived: row.is_archived,
            history: serde_json::from_value(row.history).unwrap_or_default(),
            action_requests: serde_json::from_value(row.action_requests).unwrap_or_default(),
        }
    }
}
