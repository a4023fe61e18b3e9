use anyhow::Result;
use sqlx::PgPool;

pub async fn run_postgres_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running PostgreSQL migrations");

    // Create workflow_definitions table. Definitions are referenced by name
    // from requests, so the name is unique.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflow_definitions (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name VARCHAR NOT NULL UNIQUE,
            icon VARCHAR NOT NULL DEFAULT '',
            area_id VARCHAR NOT NULL,
            owner_email VARCHAR NOT NULL,
            fields JSONB NOT NULL DEFAULT '[]',
            statuses JSONB NOT NULL DEFAULT '[]',
            routing_rules JSONB NOT NULL DEFAULT '[]',
            sla_rules JSONB NOT NULL DEFAULT '[]',
            default_sla_days BIGINT NOT NULL DEFAULT 5,
            allowed_user_ids JSONB NOT NULL DEFAULT '["all"]',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create workflow_requests table. Requests keep their definition linkage
    // by name and survive definition deletion, so no foreign key here.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflow_requests (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            request_id VARCHAR NOT NULL,
            workflow_name VARCHAR NOT NULL,
            status VARCHAR NOT NULL,
            form_data JSONB NOT NULL DEFAULT '{}',
            submitted_by JSONB NOT NULL,
            submitted_at TIMESTAMPTZ NOT NULL,
            last_updated_at TIMESTAMPTZ NOT NULL,
            assignee JSONB,
            is_archived BOOLEAN NOT NULL DEFAULT FALSE,
            history JSONB NOT NULL DEFAULT '[]',
            action_requests JSONB NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create collaborators table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collaborators (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name VARCHAR NOT NULL,
            email VARCHAR NOT NULL UNIQUE,
            area_id VARCHAR NOT NULL,
            permissions JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create audit_log table. The seq column gives the chain a total order.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            seq BIGSERIAL PRIMARY KEY,
            id UUID NOT NULL UNIQUE,
            timestamp TIMESTAMPTZ NOT NULL,
            action VARCHAR NOT NULL,
            entity_type VARCHAR NOT NULL,
            entity_id UUID NOT NULL,
            user_id UUID,
            details JSONB NOT NULL,
            hash VARCHAR NOT NULL,
            previous_hash VARCHAR,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for the common lookups
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_requests_workflow_name ON workflow_requests(workflow_name)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_requests_status ON workflow_requests(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_requests_submitted_at ON workflow_requests(submitted_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_log_entity ON audit_log(entity_type, entity_id)")
        .execute(pool)
        .await?;

    tracing::info!("PostgreSQL migrations completed successfully");
    Ok(())
}
