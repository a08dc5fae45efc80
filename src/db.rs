//! PostgreSQL persistence for the access approval state.
//!
//! The bot keeps its approval state in memory; when a database is configured
//! every change is written through so approvals survive a restart.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use teloxide::types::UserId;
use tracing::{debug, info, warn};

use crate::access::{AccessDecision, AccessRequest, AccessRole, AccessSnapshot, DecisionOutcome};

fn to_db_id(user: UserId) -> i64 {
    user.0 as i64
}

fn from_db_id(id: i64) -> UserId {
    UserId(id as u64)
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS bot_approved_users (
            telegram_id BIGINT PRIMARY KEY,
            approved_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create bot_approved_users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS bot_consents (
            telegram_id BIGINT PRIMARY KEY,
            consented_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create bot_consents table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS bot_denied_users (
            telegram_id BIGINT PRIMARY KEY,
            denied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create bot_denied_users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS bot_access_requests (
            telegram_id BIGINT PRIMARY KEY,
            display_name TEXT NOT NULL,
            username TEXT NOT NULL,
            role TEXT NOT NULL,
            requested_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create bot_access_requests table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

async fn load_ids(pool: &PgPool, table: &str) -> Result<Vec<UserId>> {
    let rows: Vec<(i64,)> = sqlx::query_as(&format!("SELECT telegram_id FROM {table}"))
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to read {table}"))?;
    Ok(rows.into_iter().map(|(id,)| from_db_id(id)).collect())
}

/// Load the whole approval state
pub async fn load_access_snapshot(pool: &PgPool) -> Result<AccessSnapshot> {
    let approved = load_ids(pool, "bot_approved_users").await?;
    let consented = load_ids(pool, "bot_consents").await?;
    let denied = load_ids(pool, "bot_denied_users").await?;

    let rows: Vec<(i64, String, String, String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT telegram_id, display_name, username, role, requested_at
         FROM bot_access_requests
         ORDER BY requested_at",
    )
    .fetch_all(pool)
    .await
    .context("Failed to read bot_access_requests")?;

    let mut pending = Vec::with_capacity(rows.len());
    for (id, display_name, username, role, requested_at) in rows {
        let Some(role) = AccessRole::parse(&role) else {
            warn!(telegram_id = id, role = %role, "Skipping access request with unknown role");
            continue;
        };
        pending.push(AccessRequest {
            user_id: from_db_id(id),
            display_name,
            username,
            requested_at,
            role,
        });
    }

    debug!(
        approved = approved.len(),
        consented = consented.len(),
        denied = denied.len(),
        pending = pending.len(),
        "Access snapshot loaded"
    );

    Ok(AccessSnapshot {
        approved,
        consented,
        denied,
        pending,
    })
}

/// Store a new pending access request
pub async fn save_access_request(pool: &PgPool, request: &AccessRequest) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM bot_denied_users WHERE telegram_id = $1")
        .bind(to_db_id(request.user_id))
        .execute(&mut *tx)
        .await
        .context("Failed to clear denied flag")?;

    sqlx::query(
        "INSERT INTO bot_access_requests (telegram_id, display_name, username, role, requested_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (telegram_id) DO NOTHING",
    )
    .bind(to_db_id(request.user_id))
    .bind(&request.display_name)
    .bind(&request.username)
    .bind(request.role.as_str())
    .bind(request.requested_at)
    .execute(&mut *tx)
    .await
    .context("Failed to insert access request")?;

    tx.commit().await.context("Failed to commit access request")?;
    Ok(())
}

/// Store the effect of an approve or deny decision
pub async fn save_decision(pool: &PgPool, outcome: &DecisionOutcome) -> Result<()> {
    let target = to_db_id(outcome.decision.target());
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM bot_access_requests WHERE telegram_id = $1")
        .bind(target)
        .execute(&mut *tx)
        .await
        .context("Failed to delete access request")?;

    match outcome.decision {
        AccessDecision::Approve(_) => {
            sqlx::query("DELETE FROM bot_denied_users WHERE telegram_id = $1")
                .bind(target)
                .execute(&mut *tx)
                .await
                .context("Failed to clear denied flag")?;
            sqlx::query(
                "INSERT INTO bot_approved_users (telegram_id) VALUES ($1)
                 ON CONFLICT (telegram_id) DO NOTHING",
            )
            .bind(target)
            .execute(&mut *tx)
            .await
            .context("Failed to insert approved user")?;
        }
        AccessDecision::Deny(_) => {
            sqlx::query("DELETE FROM bot_approved_users WHERE telegram_id = $1")
                .bind(target)
                .execute(&mut *tx)
                .await
                .context("Failed to delete approved user")?;
            sqlx::query("DELETE FROM bot_consents WHERE telegram_id = $1")
                .bind(target)
                .execute(&mut *tx)
                .await
                .context("Failed to delete consent")?;
            sqlx::query(
                "INSERT INTO bot_denied_users (telegram_id) VALUES ($1)
                 ON CONFLICT (telegram_id) DO NOTHING",
            )
            .bind(target)
            .execute(&mut *tx)
            .await
            .context("Failed to insert denied user")?;
        }
    }

    tx.commit().await.context("Failed to commit access decision")?;
    info!(telegram_id = target, decision = ?outcome.decision, "Access decision stored");
    Ok(())
}

/// Store a consent acknowledgement
pub async fn save_consent(pool: &PgPool, user: UserId) -> Result<()> {
    sqlx::query(
        "INSERT INTO bot_consents (telegram_id) VALUES ($1)
         ON CONFLICT (telegram_id) DO NOTHING",
    )
    .bind(to_db_id(user))
    .execute(pool)
    .await
    .context("Failed to insert consent")?;
    Ok(())
}
