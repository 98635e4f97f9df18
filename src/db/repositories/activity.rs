//! Activity log repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ActivityLog, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ActivityLogRepository: Send + Sync {
    /// Append an entry
    async fn create(&self, message: &str) -> Result<ActivityLog>;

    /// Entries newest first, with the total count
    async fn list(&self, params: &ListParams) -> Result<(Vec<ActivityLog>, i64)>;
}

pub struct SqlxActivityLogRepository {
    pool: DynDatabasePool,
}

impl SqlxActivityLogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ActivityLogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ActivityLogRepository for SqlxActivityLogRepository {
    async fn create(&self, message: &str) -> Result<ActivityLog> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_log_sqlite(self.pool.as_sqlite().unwrap(), message).await,
            DatabaseDriver::Mysql => create_log_mysql(self.pool.as_mysql().unwrap(), message).await,
        }
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<ActivityLog>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_logs_sqlite(self.pool.as_sqlite().unwrap(), params).await,
            DatabaseDriver::Mysql => list_logs_mysql(self.pool.as_mysql().unwrap(), params).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_log_sqlite(pool: &SqlitePool, message: &str) -> Result<ActivityLog> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO activity_logs (message, created_at) VALUES (?, ?)")
        .bind(message)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to write activity log")?;

    Ok(ActivityLog {
        id: result.last_insert_rowid(),
        message: message.to_string(),
        created_at: now,
    })
}

async fn list_logs_sqlite(pool: &SqlitePool, params: &ListParams) -> Result<(Vec<ActivityLog>, i64)> {
    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM activity_logs")
        .fetch_one(pool)
        .await
        .context("Failed to count activity logs")?
        .get("count");

    let rows = sqlx::query(
        "SELECT id, message, created_at FROM activity_logs ORDER BY id DESC LIMIT ? OFFSET ?",
    )
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list activity logs")?;

    let logs = rows
        .iter()
        .map(|row| ActivityLog {
            id: row.get("id"),
            message: row.get("message"),
            created_at: row.get("created_at"),
        })
        .collect();
    Ok((logs, total))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_log_mysql(pool: &MySqlPool, message: &str) -> Result<ActivityLog> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO activity_logs (message, created_at) VALUES (?, ?)")
        .bind(message)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to write activity log")?;

    Ok(ActivityLog {
        id: result.last_insert_id() as i64,
        message: message.to_string(),
        created_at: now,
    })
}

async fn list_logs_mysql(pool: &MySqlPool, params: &ListParams) -> Result<(Vec<ActivityLog>, i64)> {
    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM activity_logs")
        .fetch_one(pool)
        .await
        .context("Failed to count activity logs")?
        .get("count");

    let rows = sqlx::query(
        "SELECT id, message, created_at FROM activity_logs ORDER BY id DESC LIMIT ? OFFSET ?",
    )
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list activity logs")?;

    let logs = rows
        .iter()
        .map(|row| ActivityLog {
            id: row.get("id"),
            message: row.get("message"),
            created_at: row.get("created_at"),
        })
        .collect();
    Ok((logs, total))
}
