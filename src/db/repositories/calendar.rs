//! Academic calendar repository
//!
//! Academic sessions and semesters each carry an `is_current` marker; at most
//! one row of each table is current at a time.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{AcademicSession, Semester, SemesterName};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait CalendarRepository: Send + Sync {
    async fn create_session(&self, name: &str) -> Result<AcademicSession>;

    async fn list_sessions(&self) -> Result<Vec<AcademicSession>>;

    async fn get_current_session(&self) -> Result<Option<AcademicSession>>;

    /// Mark one session current and clear the marker on the others
    async fn set_current_session(&self, id: i64) -> Result<bool>;

    async fn create_semester(&self, name: SemesterName, session_id: Option<i64>) -> Result<Semester>;

    async fn list_semesters(&self) -> Result<Vec<Semester>>;

    async fn get_current_semester(&self) -> Result<Option<Semester>>;

    /// Mark one semester current and clear the marker on the others
    async fn set_current_semester(&self, id: i64) -> Result<bool>;
}

pub struct SqlxCalendarRepository {
    pool: DynDatabasePool,
}

impl SqlxCalendarRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CalendarRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CalendarRepository for SqlxCalendarRepository {
    async fn create_session(&self, name: &str) -> Result<AcademicSession> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_session_sqlite(self.pool.as_sqlite().unwrap(), name).await,
            DatabaseDriver::Mysql => create_session_mysql(self.pool.as_mysql().unwrap(), name).await,
        }
    }

    async fn list_sessions(&self) -> Result<Vec<AcademicSession>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                select_sessions_sqlite(self.pool.as_sqlite().unwrap(), false).await
            }
            DatabaseDriver::Mysql => select_sessions_mysql(self.pool.as_mysql().unwrap(), false).await,
        }
    }

    async fn get_current_session(&self) -> Result<Option<AcademicSession>> {
        let rows = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                select_sessions_sqlite(self.pool.as_sqlite().unwrap(), true).await?
            }
            DatabaseDriver::Mysql => select_sessions_mysql(self.pool.as_mysql().unwrap(), true).await?,
        };
        Ok(rows.into_iter().next())
    }

    async fn set_current_session(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_current_sqlite(self.pool.as_sqlite().unwrap(), "academic_sessions", id).await
            }
            DatabaseDriver::Mysql => {
                set_current_mysql(self.pool.as_mysql().unwrap(), "academic_sessions", id).await
            }
        }
    }

    async fn create_semester(&self, name: SemesterName, session_id: Option<i64>) -> Result<Semester> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_semester_sqlite(self.pool.as_sqlite().unwrap(), name, session_id).await
            }
            DatabaseDriver::Mysql => {
                create_semester_mysql(self.pool.as_mysql().unwrap(), name, session_id).await
            }
        }
    }

    async fn list_semesters(&self) -> Result<Vec<Semester>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                select_semesters_sqlite(self.pool.as_sqlite().unwrap(), false).await
            }
            DatabaseDriver::Mysql => {
                select_semesters_mysql(self.pool.as_mysql().unwrap(), false).await
            }
        }
    }

    async fn get_current_semester(&self) -> Result<Option<Semester>> {
        let rows = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                select_semesters_sqlite(self.pool.as_sqlite().unwrap(), true).await?
            }
            DatabaseDriver::Mysql => {
                select_semesters_mysql(self.pool.as_mysql().unwrap(), true).await?
            }
        };
        Ok(rows.into_iter().next())
    }

    async fn set_current_semester(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_current_sqlite(self.pool.as_sqlite().unwrap(), "semesters", id).await
            }
            DatabaseDriver::Mysql => {
                set_current_mysql(self.pool.as_mysql().unwrap(), "semesters", id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, name: &str) -> Result<AcademicSession> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO academic_sessions (name, is_current, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(false)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create academic session")?;

    Ok(AcademicSession {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        is_current: false,
        created_at: now,
    })
}

async fn select_sessions_sqlite(pool: &SqlitePool, current_only: bool) -> Result<Vec<AcademicSession>> {
    let sql = if current_only {
        "SELECT id, name, is_current, created_at FROM academic_sessions WHERE is_current = ? ORDER BY id DESC"
    } else {
        "SELECT id, name, is_current, created_at FROM academic_sessions ORDER BY name DESC"
    };
    let mut query = sqlx::query(sql);
    if current_only {
        query = query.bind(true);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list academic sessions")?;

    Ok(rows
        .iter()
        .map(|row| AcademicSession {
            id: row.get("id"),
            name: row.get("name"),
            is_current: row.get("is_current"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn create_semester_sqlite(
    pool: &SqlitePool,
    name: SemesterName,
    session_id: Option<i64>,
) -> Result<Semester> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO semesters (name, academic_session_id, is_current, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(name.as_str())
    .bind(session_id)
    .bind(false)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create semester")?;

    Ok(Semester {
        id: result.last_insert_rowid(),
        name,
        academic_session_id: session_id,
        is_current: false,
        created_at: now,
    })
}

async fn select_semesters_sqlite(pool: &SqlitePool, current_only: bool) -> Result<Vec<Semester>> {
    let sql = if current_only {
        "SELECT id, name, academic_session_id, is_current, created_at FROM semesters WHERE is_current = ? ORDER BY id DESC"
    } else {
        "SELECT id, name, academic_session_id, is_current, created_at FROM semesters ORDER BY id DESC"
    };
    let mut query = sqlx::query(sql);
    if current_only {
        query = query.bind(true);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list semesters")?;

    rows.iter().map(row_to_semester_sqlite).collect()
}

async fn set_current_sqlite(pool: &SqlitePool, table: &str, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let exists = sqlx::query(&format!("SELECT id FROM {} WHERE id = ?", table))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("Failed to look up {}", table))?
        .is_some();
    if !exists {
        return Ok(false);
    }

    sqlx::query(&format!("UPDATE {} SET is_current = ?", table))
        .bind(false)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to clear current {}", table))?;
    sqlx::query(&format!("UPDATE {} SET is_current = ? WHERE id = ?", table))
        .bind(true)
        .bind(id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to set current {}", table))?;

    tx.commit().await.context("Failed to commit transaction")?;
    Ok(true)
}

fn row_to_semester_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Semester> {
    let name: String = row.get("name");
    Ok(Semester {
        id: row.get("id"),
        name: SemesterName::from_str(&name)?,
        academic_session_id: row.get("academic_session_id"),
        is_current: row.get("is_current"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, name: &str) -> Result<AcademicSession> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO academic_sessions (name, is_current, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(false)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create academic session")?;

    Ok(AcademicSession {
        id: result.last_insert_id() as i64,
        name: name.to_string(),
        is_current: false,
        created_at: now,
    })
}

async fn select_sessions_mysql(pool: &MySqlPool, current_only: bool) -> Result<Vec<AcademicSession>> {
    let sql = if current_only {
        "SELECT id, name, is_current, created_at FROM academic_sessions WHERE is_current = ? ORDER BY id DESC"
    } else {
        "SELECT id, name, is_current, created_at FROM academic_sessions ORDER BY name DESC"
    };
    let mut query = sqlx::query(sql);
    if current_only {
        query = query.bind(true);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list academic sessions")?;

    Ok(rows
        .iter()
        .map(|row| AcademicSession {
            id: row.get("id"),
            name: row.get("name"),
            is_current: row.get("is_current"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn create_semester_mysql(
    pool: &MySqlPool,
    name: SemesterName,
    session_id: Option<i64>,
) -> Result<Semester> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO semesters (name, academic_session_id, is_current, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(name.as_str())
    .bind(session_id)
    .bind(false)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create semester")?;

    Ok(Semester {
        id: result.last_insert_id() as i64,
        name,
        academic_session_id: session_id,
        is_current: false,
        created_at: now,
    })
}

async fn select_semesters_mysql(pool: &MySqlPool, current_only: bool) -> Result<Vec<Semester>> {
    let sql = if current_only {
        "SELECT id, name, academic_session_id, is_current, created_at FROM semesters WHERE is_current = ? ORDER BY id DESC"
    } else {
        "SELECT id, name, academic_session_id, is_current, created_at FROM semesters ORDER BY id DESC"
    };
    let mut query = sqlx::query(sql);
    if current_only {
        query = query.bind(true);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list semesters")?;

    rows.iter().map(row_to_semester_mysql).collect()
}

async fn set_current_mysql(pool: &MySqlPool, table: &str, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let exists = sqlx::query(&format!("SELECT id FROM {} WHERE id = ?", table))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("Failed to look up {}", table))?
        .is_some();
    if !exists {
        return Ok(false);
    }

    sqlx::query(&format!("UPDATE {} SET is_current = ?", table))
        .bind(false)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to clear current {}", table))?;
    sqlx::query(&format!("UPDATE {} SET is_current = ? WHERE id = ?", table))
        .bind(true)
        .bind(id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to set current {}", table))?;

    tx.commit().await.context("Failed to commit transaction")?;
    Ok(true)
}

fn row_to_semester_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Semester> {
    let name: String = row.get("name");
    Ok(Semester {
        id: row.get("id"),
        name: SemesterName::from_str(&name)?,
        academic_session_id: row.get("academic_session_id"),
        is_current: row.get("is_current"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> Arc<dyn CalendarRepository> {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxCalendarRepository::boxed(pool)
    }

    #[tokio::test]
    async fn test_single_current_semester() {
        let repo = setup().await;
        let session = repo.create_session("2025/2026").await.unwrap();
        let first = repo.create_semester(SemesterName::First, Some(session.id)).await.unwrap();
        let second = repo.create_semester(SemesterName::Second, Some(session.id)).await.unwrap();

        assert!(repo.get_current_semester().await.unwrap().is_none());

        assert!(repo.set_current_semester(first.id).await.unwrap());
        assert!(repo.set_current_semester(second.id).await.unwrap());

        let current = repo.get_current_semester().await.unwrap().unwrap();
        assert_eq!(current.id, second.id);
        assert_eq!(current.name, SemesterName::Second);

        let all = repo.list_semesters().await.unwrap();
        assert_eq!(all.iter().filter(|s| s.is_current).count(), 1);
    }

    #[tokio::test]
    async fn test_set_current_unknown_id() {
        let repo = setup().await;
        assert!(!repo.set_current_session(42).await.unwrap());
        let session = repo.create_session("2026/2027").await.unwrap();
        assert!(repo.set_current_session(session.id).await.unwrap());
        assert_eq!(repo.get_current_session().await.unwrap().unwrap().name, "2026/2027");
    }
}
