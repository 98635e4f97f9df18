//! Program repository
//!
//! Database operations for academic programs.
//!
//! This module provides:
//! - `ProgramRepository` trait defining the interface for program data access
//! - `SqlxProgramRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Program, ProgramInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Program repository trait
#[async_trait]
pub trait ProgramRepository: Send + Sync {
    /// Create a new program
    async fn create(&self, input: &ProgramInput) -> Result<Program>;

    /// Get program by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Program>>;

    /// Get program by its exact title
    async fn get_by_title(&self, title: &str) -> Result<Option<Program>>;

    /// Update a program
    async fn update(&self, id: i64, input: &ProgramInput) -> Result<Program>;

    /// Delete a program (cascades to its courses). Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// List programs ordered by title, optionally filtered by a
    /// case-insensitive substring of title or summary
    async fn list(&self, search: Option<&str>) -> Result<Vec<Program>>;

    /// Sum of credits over the program's courses
    async fn total_credits(&self, id: i64) -> Result<i64>;
}

/// SQLx-based program repository implementation
pub struct SqlxProgramRepository {
    pool: DynDatabasePool,
}

impl SqlxProgramRepository {
    /// Create a new SQLx program repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProgramRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProgramRepository for SqlxProgramRepository {
    async fn create(&self, input: &ProgramInput) -> Result<Program> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_program_sqlite(self.pool.as_sqlite().unwrap(), input).await,
            DatabaseDriver::Mysql => create_program_mysql(self.pool.as_mysql().unwrap(), input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Program>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_program_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_program_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_by_title(&self, title: &str) -> Result<Option<Program>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_program_by_title_sqlite(self.pool.as_sqlite().unwrap(), title).await
            }
            DatabaseDriver::Mysql => {
                get_program_by_title_mysql(self.pool.as_mysql().unwrap(), title).await
            }
        }
    }

    async fn update(&self, id: i64, input: &ProgramInput) -> Result<Program> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_program_sqlite(self.pool.as_sqlite().unwrap(), id, input).await
            }
            DatabaseDriver::Mysql => update_program_mysql(self.pool.as_mysql().unwrap(), id, input).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_program_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_program_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<Program>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_programs_sqlite(self.pool.as_sqlite().unwrap(), search).await,
            DatabaseDriver::Mysql => list_programs_mysql(self.pool.as_mysql().unwrap(), search).await,
        }
    }

    async fn total_credits(&self, id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => total_credits_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => total_credits_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }
}

/// `%term%` pattern for case-insensitive LIKE searches
pub(crate) fn like_pattern(term: &str) -> String {
    format!("%{}%", term.trim().to_lowercase())
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_program_sqlite(pool: &SqlitePool, input: &ProgramInput) -> Result<Program> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO programs (title, summary, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.summary)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create program")?;

    Ok(Program {
        id: result.last_insert_rowid(),
        title: input.title.clone(),
        summary: input.summary.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_program_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Program>> {
    let row = sqlx::query("SELECT id, title, summary, created_at, updated_at FROM programs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get program by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_program_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn get_program_by_title_sqlite(pool: &SqlitePool, title: &str) -> Result<Option<Program>> {
    let row = sqlx::query("SELECT id, title, summary, created_at, updated_at FROM programs WHERE title = ?")
        .bind(title)
        .fetch_optional(pool)
        .await
        .context("Failed to get program by title")?;

    match row {
        Some(row) => Ok(Some(row_to_program_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn update_program_sqlite(pool: &SqlitePool, id: i64, input: &ProgramInput) -> Result<Program> {
    sqlx::query("UPDATE programs SET title = ?, summary = ?, updated_at = ? WHERE id = ?")
        .bind(&input.title)
        .bind(&input.summary)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update program")?;

    get_program_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Program not found after update"))
}

async fn delete_program_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM programs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete program")?;
    Ok(result.rows_affected() > 0)
}

async fn list_programs_sqlite(pool: &SqlitePool, search: Option<&str>) -> Result<Vec<Program>> {
    let rows = match search.filter(|s| !s.trim().is_empty()) {
        Some(term) => {
            let pattern = like_pattern(term);
            sqlx::query(
                r#"
                SELECT id, title, summary, created_at, updated_at
                FROM programs
                WHERE LOWER(title) LIKE ? OR LOWER(summary) LIKE ?
                ORDER BY title
                "#,
            )
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query("SELECT id, title, summary, created_at, updated_at FROM programs ORDER BY title")
                .fetch_all(pool)
                .await
        }
    }
    .context("Failed to list programs")?;

    rows.iter().map(row_to_program_sqlite).collect()
}

async fn total_credits_sqlite(pool: &SqlitePool, id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT CAST(COALESCE(SUM(credit), 0) AS INTEGER) as total FROM courses WHERE program_id = ?",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .context("Failed to sum program credits")?;
    Ok(row.get("total"))
}

fn row_to_program_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Program> {
    Ok(Program {
        id: row.get("id"),
        title: row.get("title"),
        summary: row.get("summary"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_program_mysql(pool: &MySqlPool, input: &ProgramInput) -> Result<Program> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO programs (title, summary, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.summary)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create program")?;

    Ok(Program {
        id: result.last_insert_id() as i64,
        title: input.title.clone(),
        summary: input.summary.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_program_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Program>> {
    let row = sqlx::query("SELECT id, title, summary, created_at, updated_at FROM programs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get program by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_program_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn get_program_by_title_mysql(pool: &MySqlPool, title: &str) -> Result<Option<Program>> {
    let row = sqlx::query("SELECT id, title, summary, created_at, updated_at FROM programs WHERE title = ?")
        .bind(title)
        .fetch_optional(pool)
        .await
        .context("Failed to get program by title")?;

    match row {
        Some(row) => Ok(Some(row_to_program_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn update_program_mysql(pool: &MySqlPool, id: i64, input: &ProgramInput) -> Result<Program> {
    sqlx::query("UPDATE programs SET title = ?, summary = ?, updated_at = ? WHERE id = ?")
        .bind(&input.title)
        .bind(&input.summary)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update program")?;

    get_program_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Program not found after update"))
}

async fn delete_program_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM programs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete program")?;
    Ok(result.rows_affected() > 0)
}

async fn list_programs_mysql(pool: &MySqlPool, search: Option<&str>) -> Result<Vec<Program>> {
    let rows = match search.filter(|s| !s.trim().is_empty()) {
        Some(term) => {
            let pattern = like_pattern(term);
            sqlx::query(
                r#"
                SELECT id, title, summary, created_at, updated_at
                FROM programs
                WHERE LOWER(title) LIKE ? OR LOWER(summary) LIKE ?
                ORDER BY title
                "#,
            )
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query("SELECT id, title, summary, created_at, updated_at FROM programs ORDER BY title")
                .fetch_all(pool)
                .await
        }
    }
    .context("Failed to list programs")?;

    rows.iter().map(row_to_program_mysql).collect()
}

async fn total_credits_mysql(pool: &MySqlPool, id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT CAST(COALESCE(SUM(credit), 0) AS SIGNED) as total FROM courses WHERE program_id = ?",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .context("Failed to sum program credits")?;
    Ok(row.get("total"))
}

fn row_to_program_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Program> {
    Ok(Program {
        id: row.get("id"),
        title: row.get("title"),
        summary: row.get("summary"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (DynDatabasePool, Arc<dyn ProgramRepository>) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        (pool.clone(), SqlxProgramRepository::boxed(pool))
    }

    fn input(title: &str, summary: &str) -> ProgramInput {
        ProgramInput {
            title: title.to_string(),
            summary: summary.to_string(),
        }
    }

    #[tokio::test]
    async fn test_program_crud() {
        let (_pool, repo) = setup().await;

        let program = repo.create(&input("Computer Science", "Algorithms")).await.unwrap();
        assert!(program.id > 0);

        let updated = repo.update(program.id, &input("Computer Science", "Systems")).await.unwrap();
        assert_eq!(updated.summary, "Systems");
        assert_eq!(repo.get_by_title("Computer Science").await.unwrap().unwrap().id, program.id);

        assert!(repo.delete(program.id).await.unwrap());
        assert!(!repo.delete(program.id).await.unwrap());
        assert!(repo.get_by_id(program.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_title_rejected() {
        let (_pool, repo) = setup().await;
        repo.create(&input("Physics", "")).await.unwrap();
        assert!(repo.create(&input("Physics", "again")).await.is_err());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let (_pool, repo) = setup().await;
        repo.create(&input("Mathematics", "Pure and applied")).await.unwrap();
        repo.create(&input("History", "Ancient MATH texts")).await.unwrap();
        repo.create(&input("Biology", "Cells")).await.unwrap();

        let found = repo.list(Some("math")).await.unwrap();
        let titles: Vec<_> = found.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["History", "Mathematics"]);

        assert_eq!(repo.list(None).await.unwrap().len(), 3);
        assert_eq!(repo.list(Some("  ")).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_total_credits() {
        let (pool, repo) = setup().await;
        let program = repo.create(&input("Chemistry", "")).await.unwrap();
        assert_eq!(repo.total_credits(program.id).await.unwrap(), 0);

        let sqlite = pool.as_sqlite().unwrap();
        for (slug, code, credit) in [("a", "C1", 3), ("b", "C2", 4)] {
            sqlx::query(
                "INSERT INTO courses (slug, title, code, credit, summary, program_id, level, year, semester, created_at, updated_at) \
                 VALUES (?, 'x', ?, ?, '', ?, 'Bachelor', 1, 'First', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            )
            .bind(slug)
            .bind(code)
            .bind(credit)
            .bind(program.id)
            .execute(sqlite)
            .await
            .unwrap();
        }
        assert_eq!(repo.total_credits(program.id).await.unwrap(), 7);
    }
}
