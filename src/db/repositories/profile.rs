//! Student and department-head profile repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{DepartmentHead, Student};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Student profile by its own id
    async fn get_student(&self, id: i64) -> Result<Option<Student>>;

    /// Student profile of a user
    async fn get_student_by_user(&self, user_id: i64) -> Result<Option<Student>>;

    /// Fetch the user's student profile, creating it when missing.
    /// Returns the profile and whether it was created.
    async fn get_or_create_student(
        &self,
        user_id: i64,
        program_id: Option<i64>,
        level: Option<&str>,
    ) -> Result<(Student, bool)>;

    /// Make `user_id` the head of `program_id`, replacing the program's previous head
    async fn assign_department_head(&self, user_id: i64, program_id: i64) -> Result<DepartmentHead>;

    /// Current head of a program
    async fn get_department_head(&self, program_id: i64) -> Result<Option<DepartmentHead>>;
}

pub struct SqlxProfileRepository {
    pool: DynDatabasePool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    async fn get_student(&self, id: i64) -> Result<Option<Student>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_student_where_sqlite(self.pool.as_sqlite().unwrap(), "id", id).await
            }
            DatabaseDriver::Mysql => {
                get_student_where_mysql(self.pool.as_mysql().unwrap(), "id", id).await
            }
        }
    }

    async fn get_student_by_user(&self, user_id: i64) -> Result<Option<Student>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_student_where_sqlite(self.pool.as_sqlite().unwrap(), "user_id", user_id).await
            }
            DatabaseDriver::Mysql => {
                get_student_where_mysql(self.pool.as_mysql().unwrap(), "user_id", user_id).await
            }
        }
    }

    async fn get_or_create_student(
        &self,
        user_id: i64,
        program_id: Option<i64>,
        level: Option<&str>,
    ) -> Result<(Student, bool)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_or_create_student_sqlite(self.pool.as_sqlite().unwrap(), user_id, program_id, level)
                    .await
            }
            DatabaseDriver::Mysql => {
                get_or_create_student_mysql(self.pool.as_mysql().unwrap(), user_id, program_id, level)
                    .await
            }
        }
    }

    async fn assign_department_head(&self, user_id: i64, program_id: i64) -> Result<DepartmentHead> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                assign_head_sqlite(self.pool.as_sqlite().unwrap(), user_id, program_id).await
            }
            DatabaseDriver::Mysql => {
                assign_head_mysql(self.pool.as_mysql().unwrap(), user_id, program_id).await
            }
        }
    }

    async fn get_department_head(&self, program_id: i64) -> Result<Option<DepartmentHead>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_head_sqlite(self.pool.as_sqlite().unwrap(), program_id).await
            }
            DatabaseDriver::Mysql => get_head_mysql(self.pool.as_mysql().unwrap(), program_id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_student_where_sqlite(pool: &SqlitePool, column: &str, value: i64) -> Result<Option<Student>> {
    let sql = format!("SELECT id, user_id, program_id, level FROM students WHERE {} = ?", column);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .context("Failed to get student profile")?;

    Ok(row.map(|row| Student {
        id: row.get("id"),
        user_id: row.get("user_id"),
        program_id: row.get("program_id"),
        level: row.get("level"),
    }))
}

async fn get_or_create_student_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    program_id: Option<i64>,
    level: Option<&str>,
) -> Result<(Student, bool)> {
    if let Some(student) = get_student_where_sqlite(pool, "user_id", user_id).await? {
        return Ok((student, false));
    }

    let result = sqlx::query("INSERT INTO students (user_id, program_id, level) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(program_id)
        .bind(level)
        .execute(pool)
        .await
        .context("Failed to create student profile")?;

    Ok((
        Student {
            id: result.last_insert_rowid(),
            user_id,
            program_id,
            level: level.map(str::to_string),
        },
        true,
    ))
}

async fn assign_head_sqlite(pool: &SqlitePool, user_id: i64, program_id: i64) -> Result<DepartmentHead> {
    sqlx::query("DELETE FROM department_heads WHERE program_id = ? OR user_id = ?")
        .bind(program_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to clear previous department head")?;

    let result = sqlx::query("INSERT INTO department_heads (user_id, program_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(program_id)
        .execute(pool)
        .await
        .context("Failed to assign department head")?;

    Ok(DepartmentHead {
        id: result.last_insert_rowid(),
        user_id,
        program_id: Some(program_id),
    })
}

async fn get_head_sqlite(pool: &SqlitePool, program_id: i64) -> Result<Option<DepartmentHead>> {
    let row = sqlx::query("SELECT id, user_id, program_id FROM department_heads WHERE program_id = ?")
        .bind(program_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get department head")?;

    Ok(row.map(|row| DepartmentHead {
        id: row.get("id"),
        user_id: row.get("user_id"),
        program_id: row.get("program_id"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_student_where_mysql(pool: &MySqlPool, column: &str, value: i64) -> Result<Option<Student>> {
    let sql = format!("SELECT id, user_id, program_id, level FROM students WHERE {} = ?", column);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .context("Failed to get student profile")?;

    Ok(row.map(|row| Student {
        id: row.get("id"),
        user_id: row.get("user_id"),
        program_id: row.get("program_id"),
        level: row.get("level"),
    }))
}

async fn get_or_create_student_mysql(
    pool: &MySqlPool,
    user_id: i64,
    program_id: Option<i64>,
    level: Option<&str>,
) -> Result<(Student, bool)> {
    if let Some(student) = get_student_where_mysql(pool, "user_id", user_id).await? {
        return Ok((student, false));
    }

    let result = sqlx::query("INSERT INTO students (user_id, program_id, level) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(program_id)
        .bind(level)
        .execute(pool)
        .await
        .context("Failed to create student profile")?;

    Ok((
        Student {
            id: result.last_insert_id() as i64,
            user_id,
            program_id,
            level: level.map(str::to_string),
        },
        true,
    ))
}

async fn assign_head_mysql(pool: &MySqlPool, user_id: i64, program_id: i64) -> Result<DepartmentHead> {
    sqlx::query("DELETE FROM department_heads WHERE program_id = ? OR user_id = ?")
        .bind(program_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to clear previous department head")?;

    let result = sqlx::query("INSERT INTO department_heads (user_id, program_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(program_id)
        .execute(pool)
        .await
        .context("Failed to assign department head")?;

    Ok(DepartmentHead {
        id: result.last_insert_id() as i64,
        user_id,
        program_id: Some(program_id),
    })
}

async fn get_head_mysql(pool: &MySqlPool, program_id: i64) -> Result<Option<DepartmentHead>> {
    let row = sqlx::query("SELECT id, user_id, program_id FROM department_heads WHERE program_id = ?")
        .bind(program_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get department head")?;

    Ok(row.map(|row| DepartmentHead {
        id: row.get("id"),
        user_id: row.get("user_id"),
        program_id: row.get("program_id"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (DynDatabasePool, Arc<dyn ProfileRepository>) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();
        for sql in [
            "INSERT INTO users (username, email, password_hash, is_student, created_at, updated_at) VALUES ('s', 's@x.io', 'h', 1, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            "INSERT INTO users (username, email, password_hash, is_lecturer, created_at, updated_at) VALUES ('l', 'l@x.io', 'h', 1, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            "INSERT INTO programs (title, summary, created_at, updated_at) VALUES ('CS', '', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        ] {
            sqlx::query(sql).execute(sqlite).await.unwrap();
        }
        (pool.clone(), SqlxProfileRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_get_or_create_student_is_idempotent() {
        let (_pool, repo) = setup().await;

        let (first, created) = repo.get_or_create_student(1, Some(1), Some("Bachelor")).await.unwrap();
        assert!(created);
        assert_eq!(first.level.as_deref(), Some("Bachelor"));

        let (second, created) = repo.get_or_create_student(1, None, None).await.unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.program_id, Some(1));

        assert_eq!(repo.get_student(first.id).await.unwrap().unwrap().user_id, 1);
    }

    #[tokio::test]
    async fn test_assign_department_head_replaces_previous() {
        let (_pool, repo) = setup().await;

        repo.assign_department_head(1, 1).await.unwrap();
        let head = repo.assign_department_head(2, 1).await.unwrap();

        let current = repo.get_department_head(1).await.unwrap().unwrap();
        assert_eq!(current.id, head.id);
        assert_eq!(current.user_id, 2);
    }
}
