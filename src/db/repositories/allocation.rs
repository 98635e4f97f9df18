//! Course allocation repository
//!
//! An allocation links one lecturer to a set of courses through the
//! `allocation_courses` join table.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Course, CourseAllocation, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::course::{row_to_course_mysql, row_to_course_sqlite, COURSE_COLUMNS};
use super::user::{row_to_user_mysql, row_to_user_sqlite, USER_COLUMNS};

#[async_trait]
pub trait AllocationRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<CourseAllocation>>;

    async fn get_by_lecturer(&self, lecturer_id: i64) -> Result<Option<CourseAllocation>>;

    async fn create(&self, lecturer_id: i64, session_id: Option<i64>) -> Result<CourseAllocation>;

    /// Reassign an allocation to another lecturer
    async fn set_lecturer(&self, id: i64, lecturer_id: i64) -> Result<()>;

    /// Replace the allocation's course set
    async fn set_courses(&self, id: i64, course_ids: &[i64]) -> Result<()>;

    /// Add one course to the allocation if not already present
    async fn add_course(&self, id: i64, course_id: i64) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// All allocations, newest first
    async fn list(&self) -> Result<Vec<CourseAllocation>>;

    /// Courses of an allocation ordered by code
    async fn courses(&self, id: i64) -> Result<Vec<Course>>;

    /// Courses allocated to a lecturer
    async fn courses_of_lecturer(&self, lecturer_id: i64) -> Result<Vec<Course>>;

    /// Lecturers allocated to a course
    async fn lecturers_of_course(&self, course_id: i64) -> Result<Vec<User>>;
}

pub struct SqlxAllocationRepository {
    pool: DynDatabasePool,
}

impl SqlxAllocationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AllocationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AllocationRepository for SqlxAllocationRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<CourseAllocation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_allocation_sqlite(self.pool.as_sqlite().unwrap(), "id", id).await
            }
            DatabaseDriver::Mysql => get_allocation_mysql(self.pool.as_mysql().unwrap(), "id", id).await,
        }
    }

    async fn get_by_lecturer(&self, lecturer_id: i64) -> Result<Option<CourseAllocation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_allocation_sqlite(self.pool.as_sqlite().unwrap(), "lecturer_id", lecturer_id).await
            }
            DatabaseDriver::Mysql => {
                get_allocation_mysql(self.pool.as_mysql().unwrap(), "lecturer_id", lecturer_id).await
            }
        }
    }

    async fn create(&self, lecturer_id: i64, session_id: Option<i64>) -> Result<CourseAllocation> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_allocation_sqlite(self.pool.as_sqlite().unwrap(), lecturer_id, session_id).await
            }
            DatabaseDriver::Mysql => {
                create_allocation_mysql(self.pool.as_mysql().unwrap(), lecturer_id, session_id).await
            }
        }
    }

    async fn set_lecturer(&self, id: i64, lecturer_id: i64) -> Result<()> {
        let sql = "UPDATE course_allocations SET lecturer_id = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(lecturer_id)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(lecturer_id)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|_| ()),
        }
        .context("Failed to reassign allocation")
    }

    async fn set_courses(&self, id: i64, course_ids: &[i64]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_courses_sqlite(self.pool.as_sqlite().unwrap(), id, course_ids).await
            }
            DatabaseDriver::Mysql => set_courses_mysql(self.pool.as_mysql().unwrap(), id, course_ids).await,
        }
    }

    async fn add_course(&self, id: i64, course_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT OR IGNORE INTO allocation_courses (allocation_id, course_id) VALUES (?, ?)",
            )
                .bind(id)
                .bind(course_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(
                "INSERT IGNORE INTO allocation_courses (allocation_id, course_id) VALUES (?, ?)",
            )
                .bind(id)
                .bind(course_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|_| ()),
        }
        .context("Failed to add course to allocation")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM course_allocations WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete allocation")?;
        Ok(affected > 0)
    }

    async fn list(&self) -> Result<Vec<CourseAllocation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_allocations_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_allocations_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn courses(&self, id: i64) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses WHERE id IN \
             (SELECT course_id FROM allocation_courses WHERE allocation_id = ?) ORDER BY code",
            COURSE_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                courses_where_sqlite(self.pool.as_sqlite().unwrap(), &sql, id).await
            }
            DatabaseDriver::Mysql => courses_where_mysql(self.pool.as_mysql().unwrap(), &sql, id).await,
        }
    }

    async fn courses_of_lecturer(&self, lecturer_id: i64) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses WHERE id IN \
             (SELECT ac.course_id FROM allocation_courses ac \
              JOIN course_allocations a ON a.id = ac.allocation_id WHERE a.lecturer_id = ?) \
             ORDER BY code",
            COURSE_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                courses_where_sqlite(self.pool.as_sqlite().unwrap(), &sql, lecturer_id).await
            }
            DatabaseDriver::Mysql => {
                courses_where_mysql(self.pool.as_mysql().unwrap(), &sql, lecturer_id).await
            }
        }
    }

    async fn lecturers_of_course(&self, course_id: i64) -> Result<Vec<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                lecturers_of_course_sqlite(self.pool.as_sqlite().unwrap(), course_id).await
            }
            DatabaseDriver::Mysql => {
                lecturers_of_course_mysql(self.pool.as_mysql().unwrap(), course_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_allocation_sqlite(pool: &SqlitePool, column: &str, value: i64) -> Result<Option<CourseAllocation>> {
    let sql = format!(
        "SELECT id, lecturer_id, academic_session_id, created_at FROM course_allocations WHERE {} = ?",
        column
    );
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .context("Failed to get allocation")?;

    match row {
        Some(row) => Ok(Some(row_to_allocation_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn create_allocation_sqlite(
    pool: &SqlitePool,
    lecturer_id: i64,
    session_id: Option<i64>,
) -> Result<CourseAllocation> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO course_allocations (lecturer_id, academic_session_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(lecturer_id)
    .bind(session_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create allocation")?;

    Ok(CourseAllocation {
        id: result.last_insert_rowid(),
        lecturer_id,
        academic_session_id: session_id,
        created_at: now,
    })
}

async fn set_courses_sqlite(pool: &SqlitePool, id: i64, course_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM allocation_courses WHERE allocation_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear allocation courses")?;

    for course_id in course_ids {
        sqlx::query("INSERT OR IGNORE INTO allocation_courses (allocation_id, course_id) VALUES (?, ?)")
            .bind(id)
            .bind(*course_id)
            .execute(&mut *tx)
            .await
            .context("Failed to allocate course")?;
    }

    tx.commit().await.context("Failed to commit allocation courses")?;
    Ok(())
}

async fn list_allocations_sqlite(pool: &SqlitePool) -> Result<Vec<CourseAllocation>> {
    let rows = sqlx::query(
        "SELECT id, lecturer_id, academic_session_id, created_at FROM course_allocations ORDER BY id DESC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list allocations")?;

    rows.iter().map(row_to_allocation_sqlite).collect()
}

async fn courses_where_sqlite(pool: &SqlitePool, sql: &str, value: i64) -> Result<Vec<Course>> {
    let rows = sqlx::query(sql)
        .bind(value)
        .fetch_all(pool)
        .await
        .context("Failed to list allocated courses")?;

    rows.iter().map(row_to_course_sqlite).collect()
}

async fn lecturers_of_course_sqlite(pool: &SqlitePool, course_id: i64) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE id IN \
         (SELECT a.lecturer_id FROM course_allocations a \
          JOIN allocation_courses ac ON ac.allocation_id = a.id WHERE ac.course_id = ?) \
         ORDER BY first_name, last_name",
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(course_id)
        .fetch_all(pool)
        .await
        .context("Failed to list course lecturers")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

fn row_to_allocation_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CourseAllocation> {
    Ok(CourseAllocation {
        id: row.get("id"),
        lecturer_id: row.get("lecturer_id"),
        academic_session_id: row.get("academic_session_id"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_allocation_mysql(pool: &MySqlPool, column: &str, value: i64) -> Result<Option<CourseAllocation>> {
    let sql = format!(
        "SELECT id, lecturer_id, academic_session_id, created_at FROM course_allocations WHERE {} = ?",
        column
    );
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .context("Failed to get allocation")?;

    match row {
        Some(row) => Ok(Some(row_to_allocation_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn create_allocation_mysql(
    pool: &MySqlPool,
    lecturer_id: i64,
    session_id: Option<i64>,
) -> Result<CourseAllocation> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO course_allocations (lecturer_id, academic_session_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(lecturer_id)
    .bind(session_id)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create allocation")?;

    Ok(CourseAllocation {
        id: result.last_insert_id() as i64,
        lecturer_id,
        academic_session_id: session_id,
        created_at: now,
    })
}

async fn set_courses_mysql(pool: &MySqlPool, id: i64, course_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM allocation_courses WHERE allocation_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear allocation courses")?;

    for course_id in course_ids {
        sqlx::query("INSERT IGNORE INTO allocation_courses (allocation_id, course_id) VALUES (?, ?)")
            .bind(id)
            .bind(*course_id)
            .execute(&mut *tx)
            .await
            .context("Failed to allocate course")?;
    }

    tx.commit().await.context("Failed to commit allocation courses")?;
    Ok(())
}

async fn list_allocations_mysql(pool: &MySqlPool) -> Result<Vec<CourseAllocation>> {
    let rows = sqlx::query(
        "SELECT id, lecturer_id, academic_session_id, created_at FROM course_allocations ORDER BY id DESC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list allocations")?;

    rows.iter().map(row_to_allocation_mysql).collect()
}

async fn courses_where_mysql(pool: &MySqlPool, sql: &str, value: i64) -> Result<Vec<Course>> {
    let rows = sqlx::query(sql)
        .bind(value)
        .fetch_all(pool)
        .await
        .context("Failed to list allocated courses")?;

    rows.iter().map(row_to_course_mysql).collect()
}

async fn lecturers_of_course_mysql(pool: &MySqlPool, course_id: i64) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE id IN \
         (SELECT a.lecturer_id FROM course_allocations a \
          JOIN allocation_courses ac ON ac.allocation_id = a.id WHERE ac.course_id = ?) \
         ORDER BY first_name, last_name",
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(course_id)
        .fetch_all(pool)
        .await
        .context("Failed to list course lecturers")?;

    rows.iter().map(row_to_user_mysql).collect()
}

fn row_to_allocation_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CourseAllocation> {
    Ok(CourseAllocation {
        id: row.get("id"),
        lecturer_id: row.get("lecturer_id"),
        academic_session_id: row.get("academic_session_id"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> Arc<dyn AllocationRepository> {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();
        let now = Utc::now();
        for (name, email) in [("lec1", "l1@x.io"), ("lec2", "l2@x.io")] {
            sqlx::query("INSERT INTO users (username, email, first_name, last_name, password_hash, is_lecturer, created_at, updated_at) VALUES (?, ?, ?, '', 'h', 1, ?, ?)")
                .bind(name).bind(email).bind(name).bind(now).bind(now)
                .execute(sqlite).await.unwrap();
        }
        sqlx::query("INSERT INTO programs (title, summary, created_at, updated_at) VALUES ('CS', '', ?, ?)")
            .bind(now).bind(now)
            .execute(sqlite).await.unwrap();
        for (slug, code) in [("a", "A1"), ("b", "B1"), ("c", "C1")] {
            sqlx::query("INSERT INTO courses (slug, title, code, credit, summary, program_id, level, year, semester, is_elective, created_at, updated_at) VALUES (?, ?, ?, 3, '', 1, 'Bachelor', 1, 'First', 0, ?, ?)")
                .bind(slug).bind(slug).bind(code).bind(now).bind(now)
                .execute(sqlite).await.unwrap();
        }
        SqlxAllocationRepository::boxed(pool)
    }

    #[tokio::test]
    async fn test_set_courses_replaces_set() {
        let repo = setup().await;
        let allocation = repo.create(1, None).await.unwrap();

        repo.set_courses(allocation.id, &[1, 2]).await.unwrap();
        repo.set_courses(allocation.id, &[2, 3, 3]).await.unwrap();

        let codes: Vec<_> = repo.courses(allocation.id).await.unwrap().into_iter().map(|c| c.code).collect();
        assert_eq!(codes, vec!["B1", "C1"]);
        assert_eq!(repo.courses_of_lecturer(1).await.unwrap().len(), 2);
        assert!(repo.courses_of_lecturer(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_allocation_per_lecturer() {
        let repo = setup().await;
        repo.create(1, None).await.unwrap();
        assert!(repo.create(1, None).await.is_err());
        assert!(repo.get_by_lecturer(1).await.unwrap().is_some());
        assert!(repo.get_by_lecturer(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lecturers_of_course_and_delete() {
        let repo = setup().await;
        let first = repo.create(1, None).await.unwrap();
        let second = repo.create(2, None).await.unwrap();
        repo.add_course(first.id, 1).await.unwrap();
        repo.add_course(first.id, 1).await.unwrap();
        repo.add_course(second.id, 1).await.unwrap();

        let lecturers = repo.lecturers_of_course(1).await.unwrap();
        assert_eq!(lecturers.len(), 2);

        assert!(repo.delete(second.id).await.unwrap());
        assert_eq!(repo.lecturers_of_course(1).await.unwrap().len(), 1);
        assert_eq!(repo.list().await.unwrap().len(), 1);

        repo.set_lecturer(first.id, 2).await.unwrap();
        assert_eq!(repo.get_by_id(first.id).await.unwrap().unwrap().lecturer_id, 2);
    }
}
