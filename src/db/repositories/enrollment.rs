//! Enrollment repository
//!
//! Taken courses (student to course enrollment) and per-material progress
//! markers hanging off them.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Course, MaterialKind, MaterialProgress, TakenCourse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

use super::course::{row_to_course_mysql, row_to_course_sqlite, COURSE_COLUMNS};

/// Enrollment repository trait
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Enrollment of a student in a course, if any
    async fn find_taken(&self, student_id: i64, course_id: i64) -> Result<Option<TakenCourse>>;

    async fn get_taken(&self, id: i64) -> Result<Option<TakenCourse>>;

    /// Insert an enrollment. Callers check for an existing one first.
    async fn create_taken(&self, student_id: i64, course_id: i64) -> Result<TakenCourse>;

    /// Remove a student's enrollments in a course, returning how many rows went away
    async fn delete_taken(&self, student_id: i64, course_id: i64) -> Result<u64>;

    /// Courses a student is enrolled in, ordered by year then code
    async fn taken_courses(&self, student_id: i64) -> Result<Vec<Course>>;

    async fn find_progress(
        &self,
        taken_course_id: i64,
        material_id: i64,
        kind: MaterialKind,
    ) -> Result<Option<MaterialProgress>>;

    async fn create_progress(
        &self,
        taken_course_id: i64,
        material_id: i64,
        kind: MaterialKind,
    ) -> Result<MaterialProgress>;

    /// Returns whether a marker was removed
    async fn delete_progress(&self, taken_course_id: i64, material_id: i64, kind: MaterialKind) -> Result<bool>;

    async fn list_progress(&self, taken_course_id: i64) -> Result<Vec<MaterialProgress>>;

    /// Completed markers whose material still exists and is available
    async fn count_completed(&self, taken_course_id: i64) -> Result<i64>;
}

/// SQLx-based enrollment repository implementation
pub struct SqlxEnrollmentRepository {
    pool: DynDatabasePool,
}

impl SqlxEnrollmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EnrollmentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl EnrollmentRepository for SqlxEnrollmentRepository {
    async fn find_taken(&self, student_id: i64, course_id: i64) -> Result<Option<TakenCourse>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_taken_sqlite(self.pool.as_sqlite().unwrap(), student_id, course_id).await
            }
            DatabaseDriver::Mysql => {
                find_taken_mysql(self.pool.as_mysql().unwrap(), student_id, course_id).await
            }
        }
    }

    async fn get_taken(&self, id: i64) -> Result<Option<TakenCourse>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_taken_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_taken_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn create_taken(&self, student_id: i64, course_id: i64) -> Result<TakenCourse> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_taken_sqlite(self.pool.as_sqlite().unwrap(), student_id, course_id).await
            }
            DatabaseDriver::Mysql => {
                create_taken_mysql(self.pool.as_mysql().unwrap(), student_id, course_id).await
            }
        }
    }

    async fn delete_taken(&self, student_id: i64, course_id: i64) -> Result<u64> {
        let sql = "DELETE FROM taken_courses WHERE student_id = ? AND course_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(student_id)
                .bind(course_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(student_id)
                .bind(course_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to drop taken course")
    }

    async fn taken_courses(&self, student_id: i64) -> Result<Vec<Course>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                taken_courses_sqlite(self.pool.as_sqlite().unwrap(), student_id).await
            }
            DatabaseDriver::Mysql => taken_courses_mysql(self.pool.as_mysql().unwrap(), student_id).await,
        }
    }

    async fn find_progress(
        &self,
        taken_course_id: i64,
        material_id: i64,
        kind: MaterialKind,
    ) -> Result<Option<MaterialProgress>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_progress_sqlite(self.pool.as_sqlite().unwrap(), taken_course_id, material_id, kind)
                    .await
            }
            DatabaseDriver::Mysql => {
                find_progress_mysql(self.pool.as_mysql().unwrap(), taken_course_id, material_id, kind)
                    .await
            }
        }
    }

    async fn create_progress(
        &self,
        taken_course_id: i64,
        material_id: i64,
        kind: MaterialKind,
    ) -> Result<MaterialProgress> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_progress_sqlite(self.pool.as_sqlite().unwrap(), taken_course_id, material_id, kind)
                    .await
            }
            DatabaseDriver::Mysql => {
                create_progress_mysql(self.pool.as_mysql().unwrap(), taken_course_id, material_id, kind)
                    .await
            }
        }
    }

    async fn delete_progress(&self, taken_course_id: i64, material_id: i64, kind: MaterialKind) -> Result<bool> {
        let sql = "DELETE FROM student_material_progress \
                   WHERE taken_course_id = ? AND material_id = ? AND material_type = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(taken_course_id)
                .bind(material_id)
                .bind(kind.as_str())
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(taken_course_id)
                .bind(material_id)
                .bind(kind.as_str())
                .execute(self.pool.as_mysql().unwrap())
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete progress")?;
        Ok(affected > 0)
    }

    async fn list_progress(&self, taken_course_id: i64) -> Result<Vec<MaterialProgress>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_progress_sqlite(self.pool.as_sqlite().unwrap(), taken_course_id).await
            }
            DatabaseDriver::Mysql => {
                list_progress_mysql(self.pool.as_mysql().unwrap(), taken_course_id).await
            }
        }
    }

    async fn count_completed(&self, taken_course_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_completed_sqlite(self.pool.as_sqlite().unwrap(), taken_course_id).await
            }
            DatabaseDriver::Mysql => {
                count_completed_mysql(self.pool.as_mysql().unwrap(), taken_course_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn find_taken_sqlite(pool: &SqlitePool, student_id: i64, course_id: i64) -> Result<Option<TakenCourse>> {
    let row = sqlx::query(
        "SELECT id, student_id, course_id, created_at FROM taken_courses \
         WHERE student_id = ? AND course_id = ? ORDER BY id LIMIT 1",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
    .context("Failed to look up taken course")?;

    match row {
        Some(row) => Ok(Some(row_to_taken_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn get_taken_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<TakenCourse>> {
    let row = sqlx::query("SELECT id, student_id, course_id, created_at FROM taken_courses WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get taken course")?;

    match row {
        Some(row) => Ok(Some(row_to_taken_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn create_taken_sqlite(pool: &SqlitePool, student_id: i64, course_id: i64) -> Result<TakenCourse> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO taken_courses (student_id, course_id, created_at) VALUES (?, ?, ?)")
        .bind(student_id)
        .bind(course_id)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create taken course")?;

    Ok(TakenCourse {
        id: result.last_insert_rowid(),
        student_id,
        course_id,
        created_at: now,
    })
}

async fn taken_courses_sqlite(pool: &SqlitePool, student_id: i64) -> Result<Vec<Course>> {
    let sql = format!(
        "SELECT {} FROM courses WHERE id IN (SELECT course_id FROM taken_courses WHERE student_id = ?) \
         ORDER BY year, code",
        COURSE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(student_id)
        .fetch_all(pool)
        .await
        .context("Failed to list taken courses")?;

    rows.iter().map(row_to_course_sqlite).collect()
}

async fn find_progress_sqlite(
    pool: &SqlitePool,
    taken_course_id: i64,
    material_id: i64,
    kind: MaterialKind,
) -> Result<Option<MaterialProgress>> {
    let row = sqlx::query(
        "SELECT id, taken_course_id, material_id, material_type, completed_at FROM student_material_progress \
         WHERE taken_course_id = ? AND material_id = ? AND material_type = ?",
    )
    .bind(taken_course_id)
    .bind(material_id)
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await
    .context("Failed to look up progress")?;

    match row {
        Some(row) => Ok(Some(row_to_progress_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn create_progress_sqlite(
    pool: &SqlitePool,
    taken_course_id: i64,
    material_id: i64,
    kind: MaterialKind,
) -> Result<MaterialProgress> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO student_material_progress (taken_course_id, material_id, material_type, completed_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(taken_course_id)
    .bind(material_id)
    .bind(kind.as_str())
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create progress")?;

    Ok(MaterialProgress {
        id: result.last_insert_rowid(),
        taken_course_id,
        material_id,
        material_type: kind,
        completed_at: now,
    })
}

async fn list_progress_sqlite(pool: &SqlitePool, taken_course_id: i64) -> Result<Vec<MaterialProgress>> {
    let rows = sqlx::query(
        "SELECT id, taken_course_id, material_id, material_type, completed_at FROM student_material_progress \
         WHERE taken_course_id = ? ORDER BY id",
    )
    .bind(taken_course_id)
    .fetch_all(pool)
    .await
    .context("Failed to list progress")?;

    rows.iter().map(row_to_progress_sqlite).collect()
}

async fn count_completed_sqlite(pool: &SqlitePool, taken_course_id: i64) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) as count
        FROM student_material_progress p
        WHERE p.taken_course_id = ?
          AND ((p.material_type = 'file' AND EXISTS
                  (SELECT 1 FROM uploads u WHERE u.id = p.material_id AND u.is_available = ?))
            OR (p.material_type = 'video' AND EXISTS
                  (SELECT 1 FROM upload_videos v WHERE v.id = p.material_id AND v.is_available = ?)))
        "#,
    )
    .bind(taken_course_id)
    .bind(true)
    .bind(true)
    .fetch_one(pool)
    .await
    .context("Failed to count completed materials")?;
    Ok(row.get("count"))
}

fn row_to_taken_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<TakenCourse> {
    Ok(TakenCourse {
        id: row.get("id"),
        student_id: row.get("student_id"),
        course_id: row.get("course_id"),
        created_at: row.get("created_at"),
    })
}

fn row_to_progress_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<MaterialProgress> {
    let kind: String = row.get("material_type");
    Ok(MaterialProgress {
        id: row.get("id"),
        taken_course_id: row.get("taken_course_id"),
        material_id: row.get("material_id"),
        material_type: MaterialKind::from_str(&kind)?,
        completed_at: row.get("completed_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn find_taken_mysql(pool: &MySqlPool, student_id: i64, course_id: i64) -> Result<Option<TakenCourse>> {
    let row = sqlx::query(
        "SELECT id, student_id, course_id, created_at FROM taken_courses \
         WHERE student_id = ? AND course_id = ? ORDER BY id LIMIT 1",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
    .context("Failed to look up taken course")?;

    match row {
        Some(row) => Ok(Some(row_to_taken_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn get_taken_mysql(pool: &MySqlPool, id: i64) -> Result<Option<TakenCourse>> {
    let row = sqlx::query("SELECT id, student_id, course_id, created_at FROM taken_courses WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get taken course")?;

    match row {
        Some(row) => Ok(Some(row_to_taken_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn create_taken_mysql(pool: &MySqlPool, student_id: i64, course_id: i64) -> Result<TakenCourse> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO taken_courses (student_id, course_id, created_at) VALUES (?, ?, ?)")
        .bind(student_id)
        .bind(course_id)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create taken course")?;

    Ok(TakenCourse {
        id: result.last_insert_id() as i64,
        student_id,
        course_id,
        created_at: now,
    })
}

async fn taken_courses_mysql(pool: &MySqlPool, student_id: i64) -> Result<Vec<Course>> {
    let sql = format!(
        "SELECT {} FROM courses WHERE id IN (SELECT course_id FROM taken_courses WHERE student_id = ?) \
         ORDER BY year, code",
        COURSE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(student_id)
        .fetch_all(pool)
        .await
        .context("Failed to list taken courses")?;

    rows.iter().map(row_to_course_mysql).collect()
}

async fn find_progress_mysql(
    pool: &MySqlPool,
    taken_course_id: i64,
    material_id: i64,
    kind: MaterialKind,
) -> Result<Option<MaterialProgress>> {
    let row = sqlx::query(
        "SELECT id, taken_course_id, material_id, material_type, completed_at FROM student_material_progress \
         WHERE taken_course_id = ? AND material_id = ? AND material_type = ?",
    )
    .bind(taken_course_id)
    .bind(material_id)
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await
    .context("Failed to look up progress")?;

    match row {
        Some(row) => Ok(Some(row_to_progress_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn create_progress_mysql(
    pool: &MySqlPool,
    taken_course_id: i64,
    material_id: i64,
    kind: MaterialKind,
) -> Result<MaterialProgress> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO student_material_progress (taken_course_id, material_id, material_type, completed_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(taken_course_id)
    .bind(material_id)
    .bind(kind.as_str())
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create progress")?;

    Ok(MaterialProgress {
        id: result.last_insert_id() as i64,
        taken_course_id,
        material_id,
        material_type: kind,
        completed_at: now,
    })
}

async fn list_progress_mysql(pool: &MySqlPool, taken_course_id: i64) -> Result<Vec<MaterialProgress>> {
    let rows = sqlx::query(
        "SELECT id, taken_course_id, material_id, material_type, completed_at FROM student_material_progress \
         WHERE taken_course_id = ? ORDER BY id",
    )
    .bind(taken_course_id)
    .fetch_all(pool)
    .await
    .context("Failed to list progress")?;

    rows.iter().map(row_to_progress_mysql).collect()
}

async fn count_completed_mysql(pool: &MySqlPool, taken_course_id: i64) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) as count
        FROM student_material_progress p
        WHERE p.taken_course_id = ?
          AND ((p.material_type = 'file' AND EXISTS
                  (SELECT 1 FROM uploads u WHERE u.id = p.material_id AND u.is_available = ?))
            OR (p.material_type = 'video' AND EXISTS
                  (SELECT 1 FROM upload_videos v WHERE v.id = p.material_id AND v.is_available = ?)))
        "#,
    )
    .bind(taken_course_id)
    .bind(true)
    .bind(true)
    .fetch_one(pool)
    .await
    .context("Failed to count completed materials")?;
    Ok(row.get("count"))
}

fn row_to_taken_mysql(row: &sqlx::mysql::MySqlRow) -> Result<TakenCourse> {
    Ok(TakenCourse {
        id: row.get("id"),
        student_id: row.get("student_id"),
        course_id: row.get("course_id"),
        created_at: row.get("created_at"),
    })
}

fn row_to_progress_mysql(row: &sqlx::mysql::MySqlRow) -> Result<MaterialProgress> {
    let kind: String = row.get("material_type");
    Ok(MaterialProgress {
        id: row.get("id"),
        taken_course_id: row.get("taken_course_id"),
        material_id: row.get("material_id"),
        material_type: MaterialKind::from_str(&kind)?,
        completed_at: row.get("completed_at"),
    })
}
