//! Course repository
//!
//! Database operations for courses, including the transactional copy of a
//! course together with its uploads, videos and quizzes.
//!
//! This module provides:
//! - `CourseRepository` trait defining the interface for course data access
//! - `SqlxCourseRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Course, CourseInput, DuplicationCounts, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use super::program::like_pattern;

/// Columns selected for every course query
pub(crate) const COURSE_COLUMNS: &str = "id, slug, title, code, credit, summary, program_id, \
    level, year, semester, is_elective, created_at, updated_at";

/// Course repository trait
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Create a new course with an already-unique slug
    async fn create(&self, input: &CourseInput, slug: &str) -> Result<Course>;

    /// Get course by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    /// Get course by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Course>>;

    /// Get course by code
    async fn get_by_code(&self, code: &str) -> Result<Option<Course>>;

    /// Check whether a slug is taken, optionally ignoring one course
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Update a course
    async fn update(&self, id: i64, input: &CourseInput, slug: &str) -> Result<Course>;

    /// Delete a course. Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// List courses ordered by year descending, optionally filtered by a
    /// case-insensitive substring of title, summary, code or slug
    async fn list(&self, search: Option<&str>, params: &ListParams) -> Result<(Vec<Course>, i64)>;

    /// One page of a program's courses ordered by year descending
    async fn list_by_program(&self, program_id: i64, params: &ListParams) -> Result<(Vec<Course>, i64)>;

    /// Courses offered in a semester, optionally restricted to a program and level, ordered by year
    async fn list_offered(
        &self,
        program_id: Option<i64>,
        level: Option<&str>,
        semester: &str,
    ) -> Result<Vec<Course>>;

    /// Copy `source_id` into a new course built from `input`, with its uploads,
    /// videos and quizzes, in one transaction
    async fn duplicate(
        &self,
        source_id: i64,
        input: &CourseInput,
        slug: &str,
    ) -> Result<(Course, DuplicationCounts)>;
}

/// SQLx-based course repository implementation
pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    /// Create a new SQLx course repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, input: &CourseInput, slug: &str) -> Result<Course> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_course_sqlite(self.pool.as_sqlite().unwrap(), input, slug).await
            }
            DatabaseDriver::Mysql => create_course_mysql(self.pool.as_mysql().unwrap(), input, slug).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_course_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_course_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_course_by_text_sqlite(self.pool.as_sqlite().unwrap(), "slug", slug).await
            }
            DatabaseDriver::Mysql => {
                get_course_by_text_mysql(self.pool.as_mysql().unwrap(), "slug", slug).await
            }
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Course>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_course_by_text_sqlite(self.pool.as_sqlite().unwrap(), "code", code).await
            }
            DatabaseDriver::Mysql => {
                get_course_by_text_mysql(self.pool.as_mysql().unwrap(), "code", code).await
            }
        }
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                slug_exists_sqlite(self.pool.as_sqlite().unwrap(), slug, exclude_id).await
            }
            DatabaseDriver::Mysql => {
                slug_exists_mysql(self.pool.as_mysql().unwrap(), slug, exclude_id).await
            }
        }
    }

    async fn update(&self, id: i64, input: &CourseInput, slug: &str) -> Result<Course> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_course_sqlite(self.pool.as_sqlite().unwrap(), id, input, slug).await
            }
            DatabaseDriver::Mysql => {
                update_course_mysql(self.pool.as_mysql().unwrap(), id, input, slug).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_course_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_course_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list(&self, search: Option<&str>, params: &ListParams) -> Result<(Vec<Course>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_courses_sqlite(self.pool.as_sqlite().unwrap(), search, params).await
            }
            DatabaseDriver::Mysql => {
                list_courses_mysql(self.pool.as_mysql().unwrap(), search, params).await
            }
        }
    }

    async fn list_by_program(&self, program_id: i64, params: &ListParams) -> Result<(Vec<Course>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_program_courses_sqlite(self.pool.as_sqlite().unwrap(), program_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_program_courses_mysql(self.pool.as_mysql().unwrap(), program_id, params).await
            }
        }
    }

    async fn list_offered(
        &self,
        program_id: Option<i64>,
        level: Option<&str>,
        semester: &str,
    ) -> Result<Vec<Course>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_offered_sqlite(self.pool.as_sqlite().unwrap(), program_id, level, semester).await
            }
            DatabaseDriver::Mysql => {
                list_offered_mysql(self.pool.as_mysql().unwrap(), program_id, level, semester).await
            }
        }
    }

    async fn duplicate(
        &self,
        source_id: i64,
        input: &CourseInput,
        slug: &str,
    ) -> Result<(Course, DuplicationCounts)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                duplicate_course_sqlite(self.pool.as_sqlite().unwrap(), source_id, input, slug).await
            }
            DatabaseDriver::Mysql => {
                duplicate_course_mysql(self.pool.as_mysql().unwrap(), source_id, input, slug).await
            }
        }
    }
}

/// Fresh slug for a copied video
fn copied_video_slug(slug: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", slug, &suffix[..8])
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_course_sqlite(
    conn: &mut sqlx::SqliteConnection,
    input: &CourseInput,
    slug: &str,
) -> Result<i64> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO courses (slug, title, code, credit, summary, program_id, level, year,
                             semester, is_elective, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(slug)
    .bind(&input.title)
    .bind(&input.code)
    .bind(input.credit)
    .bind(&input.summary)
    .bind(input.program_id)
    .bind(&input.level)
    .bind(input.year)
    .bind(&input.semester)
    .bind(input.is_elective)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await
    .context("Failed to create course")?;

    Ok(result.last_insert_rowid())
}

async fn create_course_sqlite(pool: &SqlitePool, input: &CourseInput, slug: &str) -> Result<Course> {
    let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
    let id = insert_course_sqlite(&mut conn, input, slug).await?;
    drop(conn);

    get_course_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Course not found after insert"))
}

async fn get_course_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get course by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_course_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn get_course_by_text_sqlite(pool: &SqlitePool, column: &str, value: &str) -> Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE {} = ?", COURSE_COLUMNS, column);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get course by {}", column))?;

    match row {
        Some(row) => Ok(Some(row_to_course_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn slug_exists_sqlite(pool: &SqlitePool, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM courses WHERE slug = ? AND id <> ?")
        .bind(slug)
        .bind(exclude_id.unwrap_or(0))
        .fetch_one(pool)
        .await
        .context("Failed to check course slug")?;
    let count: i64 = row.get("count");
    Ok(count > 0)
}

async fn update_course_sqlite(pool: &SqlitePool, id: i64, input: &CourseInput, slug: &str) -> Result<Course> {
    sqlx::query(
        r#"
        UPDATE courses
        SET slug = ?, title = ?, code = ?, credit = ?, summary = ?, program_id = ?,
            level = ?, year = ?, semester = ?, is_elective = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(slug)
    .bind(&input.title)
    .bind(&input.code)
    .bind(input.credit)
    .bind(&input.summary)
    .bind(input.program_id)
    .bind(&input.level)
    .bind(input.year)
    .bind(&input.semester)
    .bind(input.is_elective)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update course")?;

    get_course_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Course not found after update"))
}

async fn delete_course_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete course")?;
    Ok(result.rows_affected() > 0)
}

async fn list_courses_sqlite(
    pool: &SqlitePool,
    search: Option<&str>,
    params: &ListParams,
) -> Result<(Vec<Course>, i64)> {
    let pattern = search.filter(|s| !s.trim().is_empty()).map(like_pattern);
    let filter = if pattern.is_some() {
        "WHERE LOWER(title) LIKE ? OR LOWER(summary) LIKE ? OR LOWER(code) LIKE ? OR LOWER(slug) LIKE ?"
    } else {
        ""
    };

    let count_sql = format!("SELECT COUNT(*) as count FROM courses {}", filter);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(p) = &pattern {
        count_query = count_query.bind(p).bind(p).bind(p).bind(p);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count courses")?
        .get("count");

    let sql = format!(
        "SELECT {} FROM courses {} ORDER BY year DESC, id DESC LIMIT ? OFFSET ?",
        COURSE_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql);
    if let Some(p) = &pattern {
        query = query.bind(p).bind(p).bind(p).bind(p);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list courses")?;

    let courses = rows.iter().map(row_to_course_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((courses, total))
}

async fn list_program_courses_sqlite(
    pool: &SqlitePool,
    program_id: i64,
    params: &ListParams,
) -> Result<(Vec<Course>, i64)> {
    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM courses WHERE program_id = ?")
        .bind(program_id)
        .fetch_one(pool)
        .await
        .context("Failed to count program courses")?
        .get("count");

    let sql = format!(
        "SELECT {} FROM courses WHERE program_id = ? ORDER BY year DESC, id DESC LIMIT ? OFFSET ?",
        COURSE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(program_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list program courses")?;

    let courses = rows.iter().map(row_to_course_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((courses, total))
}

async fn list_offered_sqlite(
    pool: &SqlitePool,
    program_id: Option<i64>,
    level: Option<&str>,
    semester: &str,
) -> Result<Vec<Course>> {
    let mut sql = format!("SELECT {} FROM courses WHERE LOWER(semester) = ?", COURSE_COLUMNS);
    if program_id.is_some() {
        sql.push_str(" AND program_id = ?");
    }
    if level.is_some() {
        sql.push_str(" AND level = ?");
    }
    sql.push_str(" ORDER BY year, id");

    let mut query = sqlx::query(&sql).bind(semester.to_lowercase());
    if let Some(program_id) = program_id {
        query = query.bind(program_id);
    }
    if let Some(level) = level {
        query = query.bind(level);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list offered courses")?;

    rows.iter().map(row_to_course_sqlite).collect()
}

async fn duplicate_course_sqlite(
    pool: &SqlitePool,
    source_id: i64,
    input: &CourseInput,
    slug: &str,
) -> Result<(Course, DuplicationCounts)> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let mut counts = DuplicationCounts::default();
    let now = Utc::now();

    let new_id = insert_course_sqlite(&mut tx, input, slug).await?;

    let uploads = sqlx::query(
        "SELECT title, module_number, file_path, is_available FROM uploads WHERE course_id = ? ORDER BY id",
    )
    .bind(source_id)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to read uploads for duplication")?;
    for row in &uploads {
        sqlx::query(
            r#"
            INSERT INTO uploads (title, course_id, module_number, file_path, is_available, upload_time, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.get::<String, _>("title"))
        .bind(new_id)
        .bind(row.get::<i32, _>("module_number"))
        .bind(row.get::<String, _>("file_path"))
        .bind(row.get::<bool, _>("is_available"))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to copy upload")?;
        counts.uploads += 1;
    }

    let videos = sqlx::query(
        "SELECT title, slug, module_number, video_path, is_available, summary FROM upload_videos WHERE course_id = ? ORDER BY id",
    )
    .bind(source_id)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to read videos for duplication")?;
    for row in &videos {
        let video_slug: String = row.get("slug");
        sqlx::query(
            r#"
            INSERT INTO upload_videos (title, slug, course_id, module_number, video_path, is_available, summary, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.get::<String, _>("title"))
        .bind(copied_video_slug(&video_slug))
        .bind(new_id)
        .bind(row.get::<i32, _>("module_number"))
        .bind(row.get::<String, _>("video_path"))
        .bind(row.get::<bool, _>("is_available"))
        .bind(row.get::<String, _>("summary"))
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to copy video")?;
        counts.videos += 1;
    }

    let quizzes = sqlx::query(
        r#"
        SELECT id, title, description, pass_mark, single_attempt, random_order,
               answers_at_end, exam_paper, draft
        FROM quizzes WHERE course_id = ? ORDER BY id
        "#,
    )
    .bind(source_id)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to read quizzes for duplication")?;
    for row in &quizzes {
        let result = sqlx::query(
            r#"
            INSERT INTO quizzes (course_id, title, description, pass_mark, single_attempt,
                                 random_order, answers_at_end, exam_paper, draft, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new_id)
        .bind(row.get::<String, _>("title"))
        .bind(row.get::<String, _>("description"))
        .bind(row.get::<Option<i32>, _>("pass_mark"))
        .bind(row.get::<bool, _>("single_attempt"))
        .bind(row.get::<bool, _>("random_order"))
        .bind(row.get::<bool, _>("answers_at_end"))
        .bind(row.get::<bool, _>("exam_paper"))
        .bind(row.get::<bool, _>("draft"))
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to copy quiz")?;
        let new_quiz_id = result.last_insert_rowid();
        counts.quizzes += 1;

        let links = sqlx::query("SELECT question_id FROM quiz_questions WHERE quiz_id = ? ORDER BY question_id")
            .bind(row.get::<i64, _>("id"))
            .fetch_all(&mut *tx)
            .await
            .context("Failed to read quiz questions for duplication")?;
        for link in &links {
            sqlx::query("INSERT INTO quiz_questions (quiz_id, question_id) VALUES (?, ?)")
                .bind(new_quiz_id)
                .bind(link.get::<i64, _>("question_id"))
                .execute(&mut *tx)
                .await
                .context("Failed to copy quiz question")?;
            counts.questions += 1;
        }
    }

    tx.commit().await.context("Failed to commit course duplication")?;

    let course = get_course_by_id_sqlite(pool, new_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Course not found after duplication"))?;
    Ok((course, counts))
}

pub(crate) fn row_to_course_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Course> {
    Ok(Course {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        code: row.get("code"),
        credit: row.get("credit"),
        summary: row.get("summary"),
        program_id: row.get("program_id"),
        level: row.get("level"),
        year: row.get("year"),
        semester: row.get("semester"),
        is_elective: row.get("is_elective"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn insert_course_mysql(
    conn: &mut sqlx::MySqlConnection,
    input: &CourseInput,
    slug: &str,
) -> Result<i64> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO courses (slug, title, code, credit, summary, program_id, level, year,
                             semester, is_elective, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(slug)
    .bind(&input.title)
    .bind(&input.code)
    .bind(input.credit)
    .bind(&input.summary)
    .bind(input.program_id)
    .bind(&input.level)
    .bind(input.year)
    .bind(&input.semester)
    .bind(input.is_elective)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await
    .context("Failed to create course")?;

    Ok(result.last_insert_id() as i64)
}

async fn create_course_mysql(pool: &MySqlPool, input: &CourseInput, slug: &str) -> Result<Course> {
    let mut conn = pool.acquire().await.context("Failed to acquire connection")?;
    let id = insert_course_mysql(&mut conn, input, slug).await?;
    drop(conn);

    get_course_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Course not found after insert"))
}

async fn get_course_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get course by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_course_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn get_course_by_text_mysql(pool: &MySqlPool, column: &str, value: &str) -> Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE {} = ?", COURSE_COLUMNS, column);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get course by {}", column))?;

    match row {
        Some(row) => Ok(Some(row_to_course_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn slug_exists_mysql(pool: &MySqlPool, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM courses WHERE slug = ? AND id <> ?")
        .bind(slug)
        .bind(exclude_id.unwrap_or(0))
        .fetch_one(pool)
        .await
        .context("Failed to check course slug")?;
    let count: i64 = row.get("count");
    Ok(count > 0)
}

async fn update_course_mysql(pool: &MySqlPool, id: i64, input: &CourseInput, slug: &str) -> Result<Course> {
    sqlx::query(
        r#"
        UPDATE courses
        SET slug = ?, title = ?, code = ?, credit = ?, summary = ?, program_id = ?,
            level = ?, year = ?, semester = ?, is_elective = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(slug)
    .bind(&input.title)
    .bind(&input.code)
    .bind(input.credit)
    .bind(&input.summary)
    .bind(input.program_id)
    .bind(&input.level)
    .bind(input.year)
    .bind(&input.semester)
    .bind(input.is_elective)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update course")?;

    get_course_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Course not found after update"))
}

async fn delete_course_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete course")?;
    Ok(result.rows_affected() > 0)
}

async fn list_courses_mysql(
    pool: &MySqlPool,
    search: Option<&str>,
    params: &ListParams,
) -> Result<(Vec<Course>, i64)> {
    let pattern = search.filter(|s| !s.trim().is_empty()).map(like_pattern);
    let filter = if pattern.is_some() {
        "WHERE LOWER(title) LIKE ? OR LOWER(summary) LIKE ? OR LOWER(code) LIKE ? OR LOWER(slug) LIKE ?"
    } else {
        ""
    };

    let count_sql = format!("SELECT COUNT(*) as count FROM courses {}", filter);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(p) = &pattern {
        count_query = count_query.bind(p).bind(p).bind(p).bind(p);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count courses")?
        .get("count");

    let sql = format!(
        "SELECT {} FROM courses {} ORDER BY year DESC, id DESC LIMIT ? OFFSET ?",
        COURSE_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql);
    if let Some(p) = &pattern {
        query = query.bind(p).bind(p).bind(p).bind(p);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list courses")?;

    let courses = rows.iter().map(row_to_course_mysql).collect::<Result<Vec<_>>>()?;
    Ok((courses, total))
}

async fn list_program_courses_mysql(
    pool: &MySqlPool,
    program_id: i64,
    params: &ListParams,
) -> Result<(Vec<Course>, i64)> {
    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM courses WHERE program_id = ?")
        .bind(program_id)
        .fetch_one(pool)
        .await
        .context("Failed to count program courses")?
        .get("count");

    let sql = format!(
        "SELECT {} FROM courses WHERE program_id = ? ORDER BY year DESC, id DESC LIMIT ? OFFSET ?",
        COURSE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(program_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list program courses")?;

    let courses = rows.iter().map(row_to_course_mysql).collect::<Result<Vec<_>>>()?;
    Ok((courses, total))
}

async fn list_offered_mysql(
    pool: &MySqlPool,
    program_id: Option<i64>,
    level: Option<&str>,
    semester: &str,
) -> Result<Vec<Course>> {
    let mut sql = format!("SELECT {} FROM courses WHERE LOWER(semester) = ?", COURSE_COLUMNS);
    if program_id.is_some() {
        sql.push_str(" AND program_id = ?");
    }
    if level.is_some() {
        sql.push_str(" AND level = ?");
    }
    sql.push_str(" ORDER BY year, id");

    let mut query = sqlx::query(&sql).bind(semester.to_lowercase());
    if let Some(program_id) = program_id {
        query = query.bind(program_id);
    }
    if let Some(level) = level {
        query = query.bind(level);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list offered courses")?;

    rows.iter().map(row_to_course_mysql).collect()
}

async fn duplicate_course_mysql(
    pool: &MySqlPool,
    source_id: i64,
    input: &CourseInput,
    slug: &str,
) -> Result<(Course, DuplicationCounts)> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let mut counts = DuplicationCounts::default();
    let now = Utc::now();

    let new_id = insert_course_mysql(&mut tx, input, slug).await?;

    let uploads = sqlx::query(
        "SELECT title, module_number, file_path, is_available FROM uploads WHERE course_id = ? ORDER BY id",
    )
    .bind(source_id)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to read uploads for duplication")?;
    for row in &uploads {
        sqlx::query(
            r#"
            INSERT INTO uploads (title, course_id, module_number, file_path, is_available, upload_time, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.get::<String, _>("title"))
        .bind(new_id)
        .bind(row.get::<i32, _>("module_number"))
        .bind(row.get::<String, _>("file_path"))
        .bind(row.get::<bool, _>("is_available"))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to copy upload")?;
        counts.uploads += 1;
    }

    let videos = sqlx::query(
        "SELECT title, slug, module_number, video_path, is_available, summary FROM upload_videos WHERE course_id = ? ORDER BY id",
    )
    .bind(source_id)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to read videos for duplication")?;
    for row in &videos {
        let video_slug: String = row.get("slug");
        sqlx::query(
            r#"
            INSERT INTO upload_videos (title, slug, course_id, module_number, video_path, is_available, summary, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.get::<String, _>("title"))
        .bind(copied_video_slug(&video_slug))
        .bind(new_id)
        .bind(row.get::<i32, _>("module_number"))
        .bind(row.get::<String, _>("video_path"))
        .bind(row.get::<bool, _>("is_available"))
        .bind(row.get::<String, _>("summary"))
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to copy video")?;
        counts.videos += 1;
    }

    let quizzes = sqlx::query(
        r#"
        SELECT id, title, description, pass_mark, single_attempt, random_order,
               answers_at_end, exam_paper, draft
        FROM quizzes WHERE course_id = ? ORDER BY id
        "#,
    )
    .bind(source_id)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to read quizzes for duplication")?;
    for row in &quizzes {
        let result = sqlx::query(
            r#"
            INSERT INTO quizzes (course_id, title, description, pass_mark, single_attempt,
                                 random_order, answers_at_end, exam_paper, draft, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new_id)
        .bind(row.get::<String, _>("title"))
        .bind(row.get::<String, _>("description"))
        .bind(row.get::<Option<i32>, _>("pass_mark"))
        .bind(row.get::<bool, _>("single_attempt"))
        .bind(row.get::<bool, _>("random_order"))
        .bind(row.get::<bool, _>("answers_at_end"))
        .bind(row.get::<bool, _>("exam_paper"))
        .bind(row.get::<bool, _>("draft"))
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to copy quiz")?;
        let new_quiz_id = result.last_insert_id() as i64;
        counts.quizzes += 1;

        let links = sqlx::query("SELECT question_id FROM quiz_questions WHERE quiz_id = ? ORDER BY question_id")
            .bind(row.get::<i64, _>("id"))
            .fetch_all(&mut *tx)
            .await
            .context("Failed to read quiz questions for duplication")?;
        for link in &links {
            sqlx::query("INSERT INTO quiz_questions (quiz_id, question_id) VALUES (?, ?)")
                .bind(new_quiz_id)
                .bind(link.get::<i64, _>("question_id"))
                .execute(&mut *tx)
                .await
                .context("Failed to copy quiz question")?;
            counts.questions += 1;
        }
    }

    tx.commit().await.context("Failed to commit course duplication")?;

    let course = get_course_by_id_mysql(pool, new_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Course not found after duplication"))?;
    Ok((course, counts))
}

pub(crate) fn row_to_course_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Course> {
    Ok(Course {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        code: row.get("code"),
        credit: row.get("credit"),
        summary: row.get("summary"),
        program_id: row.get("program_id"),
        level: row.get("level"),
        year: row.get("year"),
        semester: row.get("semester"),
        is_elective: row.get("is_elective"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (DynDatabasePool, Arc<dyn CourseRepository>) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        sqlx::query("INSERT INTO programs (title, summary, created_at, updated_at) VALUES ('CS', '', ?, ?)")
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        (pool.clone(), SqlxCourseRepository::boxed(pool))
    }

    fn input(title: &str, code: &str, year: i32) -> CourseInput {
        CourseInput {
            title: title.to_string(),
            code: code.to_string(),
            credit: 3,
            summary: format!("About {}", title),
            program_id: 1,
            level: "Bachelor".to_string(),
            year,
            semester: "First".to_string(),
            is_elective: false,
        }
    }

    #[tokio::test]
    async fn test_course_crud() {
        let (_pool, repo) = setup().await;

        let course = repo.create(&input("Algorithms", "CS201", 2), "algorithms").await.unwrap();
        assert_eq!(course.slug, "algorithms");
        assert!(repo.slug_exists("algorithms", None).await.unwrap());
        assert!(!repo.slug_exists("algorithms", Some(course.id)).await.unwrap());

        let mut changed = input("Advanced Algorithms", "CS202", 3);
        changed.credit = 5;
        let updated = repo.update(course.id, &changed, "advanced-algorithms").await.unwrap();
        assert_eq!(updated.credit, 5);
        assert_eq!(repo.get_by_code("CS202").await.unwrap().unwrap().id, course.id);
        assert!(repo.get_by_slug("algorithms").await.unwrap().is_none());

        assert!(repo.delete(course.id).await.unwrap());
        assert!(repo.get_by_id(course.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_year_and_paginates() {
        let (_pool, repo) = setup().await;
        for i in 0..12 {
            let year = (i % 4) + 1;
            repo.create(&input(&format!("Course {}", i), &format!("C{}", i), year), &format!("course-{}", i))
                .await
                .unwrap();
        }

        let (page1, total) = repo.list(None, &ListParams::page(1)).await.unwrap();
        assert_eq!(total, 12);
        assert_eq!(page1.len(), 10);
        assert_eq!(page1[0].year, 4);
        assert!(page1.windows(2).all(|w| w[0].year >= w[1].year));

        let (page2, _) = repo.list_by_program(1, &ListParams::page(2)).await.unwrap();
        assert_eq!(page2.len(), 2);
        assert_eq!(page2[1].year, 1);
    }

    #[tokio::test]
    async fn test_search_matches_code_and_slug() {
        let (_pool, repo) = setup().await;
        repo.create(&input("Databases", "DB101", 1), "databases").await.unwrap();
        repo.create(&input("Networks", "NET200", 2), "networks").await.unwrap();

        let (by_code, total) = repo.list(Some("db1"), &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(by_code[0].code, "DB101");

        let (by_slug, _) = repo.list(Some("NETWORK"), &ListParams::default()).await.unwrap();
        assert_eq!(by_slug[0].slug, "networks");
    }

    #[tokio::test]
    async fn test_list_offered_is_case_insensitive() {
        let (_pool, repo) = setup().await;
        let mut second = input("Compilers", "CS400", 4);
        second.semester = "Second".to_string();
        repo.create(&second, "compilers").await.unwrap();
        repo.create(&input("Logic", "CS100", 1), "logic").await.unwrap();

        let offered = repo.list_offered(Some(1), Some("Bachelor"), "second").await.unwrap();
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].code, "CS400");
        assert!(repo.list_offered(Some(1), Some("Master"), "First").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_copies_materials() {
        let (pool, repo) = setup().await;
        let source = repo.create(&input("Operating Systems", "OS300", 3), "operating-systems").await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();
        let now = Utc::now();

        for (title, path) in [("Week 1", "course_files/a.pdf"), ("Week 2", "course_files/b.pdf")] {
            sqlx::query("INSERT INTO uploads (title, course_id, module_number, file_path, is_available, upload_time, updated_at) VALUES (?, ?, 1, ?, 1, ?, ?)")
                .bind(title).bind(source.id).bind(path).bind(now).bind(now)
                .execute(sqlite).await.unwrap();
        }
        sqlx::query("INSERT INTO upload_videos (title, slug, course_id, module_number, video_path, is_available, summary, created_at) VALUES ('Intro', 'intro', ?, 1, 'course_videos/v.mp4', 0, 's', ?)")
            .bind(source.id).bind(now)
            .execute(sqlite).await.unwrap();
        sqlx::query("INSERT INTO quizzes (course_id, title, description, pass_mark, created_at) VALUES (?, 'Quiz', '', 50, ?)")
            .bind(source.id).bind(now)
            .execute(sqlite).await.unwrap();
        for content in ["Q1", "Q2"] {
            sqlx::query("INSERT INTO questions (content, created_at) VALUES (?, ?)")
                .bind(content).bind(now)
                .execute(sqlite).await.unwrap();
        }
        sqlx::query("INSERT INTO quiz_questions (quiz_id, question_id) VALUES (1, 1), (1, 2)")
            .execute(sqlite).await.unwrap();

        let copy_input = CourseInput::copy_of(&source);
        let (copy, counts) = repo.duplicate(source.id, &copy_input, "copy-of-operating-systems").await.unwrap();

        assert_eq!(copy.title, "Copy of Operating Systems");
        assert_eq!(copy.code, "Copy-OS300");
        assert_eq!(
            counts,
            DuplicationCounts { uploads: 2, videos: 1, quizzes: 1, questions: 2 }
        );

        let (paths,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM uploads WHERE course_id = ? AND file_path LIKE 'course_files/%'")
            .bind(copy.id)
            .fetch_one(sqlite).await.unwrap();
        assert_eq!(paths, 2);
        let (available,): (bool,) = sqlx::query_as("SELECT is_available FROM upload_videos WHERE course_id = ?")
            .bind(copy.id)
            .fetch_one(sqlite).await.unwrap();
        assert!(!available);
    }

    #[tokio::test]
    async fn test_duplicate_rolls_back_on_conflict() {
        let (pool, repo) = setup().await;
        let source = repo.create(&input("Graphics", "GR100", 2), "graphics").await.unwrap();
        sqlx::query("INSERT INTO uploads (title, course_id, module_number, file_path, is_available, upload_time, updated_at) VALUES ('w', ?, 1, 'course_files/g.pdf', 1, ?, ?)")
            .bind(source.id).bind(Utc::now()).bind(Utc::now())
            .execute(pool.as_sqlite().unwrap()).await.unwrap();

        // Same code as the source: unique violation aborts the copy
        let result = repo.duplicate(source.id, &input("Graphics", "GR100", 2), "graphics-2").await;
        assert!(result.is_err());

        let (courses,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
            .fetch_one(pool.as_sqlite().unwrap()).await.unwrap();
        let (uploads,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM uploads")
            .fetch_one(pool.as_sqlite().unwrap()).await.unwrap();
        assert_eq!(courses, 1);
        assert_eq!(uploads, 1);
    }
}
