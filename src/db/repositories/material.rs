//! Material repository
//!
//! Database operations for course uploads (documents) and videos.
//!
//! Stored objects may be shared by several rows (course duplication reuses
//! the storage path), so deletions report how many rows still reference a path.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{MaterialUpdate, NewUpload, NewUploadVideo, Upload, UploadVideo};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const UPLOAD_COLUMNS: &str =
    "id, title, course_id, module_number, file_path, is_available, upload_time, updated_at";
const VIDEO_COLUMNS: &str =
    "id, title, slug, course_id, module_number, video_path, is_available, summary, created_at";

/// Material repository trait
#[async_trait]
pub trait MaterialRepository: Send + Sync {
    async fn create_upload(&self, upload: &NewUpload) -> Result<Upload>;

    async fn get_upload(&self, id: i64) -> Result<Option<Upload>>;

    async fn update_upload(&self, id: i64, update: &MaterialUpdate) -> Result<Upload>;

    /// Delete an upload row. Returns whether a row was removed.
    async fn delete_upload(&self, id: i64) -> Result<bool>;

    /// Number of upload rows referencing a storage path
    async fn count_uploads_by_path(&self, path: &str) -> Result<i64>;

    /// Uploads of a course ordered by module, optionally only available ones
    async fn list_uploads(&self, course_id: i64, available_only: bool) -> Result<Vec<Upload>>;

    async fn create_video(&self, video: &NewUploadVideo) -> Result<UploadVideo>;

    async fn get_video(&self, id: i64) -> Result<Option<UploadVideo>>;

    async fn get_video_by_slug(&self, slug: &str) -> Result<Option<UploadVideo>>;

    async fn video_slug_exists(&self, slug: &str) -> Result<bool>;

    async fn update_video(&self, id: i64, update: &MaterialUpdate) -> Result<UploadVideo>;

    /// Delete a video row. Returns whether a row was removed.
    async fn delete_video(&self, id: i64) -> Result<bool>;

    /// Number of video rows referencing a storage path
    async fn count_videos_by_path(&self, path: &str) -> Result<i64>;

    /// Videos of a course ordered by module, optionally only available ones
    async fn list_videos(&self, course_id: i64, available_only: bool) -> Result<Vec<UploadVideo>>;

    /// Available uploads plus available videos of a course
    async fn count_available(&self, course_id: i64) -> Result<i64>;
}

/// SQLx-based material repository implementation
pub struct SqlxMaterialRepository {
    pool: DynDatabasePool,
}

impl SqlxMaterialRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MaterialRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MaterialRepository for SqlxMaterialRepository {
    async fn create_upload(&self, upload: &NewUpload) -> Result<Upload> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_upload_sqlite(self.pool.as_sqlite().unwrap(), upload).await,
            DatabaseDriver::Mysql => create_upload_mysql(self.pool.as_mysql().unwrap(), upload).await,
        }
    }

    async fn get_upload(&self, id: i64) -> Result<Option<Upload>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_upload_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_upload_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn update_upload(&self, id: i64, update: &MaterialUpdate) -> Result<Upload> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_upload_sqlite(self.pool.as_sqlite().unwrap(), id, update).await
            }
            DatabaseDriver::Mysql => update_upload_mysql(self.pool.as_mysql().unwrap(), id, update).await,
        }
    }

    async fn delete_upload(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_row_sqlite(self.pool.as_sqlite().unwrap(), "uploads", id).await
            }
            DatabaseDriver::Mysql => delete_row_mysql(self.pool.as_mysql().unwrap(), "uploads", id).await,
        }
    }

    async fn count_uploads_by_path(&self, path: &str) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_by_path_sqlite(self.pool.as_sqlite().unwrap(), "uploads", "file_path", path).await
            }
            DatabaseDriver::Mysql => {
                count_by_path_mysql(self.pool.as_mysql().unwrap(), "uploads", "file_path", path).await
            }
        }
    }

    async fn list_uploads(&self, course_id: i64, available_only: bool) -> Result<Vec<Upload>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_uploads_sqlite(self.pool.as_sqlite().unwrap(), course_id, available_only).await
            }
            DatabaseDriver::Mysql => {
                list_uploads_mysql(self.pool.as_mysql().unwrap(), course_id, available_only).await
            }
        }
    }

    async fn create_video(&self, video: &NewUploadVideo) -> Result<UploadVideo> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_video_sqlite(self.pool.as_sqlite().unwrap(), video).await,
            DatabaseDriver::Mysql => create_video_mysql(self.pool.as_mysql().unwrap(), video).await,
        }
    }

    async fn get_video(&self, id: i64) -> Result<Option<UploadVideo>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_video_where_sqlite(self.pool.as_sqlite().unwrap(), VideoKey::Id(id)).await
            }
            DatabaseDriver::Mysql => {
                get_video_where_mysql(self.pool.as_mysql().unwrap(), VideoKey::Id(id)).await
            }
        }
    }

    async fn get_video_by_slug(&self, slug: &str) -> Result<Option<UploadVideo>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_video_where_sqlite(self.pool.as_sqlite().unwrap(), VideoKey::Slug(slug)).await
            }
            DatabaseDriver::Mysql => {
                get_video_where_mysql(self.pool.as_mysql().unwrap(), VideoKey::Slug(slug)).await
            }
        }
    }

    async fn video_slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.get_video_by_slug(slug).await?.is_some())
    }

    async fn update_video(&self, id: i64, update: &MaterialUpdate) -> Result<UploadVideo> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_video_sqlite(self.pool.as_sqlite().unwrap(), id, update).await,
            DatabaseDriver::Mysql => update_video_mysql(self.pool.as_mysql().unwrap(), id, update).await,
        }
    }

    async fn delete_video(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_row_sqlite(self.pool.as_sqlite().unwrap(), "upload_videos", id).await
            }
            DatabaseDriver::Mysql => {
                delete_row_mysql(self.pool.as_mysql().unwrap(), "upload_videos", id).await
            }
        }
    }

    async fn count_videos_by_path(&self, path: &str) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_by_path_sqlite(self.pool.as_sqlite().unwrap(), "upload_videos", "video_path", path)
                    .await
            }
            DatabaseDriver::Mysql => {
                count_by_path_mysql(self.pool.as_mysql().unwrap(), "upload_videos", "video_path", path)
                    .await
            }
        }
    }

    async fn list_videos(&self, course_id: i64, available_only: bool) -> Result<Vec<UploadVideo>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_videos_sqlite(self.pool.as_sqlite().unwrap(), course_id, available_only).await
            }
            DatabaseDriver::Mysql => {
                list_videos_mysql(self.pool.as_mysql().unwrap(), course_id, available_only).await
            }
        }
    }

    async fn count_available(&self, course_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_available_sqlite(self.pool.as_sqlite().unwrap(), course_id).await
            }
            DatabaseDriver::Mysql => count_available_mysql(self.pool.as_mysql().unwrap(), course_id).await,
        }
    }
}

#[derive(Clone, Copy)]
enum VideoKey<'a> {
    Id(i64),
    Slug(&'a str),
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_upload_sqlite(pool: &SqlitePool, upload: &NewUpload) -> Result<Upload> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO uploads (title, course_id, module_number, file_path, is_available, upload_time, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&upload.title)
    .bind(upload.course_id)
    .bind(upload.module_number)
    .bind(&upload.file_path)
    .bind(upload.is_available)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create upload")?;

    Ok(Upload {
        id: result.last_insert_rowid(),
        title: upload.title.clone(),
        course_id: upload.course_id,
        module_number: upload.module_number,
        file_path: upload.file_path.clone(),
        is_available: upload.is_available,
        upload_time: now,
        updated_at: now,
    })
}

async fn get_upload_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Upload>> {
    let sql = format!("SELECT {} FROM uploads WHERE id = ?", UPLOAD_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get upload")?;

    match row {
        Some(row) => Ok(Some(row_to_upload_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn update_upload_sqlite(pool: &SqlitePool, id: i64, update: &MaterialUpdate) -> Result<Upload> {
    let current = get_upload_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Upload not found"))?;

    sqlx::query("UPDATE uploads SET title = ?, module_number = ?, is_available = ?, updated_at = ? WHERE id = ?")
        .bind(update.title.as_ref().unwrap_or(&current.title))
        .bind(update.module_number.unwrap_or(current.module_number))
        .bind(update.is_available.unwrap_or(current.is_available))
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update upload")?;

    get_upload_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Upload not found after update"))
}

async fn delete_row_sqlite(pool: &SqlitePool, table: &str, id: i64) -> Result<bool> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table))
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete from {}", table))?;
    Ok(result.rows_affected() > 0)
}

async fn count_by_path_sqlite(pool: &SqlitePool, table: &str, column: &str, path: &str) -> Result<i64> {
    let row = sqlx::query(&format!("SELECT COUNT(*) as count FROM {} WHERE {} = ?", table, column))
        .bind(path)
        .fetch_one(pool)
        .await
        .with_context(|| format!("Failed to count {} by path", table))?;
    Ok(row.get("count"))
}

async fn list_uploads_sqlite(pool: &SqlitePool, course_id: i64, available_only: bool) -> Result<Vec<Upload>> {
    let filter = if available_only { " AND is_available = ?" } else { "" };
    let sql = format!(
        "SELECT {} FROM uploads WHERE course_id = ?{} ORDER BY module_number, id",
        UPLOAD_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql).bind(course_id);
    if available_only {
        query = query.bind(true);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list uploads")?;

    rows.iter().map(row_to_upload_sqlite).collect()
}

async fn create_video_sqlite(pool: &SqlitePool, video: &NewUploadVideo) -> Result<UploadVideo> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO upload_videos (title, slug, course_id, module_number, video_path, is_available, summary, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&video.title)
    .bind(&video.slug)
    .bind(video.course_id)
    .bind(video.module_number)
    .bind(&video.video_path)
    .bind(video.is_available)
    .bind(&video.summary)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create video")?;

    Ok(UploadVideo {
        id: result.last_insert_rowid(),
        title: video.title.clone(),
        slug: video.slug.clone(),
        course_id: video.course_id,
        module_number: video.module_number,
        video_path: video.video_path.clone(),
        is_available: video.is_available,
        summary: video.summary.clone(),
        created_at: now,
    })
}

async fn get_video_where_sqlite(pool: &SqlitePool, key: VideoKey<'_>) -> Result<Option<UploadVideo>> {
    let row = match key {
        VideoKey::Id(id) => {
            sqlx::query(&format!("SELECT {} FROM upload_videos WHERE id = ?", VIDEO_COLUMNS))
                .bind(id)
                .fetch_optional(pool)
                .await
        }
        VideoKey::Slug(slug) => {
            sqlx::query(&format!("SELECT {} FROM upload_videos WHERE slug = ?", VIDEO_COLUMNS))
                .bind(slug)
                .fetch_optional(pool)
                .await
        }
    }
    .context("Failed to get video")?;

    match row {
        Some(row) => Ok(Some(row_to_video_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn update_video_sqlite(pool: &SqlitePool, id: i64, update: &MaterialUpdate) -> Result<UploadVideo> {
    let current = get_video_where_sqlite(pool, VideoKey::Id(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("Video not found"))?;

    sqlx::query("UPDATE upload_videos SET title = ?, module_number = ?, is_available = ?, summary = ? WHERE id = ?")
        .bind(update.title.as_ref().unwrap_or(&current.title))
        .bind(update.module_number.unwrap_or(current.module_number))
        .bind(update.is_available.unwrap_or(current.is_available))
        .bind(update.summary.as_ref().unwrap_or(&current.summary))
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update video")?;

    get_video_where_sqlite(pool, VideoKey::Id(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("Video not found after update"))
}

async fn list_videos_sqlite(pool: &SqlitePool, course_id: i64, available_only: bool) -> Result<Vec<UploadVideo>> {
    let filter = if available_only { " AND is_available = ?" } else { "" };
    let sql = format!(
        "SELECT {} FROM upload_videos WHERE course_id = ?{} ORDER BY module_number, id",
        VIDEO_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql).bind(course_id);
    if available_only {
        query = query.bind(true);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list videos")?;

    rows.iter().map(row_to_video_sqlite).collect()
}

async fn count_available_sqlite(pool: &SqlitePool, course_id: i64) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM uploads WHERE course_id = ? AND is_available = ?) +
            (SELECT COUNT(*) FROM upload_videos WHERE course_id = ? AND is_available = ?) as count
        "#,
    )
    .bind(course_id)
    .bind(true)
    .bind(course_id)
    .bind(true)
    .fetch_one(pool)
    .await
    .context("Failed to count available materials")?;
    Ok(row.get("count"))
}

fn row_to_upload_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Upload> {
    Ok(Upload {
        id: row.get("id"),
        title: row.get("title"),
        course_id: row.get("course_id"),
        module_number: row.get("module_number"),
        file_path: row.get("file_path"),
        is_available: row.get("is_available"),
        upload_time: row.get("upload_time"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_video_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<UploadVideo> {
    Ok(UploadVideo {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        course_id: row.get("course_id"),
        module_number: row.get("module_number"),
        video_path: row.get("video_path"),
        is_available: row.get("is_available"),
        summary: row.get("summary"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_upload_mysql(pool: &MySqlPool, upload: &NewUpload) -> Result<Upload> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO uploads (title, course_id, module_number, file_path, is_available, upload_time, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&upload.title)
    .bind(upload.course_id)
    .bind(upload.module_number)
    .bind(&upload.file_path)
    .bind(upload.is_available)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create upload")?;

    Ok(Upload {
        id: result.last_insert_id() as i64,
        title: upload.title.clone(),
        course_id: upload.course_id,
        module_number: upload.module_number,
        file_path: upload.file_path.clone(),
        is_available: upload.is_available,
        upload_time: now,
        updated_at: now,
    })
}

async fn get_upload_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Upload>> {
    let sql = format!("SELECT {} FROM uploads WHERE id = ?", UPLOAD_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get upload")?;

    match row {
        Some(row) => Ok(Some(row_to_upload_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn update_upload_mysql(pool: &MySqlPool, id: i64, update: &MaterialUpdate) -> Result<Upload> {
    let current = get_upload_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Upload not found"))?;

    sqlx::query("UPDATE uploads SET title = ?, module_number = ?, is_available = ?, updated_at = ? WHERE id = ?")
        .bind(update.title.as_ref().unwrap_or(&current.title))
        .bind(update.module_number.unwrap_or(current.module_number))
        .bind(update.is_available.unwrap_or(current.is_available))
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update upload")?;

    get_upload_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Upload not found after update"))
}

async fn delete_row_mysql(pool: &MySqlPool, table: &str, id: i64) -> Result<bool> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table))
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete from {}", table))?;
    Ok(result.rows_affected() > 0)
}

async fn count_by_path_mysql(pool: &MySqlPool, table: &str, column: &str, path: &str) -> Result<i64> {
    let row = sqlx::query(&format!("SELECT COUNT(*) as count FROM {} WHERE {} = ?", table, column))
        .bind(path)
        .fetch_one(pool)
        .await
        .with_context(|| format!("Failed to count {} by path", table))?;
    Ok(row.get("count"))
}

async fn list_uploads_mysql(pool: &MySqlPool, course_id: i64, available_only: bool) -> Result<Vec<Upload>> {
    let filter = if available_only { " AND is_available = ?" } else { "" };
    let sql = format!(
        "SELECT {} FROM uploads WHERE course_id = ?{} ORDER BY module_number, id",
        UPLOAD_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql).bind(course_id);
    if available_only {
        query = query.bind(true);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list uploads")?;

    rows.iter().map(row_to_upload_mysql).collect()
}

async fn create_video_mysql(pool: &MySqlPool, video: &NewUploadVideo) -> Result<UploadVideo> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO upload_videos (title, slug, course_id, module_number, video_path, is_available, summary, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&video.title)
    .bind(&video.slug)
    .bind(video.course_id)
    .bind(video.module_number)
    .bind(&video.video_path)
    .bind(video.is_available)
    .bind(&video.summary)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create video")?;

    Ok(UploadVideo {
        id: result.last_insert_id() as i64,
        title: video.title.clone(),
        slug: video.slug.clone(),
        course_id: video.course_id,
        module_number: video.module_number,
        video_path: video.video_path.clone(),
        is_available: video.is_available,
        summary: video.summary.clone(),
        created_at: now,
    })
}

async fn get_video_where_mysql(pool: &MySqlPool, key: VideoKey<'_>) -> Result<Option<UploadVideo>> {
    let row = match key {
        VideoKey::Id(id) => {
            sqlx::query(&format!("SELECT {} FROM upload_videos WHERE id = ?", VIDEO_COLUMNS))
                .bind(id)
                .fetch_optional(pool)
                .await
        }
        VideoKey::Slug(slug) => {
            sqlx::query(&format!("SELECT {} FROM upload_videos WHERE slug = ?", VIDEO_COLUMNS))
                .bind(slug)
                .fetch_optional(pool)
                .await
        }
    }
    .context("Failed to get video")?;

    match row {
        Some(row) => Ok(Some(row_to_video_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn update_video_mysql(pool: &MySqlPool, id: i64, update: &MaterialUpdate) -> Result<UploadVideo> {
    let current = get_video_where_mysql(pool, VideoKey::Id(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("Video not found"))?;

    sqlx::query("UPDATE upload_videos SET title = ?, module_number = ?, is_available = ?, summary = ? WHERE id = ?")
        .bind(update.title.as_ref().unwrap_or(&current.title))
        .bind(update.module_number.unwrap_or(current.module_number))
        .bind(update.is_available.unwrap_or(current.is_available))
        .bind(update.summary.as_ref().unwrap_or(&current.summary))
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update video")?;

    get_video_where_mysql(pool, VideoKey::Id(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("Video not found after update"))
}

async fn list_videos_mysql(pool: &MySqlPool, course_id: i64, available_only: bool) -> Result<Vec<UploadVideo>> {
    let filter = if available_only { " AND is_available = ?" } else { "" };
    let sql = format!(
        "SELECT {} FROM upload_videos WHERE course_id = ?{} ORDER BY module_number, id",
        VIDEO_COLUMNS, filter
    );
    let mut query = sqlx::query(&sql).bind(course_id);
    if available_only {
        query = query.bind(true);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list videos")?;

    rows.iter().map(row_to_video_mysql).collect()
}

async fn count_available_mysql(pool: &MySqlPool, course_id: i64) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM uploads WHERE course_id = ? AND is_available = ?) +
            (SELECT COUNT(*) FROM upload_videos WHERE course_id = ? AND is_available = ?) as count
        "#,
    )
    .bind(course_id)
    .bind(true)
    .bind(course_id)
    .bind(true)
    .fetch_one(pool)
    .await
    .context("Failed to count available materials")?;
    Ok(row.get("count"))
}

fn row_to_upload_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Upload> {
    Ok(Upload {
        id: row.get("id"),
        title: row.get("title"),
        course_id: row.get("course_id"),
        module_number: row.get("module_number"),
        file_path: row.get("file_path"),
        is_available: row.get("is_available"),
        upload_time: row.get("upload_time"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_video_mysql(row: &sqlx::mysql::MySqlRow) -> Result<UploadVideo> {
    Ok(UploadVideo {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        course_id: row.get("course_id"),
        module_number: row.get("module_number"),
        video_path: row.get("video_path"),
        is_available: row.get("is_available"),
        summary: row.get("summary"),
        created_at: row.get("created_at"),
    })
}
