//! Course material service
//!
//! Files and videos are written to object storage under a fresh
//! `{directory}/{uuid}.{ext}` key before the row is inserted, and deleted
//! again if the insert fails. Rows may share
//! a key after a course has been duplicated, so deleting a row only removes
//! the stored object once no row of the same kind references it.
//! The count-then-delete is not atomic: two concurrent deletions of the last
//! two references can both see a non-zero count and leave the object behind.

use crate::config::StorageConfig;
use crate::db::repositories::{CourseRepository, MaterialRepository};
use crate::events::{DomainEvent, EventBus};
use crate::models::{
    extension_of, Course, MaterialKind, MaterialUpdate, NewUpload, NewUploadVideo, Upload,
    UploadVideo, User,
};
use crate::services::slug::{slug_base, slug_candidate};
use crate::storage::DynObjectStorage;
use anyhow::Context;
use std::sync::Arc;
use uuid::Uuid;

/// Error types for material service operations
#[derive(Debug, thiserror::Error)]
pub enum MaterialServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("File too large: maximum size is {0} bytes")]
    TooLarge(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// An uploaded file or video together with its form fields
#[derive(Debug, Clone, Default)]
pub struct MaterialInput {
    pub title: String,
    pub module_number: i32,
    pub is_available: bool,
    /// Videos only
    pub summary: String,
    /// Client-side file name, used for the extension
    pub filename: String,
    pub data: Vec<u8>,
}

pub struct MaterialService {
    repo: Arc<dyn MaterialRepository>,
    course_repo: Arc<dyn CourseRepository>,
    storage: DynObjectStorage,
    config: StorageConfig,
    events: Arc<EventBus>,
}

impl MaterialService {
    pub fn new(
        repo: Arc<dyn MaterialRepository>,
        course_repo: Arc<dyn CourseRepository>,
        storage: DynObjectStorage,
        config: StorageConfig,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            repo,
            course_repo,
            storage,
            config,
            events,
        }
    }

    pub async fn upload_file(
        &self,
        course_id: i64,
        input: MaterialInput,
    ) -> Result<Upload, MaterialServiceError> {
        let course = self.course(course_id).await?;
        let title = validate_title(&input.title)?;
        let file_path = self.store(MaterialKind::File, &input).await?;

        let created = self
            .repo
            .create_upload(&NewUpload {
                title,
                course_id: course.id,
                module_number: input.module_number,
                file_path: file_path.clone(),
                is_available: input.is_available,
            })
            .await;
        let upload = match created {
            Ok(upload) => upload,
            Err(e) => {
                self.discard(&file_path).await;
                return Err(e.context("Failed to create upload").into());
            }
        };

        self.events
            .publish(DomainEvent::UploadSaved {
                upload: upload.clone(),
                course,
                created: true,
            })
            .await;
        Ok(upload)
    }

    pub async fn upload_video(
        &self,
        course_id: i64,
        input: MaterialInput,
    ) -> Result<UploadVideo, MaterialServiceError> {
        let course = self.course(course_id).await?;
        let title = validate_title(&input.title)?;
        let slug = self.unique_video_slug(&title).await?;
        let video_path = self.store(MaterialKind::Video, &input).await?;

        let created = self
            .repo
            .create_video(&NewUploadVideo {
                title,
                slug,
                course_id: course.id,
                module_number: input.module_number,
                video_path: video_path.clone(),
                is_available: input.is_available,
                summary: input.summary.trim().to_string(),
            })
            .await;
        let video = match created {
            Ok(video) => video,
            Err(e) => {
                self.discard(&video_path).await;
                return Err(e.context("Failed to create video").into());
            }
        };

        self.events
            .publish(DomainEvent::VideoSaved {
                video: video.clone(),
                course,
                created: true,
            })
            .await;
        Ok(video)
    }

    pub async fn get_file(&self, id: i64) -> Result<Upload, MaterialServiceError> {
        self.repo
            .get_upload(id)
            .await
            .context("Failed to get upload")?
            .ok_or_else(|| MaterialServiceError::NotFound(format!("File {}", id)))
    }

    pub async fn get_video(&self, id: i64) -> Result<UploadVideo, MaterialServiceError> {
        self.repo
            .get_video(id)
            .await
            .context("Failed to get video")?
            .ok_or_else(|| MaterialServiceError::NotFound(format!("Video {}", id)))
    }

    /// Video page. Unavailable videos are hidden from students.
    pub async fn video_by_slug(
        &self,
        slug: &str,
        viewer: &User,
    ) -> Result<UploadVideo, MaterialServiceError> {
        let video = self
            .repo
            .get_video_by_slug(slug)
            .await
            .context("Failed to get video")?
            .ok_or_else(|| MaterialServiceError::NotFound(format!("Video {}", slug)))?;
        if !video.is_available && !viewer.is_staff() {
            return Err(MaterialServiceError::NotFound(format!("Video {}", slug)));
        }
        Ok(video)
    }

    pub async fn update_file(
        &self,
        id: i64,
        update: MaterialUpdate,
    ) -> Result<Upload, MaterialServiceError> {
        let existing = self.get_file(id).await?;
        let update = normalize_update(update)?;
        let upload = self
            .repo
            .update_upload(existing.id, &update)
            .await
            .context("Failed to update upload")?;
        let course = self.course(upload.course_id).await?;

        self.events
            .publish(DomainEvent::UploadSaved {
                upload: upload.clone(),
                course,
                created: false,
            })
            .await;
        Ok(upload)
    }

    pub async fn update_video(
        &self,
        id: i64,
        update: MaterialUpdate,
    ) -> Result<UploadVideo, MaterialServiceError> {
        let existing = self.get_video(id).await?;
        let update = normalize_update(update)?;
        let video = self
            .repo
            .update_video(existing.id, &update)
            .await
            .context("Failed to update video")?;
        let course = self.course(video.course_id).await?;

        self.events
            .publish(DomainEvent::VideoSaved {
                video: video.clone(),
                course,
                created: false,
            })
            .await;
        Ok(video)
    }

    pub async fn delete_file(&self, id: i64) -> Result<(), MaterialServiceError> {
        let upload = self.get_file(id).await?;
        let course = self.course(upload.course_id).await?;
        self.repo
            .delete_upload(id)
            .await
            .context("Failed to delete upload")?;

        let remaining = self
            .repo
            .count_uploads_by_path(&upload.file_path)
            .await
            .context("Failed to count file references")?;
        self.release(&upload.file_path, remaining).await;

        self.events
            .publish(DomainEvent::UploadDeleted { upload, course })
            .await;
        Ok(())
    }

    pub async fn delete_video(&self, id: i64) -> Result<(), MaterialServiceError> {
        let video = self.get_video(id).await?;
        let course = self.course(video.course_id).await?;
        self.repo
            .delete_video(id)
            .await
            .context("Failed to delete video")?;

        let remaining = self
            .repo
            .count_videos_by_path(&video.video_path)
            .await
            .context("Failed to count video references")?;
        self.release(&video.video_path, remaining).await;

        self.events
            .publish(DomainEvent::VideoDeleted { video, course })
            .await;
        Ok(())
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn course(&self, id: i64) -> Result<Course, MaterialServiceError> {
        self.course_repo
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .ok_or_else(|| MaterialServiceError::NotFound(format!("Course {}", id)))
    }

    /// Validate and write the payload, returning its storage key
    async fn store(
        &self,
        kind: MaterialKind,
        input: &MaterialInput,
    ) -> Result<String, MaterialServiceError> {
        let ext = extension_of(&input.filename);
        if !kind.allowed_extensions().contains(&ext.as_str()) {
            return Err(MaterialServiceError::ValidationError(format!(
                "Unsupported {} extension '{}'. Allowed: {}",
                kind,
                ext,
                kind.allowed_extensions().join(", ")
            )));
        }
        if input.data.is_empty() {
            return Err(MaterialServiceError::ValidationError(
                "Uploaded file is empty".to_string(),
            ));
        }
        let max = match kind {
            MaterialKind::File => self.config.max_file_size,
            MaterialKind::Video => self.config.max_video_size,
        };
        if input.data.len() as u64 > max {
            return Err(MaterialServiceError::TooLarge(max));
        }

        let key = format!("{}/{}.{}", kind.directory(), Uuid::new_v4().simple(), ext);
        self.storage
            .put(&key, &input.data)
            .await
            .with_context(|| format!("Failed to store {}", key))?;
        tracing::debug!(
            "Stored {} bytes at {} ({})",
            input.data.len(),
            key,
            self.storage.driver_name()
        );
        Ok(key)
    }

    /// Remove the stored object once nothing references it. Failures are
    /// logged only; the row is already gone.
    async fn release(&self, key: &str, remaining: i64) {
        if remaining > 0 {
            tracing::debug!("Keeping {}: {} reference(s) left", key, remaining);
            return;
        }
        match self.storage.exists(key).await {
            Ok(true) => {
                if let Err(e) = self.storage.delete(key).await {
                    tracing::warn!("Failed to delete stored object {}: {:#}", key, e);
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to check stored object {}: {:#}", key, e),
        }
    }

    /// Delete an object whose row was never written
    async fn discard(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!("Failed to delete orphaned object {}: {:#}", key, e);
        }
    }

    async fn unique_video_slug(&self, title: &str) -> Result<String, MaterialServiceError> {
        let base = slug_base(title, "video");
        let mut n = 1;
        loop {
            let candidate = slug_candidate(&base, n);
            if !self
                .repo
                .video_slug_exists(&candidate)
                .await
                .context("Failed to check video slug")?
            {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

fn validate_title(title: &str) -> Result<String, MaterialServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(MaterialServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    Ok(title.to_string())
}

fn normalize_update(update: MaterialUpdate) -> Result<MaterialUpdate, MaterialServiceError> {
    let title = match update.title {
        Some(title) => Some(validate_title(&title)?),
        None => None,
    };
    Ok(MaterialUpdate {
        title,
        summary: update.summary.map(|s| s.trim().to_string()),
        ..update
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCourseRepository, SqlxMaterialRepository, SqlxProgramRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{CourseInput, NewUser, ProgramInput, UserRole};
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    struct Fixture {
        pool: DynDatabasePool,
        service: MaterialService,
        storage: DynObjectStorage,
        course: Course,
        dir: TempDir,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let program = SqlxProgramRepository::boxed(pool.clone())
            .create(&ProgramInput {
                title: "Physics".to_string(),
                summary: String::new(),
            })
            .await
            .unwrap();
        let course_repo = SqlxCourseRepository::boxed(pool.clone());
        let course = course_repo
            .create(
                &CourseInput {
                    title: "Optics".to_string(),
                    code: "PHY210".to_string(),
                    credit: 2,
                    summary: String::new(),
                    program_id: program.id,
                    level: "Bachelor".to_string(),
                    year: 2,
                    semester: "Second".to_string(),
                    is_elective: false,
                },
                "optics",
            )
            .await
            .unwrap();

        let dir = TempDir::new().unwrap();
        let storage: DynObjectStorage = Arc::new(LocalStorage::new(dir.path()));
        let config = StorageConfig {
            path: dir.path().to_path_buf(),
            max_file_size: 64,
            max_video_size: 128,
            ..Default::default()
        };
        let service = MaterialService::new(
            SqlxMaterialRepository::boxed(pool.clone()),
            course_repo,
            storage.clone(),
            config,
            Arc::new(EventBus::new()),
        );
        Fixture {
            pool,
            service,
            storage,
            course,
            dir,
        }
    }

    fn file(title: &str, filename: &str, size: usize) -> MaterialInput {
        MaterialInput {
            title: title.to_string(),
            module_number: 1,
            is_available: true,
            filename: filename.to_string(),
            data: vec![7u8; size],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upload_file_stores_object() {
        let fx = setup().await;
        let upload = fx
            .service
            .upload_file(fx.course.id, file("Week 1", "Lecture 1.PDF", 10))
            .await
            .unwrap();

        assert!(upload.file_path.starts_with("course_files/"));
        assert!(upload.file_path.ends_with(".pdf"));
        assert!(fx.storage.exists(&upload.file_path).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let fx = setup().await;
        assert!(matches!(
            fx.service.upload_file(fx.course.id, file("Bad", "run.exe", 10)).await,
            Err(MaterialServiceError::ValidationError(_))
        ));
        assert!(matches!(
            fx.service.upload_file(fx.course.id, file("Big", "big.pdf", 65)).await,
            Err(MaterialServiceError::TooLarge(64))
        ));
        assert!(matches!(
            fx.service.upload_file(fx.course.id, file("  ", "a.pdf", 1)).await,
            Err(MaterialServiceError::ValidationError(_))
        ));
        assert!(matches!(
            fx.service.upload_file(999, file("Lost", "a.pdf", 1)).await,
            Err(MaterialServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.upload_video(fx.course.id, file("Doc", "a.pdf", 1)).await,
            Err(MaterialServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_insert_removes_stored_object() {
        let fx = setup().await;
        for table in ["uploads", "upload_videos"] {
            fx.pool
                .execute(&format!(
                    "CREATE TRIGGER reject_{table} BEFORE INSERT ON {table} \
                     BEGIN SELECT RAISE(ABORT, 'rejected'); END"
                ))
                .await
                .unwrap();
        }

        assert!(matches!(
            fx.service.upload_file(fx.course.id, file("Week 1", "week1.pdf", 10)).await,
            Err(MaterialServiceError::InternalError(_))
        ));
        assert!(matches!(
            fx.service.upload_video(fx.course.id, file("Intro", "intro.mp4", 10)).await,
            Err(MaterialServiceError::InternalError(_))
        ));

        for directory in [MaterialKind::File.directory(), MaterialKind::Video.directory()] {
            let path = fx.dir.path().join(directory);
            let left = match std::fs::read_dir(&path) {
                Ok(entries) => entries.count(),
                Err(_) => 0,
            };
            assert_eq!(left, 0, "{} still holds objects", directory);
        }
    }

    #[tokio::test]
    async fn test_video_slugs_are_unique() {
        let fx = setup().await;
        let first = fx
            .service
            .upload_video(fx.course.id, file("Lens Basics", "lens.mp4", 100))
            .await
            .unwrap();
        let second = fx
            .service
            .upload_video(fx.course.id, file("Lens Basics", "lens2.mp4", 100))
            .await
            .unwrap();
        assert_eq!(first.slug, "lens-basics");
        assert_eq!(second.slug, "lens-basics-2");
        assert!(first.video_path.starts_with("course_videos/"));
    }

    #[tokio::test]
    async fn test_shared_object_removed_with_last_reference() {
        let fx = setup().await;
        let upload = fx
            .service
            .upload_file(fx.course.id, file("Notes", "notes.docx", 20))
            .await
            .unwrap();
        let copy = SqlxMaterialRepository::boxed(fx.pool.clone())
            .create_upload(&NewUpload {
                title: upload.title.clone(),
                course_id: fx.course.id,
                module_number: upload.module_number,
                file_path: upload.file_path.clone(),
                is_available: true,
            })
            .await
            .unwrap();

        fx.service.delete_file(upload.id).await.unwrap();
        assert!(fx.storage.exists(&upload.file_path).await.unwrap());

        fx.service.delete_file(copy.id).await.unwrap();
        assert!(!fx.storage.exists(&upload.file_path).await.unwrap());
        assert!(matches!(
            fx.service.get_file(copy.id).await,
            Err(MaterialServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_video_with_missing_object() {
        let fx = setup().await;
        let video = fx
            .service
            .upload_video(fx.course.id, file("Intro", "intro.mkv", 5))
            .await
            .unwrap();
        fx.storage.delete(&video.video_path).await.unwrap();

        fx.service.delete_video(video.id).await.unwrap();
        assert!(fx.service.get_video(video.id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_hidden_video() {
        let fx = setup().await;
        let video = fx
            .service
            .upload_video(fx.course.id, file("Intro", "intro.mp4", 5))
            .await
            .unwrap();
        let updated = fx
            .service
            .update_video(
                video.id,
                MaterialUpdate {
                    title: Some(" Welcome ".to_string()),
                    is_available: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Welcome");
        assert_eq!(updated.slug, video.slug);
        assert!(!updated.is_available);

        let student = SqlxUserRepository::boxed(fx.pool.clone())
            .create(&NewUser {
                username: "stu".to_string(),
                email: "stu@example.com".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "x".to_string(),
                role: UserRole::Student,
                is_active: true,
            })
            .await
            .unwrap();
        assert!(matches!(
            fx.service.video_by_slug(&video.slug, &student).await,
            Err(MaterialServiceError::NotFound(_))
        ));
    }
}
