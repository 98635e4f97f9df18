//! Activity log
//!
//! [`ActivityLogger`] listens to catalog and material events and appends a
//! human-readable line per change.

use crate::db::repositories::ActivityLogRepository;
use crate::events::{DomainEvent, EventListener};
use crate::models::{ActivityLog, ListParams, PagedResult};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

fn verb(created: bool) -> &'static str {
    if created {
        "created"
    } else {
        "updated"
    }
}

/// Log line for an event, `None` for events that are not logged
pub fn activity_message(event: &DomainEvent) -> Option<String> {
    let message = match event {
        DomainEvent::ProgramSaved { program, created } => {
            format!("The program '{}' has been {}.", program.title, verb(*created))
        }
        DomainEvent::ProgramDeleted { program } => {
            format!("The program '{}' has been deleted.", program.title)
        }
        DomainEvent::CourseSaved { course, created } => {
            format!("The course '{}' has been {}.", course, verb(*created))
        }
        DomainEvent::CourseDeleted { course } => {
            format!("The course '{}' has been deleted.", course)
        }
        DomainEvent::UploadSaved { upload, course, created: true } => format!(
            "The file '{}' has been uploaded to the course '{}'.",
            upload.title, course
        ),
        DomainEvent::UploadSaved { upload, course, created: false } => format!(
            "The file '{}' of the course '{}' has been updated.",
            upload.title, course
        ),
        DomainEvent::UploadDeleted { upload, course } => format!(
            "The file '{}' of the course '{}' has been deleted.",
            upload.title, course
        ),
        DomainEvent::VideoSaved { video, course, created: true } => format!(
            "The video '{}' has been uploaded to the course '{}'.",
            video.title, course
        ),
        DomainEvent::VideoSaved { video, course, created: false } => format!(
            "The video '{}' of the course '{}' has been updated.",
            video.title, course
        ),
        DomainEvent::VideoDeleted { video, course } => format!(
            "The video '{}' of the course '{}' has been deleted.",
            video.title, course
        ),
        DomainEvent::UserCreated { .. } => return None,
    };
    Some(message)
}

pub struct ActivityLogger {
    repo: Arc<dyn ActivityLogRepository>,
}

impl ActivityLogger {
    pub fn new(repo: Arc<dyn ActivityLogRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl EventListener for ActivityLogger {
    fn name(&self) -> &'static str {
        "activity_logger"
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        if let Some(message) = activity_message(event) {
            self.repo
                .create(&message)
                .await
                .context("Failed to write activity log")?;
        }
        Ok(())
    }
}

/// Read side of the activity log, newest first
pub struct ActivityService {
    repo: Arc<dyn ActivityLogRepository>,
}

impl ActivityService {
    pub fn new(repo: Arc<dyn ActivityLogRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, params: &ListParams) -> anyhow::Result<PagedResult<ActivityLog>> {
        let (items, total) = self
            .repo
            .list(params)
            .await
            .context("Failed to list activity")?;
        Ok(PagedResult::new(items, total, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxActivityLogRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::events::{EventBus, PRIORITY_LATE};
    use crate::models::{Course, Program, Upload, UploadVideo, User};
    use chrono::Utc;

    fn program() -> Program {
        Program {
            id: 1,
            title: "Biology".to_string(),
            summary: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn course() -> Course {
        Course {
            id: 1,
            slug: "genetics".to_string(),
            title: "Genetics".to_string(),
            code: "BIO301".to_string(),
            credit: 3,
            summary: String::new(),
            program_id: 1,
            level: "Bachelor".to_string(),
            year: 3,
            semester: "First".to_string(),
            is_elective: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn upload() -> Upload {
        Upload {
            id: 1,
            title: "Lab Manual".to_string(),
            course_id: 1,
            module_number: 1,
            file_path: "course_files/lab.pdf".to_string(),
            is_available: true,
            upload_time: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn video() -> UploadVideo {
        UploadVideo {
            id: 1,
            title: "DNA".to_string(),
            slug: "dna".to_string(),
            course_id: 1,
            module_number: 1,
            video_path: "course_videos/dna.mp4".to_string(),
            is_available: true,
            summary: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_catalog_messages() {
        assert_eq!(
            activity_message(&DomainEvent::ProgramSaved { program: program(), created: true }).unwrap(),
            "The program 'Biology' has been created."
        );
        assert_eq!(
            activity_message(&DomainEvent::ProgramDeleted { program: program() }).unwrap(),
            "The program 'Biology' has been deleted."
        );
        assert_eq!(
            activity_message(&DomainEvent::CourseSaved { course: course(), created: false }).unwrap(),
            "The course 'Genetics (BIO301)' has been updated."
        );
        assert_eq!(
            activity_message(&DomainEvent::CourseDeleted { course: course() }).unwrap(),
            "The course 'Genetics (BIO301)' has been deleted."
        );
    }

    #[test]
    fn test_material_messages() {
        assert_eq!(
            activity_message(&DomainEvent::UploadSaved { upload: upload(), course: course(), created: true })
                .unwrap(),
            "The file 'Lab Manual' has been uploaded to the course 'Genetics (BIO301)'."
        );
        assert_eq!(
            activity_message(&DomainEvent::UploadSaved { upload: upload(), course: course(), created: false })
                .unwrap(),
            "The file 'Lab Manual' of the course 'Genetics (BIO301)' has been updated."
        );
        assert_eq!(
            activity_message(&DomainEvent::UploadDeleted { upload: upload(), course: course() }).unwrap(),
            "The file 'Lab Manual' of the course 'Genetics (BIO301)' has been deleted."
        );
        assert_eq!(
            activity_message(&DomainEvent::VideoSaved { video: video(), course: course(), created: true })
                .unwrap(),
            "The video 'DNA' has been uploaded to the course 'Genetics (BIO301)'."
        );
        assert_eq!(
            activity_message(&DomainEvent::VideoDeleted { video: video(), course: course() }).unwrap(),
            "The video 'DNA' of the course 'Genetics (BIO301)' has been deleted."
        );
    }

    #[tokio::test]
    async fn test_logger_writes_through_bus() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxActivityLogRepository::boxed(pool.clone());

        let bus = EventBus::new();
        bus.subscribe(Arc::new(ActivityLogger::new(repo.clone())), PRIORITY_LATE);
        bus.publish(DomainEvent::ProgramSaved { program: program(), created: true })
            .await;
        bus.publish(DomainEvent::CourseDeleted { course: course() }).await;

        let user = User {
            id: 1,
            username: "u".to_string(),
            email: "u@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: String::new(),
            is_student: true,
            is_lecturer: false,
            is_superuser: false,
            is_active: false,
            activation_key: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        bus.publish(DomainEvent::UserCreated { user }).await;

        let page = ActivityService::new(repo).list(&ListParams::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].message, "The course 'Genetics (BIO301)' has been deleted.");
    }
}
