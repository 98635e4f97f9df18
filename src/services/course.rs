//! Course service
//!
//! Courses belong to a program and carry a unique slug (derived from the
//! title once, at creation) and a unique code. A lecturer who creates a
//! course is allocated to it. Duplication copies the course's materials and
//! quizzes in one transaction; events for the copy are published after the
//! commit.

use crate::cache::{course_key, course_slug_key, MemoryCache};
use crate::db::repositories::{
    AllocationRepository, CalendarRepository, CourseRepository, MaterialRepository,
    ProgramRepository,
};
use crate::events::{DomainEvent, EventBus};
use crate::models::{
    Course, CourseDetail, CourseInput, DuplicationCounts, ListParams, PagedResult, SemesterName,
    User,
};
use crate::services::slug::{slug_base, slug_candidate};
use anyhow::Context;
use std::str::FromStr;
use std::sync::Arc;

/// Error types for course service operations
#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    #[error("Course code already exists: {0}")]
    DuplicateCode(String),

    #[error("Course not found: {0}")]
    NotFound(String),

    #[error("Program not found: {0}")]
    ProgramNotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CourseService {
    repo: Arc<dyn CourseRepository>,
    program_repo: Arc<dyn ProgramRepository>,
    material_repo: Arc<dyn MaterialRepository>,
    allocation_repo: Arc<dyn AllocationRepository>,
    calendar_repo: Arc<dyn CalendarRepository>,
    cache: Arc<MemoryCache>,
    events: Arc<EventBus>,
}

impl CourseService {
    pub fn new(
        repo: Arc<dyn CourseRepository>,
        program_repo: Arc<dyn ProgramRepository>,
        material_repo: Arc<dyn MaterialRepository>,
        allocation_repo: Arc<dyn AllocationRepository>,
        calendar_repo: Arc<dyn CalendarRepository>,
        cache: Arc<MemoryCache>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            repo,
            program_repo,
            material_repo,
            allocation_repo,
            calendar_repo,
            cache,
            events,
        }
    }

    /// Create a course; a lecturer creator is allocated to it
    pub async fn create(
        &self,
        input: CourseInput,
        creator: &User,
    ) -> Result<Course, CourseServiceError> {
        let input = self.validate(input).await?;
        self.ensure_code_free(&input.code, None).await?;

        let slug = self.unique_slug(&input.title).await?;
        let course = self
            .repo
            .create(&input, &slug)
            .await
            .context("Failed to create course")?;

        if creator.is_lecturer {
            self.allocate_to(creator.id, course.id).await?;
        }

        self.events
            .publish(DomainEvent::CourseSaved {
                course: course.clone(),
                created: true,
            })
            .await;
        Ok(course)
    }

    /// Update a course. The slug is kept.
    pub async fn update(&self, id: i64, input: CourseInput) -> Result<Course, CourseServiceError> {
        let existing = self.get(id).await?;
        let input = self.validate(input).await?;
        self.ensure_code_free(&input.code, Some(id)).await?;

        let course = self
            .repo
            .update(id, &input, &existing.slug)
            .await
            .context("Failed to update course")?;
        self.invalidate(&existing).await;

        self.events
            .publish(DomainEvent::CourseSaved {
                course: course.clone(),
                created: false,
            })
            .await;
        Ok(course)
    }

    /// Delete a course. Materials, quizzes, enrollments and progress rows
    /// cascade in the database; stored objects are left in place.
    pub async fn delete(&self, id: i64) -> Result<(), CourseServiceError> {
        let course = self.get(id).await?;
        self.repo
            .delete(id)
            .await
            .context("Failed to delete course")?;
        self.invalidate(&course).await;

        self.events.publish(DomainEvent::CourseDeleted { course }).await;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Course, CourseServiceError> {
        let key = course_key(id);
        if let Some(course) = self.cache.get::<Course>(&key).await.ok().flatten() {
            return Ok(course);
        }
        let course = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .ok_or_else(|| CourseServiceError::NotFound(id.to_string()))?;
        let _ = self.cache.set(&key, &course).await;
        Ok(course)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Course, CourseServiceError> {
        let key = course_slug_key(slug);
        if let Some(course) = self.cache.get::<Course>(&key).await.ok().flatten() {
            return Ok(course);
        }
        let course = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get course by slug")?
            .ok_or_else(|| CourseServiceError::NotFound(slug.to_string()))?;
        let _ = self.cache.set(&key, &course).await;
        Ok(course)
    }

    /// Course page: files, videos and lecturers. Students only see
    /// available materials.
    pub async fn detail(&self, slug: &str, viewer: &User) -> Result<CourseDetail, CourseServiceError> {
        let course = self.get_by_slug(slug).await?;
        let available_only = !viewer.is_staff();

        let files = self
            .material_repo
            .list_uploads(course.id, available_only)
            .await
            .context("Failed to list course files")?;
        let videos = self
            .material_repo
            .list_videos(course.id, available_only)
            .await
            .context("Failed to list course videos")?;
        let lecturers = self
            .allocation_repo
            .lecturers_of_course(course.id)
            .await
            .context("Failed to list course lecturers")?;

        Ok(CourseDetail {
            course,
            files,
            videos,
            lecturers,
        })
    }

    /// Courses ordered by year descending, ten per page by default
    pub async fn list(
        &self,
        search: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<Course>, CourseServiceError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let (items, total) = self
            .repo
            .list(search, params)
            .await
            .context("Failed to list courses")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Form values for duplicating a course
    pub async fn duplicate_prefill(&self, id: i64) -> Result<CourseInput, CourseServiceError> {
        let course = self.get(id).await?;
        Ok(CourseInput::copy_of(&course))
    }

    /// Create a new course from `input` and copy the source's uploads,
    /// videos and quizzes into it. All-or-nothing.
    pub async fn duplicate(
        &self,
        source_id: i64,
        input: CourseInput,
    ) -> Result<(Course, DuplicationCounts), CourseServiceError> {
        let source = self.get(source_id).await?;
        let input = self.validate(input).await?;
        self.ensure_code_free(&input.code, None).await?;
        let slug = self.unique_slug(&input.title).await?;

        let (course, counts) = self
            .repo
            .duplicate(source.id, &input, &slug)
            .await
            .context("Failed to duplicate course")?;

        tracing::info!(
            "Duplicated course '{}' into '{}': {} files, {} videos, {} quizzes",
            source,
            course,
            counts.uploads,
            counts.videos,
            counts.quizzes
        );

        self.events
            .publish(DomainEvent::CourseSaved {
                course: course.clone(),
                created: true,
            })
            .await;
        self.publish_copied_materials(&course).await;

        Ok((course, counts))
    }

    /// Whether the course's semester is the current one (case-insensitive)
    pub async fn is_current_semester(&self, course: &Course) -> Result<bool, CourseServiceError> {
        let current = self
            .calendar_repo
            .get_current_semester()
            .await
            .context("Failed to get current semester")?;
        Ok(match current {
            Some(semester) => {
                course.semester.trim().eq_ignore_ascii_case(semester.name.as_str())
            }
            None => false,
        })
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn publish_copied_materials(&self, course: &Course) {
        match self.material_repo.list_uploads(course.id, false).await {
            Ok(uploads) => {
                for upload in uploads {
                    self.events
                        .publish(DomainEvent::UploadSaved {
                            upload,
                            course: course.clone(),
                            created: true,
                        })
                        .await;
                }
            }
            Err(e) => tracing::warn!("Failed to list copied files of {}: {:#}", course, e),
        }
        match self.material_repo.list_videos(course.id, false).await {
            Ok(videos) => {
                for video in videos {
                    self.events
                        .publish(DomainEvent::VideoSaved {
                            video,
                            course: course.clone(),
                            created: true,
                        })
                        .await;
                }
            }
            Err(e) => tracing::warn!("Failed to list copied videos of {}: {:#}", course, e),
        }
    }

    async fn allocate_to(&self, lecturer_id: i64, course_id: i64) -> Result<(), CourseServiceError> {
        let allocation = match self
            .allocation_repo
            .get_by_lecturer(lecturer_id)
            .await
            .context("Failed to get allocation")?
        {
            Some(allocation) => allocation,
            None => {
                let session = self
                    .calendar_repo
                    .get_current_session()
                    .await
                    .context("Failed to get current session")?;
                self.allocation_repo
                    .create(lecturer_id, session.map(|s| s.id))
                    .await
                    .context("Failed to create allocation")?
            }
        };
        self.allocation_repo
            .add_course(allocation.id, course_id)
            .await
            .context("Failed to allocate course")?;
        Ok(())
    }

    async fn validate(&self, input: CourseInput) -> Result<CourseInput, CourseServiceError> {
        let title = input.title.trim().to_string();
        let code = input.code.trim().to_string();
        if title.is_empty() {
            return Err(CourseServiceError::ValidationError(
                "Course title cannot be empty".to_string(),
            ));
        }
        if code.is_empty() {
            return Err(CourseServiceError::ValidationError(
                "Course code cannot be empty".to_string(),
            ));
        }
        if input.credit < 0 {
            return Err(CourseServiceError::ValidationError(
                "Credit cannot be negative".to_string(),
            ));
        }
        if input.year < 1 {
            return Err(CourseServiceError::ValidationError(
                "Year must be at least 1".to_string(),
            ));
        }
        if input.level.trim().is_empty() {
            return Err(CourseServiceError::ValidationError(
                "Level cannot be empty".to_string(),
            ));
        }
        let semester = SemesterName::from_str(&input.semester)
            .map_err(|e| CourseServiceError::ValidationError(e.to_string()))?;

        if self
            .program_repo
            .get_by_id(input.program_id)
            .await
            .context("Failed to get program")?
            .is_none()
        {
            return Err(CourseServiceError::ProgramNotFound(input.program_id));
        }

        Ok(CourseInput {
            title,
            code,
            summary: input.summary.trim().to_string(),
            level: input.level.trim().to_string(),
            semester: semester.as_str().to_string(),
            ..input
        })
    }

    async fn ensure_code_free(&self, code: &str, own_id: Option<i64>) -> Result<(), CourseServiceError> {
        if let Some(existing) = self
            .repo
            .get_by_code(code)
            .await
            .context("Failed to check course code")?
        {
            if Some(existing.id) != own_id {
                return Err(CourseServiceError::DuplicateCode(code.to_string()));
            }
        }
        Ok(())
    }

    async fn unique_slug(&self, title: &str) -> Result<String, CourseServiceError> {
        let base = slug_base(title, "course");
        let mut n = 1;
        loop {
            let candidate = slug_candidate(&base, n);
            if !self
                .repo
                .slug_exists(&candidate, None)
                .await
                .context("Failed to check slug")?
            {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn invalidate(&self, course: &Course) {
        self.cache.delete(&course_key(course.id)).await;
        self.cache.delete(&course_slug_key(&course.slug)).await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::repositories::{
        SqlxAllocationRepository, SqlxCalendarRepository, SqlxCourseRepository,
        SqlxMaterialRepository, SqlxProgramRepository,
    };
    use crate::db::DynDatabasePool;

    pub fn course_service(pool: &DynDatabasePool, events: Arc<EventBus>) -> CourseService {
        CourseService::new(
            SqlxCourseRepository::boxed(pool.clone()),
            SqlxProgramRepository::boxed(pool.clone()),
            SqlxMaterialRepository::boxed(pool.clone()),
            SqlxAllocationRepository::boxed(pool.clone()),
            SqlxCalendarRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
            events,
        )
    }

    pub fn course_input(program_id: i64, title: &str, code: &str) -> CourseInput {
        CourseInput {
            title: title.to_string(),
            code: code.to_string(),
            credit: 3,
            summary: String::new(),
            program_id,
            level: "Bachelor".to_string(),
            year: 1,
            semester: "First".to_string(),
            is_elective: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::db::repositories::{
        SqlxAllocationRepository, SqlxCalendarRepository, SqlxMaterialRepository,
        SqlxProgramRepository, SqlxQuizRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{NewUpload, NewUploadVideo, NewUser, ProgramInput, QuizInput, UserRole};

    async fn setup() -> (DynDatabasePool, CourseService, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let program = SqlxProgramRepository::boxed(pool.clone())
            .create(&ProgramInput {
                title: "Computer Science".to_string(),
                summary: String::new(),
            })
            .await
            .unwrap();
        let service = course_service(&pool, Arc::new(EventBus::new()));
        (pool, service, program.id)
    }

    async fn user(pool: &DynDatabasePool, name: &str, role: UserRole) -> User {
        SqlxUserRepository::boxed(pool.clone())
            .create(&NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                first_name: name.to_string(),
                last_name: String::new(),
                password_hash: "x".to_string(),
                role,
                is_active: true,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_generates_suffixed_slugs() {
        let (pool, service, program_id) = setup().await;
        let admin = user(&pool, "admin", UserRole::Admin).await;

        let a = service.create(course_input(program_id, "Algebra", "MTH101"), &admin).await.unwrap();
        let b = service.create(course_input(program_id, "Algebra", "MTH102"), &admin).await.unwrap();
        let c = service.create(course_input(program_id, "algebra!", "MTH103"), &admin).await.unwrap();

        assert_eq!(a.slug, "algebra");
        assert_eq!(b.slug, "algebra-2");
        assert_eq!(c.slug, "algebra-3");
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (pool, service, program_id) = setup().await;
        let admin = user(&pool, "admin", UserRole::Admin).await;

        service.create(course_input(program_id, "Algebra", "MTH101"), &admin).await.unwrap();
        assert!(matches!(
            service.create(course_input(program_id, "Other", "MTH101"), &admin).await,
            Err(CourseServiceError::DuplicateCode(_))
        ));
        assert!(matches!(
            service.create(course_input(999, "Other", "X1"), &admin).await,
            Err(CourseServiceError::ProgramNotFound(999))
        ));

        let mut bad = course_input(program_id, "Other", "X2");
        bad.semester = "Summer".to_string();
        assert!(matches!(
            service.create(bad, &admin).await,
            Err(CourseServiceError::ValidationError(_))
        ));

        let mut lower = course_input(program_id, "Other", "X3");
        lower.semester = "second".to_string();
        let course = service.create(lower, &admin).await.unwrap();
        assert_eq!(course.semester, "Second");
    }

    #[tokio::test]
    async fn test_lecturer_creator_is_allocated() {
        let (pool, service, program_id) = setup().await;
        let lecturer = user(&pool, "lec", UserRole::Lecturer).await;

        let course = service
            .create(course_input(program_id, "Networks", "CS301"), &lecturer)
            .await
            .unwrap();
        service
            .create(course_input(program_id, "Databases", "CS302"), &lecturer)
            .await
            .unwrap();

        let allocations = SqlxAllocationRepository::boxed(pool.clone());
        let taught = allocations.courses_of_lecturer(lecturer.id).await.unwrap();
        assert_eq!(taught.len(), 2);

        let detail = service.detail(&course.slug, &lecturer).await.unwrap();
        assert_eq!(detail.lecturers.len(), 1);
        assert_eq!(detail.lecturers[0].id, lecturer.id);
    }

    #[tokio::test]
    async fn test_update_keeps_slug_and_refreshes_cache() {
        let (pool, service, program_id) = setup().await;
        let admin = user(&pool, "admin", UserRole::Admin).await;
        let course = service.create(course_input(program_id, "Algebra", "MTH101"), &admin).await.unwrap();
        service.get_by_slug("algebra").await.unwrap();

        let mut input = course_input(program_id, "Linear Algebra", "MTH101");
        input.credit = 4;
        let updated = service.update(course.id, input).await.unwrap();

        assert_eq!(updated.slug, "algebra");
        let fetched = service.get_by_slug("algebra").await.unwrap();
        assert_eq!(fetched.title, "Linear Algebra");
        assert_eq!(fetched.credit, 4);
    }

    #[tokio::test]
    async fn test_delete_course() {
        let (pool, service, program_id) = setup().await;
        let admin = user(&pool, "admin", UserRole::Admin).await;
        let course = service.create(course_input(program_id, "Algebra", "MTH101"), &admin).await.unwrap();
        service.get(course.id).await.unwrap();

        service.delete(course.id).await.unwrap();
        assert!(matches!(service.get(course.id).await, Err(CourseServiceError::NotFound(_))));
        assert!(matches!(
            service.get_by_slug("algebra").await,
            Err(CourseServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_detail_hides_unavailable_from_students() {
        let (pool, service, program_id) = setup().await;
        let admin = user(&pool, "admin", UserRole::Admin).await;
        let student = user(&pool, "stu", UserRole::Student).await;
        let course = service.create(course_input(program_id, "Algebra", "MTH101"), &admin).await.unwrap();

        let materials = SqlxMaterialRepository::boxed(pool.clone());
        for (title, available) in [("Week 1", true), ("Draft", false)] {
            materials
                .create_upload(&NewUpload {
                    title: title.to_string(),
                    course_id: course.id,
                    module_number: 1,
                    file_path: format!("course_files/{}.pdf", title),
                    is_available: available,
                })
                .await
                .unwrap();
        }

        assert_eq!(service.detail("algebra", &admin).await.unwrap().files.len(), 2);
        let seen = service.detail("algebra", &student).await.unwrap();
        assert_eq!(seen.files.len(), 1);
        assert_eq!(seen.files[0].title, "Week 1");
    }

    #[tokio::test]
    async fn test_list_search_and_pagination() {
        let (pool, service, program_id) = setup().await;
        let admin = user(&pool, "admin", UserRole::Admin).await;
        for i in 0..11 {
            let mut input = course_input(program_id, &format!("Topic {}", i), &format!("GEN{}", i));
            input.year = (i % 3) + 1;
            service.create(input, &admin).await.unwrap();
        }
        service
            .create(course_input(program_id, "Quantum Mechanics", "PHY500"), &admin)
            .await
            .unwrap();

        let page = service.list(None, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.items[0].year, 3);
        assert_eq!(page.total_pages(), 2);

        let hits = service.list(Some("quantum"), &ListParams::default()).await.unwrap();
        assert_eq!(hits.total, 1);
        let hits = service.list(Some("phy5"), &ListParams::default()).await.unwrap();
        assert_eq!(hits.items[0].code, "PHY500");
    }

    #[tokio::test]
    async fn test_duplicate_copies_materials_and_quizzes() {
        let (pool, service, program_id) = setup().await;
        let admin = user(&pool, "admin", UserRole::Admin).await;
        let source = service.create(course_input(program_id, "Algebra", "MTH101"), &admin).await.unwrap();

        let materials = SqlxMaterialRepository::boxed(pool.clone());
        for i in 0..2 {
            materials
                .create_upload(&NewUpload {
                    title: format!("Notes {}", i),
                    course_id: source.id,
                    module_number: i,
                    file_path: format!("course_files/n{}.pdf", i),
                    is_available: i == 0,
                })
                .await
                .unwrap();
        }
        materials
            .create_video(&NewUploadVideo {
                title: "Lecture".to_string(),
                slug: "lecture".to_string(),
                course_id: source.id,
                module_number: 1,
                video_path: "course_videos/l.mp4".to_string(),
                is_available: true,
                summary: "Intro".to_string(),
            })
            .await
            .unwrap();
        let quizzes = SqlxQuizRepository::boxed(pool.clone());
        let quiz = quizzes
            .create(
                source.id,
                &QuizInput {
                    title: "Quiz 1".to_string(),
                    description: String::new(),
                    pass_mark: Some(50),
                    single_attempt: true,
                    random_order: false,
                    answers_at_end: false,
                    exam_paper: false,
                    draft: false,
                },
            )
            .await
            .unwrap();
        let question = quizzes.create_question("2 + 2?").await.unwrap();
        quizzes.attach_question(quiz.id, question.id).await.unwrap();

        let prefill = service.duplicate_prefill(source.id).await.unwrap();
        assert_eq!(prefill.title, "Copy of Algebra");
        assert_eq!(prefill.code, "Copy-MTH101");

        let (copy, counts) = service.duplicate(source.id, prefill).await.unwrap();
        assert_eq!(copy.slug, "copy-of-algebra");
        assert_eq!(
            counts,
            DuplicationCounts {
                uploads: 2,
                videos: 1,
                quizzes: 1,
                questions: 1
            }
        );

        let copied = materials.list_uploads(copy.id, false).await.unwrap();
        assert_eq!(copied.len(), 2);
        assert_eq!(copied[0].file_path, "course_files/n0.pdf");
        assert!(!copied[1].is_available);
        let videos = materials.list_videos(copy.id, false).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_ne!(videos[0].slug, "lecture");
        assert_eq!(videos[0].video_path, "course_videos/l.mp4");

        let copied_quizzes = quizzes.list_by_course(copy.id).await.unwrap();
        assert_eq!(copied_quizzes.len(), 1);
        assert_eq!(quizzes.questions(copied_quizzes[0].id).await.unwrap()[0].id, question.id);

        // Source untouched
        assert_eq!(materials.list_uploads(source.id, false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_with_taken_code_fails_cleanly() {
        let (pool, service, program_id) = setup().await;
        let admin = user(&pool, "admin", UserRole::Admin).await;
        let source = service.create(course_input(program_id, "Algebra", "MTH101"), &admin).await.unwrap();

        let result = service
            .duplicate(source.id, course_input(program_id, "Algebra Copy", "MTH101"))
            .await;
        assert!(matches!(result, Err(CourseServiceError::DuplicateCode(_))));
        assert_eq!(service.list(None, &ListParams::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_is_current_semester() {
        let (pool, service, program_id) = setup().await;
        let admin = user(&pool, "admin", UserRole::Admin).await;
        let course = service.create(course_input(program_id, "Algebra", "MTH101"), &admin).await.unwrap();
        assert!(!service.is_current_semester(&course).await.unwrap());

        let calendar = SqlxCalendarRepository::boxed(pool.clone());
        let first = calendar.create_semester(SemesterName::First, None).await.unwrap();
        calendar.set_current_semester(first.id).await.unwrap();
        assert!(service.is_current_semester(&course).await.unwrap());

        let second = calendar.create_semester(SemesterName::Second, None).await.unwrap();
        calendar.set_current_semester(second.id).await.unwrap();
        assert!(!service.is_current_semester(&course).await.unwrap());
    }
}
