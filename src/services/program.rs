//! Program service
//!
//! Programs group courses (e.g. "Computer Science"). Titles are unique.
//! Lookups by id are cached; every write invalidates the cached program and,
//! on delete, every cached course since the courses cascade away with it.

use crate::cache::{course_key, program_key, MemoryCache};
use crate::db::repositories::{CourseRepository, ProgramRepository};
use crate::events::{DomainEvent, EventBus};
use crate::models::{ListParams, PagedResult, Program, ProgramDetail, ProgramInput};
use anyhow::Context;
use std::sync::Arc;

/// Error types for program service operations
#[derive(Debug, thiserror::Error)]
pub enum ProgramServiceError {
    #[error("Program title already exists: {0}")]
    DuplicateTitle(String),

    #[error("Program not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ProgramService {
    repo: Arc<dyn ProgramRepository>,
    course_repo: Arc<dyn CourseRepository>,
    cache: Arc<MemoryCache>,
    events: Arc<EventBus>,
}

impl ProgramService {
    pub fn new(
        repo: Arc<dyn ProgramRepository>,
        course_repo: Arc<dyn CourseRepository>,
        cache: Arc<MemoryCache>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            repo,
            course_repo,
            cache,
            events,
        }
    }

    pub async fn create(&self, input: ProgramInput) -> Result<Program, ProgramServiceError> {
        let input = Self::validate(input)?;

        if self
            .repo
            .get_by_title(&input.title)
            .await
            .context("Failed to check title uniqueness")?
            .is_some()
        {
            return Err(ProgramServiceError::DuplicateTitle(input.title));
        }

        let program = self
            .repo
            .create(&input)
            .await
            .context("Failed to create program")?;

        self.events
            .publish(DomainEvent::ProgramSaved {
                program: program.clone(),
                created: true,
            })
            .await;
        Ok(program)
    }

    pub async fn update(
        &self,
        id: i64,
        input: ProgramInput,
    ) -> Result<Program, ProgramServiceError> {
        let input = Self::validate(input)?;
        self.get(id).await?;

        if let Some(existing) = self
            .repo
            .get_by_title(&input.title)
            .await
            .context("Failed to check title uniqueness")?
        {
            if existing.id != id {
                return Err(ProgramServiceError::DuplicateTitle(input.title));
            }
        }

        let program = self
            .repo
            .update(id, &input)
            .await
            .context("Failed to update program")?;
        self.cache.delete(&program_key(id)).await;

        self.events
            .publish(DomainEvent::ProgramSaved {
                program: program.clone(),
                created: false,
            })
            .await;
        Ok(program)
    }

    /// Delete a program together with its courses
    pub async fn delete(&self, id: i64) -> Result<(), ProgramServiceError> {
        let program = self.get(id).await?;

        self.repo
            .delete(id)
            .await
            .context("Failed to delete program")?;
        self.cache.delete(&program_key(id)).await;
        self.cache.delete_pattern("course:*").await;

        self.events
            .publish(DomainEvent::ProgramDeleted { program })
            .await;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Program, ProgramServiceError> {
        let key = program_key(id);
        if let Some(program) = self.cache.get::<Program>(&key).await.ok().flatten() {
            return Ok(program);
        }

        let program = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get program")?
            .ok_or(ProgramServiceError::NotFound(id))?;
        let _ = self.cache.set(&key, &program).await;
        Ok(program)
    }

    /// Program with its courses (year descending, paginated) and credit total
    pub async fn detail(
        &self,
        id: i64,
        params: &ListParams,
    ) -> Result<ProgramDetail, ProgramServiceError> {
        let program = self.get(id).await?;
        let (courses, total) = self
            .course_repo
            .list_by_program(id, params)
            .await
            .context("Failed to list program courses")?;
        for course in &courses {
            let _ = self.cache.set(&course_key(course.id), course).await;
        }
        let total_credits = self
            .repo
            .total_credits(id)
            .await
            .context("Failed to sum credits")?;

        Ok(ProgramDetail {
            program,
            courses: PagedResult::new(courses, total, params),
            total_credits,
        })
    }

    /// All programs ordered by title, optionally filtered on title or summary
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Program>, ProgramServiceError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        Ok(self
            .repo
            .list(search)
            .await
            .context("Failed to list programs")?)
    }

    fn validate(input: ProgramInput) -> Result<ProgramInput, ProgramServiceError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ProgramServiceError::ValidationError(
                "Program title cannot be empty".to_string(),
            ));
        }
        if title.chars().count() > 255 {
            return Err(ProgramServiceError::ValidationError(
                "Program title is too long".to_string(),
            ));
        }
        Ok(ProgramInput {
            title,
            summary: input.summary.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCourseRepository, SqlxProgramRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::CourseInput;

    async fn setup() -> (DynDatabasePool, ProgramService) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = ProgramService::new(
            SqlxProgramRepository::boxed(pool.clone()),
            SqlxCourseRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
            Arc::new(EventBus::new()),
        );
        (pool, service)
    }

    fn input(title: &str, summary: &str) -> ProgramInput {
        ProgramInput {
            title: title.to_string(),
            summary: summary.to_string(),
        }
    }

    fn course(program_id: i64, code: &str, credit: i32, year: i32) -> CourseInput {
        CourseInput {
            title: format!("Course {}", code),
            code: code.to_string(),
            credit,
            summary: String::new(),
            program_id,
            level: "Bachelor".to_string(),
            year,
            semester: "First".to_string(),
            is_elective: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_duplicate_title() {
        let (_pool, service) = setup().await;
        let program = service
            .create(input("  Computer Science ", "Computing"))
            .await
            .unwrap();
        assert_eq!(program.title, "Computer Science");

        assert!(matches!(
            service.create(input("Computer Science", "")).await,
            Err(ProgramServiceError::DuplicateTitle(_))
        ));
        assert!(matches!(
            service.create(input("   ", "")).await,
            Err(ProgramServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_update_refreshes_cached_program() {
        let (_pool, service) = setup().await;
        let program = service.create(input("Physics", "")).await.unwrap();
        service.get(program.id).await.unwrap();

        service
            .update(program.id, input("Applied Physics", "Labs"))
            .await
            .unwrap();
        let fetched = service.get(program.id).await.unwrap();
        assert_eq!(fetched.title, "Applied Physics");
        assert_eq!(fetched.summary, "Labs");
    }

    #[tokio::test]
    async fn test_update_rejects_taken_title() {
        let (_pool, service) = setup().await;
        service.create(input("Physics", "")).await.unwrap();
        let chem = service.create(input("Chemistry", "")).await.unwrap();

        assert!(matches!(
            service.update(chem.id, input("Physics", "")).await,
            Err(ProgramServiceError::DuplicateTitle(_))
        ));
        // Keeping the own title is fine
        service.update(chem.id, input("Chemistry", "new")).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_and_not_found() {
        let (_pool, service) = setup().await;
        let program = service.create(input("History", "")).await.unwrap();
        service.get(program.id).await.unwrap();
        service.delete(program.id).await.unwrap();

        assert!(matches!(
            service.get(program.id).await,
            Err(ProgramServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.delete(program.id).await,
            Err(ProgramServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_detail_pages_courses_and_sums_credits() {
        let (pool, service) = setup().await;
        let program = service.create(input("Mathematics", "")).await.unwrap();
        let courses = SqlxCourseRepository::boxed(pool);
        for i in 0..12 {
            courses
                .create(&course(program.id, &format!("MTH{}", i), 2, (i % 4) + 1), &format!("mth{}", i))
                .await
                .unwrap();
        }

        let detail = service.detail(program.id, &ListParams::default()).await.unwrap();
        assert_eq!(detail.total_credits, 24);
        assert_eq!(detail.courses.total, 12);
        assert_eq!(detail.courses.items.len(), 10);
        assert_eq!(detail.courses.items[0].year, 4);

        let page2 = service.detail(program.id, &ListParams::page(2)).await.unwrap();
        assert_eq!(page2.courses.items.len(), 2);
    }

    #[tokio::test]
    async fn test_list_search_is_case_insensitive() {
        let (_pool, service) = setup().await;
        service.create(input("Computer Science", "Algorithms")).await.unwrap();
        service.create(input("Biology", "Life sciences")).await.unwrap();
        service.create(input("Arts", "Painting")).await.unwrap();

        assert_eq!(service.list(None).await.unwrap().len(), 3);
        let hits = service.list(Some("SCIENCE")).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Biology");
        assert_eq!(service.list(Some("  ")).await.unwrap().len(), 3);
    }
}
