//! Course allocation service
//!
//! Each lecturer has at most one allocation holding the set of courses they
//! teach, tagged with the academic session current at creation time.

use crate::db::repositories::{
    AllocationRepository, CalendarRepository, CourseRepository, UserRepository,
};
use crate::models::{AllocationDetail, AllocationFilter, AllocationInput, CourseAllocation, User};
use anyhow::Context;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AllocationServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lecturer already has an allocation: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct AllocationService {
    repo: Arc<dyn AllocationRepository>,
    user_repo: Arc<dyn UserRepository>,
    course_repo: Arc<dyn CourseRepository>,
    calendar_repo: Arc<dyn CalendarRepository>,
}

impl AllocationService {
    pub fn new(
        repo: Arc<dyn AllocationRepository>,
        user_repo: Arc<dyn UserRepository>,
        course_repo: Arc<dyn CourseRepository>,
        calendar_repo: Arc<dyn CalendarRepository>,
    ) -> Self {
        Self {
            repo,
            user_repo,
            course_repo,
            calendar_repo,
        }
    }

    /// Allocate courses to a lecturer, replacing their current course set
    pub async fn allocate(
        &self,
        input: AllocationInput,
    ) -> Result<AllocationDetail, AllocationServiceError> {
        let lecturer = self.lecturer(input.lecturer_id).await?;
        let course_ids = self.validate_courses(&input.course_ids).await?;

        let allocation = match self
            .repo
            .get_by_lecturer(lecturer.id)
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
                self.repo
                    .create(lecturer.id, session.map(|s| s.id))
                    .await
                    .context("Failed to create allocation")?
            }
        };

        self.repo
            .set_courses(allocation.id, &course_ids)
            .await
            .context("Failed to set allocated courses")?;
        tracing::info!(
            "Allocated {} course(s) to {}",
            course_ids.len(),
            lecturer.username
        );

        self.detail_of(allocation, lecturer).await
    }

    /// Change the lecturer and course set of an allocation
    pub async fn edit(
        &self,
        id: i64,
        input: AllocationInput,
    ) -> Result<AllocationDetail, AllocationServiceError> {
        let allocation = self.get_allocation(id).await?;
        let lecturer = self.lecturer(input.lecturer_id).await?;
        let course_ids = self.validate_courses(&input.course_ids).await?;

        if lecturer.id != allocation.lecturer_id {
            if let Some(other) = self
                .repo
                .get_by_lecturer(lecturer.id)
                .await
                .context("Failed to get allocation")?
            {
                if other.id != id {
                    return Err(AllocationServiceError::Conflict(lecturer.username));
                }
            }
            self.repo
                .set_lecturer(id, lecturer.id)
                .await
                .context("Failed to change lecturer")?;
        }

        self.repo
            .set_courses(id, &course_ids)
            .await
            .context("Failed to set allocated courses")?;

        let allocation = self.get_allocation(id).await?;
        self.detail_of(allocation, lecturer).await
    }

    pub async fn deallocate(&self, id: i64) -> Result<(), AllocationServiceError> {
        if !self
            .repo
            .delete(id)
            .await
            .context("Failed to delete allocation")?
        {
            return Err(AllocationServiceError::NotFound(format!("Allocation {}", id)));
        }
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<AllocationDetail, AllocationServiceError> {
        let allocation = self.get_allocation(id).await?;
        let lecturer = self
            .user_repo
            .get_by_id(allocation.lecturer_id)
            .await
            .context("Failed to get lecturer")?
            .ok_or_else(|| AllocationServiceError::NotFound("Lecturer".to_string()))?;
        self.detail_of(allocation, lecturer).await
    }

    /// Allocations, optionally filtered by lecturer name and course title
    /// (case-insensitive substrings)
    pub async fn list(
        &self,
        filter: &AllocationFilter,
    ) -> Result<Vec<AllocationDetail>, AllocationServiceError> {
        let lecturer_term = normalized(filter.lecturer.as_deref());
        let course_term = normalized(filter.course.as_deref());

        let mut result = Vec::new();
        for allocation in self.repo.list().await.context("Failed to list allocations")? {
            let lecturer = match self
                .user_repo
                .get_by_id(allocation.lecturer_id)
                .await
                .context("Failed to get lecturer")?
            {
                Some(user) => user,
                None => continue,
            };
            if let Some(term) = &lecturer_term {
                let name = format!("{} {}", lecturer.full_name(), lecturer.username).to_lowercase();
                if !name.contains(term.as_str()) {
                    continue;
                }
            }

            let detail = self.detail_of(allocation, lecturer).await?;
            if let Some(term) = &course_term {
                if !detail
                    .courses
                    .iter()
                    .any(|c| c.title.to_lowercase().contains(term.as_str()))
                {
                    continue;
                }
            }
            result.push(detail);
        }
        Ok(result)
    }

    pub async fn lecturers_of_course(&self, course_id: i64) -> Result<Vec<User>, AllocationServiceError> {
        Ok(self
            .repo
            .lecturers_of_course(course_id)
            .await
            .context("Failed to list lecturers")?)
    }

    async fn detail_of(
        &self,
        allocation: CourseAllocation,
        lecturer: User,
    ) -> Result<AllocationDetail, AllocationServiceError> {
        let courses = self
            .repo
            .courses(allocation.id)
            .await
            .context("Failed to list allocated courses")?;
        Ok(AllocationDetail {
            allocation,
            lecturer,
            courses,
        })
    }

    async fn get_allocation(&self, id: i64) -> Result<CourseAllocation, AllocationServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get allocation")?
            .ok_or_else(|| AllocationServiceError::NotFound(format!("Allocation {}", id)))
    }

    async fn lecturer(&self, id: i64) -> Result<User, AllocationServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get lecturer")?
            .ok_or_else(|| AllocationServiceError::NotFound(format!("User {}", id)))?;
        if !user.is_lecturer {
            return Err(AllocationServiceError::ValidationError(format!(
                "{} is not a lecturer",
                user.username
            )));
        }
        Ok(user)
    }

    /// Deduplicate and check that every course exists
    async fn validate_courses(&self, ids: &[i64]) -> Result<Vec<i64>, AllocationServiceError> {
        let ids: BTreeSet<i64> = ids.iter().copied().collect();
        if ids.is_empty() {
            return Err(AllocationServiceError::ValidationError(
                "Select at least one course".to_string(),
            ));
        }
        for id in &ids {
            if self
                .course_repo
                .get_by_id(*id)
                .await
                .context("Failed to get course")?
                .is_none()
            {
                return Err(AllocationServiceError::NotFound(format!("Course {}", id)));
            }
        }
        Ok(ids.into_iter().collect())
    }
}

fn normalized(term: Option<&str>) -> Option<String> {
    term.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty())
}
