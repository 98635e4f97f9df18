//! Academic calendar service

use crate::db::repositories::CalendarRepository;
use crate::models::{AcademicSession, Semester, SemesterName};
use anyhow::Context;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CalendarServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Academic session already exists: {0}")]
    DuplicateSession(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemesterInput {
    pub name: String,
    pub academic_session_id: Option<i64>,
    #[serde(default)]
    pub is_current: bool,
}

pub struct CalendarService {
    repo: Arc<dyn CalendarRepository>,
}

impl CalendarService {
    pub fn new(repo: Arc<dyn CalendarRepository>) -> Self {
        Self { repo }
    }

    pub async fn create_session(
        &self,
        name: &str,
        is_current: bool,
    ) -> Result<AcademicSession, CalendarServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CalendarServiceError::ValidationError(
                "Session name cannot be empty".to_string(),
            ));
        }
        if self.sessions().await?.iter().any(|s| s.name == name) {
            return Err(CalendarServiceError::DuplicateSession(name.to_string()));
        }

        let session = self
            .repo
            .create_session(name)
            .await
            .context("Failed to create session")?;
        if is_current {
            return self.set_current_session(session.id).await;
        }
        Ok(session)
    }

    pub async fn sessions(&self) -> Result<Vec<AcademicSession>, CalendarServiceError> {
        Ok(self.repo.list_sessions().await.context("Failed to list sessions")?)
    }

    pub async fn set_current_session(&self, id: i64) -> Result<AcademicSession, CalendarServiceError> {
        if !self
            .repo
            .set_current_session(id)
            .await
            .context("Failed to set current session")?
        {
            return Err(CalendarServiceError::NotFound(format!("Session {}", id)));
        }
        tracing::info!("Academic session {} is now current", id);
        self.repo
            .get_current_session()
            .await
            .context("Failed to get current session")?
            .ok_or_else(|| CalendarServiceError::NotFound(format!("Session {}", id)))
    }

    pub async fn create_semester(&self, input: SemesterInput) -> Result<Semester, CalendarServiceError> {
        let name = SemesterName::from_str(&input.name)
            .map_err(|e| CalendarServiceError::ValidationError(e.to_string()))?;
        if let Some(session_id) = input.academic_session_id {
            if !self.sessions().await?.iter().any(|s| s.id == session_id) {
                return Err(CalendarServiceError::NotFound(format!("Session {}", session_id)));
            }
        }

        let semester = self
            .repo
            .create_semester(name, input.academic_session_id)
            .await
            .context("Failed to create semester")?;
        if input.is_current {
            return self.set_current_semester(semester.id).await;
        }
        Ok(semester)
    }

    pub async fn semesters(&self) -> Result<Vec<Semester>, CalendarServiceError> {
        Ok(self.repo.list_semesters().await.context("Failed to list semesters")?)
    }

    pub async fn set_current_semester(&self, id: i64) -> Result<Semester, CalendarServiceError> {
        if !self
            .repo
            .set_current_semester(id)
            .await
            .context("Failed to set current semester")?
        {
            return Err(CalendarServiceError::NotFound(format!("Semester {}", id)));
        }
        tracing::info!("Semester {} is now current", id);
        self.repo
            .get_current_semester()
            .await
            .context("Failed to get current semester")?
            .ok_or_else(|| CalendarServiceError::NotFound(format!("Semester {}", id)))
    }

    pub async fn current(
        &self,
    ) -> Result<(Option<AcademicSession>, Option<Semester>), CalendarServiceError> {
        let session = self
            .repo
            .get_current_session()
            .await
            .context("Failed to get current session")?;
        let semester = self
            .repo
            .get_current_semester()
            .await
            .context("Failed to get current semester")?;
        Ok((session, semester))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxCalendarRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> CalendarService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        CalendarService::new(SqlxCalendarRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_single_current_session() {
        let service = setup().await;
        let a = service.create_session("2025/2026", true).await.unwrap();
        assert!(a.is_current);
        let b = service.create_session("2026/2027", true).await.unwrap();
        assert_eq!(b.name, "2026/2027");

        let current: Vec<_> = service
            .sessions()
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.is_current)
            .collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, b.id);

        assert!(matches!(
            service.create_session("2025/2026", false).await,
            Err(CalendarServiceError::DuplicateSession(_))
        ));
        assert!(matches!(
            service.set_current_session(999).await,
            Err(CalendarServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_semesters() {
        let service = setup().await;
        let session = service.create_session("2025/2026", true).await.unwrap();
        let first = service
            .create_semester(SemesterInput {
                name: "first".to_string(),
                academic_session_id: Some(session.id),
                is_current: true,
            })
            .await
            .unwrap();
        assert_eq!(first.name, SemesterName::First);

        service
            .create_semester(SemesterInput {
                name: "Second".to_string(),
                academic_session_id: Some(session.id),
                is_current: true,
            })
            .await
            .unwrap();
        let (_, semester) = service.current().await.unwrap();
        assert_eq!(semester.unwrap().name, SemesterName::Second);

        assert!(matches!(
            service
                .create_semester(SemesterInput {
                    name: "Summer".to_string(),
                    academic_session_id: None,
                    is_current: false,
                })
                .await,
            Err(CalendarServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service
                .create_semester(SemesterInput {
                    name: "Third".to_string(),
                    academic_session_id: Some(999),
                    is_current: false,
                })
                .await,
            Err(CalendarServiceError::NotFound(_))
        ));
    }
}
