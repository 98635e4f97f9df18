//! Material completion tracking
//!
//! Students tick off files and videos of the courses they take. A marker is
//! keyed by (taken course, material id, material type).

use crate::db::repositories::{EnrollmentRepository, MaterialRepository, ProfileRepository};
use crate::models::{MaterialKind, ProgressSummary, TakenCourse, User};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ProgressServiceError {
    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    NotFound(String),

    #[error("This course does not belong to you")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Toggle request as posted by the course page checkbox
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressToggle {
    pub material_id: i64,
    pub material_type: String,
    pub is_checked: bool,
    pub taken_course_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Checked,
    Unchecked,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleOutcome {
    pub action: ToggleAction,
    pub message: String,
    pub summary: ProgressSummary,
}

pub struct ProgressService {
    enrollment_repo: Arc<dyn EnrollmentRepository>,
    material_repo: Arc<dyn MaterialRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
}

impl ProgressService {
    pub fn new(
        enrollment_repo: Arc<dyn EnrollmentRepository>,
        material_repo: Arc<dyn MaterialRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            enrollment_repo,
            material_repo,
            profile_repo,
        }
    }

    /// Mark a material complete (`is_checked`) or clear the marker
    pub async fn toggle(
        &self,
        user: &User,
        request: ProgressToggle,
    ) -> Result<ToggleOutcome, ProgressServiceError> {
        let kind = MaterialKind::from_str(&request.material_type)
            .map_err(|e| ProgressServiceError::ValidationError(e.to_string()))?;
        let taken = self.owned_taken_course(user, request.taken_course_id).await?;
        self.ensure_material_in_course(kind, request.material_id, taken.course_id)
            .await?;

        let action = if request.is_checked {
            let existing = self
                .enrollment_repo
                .find_progress(taken.id, request.material_id, kind)
                .await
                .context("Failed to get progress")?;
            if existing.is_none() {
                self.enrollment_repo
                    .create_progress(taken.id, request.material_id, kind)
                    .await
                    .context("Failed to record progress")?;
            }
            ToggleAction::Checked
        } else {
            self.enrollment_repo
                .delete_progress(taken.id, request.material_id, kind)
                .await
                .context("Failed to clear progress")?;
            ToggleAction::Unchecked
        };

        let message = match action {
            ToggleAction::Checked => format!("Marked {} as complete", kind),
            ToggleAction::Unchecked => format!("Marked {} as incomplete", kind),
        };
        let summary = self.summary_of(&taken).await?;
        Ok(ToggleOutcome {
            action,
            message,
            summary,
        })
    }

    /// Completed versus available materials of a taken course
    pub async fn summary(
        &self,
        user: &User,
        taken_course_id: i64,
    ) -> Result<ProgressSummary, ProgressServiceError> {
        let taken = self.owned_taken_course(user, taken_course_id).await?;
        self.summary_of(&taken).await
    }

    async fn summary_of(&self, taken: &TakenCourse) -> Result<ProgressSummary, ProgressServiceError> {
        let completed = self
            .enrollment_repo
            .count_completed(taken.id)
            .await
            .context("Failed to count completed materials")?;
        let total = self
            .material_repo
            .count_available(taken.course_id)
            .await
            .context("Failed to count course materials")?;
        Ok(ProgressSummary::new(taken.id, completed, total))
    }

    async fn owned_taken_course(
        &self,
        user: &User,
        taken_course_id: i64,
    ) -> Result<TakenCourse, ProgressServiceError> {
        let taken = self
            .enrollment_repo
            .get_taken(taken_course_id)
            .await
            .context("Failed to get taken course")?
            .ok_or_else(|| ProgressServiceError::NotFound("Course enrollment not found".to_string()))?;
        let student = self
            .profile_repo
            .get_student_by_user(user.id)
            .await
            .context("Failed to get student profile")?;
        match student {
            Some(student) if student.id == taken.student_id => Ok(taken),
            _ => Err(ProgressServiceError::Forbidden),
        }
    }

    async fn ensure_material_in_course(
        &self,
        kind: MaterialKind,
        material_id: i64,
        course_id: i64,
    ) -> Result<(), ProgressServiceError> {
        let material_course = match kind {
            MaterialKind::File => self
                .material_repo
                .get_upload(material_id)
                .await
                .context("Failed to get file")?
                .map(|u| u.course_id),
            MaterialKind::Video => self
                .material_repo
                .get_video(material_id)
                .await
                .context("Failed to get video")?
                .map(|v| v.course_id),
        };
        match material_course {
            Some(id) if id == course_id => Ok(()),
            _ => Err(ProgressServiceError::NotFound(format!(
                "The {} was not found in this course",
                kind
            ))),
        }
    }
}
