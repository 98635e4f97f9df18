//! Enrollment records, material progress and the registration views built on them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Course, MaterialKind};

/// A student's enrollment in a course
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TakenCourse {
    pub id: i64,
    /// Student profile id
    pub student_id: i64,
    pub course_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Completion marker for one material, unique per (taken course, material, type)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialProgress {
    pub id: i64,
    pub taken_course_id: i64,
    pub material_id: i64,
    pub material_type: MaterialKind,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of enrolling a single address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollOutcome {
    Added,
    AlreadyEnrolled,
}

/// Result of a single enrollment
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SingleEnrollResult {
    pub email: String,
    pub outcome: EnrollOutcome,
    pub account_created: bool,
}

/// Aggregated result of a bulk enrollment
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BulkEnrollResult {
    pub added: Vec<String>,
    pub already: Vec<String>,
    pub created: Vec<String>,
    pub invalid: Vec<String>,
}

impl BulkEnrollResult {
    /// Human-readable summary, one sentence per non-empty bucket
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push(format!("Added to course: {}", self.added.join(", ")));
        }
        if !self.created.is_empty() {
            parts.push(format!("Accounts created & emailed: {}", self.created.join(", ")));
        }
        if !self.already.is_empty() {
            parts.push(format!("Already enrolled: {}", self.already.join(", ")));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("Invalid addresses: {}", self.invalid.join(", ")));
        }
        parts.join(". ")
    }
}

/// Course registration overview for the current semester
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOverview {
    pub current_semester: String,
    /// Offered courses not yet taken
    pub courses: Vec<Course>,
    pub registered_courses: Vec<Course>,
    pub total_first_semester_credit: i64,
    pub total_sec_semester_credit: i64,
    pub total_registered_credit: i64,
    pub no_course_is_registered: bool,
    pub all_courses_are_registered: bool,
}

/// Completion summary for one taken course
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressSummary {
    pub taken_course_id: i64,
    pub completed: i64,
    pub total: i64,
    pub percentage: f64,
}

impl ProgressSummary {
    pub fn new(taken_course_id: i64, completed: i64, total: i64) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            ((completed as f64 / total as f64) * 10000.0).round() / 100.0
        };
        Self {
            taken_course_id,
            completed,
            total,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_summary_skips_empty_buckets() {
        let result = BulkEnrollResult {
            added: vec!["a@x.io".to_string(), "b@x.io".to_string()],
            already: vec!["c@x.io".to_string()],
            created: vec![],
            invalid: vec![],
        };
        assert_eq!(
            result.summary(),
            "Added to course: a@x.io, b@x.io. Already enrolled: c@x.io"
        );
        assert_eq!(BulkEnrollResult::default().summary(), "");
    }

    #[test]
    fn test_progress_percentage() {
        assert_eq!(ProgressSummary::new(1, 0, 0).percentage, 0.0);
        assert_eq!(ProgressSummary::new(1, 1, 3).percentage, 33.33);
        assert_eq!(ProgressSummary::new(1, 4, 4).percentage, 100.0);
    }
}
