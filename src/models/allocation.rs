//! Course allocation: one lecturer, many courses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Course, User};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseAllocation {
    pub id: i64,
    /// At most one allocation per lecturer
    pub lecturer_id: i64,
    pub academic_session_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Allocation joined with its lecturer and courses
#[derive(Debug, Clone, Serialize)]
pub struct AllocationDetail {
    pub allocation: CourseAllocation,
    pub lecturer: User,
    pub courses: Vec<Course>,
}

/// Input for allocating or re-allocating courses
#[derive(Debug, Clone, Deserialize)]
pub struct AllocationInput {
    pub lecturer_id: i64,
    pub course_ids: Vec<i64>,
}

/// Optional filters for the allocation list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllocationFilter {
    pub lecturer: Option<String>,
    pub course: Option<String>,
}
