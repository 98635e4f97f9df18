//! Academic program model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Course, PagedResult};

/// A program of study (e.g. "Computer Science")
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Program {
    pub id: i64,
    /// Unique title
    pub title: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or updating a program
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramInput {
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

/// Program detail page: one page of its courses plus the credit total
#[derive(Debug, Clone, Serialize)]
pub struct ProgramDetail {
    pub program: Program,
    pub courses: PagedResult<Course>,
    /// Sum of credits over every course of the program
    pub total_credits: i64,
}
