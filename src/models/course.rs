//! Course model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Upload, UploadVideo, User};

/// A course belonging to a program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub id: i64,
    /// URL-safe unique identifier derived from the title
    pub slug: String,
    pub title: String,
    /// Unique course code
    pub code: String,
    pub credit: i32,
    pub summary: String,
    pub program_id: i64,
    pub level: String,
    pub year: i32,
    /// Semester name, e.g. "First"
    pub semester: String,
    pub is_elective: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.code)
    }
}

/// Input for creating, updating or duplicating a course
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseInput {
    pub title: String,
    pub code: String,
    #[serde(default)]
    pub credit: i32,
    #[serde(default)]
    pub summary: String,
    pub program_id: i64,
    pub level: String,
    #[serde(default = "default_year")]
    pub year: i32,
    pub semester: String,
    #[serde(default)]
    pub is_elective: bool,
}

fn default_year() -> i32 {
    1
}

impl CourseInput {
    /// Prefill for the duplicate form
    pub fn copy_of(course: &Course) -> Self {
        Self {
            title: format!("Copy of {}", course.title),
            code: format!("Copy-{}", course.code),
            credit: course.credit,
            summary: course.summary.clone(),
            program_id: course.program_id,
            level: course.level.clone(),
            year: course.year,
            semester: course.semester.clone(),
            is_elective: course.is_elective,
        }
    }
}

/// Course detail: materials and assigned lecturers
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    pub course: Course,
    pub files: Vec<Upload>,
    pub videos: Vec<UploadVideo>,
    pub lecturers: Vec<User>,
}

/// Counts of the materials copied by a course duplication
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DuplicationCounts {
    pub uploads: usize,
    pub videos: usize,
    pub quizzes: usize,
    pub questions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course() -> Course {
        let now = Utc::now();
        Course {
            id: 3,
            slug: "intro-to-programming".to_string(),
            title: "Intro to Programming".to_string(),
            code: "CS101".to_string(),
            credit: 3,
            summary: "Basics".to_string(),
            program_id: 1,
            level: "Bachelor".to_string(),
            year: 1,
            semester: "First".to_string(),
            is_elective: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_course_display() {
        assert_eq!(course().to_string(), "Intro to Programming (CS101)");
    }

    #[test]
    fn test_copy_of_prefill() {
        let input = CourseInput::copy_of(&course());
        assert_eq!(input.title, "Copy of Intro to Programming");
        assert_eq!(input.code, "Copy-CS101");
        assert_eq!(input.credit, 3);
        assert!(input.is_elective);
    }
}
