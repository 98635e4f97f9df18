//! Quizzes attached to courses. Only storage is modelled here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub pass_mark: Option<i32>,
    pub single_attempt: bool,
    pub random_order: bool,
    pub answers_at_end: bool,
    pub exam_paper: bool,
    pub draft: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a quiz
#[derive(Debug, Clone, Deserialize)]
pub struct QuizInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub pass_mark: Option<i32>,
    #[serde(default)]
    pub single_attempt: bool,
    #[serde(default)]
    pub random_order: bool,
    #[serde(default)]
    pub answers_at_end: bool,
    #[serde(default)]
    pub exam_paper: bool,
    #[serde(default)]
    pub draft: bool,
}
