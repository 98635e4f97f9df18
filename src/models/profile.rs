//! Student and department-head profiles (one-to-one with a user)

use serde::{Deserialize, Serialize};

use super::User;

/// Student profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Student {
    pub id: i64,
    pub user_id: i64,
    pub program_id: Option<i64>,
    pub level: Option<String>,
}

/// Student profile joined with its user, for listings
#[derive(Debug, Clone, Serialize)]
pub struct StudentWithUser {
    #[serde(flatten)]
    pub student: Student,
    pub user: User,
}

/// Head of a program's department
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepartmentHead {
    pub id: i64,
    pub user_id: i64,
    pub program_id: Option<i64>,
}
