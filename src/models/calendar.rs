//! Academic calendar: sessions (school years) and semesters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A school year such as `2025/2026`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcademicSession {
    pub id: i64,
    pub name: String,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Semester {
    pub id: i64,
    pub name: SemesterName,
    pub academic_session_id: Option<i64>,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

/// Semester names. Courses store the name as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemesterName {
    First,
    Second,
    Third,
}

impl SemesterName {
    pub const ALL: [SemesterName; 3] = [SemesterName::First, SemesterName::Second, SemesterName::Third];

    pub fn as_str(&self) -> &'static str {
        match self {
            SemesterName::First => "First",
            SemesterName::Second => "Second",
            SemesterName::Third => "Third",
        }
    }
}

impl fmt::Display for SemesterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemesterName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(SemesterName::First),
            "second" => Ok(SemesterName::Second),
            "third" => Ok(SemesterName::Third),
            _ => Err(anyhow::anyhow!("Invalid semester: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semester_name_parse_is_case_insensitive() {
        assert_eq!(SemesterName::from_str("FIRST").unwrap(), SemesterName::First);
        assert_eq!(SemesterName::from_str(" second ").unwrap(), SemesterName::Second);
        assert!(SemesterName::from_str("fourth").is_err());
        assert_eq!(SemesterName::Third.to_string(), "Third");
    }
}
