//! User model
//!
//! Users carry role flags rather than a single role: a user may be a
//! student, a lecturer, an administrator (superuser) or a plain account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique). Students and lecturers receive a generated id.
    pub username: String,
    /// Email address (unique)
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_student: bool,
    pub is_lecturer: bool,
    /// Administrator flag
    pub is_superuser: bool,
    /// False until the account is confirmed by email
    pub is_active: bool,
    /// One-time activation token, cleared on confirmation
    #[serde(skip_serializing)]
    pub activation_key: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.is_superuser
    }

    /// Administrators and lecturers
    pub fn is_staff(&self) -> bool {
        self.is_superuser || self.is_lecturer
    }

    /// "First Last", falling back to the username when no name is set
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    /// The role that drives credential provisioning, if any
    pub fn provisioned_role(&self) -> Option<UserRole> {
        if self.is_superuser {
            None
        } else if self.is_student {
            Some(UserRole::Student)
        } else if self.is_lecturer {
            Some(UserRole::Lecturer)
        } else {
            None
        }
    }
}

/// Role used when creating accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Lecturer,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Student => write!(f, "student"),
            UserRole::Lecturer => write!(f, "lecturer"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "lecturer" => Ok(UserRole::Lecturer),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Input for inserting a user row (password already hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
}

/// Credentials assigned by provisioning
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub username: String,
    pub password_hash: String,
    pub activation_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_student: bool, is_lecturer: bool, is_superuser: bool) -> User {
        let now = Utc::now();
        User {
            id: 1,
            username: "u".to_string(),
            email: "u@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "hash".to_string(),
            is_student,
            is_lecturer,
            is_superuser,
            is_active: true,
            activation_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_provisioned_role() {
        assert_eq!(user(true, false, false).provisioned_role(), Some(UserRole::Student));
        assert_eq!(user(false, true, false).provisioned_role(), Some(UserRole::Lecturer));
        assert_eq!(user(false, true, true).provisioned_role(), None);
        assert_eq!(user(false, false, false).provisioned_role(), None);
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        let mut u = user(true, false, false);
        assert_eq!(u.full_name(), "u");
        u.first_name = "Ada".to_string();
        u.last_name = "Lovelace".to_string();
        assert_eq!(u.full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!(UserRole::from_str("Student").unwrap(), UserRole::Student);
        assert_eq!(UserRole::from_str("lecturer").unwrap(), UserRole::Lecturer);
        assert!(UserRole::from_str("editor").is_err());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_string(&user(true, false, false)).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("activation_key"));
    }
}
