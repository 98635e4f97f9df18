//! Shared API response types
//!
//! Response structures used across several endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{ProgressSummary, User};
use crate::services::ToggleAction;

// ============================================================================
// User Response Types
// ============================================================================

/// Public view of a user
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let role = if user.is_admin() {
            "admin"
        } else if user.is_lecturer {
            "lecturer"
        } else if user.is_student {
            "student"
        } else {
            "user"
        };
        Self {
            id: user.id,
            full_name: user.full_name(),
            role: role.to_string(),
            is_active: user.is_active,
            created_at: user.created_at.to_rfc3339(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

// ============================================================================
// Generic Response Types
// ============================================================================

/// Plain confirmation message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Progress Envelope
// ============================================================================

/// Successful progress toggle: `{status: "success", action, message}`
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub status: &'static str,
    pub action: ToggleAction,
    pub message: String,
    pub progress: ProgressSummary,
}

impl ProgressResponse {
    pub fn new(action: ToggleAction, message: String, progress: ProgressSummary) -> Self {
        Self {
            status: "success",
            action,
            message,
            progress,
        }
    }
}

/// Failed progress toggle: `{status: "error", message}`
#[derive(Debug)]
pub struct ProgressError {
    pub status: StatusCode,
    pub message: String,
}

impl ProgressError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ProgressError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}
