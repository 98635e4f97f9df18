//! Activity log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLog {
    pub id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
