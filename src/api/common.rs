//! Common API utilities and shared types
//!
//! This module contains shared utilities used across multiple API endpoints.

use serde::Deserialize;

use crate::models::{ListParams, DEFAULT_PER_PAGE};

// ============================================================================
// Pagination Defaults
// ============================================================================

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size for catalog listings
pub fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

// ============================================================================
// Query Types
// ============================================================================

/// Pagination and search query parameters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default)]
    pub q: Option<String>,
}

impl ListQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }

    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Request body carrying a list of course ids
#[derive(Debug, Deserialize)]
pub struct CourseIdsRequest {
    pub course_ids: Vec<i64>,
}
