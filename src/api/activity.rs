//! Activity log endpoint (admin)
//!
//! - GET /api/v1/activity?page=&per_page= - Newest first

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::api::common::ListQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{ActivityLog, PagedResult};

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/activity", get(list_activity))
}

async fn list_activity(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PagedResult<ActivityLog>>, ApiError> {
    let page = state
        .activity_service
        .list(&query.params())
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(page))
}
