//! Course allocation API endpoints (staff)
//!
//! - GET /api/v1/allocations?lecturer=&course= - List with filters
//! - POST /api/v1/allocations - Allocate courses to a lecturer
//! - GET /api/v1/allocations/{id}
//! - PUT /api/v1/allocations/{id} - Change lecturer and courses
//! - DELETE /api/v1/allocations/{id} - Deallocate

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{AllocationDetail, AllocationFilter, AllocationInput};
use crate::services::AllocationServiceError;

impl From<AllocationServiceError> for ApiError {
    fn from(err: AllocationServiceError) -> Self {
        match err {
            AllocationServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            AllocationServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            AllocationServiceError::Conflict(_) => ApiError::conflict(err.to_string()),
            AllocationServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/allocations", get(list_allocations).post(allocate))
        .route(
            "/allocations/{id}",
            get(get_allocation).put(edit_allocation).delete(deallocate),
        )
}

async fn list_allocations(
    State(state): State<AppState>,
    Query(filter): Query<AllocationFilter>,
) -> Result<Json<Vec<AllocationDetail>>, ApiError> {
    Ok(Json(state.allocation_service.list(&filter).await?))
}

async fn allocate(
    State(state): State<AppState>,
    Json(body): Json<AllocationInput>,
) -> Result<(StatusCode, Json<AllocationDetail>), ApiError> {
    let detail = state.allocation_service.allocate(body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_allocation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AllocationDetail>, ApiError> {
    Ok(Json(state.allocation_service.get(id).await?))
}

async fn edit_allocation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<AllocationInput>,
) -> Result<Json<AllocationDetail>, ApiError> {
    Ok(Json(state.allocation_service.edit(id, body).await?))
}

async fn deallocate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.allocation_service.deallocate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
