//! Program API endpoints
//!
//! - GET /api/v1/programs?q= - List/search programs
//! - GET /api/v1/programs/{id}?page= - Program with its courses and credit total
//! - POST /api/v1/programs - Create (staff)
//! - PUT /api/v1/programs/{id} - Update (staff)
//! - DELETE /api/v1/programs/{id} - Delete (staff)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::ListQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Program, ProgramDetail, ProgramInput};
use crate::services::ProgramServiceError;

impl From<ProgramServiceError> for ApiError {
    fn from(err: ProgramServiceError) -> Self {
        match err {
            ProgramServiceError::DuplicateTitle(_) => ApiError::conflict(err.to_string()),
            ProgramServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            ProgramServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ProgramServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Read routes for any authenticated user
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/programs", get(list_programs))
        .route("/programs/{id}", get(get_program))
}

/// Write routes (staff middleware applied by the caller)
pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/programs", axum::routing::post(create_program))
        .route(
            "/programs/{id}",
            axum::routing::put(update_program).delete(delete_program),
        )
}

async fn list_programs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Program>>, ApiError> {
    Ok(Json(state.program_service.list(query.search()).await?))
}

async fn get_program(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ProgramDetail>, ApiError> {
    Ok(Json(state.program_service.detail(id, &query.params()).await?))
}

async fn create_program(
    State(state): State<AppState>,
    Json(body): Json<ProgramInput>,
) -> Result<(StatusCode, Json<Program>), ApiError> {
    let program = state.program_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

async fn update_program(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ProgramInput>,
) -> Result<Json<Program>, ApiError> {
    Ok(Json(state.program_service.update(id, body).await?))
}

async fn delete_program(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.program_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
