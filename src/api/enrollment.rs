//! Enrollment, registration and progress endpoints
//!
//! Staff:
//! - POST /api/v1/courses/{slug}/students/bulk - Enroll a pasted address list
//! - POST /api/v1/courses/{slug}/students - Enroll one address
//!
//! Students:
//! - GET /api/v1/registration - Registration overview for the current semester
//! - POST /api/v1/registration - Register for courses
//! - POST /api/v1/registration/drop - Drop courses
//! - POST /api/v1/progress/toggle - Tick or untick a material
//! - GET /api/v1/progress/summary/{id} - Completion of a taken course

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::CourseIdsRequest;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ProgressError, ProgressResponse};
use crate::models::{
    BulkEnrollResult, Course, ProgressSummary, RegistrationOverview, SingleEnrollResult,
};
use crate::services::{EnrollmentServiceError, ProgressServiceError, ProgressToggle};

impl From<EnrollmentServiceError> for ApiError {
    fn from(err: EnrollmentServiceError) -> Self {
        match err {
            EnrollmentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            EnrollmentServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            EnrollmentServiceError::NotAStudent => ApiError::forbidden(err.to_string()),
            EnrollmentServiceError::NoActiveSemester => ApiError::validation_error(err.to_string()),
            EnrollmentServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ProgressServiceError> for ApiError {
    fn from(err: ProgressServiceError) -> Self {
        match err {
            ProgressServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ProgressServiceError::NotFound(msg) => ApiError::not_found(msg),
            ProgressServiceError::Forbidden => ApiError::forbidden(err.to_string()),
            ProgressServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ProgressServiceError> for ProgressError {
    fn from(err: ProgressServiceError) -> Self {
        match err {
            ProgressServiceError::ValidationError(msg) => {
                ProgressError::new(StatusCode::BAD_REQUEST, msg)
            }
            ProgressServiceError::NotFound(msg) => ProgressError::new(StatusCode::NOT_FOUND, msg),
            ProgressServiceError::Forbidden => {
                ProgressError::new(StatusCode::FORBIDDEN, err.to_string())
            }
            ProgressServiceError::InternalError(e) => {
                tracing::error!("Progress toggle failed: {}", e);
                ProgressError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkEnrollRequest {
    pub emails: String,
}

#[derive(Debug, Serialize)]
pub struct BulkEnrollResponse {
    #[serde(flatten)]
    pub result: BulkEnrollResult,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SingleEnrollRequest {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct DropResponse {
    pub dropped: u64,
}

pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/courses/{slug}/students/bulk", post(bulk_enroll))
        .route("/courses/{slug}/students", post(enroll_single))
}

pub fn student_router() -> Router<AppState> {
    Router::new()
        .route("/registration", get(registration_overview).post(register))
        .route("/registration/drop", post(drop_courses))
        .route("/progress/toggle", post(toggle_progress))
        .route("/progress/summary/{id}", get(progress_summary))
}

async fn bulk_enroll(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<BulkEnrollRequest>,
) -> Result<Json<BulkEnrollResponse>, ApiError> {
    let course = state.course_service.get_by_slug(&slug).await?;
    let result = state
        .enrollment_service
        .bulk_enroll(course.id, &body.emails)
        .await?;
    let message = result.summary();
    Ok(Json(BulkEnrollResponse { result, message }))
}

async fn enroll_single(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<SingleEnrollRequest>,
) -> Result<Json<SingleEnrollResult>, ApiError> {
    let course = state.course_service.get_by_slug(&slug).await?;
    Ok(Json(
        state
            .enrollment_service
            .enroll_single(course.id, &body.email, &body.first_name, &body.last_name)
            .await?,
    ))
}

async fn registration_overview(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<RegistrationOverview>, ApiError> {
    Ok(Json(state.enrollment_service.overview(&user.0).await?))
}

async fn register(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CourseIdsRequest>,
) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(
        state
            .enrollment_service
            .register_courses(&user.0, &body.course_ids)
            .await?,
    ))
}

async fn drop_courses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CourseIdsRequest>,
) -> Result<Json<DropResponse>, ApiError> {
    let dropped = state
        .enrollment_service
        .drop_courses(&user.0, &body.course_ids)
        .await?;
    Ok(Json(DropResponse { dropped }))
}

async fn toggle_progress(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: Result<Json<ProgressToggle>, JsonRejection>,
) -> Result<Json<ProgressResponse>, ProgressError> {
    let Json(request) =
        body.map_err(|e| ProgressError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
    let outcome = state.progress_service.toggle(&user.0, request).await?;
    Ok(Json(ProgressResponse::new(
        outcome.action,
        outcome.message,
        outcome.summary,
    )))
}

async fn progress_summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ProgressSummary>, ApiError> {
    Ok(Json(state.progress_service.summary(&user.0, id).await?))
}
