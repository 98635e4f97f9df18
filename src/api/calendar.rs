//! Academic calendar endpoints (admin)
//!
//! - GET/POST /api/v1/calendar/sessions
//! - POST /api/v1/calendar/sessions/{id}/current
//! - GET/POST /api/v1/calendar/semesters
//! - POST /api/v1/calendar/semesters/{id}/current
//! - GET /api/v1/calendar/current

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{AcademicSession, Semester};
use crate::services::{CalendarServiceError, SemesterInput};

impl From<CalendarServiceError> for ApiError {
    fn from(err: CalendarServiceError) -> Self {
        match err {
            CalendarServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CalendarServiceError::DuplicateSession(_) => ApiError::conflict(err.to_string()),
            CalendarServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            CalendarServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub name: String,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Serialize)]
pub struct CurrentCalendarResponse {
    pub session: Option<AcademicSession>,
    pub semester: Option<Semester>,
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/calendar/sessions", get(list_sessions).post(create_session))
        .route("/calendar/sessions/{id}/current", post(set_current_session))
        .route("/calendar/semesters", get(list_semesters).post(create_semester))
        .route("/calendar/semesters/{id}/current", post(set_current_semester))
        .route("/calendar/current", get(current))
}

async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<AcademicSession>>, ApiError> {
    Ok(Json(state.calendar_service.sessions().await?))
}

async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<SessionRequest>,
) -> Result<(StatusCode, Json<AcademicSession>), ApiError> {
    let session = state
        .calendar_service
        .create_session(&body.name, body.is_current)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn set_current_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AcademicSession>, ApiError> {
    Ok(Json(state.calendar_service.set_current_session(id).await?))
}

async fn list_semesters(State(state): State<AppState>) -> Result<Json<Vec<Semester>>, ApiError> {
    Ok(Json(state.calendar_service.semesters().await?))
}

async fn create_semester(
    State(state): State<AppState>,
    Json(body): Json<SemesterInput>,
) -> Result<(StatusCode, Json<Semester>), ApiError> {
    let semester = state.calendar_service.create_semester(body).await?;
    Ok((StatusCode::CREATED, Json(semester)))
}

async fn set_current_semester(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Semester>, ApiError> {
    Ok(Json(state.calendar_service.set_current_semester(id).await?))
}

async fn current(State(state): State<AppState>) -> Result<Json<CurrentCalendarResponse>, ApiError> {
    let (session, semester) = state.calendar_service.current().await?;
    Ok(Json(CurrentCalendarResponse { session, semester }))
}
