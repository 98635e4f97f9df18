//! Account administration endpoints
//!
//! Admin:
//! - GET/POST /api/v1/accounts/lecturers
//! - POST /api/v1/accounts/department-heads
//!
//! Staff:
//! - GET/POST /api/v1/accounts/students
//!
//! New accounts are created inactive; the activation email is sent by the
//! account provisioner.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::UserResponse;
use crate::models::{DepartmentHead, UserRole};
use crate::services::{
    AccountServiceError, CreateLecturerInput, CreateStudentInput, StudentAccount,
};

impl From<AccountServiceError> for ApiError {
    fn from(err: AccountServiceError) -> Self {
        match err {
            AccountServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            AccountServiceError::UserExists(_) => ApiError::conflict(err.to_string()),
            AccountServiceError::NotFound(msg) => ApiError::not_found(msg),
            AccountServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DepartmentHeadRequest {
    pub user_id: i64,
    pub program_id: i64,
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/accounts/lecturers", get(list_lecturers).post(create_lecturer))
        .route(
            "/accounts/department-heads",
            axum::routing::post(assign_department_head),
        )
}

pub fn staff_router() -> Router<AppState> {
    Router::new().route("/accounts/students", get(list_students).post(create_student))
}

async fn list_lecturers(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.account_service.list_by_role(UserRole::Lecturer).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn create_lecturer(
    State(state): State<AppState>,
    Json(body): Json<CreateLecturerInput>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.account_service.create_lecturer(body).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn list_students(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.account_service.list_by_role(UserRole::Student).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn create_student(
    State(state): State<AppState>,
    Json(body): Json<CreateStudentInput>,
) -> Result<(StatusCode, Json<StudentAccount>), ApiError> {
    let account = state.account_service.create_student(body).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn assign_department_head(
    State(state): State<AppState>,
    Json(body): Json<DepartmentHeadRequest>,
) -> Result<Json<DepartmentHead>, ApiError> {
    Ok(Json(
        state
            .account_service
            .assign_department_head(body.user_id, body.program_id)
            .await?,
    ))
}
