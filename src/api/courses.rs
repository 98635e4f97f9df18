//! Course API endpoints
//!
//! Read (any authenticated user):
//! - GET /api/v1/courses?q=&page= - List/search courses
//! - GET /api/v1/courses/{slug} - Course page with files, videos and lecturers
//! - GET /api/v1/courses/{slug}/lecturers - Lecturers allocated to the course
//! - GET /api/v1/my-courses - Allocated (lecturer) or taken (student) courses
//!
//! Write (staff):
//! - POST /api/v1/courses
//! - PUT /api/v1/courses/{slug}
//! - DELETE /api/v1/courses/{slug}
//! - GET /api/v1/courses/{slug}/duplicate - Prefilled copy form
//! - POST /api/v1/courses/{slug}/duplicate - Copy with materials and quizzes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::common::ListQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::UserResponse;
use crate::models::{Course, CourseDetail, CourseInput, DuplicationCounts, PagedResult};
use crate::services::CourseServiceError;

impl From<CourseServiceError> for ApiError {
    fn from(err: CourseServiceError) -> Self {
        match err {
            CourseServiceError::DuplicateCode(_) => ApiError::conflict(err.to_string()),
            CourseServiceError::NotFound(_) | CourseServiceError::ProgramNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            CourseServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CourseServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Course page plus whether it runs this semester
#[derive(Debug, Serialize)]
pub struct CourseDetailResponse {
    #[serde(flatten)]
    pub detail: CourseDetail,
    pub is_current_semester: bool,
    /// Set for students taking the course; used for progress toggles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken_course_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DuplicateResponse {
    pub course: Course,
    pub copied: DuplicationCounts,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/{slug}", get(get_course))
        .route("/courses/{slug}/lecturers", get(course_lecturers))
        .route("/my-courses", get(my_courses))
}

pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route("/courses", axum::routing::post(create_course))
        .route(
            "/courses/{slug}",
            axum::routing::put(update_course).delete(delete_course),
        )
        .route(
            "/courses/{slug}/duplicate",
            get(duplicate_prefill).post(duplicate_course),
        )
}

async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PagedResult<Course>>, ApiError> {
    Ok(Json(
        state
            .course_service
            .list(query.search(), &query.params())
            .await?,
    ))
}

async fn get_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<CourseDetailResponse>, ApiError> {
    let detail = state.course_service.detail(&slug, &user.0).await?;
    let is_current_semester = state
        .course_service
        .is_current_semester(&detail.course)
        .await?;
    let taken_course_id = state
        .enrollment_service
        .taken_course(&user.0, detail.course.id)
        .await?
        .map(|taken| taken.id);
    Ok(Json(CourseDetailResponse {
        detail,
        is_current_semester,
        taken_course_id,
    }))
}

async fn course_lecturers(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let course = state.course_service.get_by_slug(&slug).await?;
    let lecturers = state
        .allocation_service
        .lecturers_of_course(course.id)
        .await?;
    Ok(Json(lecturers.into_iter().map(UserResponse::from).collect()))
}

async fn my_courses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.enrollment_service.my_courses(&user.0).await?))
}

async fn create_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CourseInput>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let course = state.course_service.create(body, &user.0).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<CourseInput>,
) -> Result<Json<Course>, ApiError> {
    let course = state.course_service.get_by_slug(&slug).await?;
    Ok(Json(state.course_service.update(course.id, body).await?))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    let course = state.course_service.get_by_slug(&slug).await?;
    state.course_service.delete(course.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn duplicate_prefill(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CourseInput>, ApiError> {
    let course = state.course_service.get_by_slug(&slug).await?;
    Ok(Json(state.course_service.duplicate_prefill(course.id).await?))
}

async fn duplicate_course(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<CourseInput>,
) -> Result<(StatusCode, Json<DuplicateResponse>), ApiError> {
    let source = state.course_service.get_by_slug(&slug).await?;
    let (course, copied) = state.course_service.duplicate(source.id, body).await?;
    Ok((StatusCode::CREATED, Json(DuplicateResponse { course, copied })))
}
