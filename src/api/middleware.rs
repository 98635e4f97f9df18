//! API middleware
//!
//! Contains:
//! - Application state and service wiring
//! - Authentication (session token validation)
//! - Authorization (administrator / staff gates)
//! - The JSON error envelope

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxActivityLogRepository, SqlxAllocationRepository, SqlxCalendarRepository,
    SqlxCourseRepository, SqlxEnrollmentRepository, SqlxMaterialRepository,
    SqlxProfileRepository, SqlxProgramRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::events::{EventBus, PRIORITY_EARLY, PRIORITY_LATE};
use crate::models::User;
use crate::services::{
    AccountProvisioner, AccountService, ActivityLogger, ActivityService, AllocationService,
    CalendarService, CourseService, EmailOutbox, EnrollmentService, LoginRateLimiter,
    MaterialService, ProgramService, ProgressService, UserService,
};
use crate::storage::DynObjectStorage;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub events: Arc<EventBus>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub user_service: Arc<UserService>,
    pub account_service: Arc<AccountService>,
    pub program_service: Arc<ProgramService>,
    pub course_service: Arc<CourseService>,
    pub allocation_service: Arc<AllocationService>,
    pub material_service: Arc<MaterialService>,
    pub enrollment_service: Arc<EnrollmentService>,
    pub progress_service: Arc<ProgressService>,
    pub calendar_service: Arc<CalendarService>,
    pub activity_service: Arc<ActivityService>,
}

impl AppState {
    /// Create repositories and services over `pool` and subscribe the
    /// provisioning and activity listeners to a fresh event bus
    pub fn build(
        pool: DynDatabasePool,
        config: &Config,
        storage: DynObjectStorage,
        outbox: EmailOutbox,
    ) -> Self {
        let cache = create_cache(&config.cache);
        let events = Arc::new(EventBus::new());
        let rate_limiter = Arc::new(LoginRateLimiter::new());

        // Repositories
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let profile_repo = SqlxProfileRepository::boxed(pool.clone());
        let program_repo = SqlxProgramRepository::boxed(pool.clone());
        let course_repo = SqlxCourseRepository::boxed(pool.clone());
        let allocation_repo = SqlxAllocationRepository::boxed(pool.clone());
        let material_repo = SqlxMaterialRepository::boxed(pool.clone());
        let enrollment_repo = SqlxEnrollmentRepository::boxed(pool.clone());
        let calendar_repo = SqlxCalendarRepository::boxed(pool.clone());
        let activity_repo = SqlxActivityLogRepository::boxed(pool.clone());

        // Listeners: credentials are assigned before anything else sees the user
        events.subscribe(
            Arc::new(AccountProvisioner::new(
                user_repo.clone(),
                outbox,
                config.accounts.clone(),
            )),
            PRIORITY_EARLY,
        );
        events.subscribe(
            Arc::new(ActivityLogger::new(activity_repo.clone())),
            PRIORITY_LATE,
        );

        let user_service = Arc::new(UserService::with_session_expiration(
            user_repo.clone(),
            session_repo,
            rate_limiter.clone(),
            config.accounts.session_expiration_days,
        ));
        let account_service = Arc::new(AccountService::new(
            user_repo.clone(),
            profile_repo.clone(),
            program_repo.clone(),
            events.clone(),
        ));
        let program_service = Arc::new(ProgramService::new(
            program_repo.clone(),
            course_repo.clone(),
            cache.clone(),
            events.clone(),
        ));
        let course_service = Arc::new(CourseService::new(
            course_repo.clone(),
            program_repo,
            material_repo.clone(),
            allocation_repo.clone(),
            calendar_repo.clone(),
            cache,
            events.clone(),
        ));
        let allocation_service = Arc::new(AllocationService::new(
            allocation_repo.clone(),
            user_repo,
            course_repo.clone(),
            calendar_repo.clone(),
        ));
        let material_service = Arc::new(MaterialService::new(
            material_repo.clone(),
            course_repo.clone(),
            storage,
            config.storage.clone(),
            events.clone(),
        ));
        let enrollment_service = Arc::new(EnrollmentService::new(
            enrollment_repo.clone(),
            course_repo,
            profile_repo.clone(),
            allocation_repo,
            calendar_repo.clone(),
            account_service.clone(),
            config.enrollment.clone(),
        ));
        let progress_service = Arc::new(ProgressService::new(
            enrollment_repo,
            material_repo,
            profile_repo,
        ));
        let calendar_service = Arc::new(CalendarService::new(calendar_repo));
        let activity_service = Arc::new(ActivityService::new(activity_repo));

        Self {
            pool,
            config: Arc::new(config.clone()),
            events,
            rate_limiter,
            user_service,
            account_service,
            program_service,
            course_service,
            allocation_service,
            material_service,
            enrollment_service,
            progress_service,
            calendar_service,
            activity_service,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new("PAYLOAD_TOO_LARGE", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMIT", message)
    }

    /// Internal failures are logged with their full chain; clients only get
    /// the top-level message
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("{:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Session token from the `Authorization: Bearer` header or the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Administrator authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Staff (administrator or lecturer) authorization middleware
pub async fn require_staff(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_staff() {
        return Err(ApiError::forbidden("Lecturer or admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Student authorization middleware
pub async fn require_student(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_student {
        return Err(ApiError::forbidden("Student account required"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};

    fn create_request_with_auth(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn create_request_with_cookie(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/test")
            .header(header::COOKIE, format!("theme=dark; session={}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let request = create_request_with_auth("test-token-123");
        assert_eq!(extract_session_token(request.headers()), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let request = create_request_with_cookie("test-token-456");
        assert_eq!(extract_session_token(request.headers()), Some("test-token-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer bearer-token")
            .header(header::COOKIE, "session=cookie-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_session_token(request.headers()), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_none() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert!(extract_session_token(request.headers()).is_none());

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Basic invalid")
            .body(Body::empty())
            .unwrap();
        assert!(extract_session_token(request.headers()).is_none());
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::rate_limited("x").status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::internal(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_hides_details() {
        let error = ApiError::internal(anyhow::anyhow!("connection refused"));
        assert_eq!(error.error.code, "INTERNAL_ERROR");
        assert!(!error.error.message.contains("connection"));
    }

    #[test]
    fn test_api_error_with_details() {
        let details = serde_json::json!({"field": "email"});
        let error = ApiError::with_details("VALIDATION_ERROR", "Invalid", details.clone());
        assert_eq!(error.error.details, Some(details));
    }
}
