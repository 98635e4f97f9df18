//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - First administrator registration
//! - POST /api/v1/auth/login - User login
//! - POST /api/v1/auth/logout - User logout
//! - GET /api/v1/auth/me - Current user
//! - GET /api/v1/auth/has-admin - Whether setup already happened
//! - POST /api/v1/auth/confirm-email/{token} - Account activation

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{MessageResponse, UserResponse};
use crate::models::Session;
use crate::services::user::{LoginInput, RegisterInput, UserServiceError};

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Response for has-admin check
#[derive(Debug, Serialize)]
pub struct HasAdminResponse {
    pub has_admin: bool,
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(_) => {
                ApiError::unauthorized("Invalid username or password")
            }
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::AccountInactive => ApiError::forbidden(err.to_string()),
            UserServiceError::RateLimited => ApiError::rate_limited(err.to_string()),
            UserServiceError::RegistrationClosed => {
                ApiError::forbidden("An administrator already exists; registration is closed")
            }
            UserServiceError::NotFound(msg) => ApiError::not_found(msg),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/has-admin", get(has_admin))
        .route("/confirm-email/{token}", post(confirm_email))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

/// GET /api/v1/auth/has-admin
async fn has_admin(State(state): State<AppState>) -> Result<Json<HasAdminResponse>, ApiError> {
    let is_first = state.user_service.is_first_user().await?;
    Ok(Json(HasAdminResponse { has_admin: !is_first }))
}

/// POST /api/v1/auth/register - Create the administrator on an empty system
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let password = body.password.clone();
    let user = state.user_service.register(body).await?;

    let session = state
        .user_service
        .login(LoginInput::new(&user.username, password))
        .await?;

    Ok((
        StatusCode::CREATED,
        session_cookie(&state, &session)?,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .user_service
        .login(LoginInput::new(body.username_or_email, body.password))
        .await?;

    let user = state
        .user_service
        .validate_session(&session.id)
        .await?
        .ok_or_else(|| ApiError::internal("Session validation failed right after login"))?;

    Ok((
        session_cookie(&state, &session)?,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((response_headers, StatusCode::NO_CONTENT))
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// POST /api/v1/auth/confirm-email/{token}
async fn confirm_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state
        .user_service
        .confirm_email(&token)
        .await
        .map_err(|e| match e {
            UserServiceError::NotFound(_) => {
                ApiError::not_found("The confirmation link is invalid or has already been used")
            }
            other => other.into(),
        })?;
    Ok(Json(MessageResponse::new(format!(
        "Your account {} is now active. You can log in.",
        user.username
    ))))
}

fn session_cookie(state: &AppState, session: &Session) -> Result<HeaderMap, ApiError> {
    let max_age = state.config.accounts.session_expiration_days * 24 * 60 * 60;
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id, max_age
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );
    Ok(headers)
}
