//! User service
//!
//! Authentication and session management:
//! - First registration on an empty system creates the administrator;
//!   public registration is closed afterwards
//! - Login by username or email with per-name rate limiting
//! - Session tokens with configurable expiration
//! - Email confirmation by activation token

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{NewUser, Session, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    /// Account exists but has not been confirmed
    #[error("Account is not active. Please confirm your email address.")]
    AccountInactive,

    #[error("Too many failed login attempts. Please try again later.")]
    RateLimited,

    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for authentication and sessions
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    rate_limiter: Arc<LoginRateLimiter>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        rate_limiter: Arc<LoginRateLimiter>,
    ) -> Self {
        Self::with_session_expiration(
            user_repo,
            session_repo,
            rate_limiter,
            DEFAULT_SESSION_EXPIRATION_DAYS,
        )
    }

    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        rate_limiter: Arc<LoginRateLimiter>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            rate_limiter,
            session_expiration_days,
        }
    }

    /// Register the first administrator.
    ///
    /// Only allowed while the system has no users at all.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        self.validate_register_input(&input)?;

        if !self.is_first_user().await? {
            return Err(UserServiceError::RegistrationClosed);
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&NewUser {
                username: input.username.trim().to_string(),
                email: input.email.trim().to_lowercase(),
                first_name: input.first_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
                password_hash,
                role: UserRole::Admin,
                is_active: true,
            })
            .await
            .context("Failed to create user")?;

        tracing::info!("Administrator '{}' registered", user.username);
        Ok(user)
    }

    /// Login with username or email.
    ///
    /// Five failures for the same name within fifteen minutes lock further
    /// attempts. Unconfirmed accounts cannot log in.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let login = input.username_or_email.trim();
        if self.rate_limiter.is_limited(login).await {
            tracing::warn!("Login rate limit hit for '{}'", login);
            return Err(UserServiceError::RateLimited);
        }

        let user = match self.find_user_by_username_or_email(login).await? {
            Some(user) => user,
            None => {
                self.rate_limiter.record_failure(login).await;
                return Err(UserServiceError::AuthenticationError(
                    "Invalid username or password".to_string(),
                ));
            }
        };

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            self.rate_limiter.record_failure(login).await;
            return Err(UserServiceError::AuthenticationError(
                "Invalid username or password".to_string(),
            ));
        }

        if !user.is_active {
            return Err(UserServiceError::AccountInactive);
        }

        self.rate_limiter.clear(login).await;
        let session = self.create_session(user.id).await?;
        tracing::debug!("User '{}' logged in", user.username);
        Ok(session)
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Returns `None` for unknown or expired tokens and for accounts that
    /// are no longer active.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| u.is_active))
    }

    /// Activate the account holding `token`. The token is single-use.
    pub async fn confirm_email(&self, token: &str) -> Result<User, UserServiceError> {
        let user = self
            .user_repo
            .get_by_activation_key(token)
            .await
            .context("Failed to look up activation key")?
            .ok_or_else(|| {
                UserServiceError::NotFound("Invalid or expired activation link".to_string())
            })?;

        self.user_repo
            .activate(user.id)
            .await
            .context("Failed to activate user")?;
        tracing::info!("Account '{}' confirmed", user.username);

        self.user_repo
            .get_by_id(user.id)
            .await
            .context("Failed to reload user")?
            .ok_or_else(|| UserServiceError::NotFound(format!("User {} not found", user.id)))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// `true` if no users exist yet
    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Delete expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    pub fn rate_limiter(&self) -> &Arc<LoginRateLimiter> {
        &self.rate_limiter
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    fn validate_register_input(&self, input: &RegisterInput) -> Result<(), UserServiceError> {
        if input.username.trim().is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username cannot be empty".to_string(),
            ));
        }
        if input.email.trim().is_empty() || !input.email.contains('@') {
            return Err(UserServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }
        if input.password.len() < 8 {
            return Err(UserServiceError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        Ok(())
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username_or_email)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        Ok(self
            .user_repo
            .get_by_email(&username_or_email.to_lowercase())
            .await
            .context("Failed to get user by email")?)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };

        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }
}

/// Input for administrator registration
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}
