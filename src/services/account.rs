//! Account provisioning
//!
//! Student and lecturer accounts are never created with credentials chosen
//! by a person. The row is inserted locked (unusable password, inactive) and
//! a `UserCreated` event is published; [`AccountProvisioner`] reacts by
//! generating the role-specific username and a random password, storing
//! them with a fresh activation key, and queueing the confirmation email.
//!
//! [`AccountService`] is the write side used by administrators, lecturers
//! (adding students to a course) and the enrollment workflow.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::AccountsConfig;
use crate::db::repositories::{ProfileRepository, ProgramRepository, UserRepository};
use crate::events::{DomainEvent, EventBus, EventListener};
use crate::models::{DepartmentHead, NewUser, Student, User, UserCredentials, UserRole};
use crate::services::email::{
    EmailOutbox, OutgoingEmail, LECTURER_ACCOUNT_TEMPLATE, STUDENT_ACCOUNT_TEMPLATE,
};
use crate::services::password::{
    generate_activation_token, generate_password, hash_password, unusable_password_hash,
};

/// Placeholder username of a locked user awaiting provisioning
const PENDING_USERNAME_PREFIX: &str = "pending-";

/// Error types for account operations
#[derive(Debug, thiserror::Error)]
pub enum AccountServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Attempts at claiming a username before provisioning gives up
const USERNAME_ATTEMPTS: usize = 5;

/// Issues credentials for newly created students and lecturers
pub struct AccountProvisioner {
    user_repo: Arc<dyn UserRepository>,
    outbox: EmailOutbox,
    settings: AccountsConfig,
    /// Held from picking a username until it is stored
    username_lock: Mutex<()>,
}

#[derive(Serialize)]
struct AccountEmailContext<'a> {
    full_name: String,
    site_name: &'a str,
    username: &'a str,
    password: &'a str,
    activation_link: String,
}

impl AccountProvisioner {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        outbox: EmailOutbox,
        settings: AccountsConfig,
    ) -> Self {
        Self {
            user_repo,
            outbox,
            settings,
            username_lock: Mutex::new(()),
        }
    }

    /// Assign credentials to a freshly created user.
    ///
    /// Returns `None` for users that are not provisioned (administrators and
    /// plain accounts).
    pub async fn provision(&self, user: &User) -> anyhow::Result<Option<User>> {
        let role = match user.provisioned_role() {
            Some(role) => role,
            None => return Ok(None),
        };

        let password = generate_password();
        let password_hash = hash_password(&password)?;
        let (updated, credentials) = self.claim_username(user, role, password_hash).await?;

        tracing::info!("Provisioned {} account {}", role, updated.username);
        self.send_confirmation(&updated, role, &password, &credentials.activation_key)
            .await?;

        Ok(Some(updated))
    }

    /// Pick the next free username and store it with the new credentials.
    ///
    /// Picking and storing happen under `username_lock`. A unique violation
    /// (another process took the name) moves on to the next number.
    async fn claim_username(
        &self,
        user: &User,
        role: UserRole,
        password_hash: String,
    ) -> anyhow::Result<(User, UserCredentials)> {
        let _guard = self.username_lock.lock().await;
        let mut skip = 0;

        for _ in 0..USERNAME_ATTEMPTS {
            let credentials = UserCredentials {
                username: self.next_username(role, skip).await?,
                password_hash: password_hash.clone(),
                activation_key: generate_activation_token(),
            };
            match self.user_repo.set_credentials(user.id, &credentials).await {
                Ok(updated) => return Ok((updated, credentials)),
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!("Username {} was taken, retrying", credentials.username);
                    skip += 1;
                }
                Err(e) => return Err(e.context("Failed to store generated credentials")),
            }
        }

        anyhow::bail!(
            "Could not claim a {} username for user {} after {} attempts",
            role,
            user.id,
            USERNAME_ATTEMPTS
        )
    }

    /// `{PREFIX}-{YYYY}-{n}` where `n` counts users of the role plus `skip`,
    /// bumped until free
    async fn next_username(&self, role: UserRole, skip: i64) -> anyhow::Result<String> {
        let prefix = match role {
            UserRole::Student => &self.settings.student_id_prefix,
            UserRole::Lecturer => &self.settings.lecturer_id_prefix,
            UserRole::Admin => anyhow::bail!("Administrators are not provisioned"),
        };
        let year = Utc::now().format("%Y");
        let mut n = self.user_repo.count_by_role(role).await? + skip;

        loop {
            let candidate = format!("{}-{}-{}", prefix, year, n);
            if self.user_repo.get_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn send_confirmation(
        &self,
        user: &User,
        role: UserRole,
        password: &str,
        activation_key: &str,
    ) -> anyhow::Result<()> {
        let template = match role {
            UserRole::Student => STUDENT_ACCOUNT_TEMPLATE,
            _ => LECTURER_ACCOUNT_TEMPLATE,
        };
        let context = AccountEmailContext {
            full_name: user.full_name(),
            site_name: &self.settings.site_name,
            username: &user.username,
            password,
            activation_link: activation_link(&self.settings.site_url, activation_key),
        };
        let email = OutgoingEmail::new(
            user.email.clone(),
            format!(
                "Your {} account confirmation and credentials",
                self.settings.site_name
            ),
            template,
            &context,
        )?;
        self.outbox.enqueue(email).await;
        Ok(())
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

pub fn activation_link(site_url: &str, token: &str) -> String {
    format!(
        "{}/accounts/confirm-email/{}/",
        site_url.trim_end_matches('/'),
        token
    )
}

#[async_trait]
impl EventListener for AccountProvisioner {
    fn name(&self) -> &'static str {
        "account_provisioner"
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        if let DomainEvent::UserCreated { user } = event {
            self.provision(user).await?;
        }
        Ok(())
    }
}

/// Input for adding a lecturer
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLecturerInput {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Input for adding a student
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStudentInput {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub program_id: Option<i64>,
    pub level: Option<String>,
}

/// A student user with its profile
#[derive(Debug, Clone, Serialize)]
pub struct StudentAccount {
    pub user: User,
    pub student: Student,
}

/// Creates accounts and profiles
pub struct AccountService {
    user_repo: Arc<dyn UserRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    program_repo: Arc<dyn ProgramRepository>,
    events: Arc<EventBus>,
}

impl AccountService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
        program_repo: Arc<dyn ProgramRepository>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            user_repo,
            profile_repo,
            program_repo,
            events,
        }
    }

    pub async fn create_lecturer(
        &self,
        input: CreateLecturerInput,
    ) -> Result<User, AccountServiceError> {
        let email = normalize_email(&input.email)?;
        self.ensure_email_free(&email).await?;
        self.create_locked_user(&email, &input.first_name, &input.last_name, UserRole::Lecturer)
            .await
    }

    pub async fn create_student(
        &self,
        input: CreateStudentInput,
    ) -> Result<StudentAccount, AccountServiceError> {
        let email = normalize_email(&input.email)?;
        self.ensure_email_free(&email).await?;
        if let Some(program_id) = input.program_id {
            self.ensure_program(program_id).await?;
        }

        let user = self
            .create_locked_user(&email, &input.first_name, &input.last_name, UserRole::Student)
            .await?;
        let (student, _) = self
            .profile_repo
            .get_or_create_student(user.id, input.program_id, input.level.as_deref())
            .await
            .context("Failed to create student profile")?;

        Ok(StudentAccount { user, student })
    }

    /// Look up a student account by email, creating it when missing.
    ///
    /// Returns the user, its profile and whether the account was created.
    pub async fn find_or_create_student(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(User, Student, bool), AccountServiceError> {
        let email = normalize_email(email)?;
        let (user, created) = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
        {
            Some(user) => (user, false),
            None => (
                self.create_locked_user(&email, first_name, last_name, UserRole::Student)
                    .await?,
                true,
            ),
        };

        let (student, _) = self
            .profile_repo
            .get_or_create_student(user.id, None, None)
            .await
            .context("Failed to get student profile")?;

        Ok((user, student, created))
    }

    /// Make a user the head of a program, replacing any previous head
    pub async fn assign_department_head(
        &self,
        user_id: i64,
        program_id: i64,
    ) -> Result<DepartmentHead, AccountServiceError> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| AccountServiceError::NotFound(format!("User {} not found", user_id)))?;
        if !user.is_lecturer {
            return Err(AccountServiceError::ValidationError(
                "Only lecturers can head a department".to_string(),
            ));
        }
        self.ensure_program(program_id).await?;

        let head = self
            .profile_repo
            .assign_department_head(user_id, program_id)
            .await
            .context("Failed to assign department head")?;
        Ok(head)
    }

    pub async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>, AccountServiceError> {
        Ok(self
            .user_repo
            .list_by_role(role)
            .await
            .context("Failed to list users")?)
    }

    /// Insert a locked user and let provisioning assign credentials
    async fn create_locked_user(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        role: UserRole,
    ) -> Result<User, AccountServiceError> {
        let new_user = NewUser {
            username: format!("{}{}", PENDING_USERNAME_PREFIX, Uuid::new_v4().simple()),
            email: email.to_string(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            password_hash: unusable_password_hash()?,
            role,
            is_active: false,
        };
        let user = self
            .user_repo
            .create(&new_user)
            .await
            .context("Failed to create user")?;

        self.events
            .publish(DomainEvent::UserCreated { user: user.clone() })
            .await;

        // Reload to pick up the provisioned username
        let user = self
            .user_repo
            .get_by_id(user.id)
            .await
            .context("Failed to reload user")?
            .ok_or_else(|| AccountServiceError::NotFound(format!("User {} not found", user.id)))?;
        ensure_provisioned(&user)?;
        Ok(user)
    }

    async fn ensure_email_free(&self, email: &str) -> Result<(), AccountServiceError> {
        if self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AccountServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }
        Ok(())
    }

    async fn ensure_program(&self, program_id: i64) -> Result<(), AccountServiceError> {
        if self
            .program_repo
            .get_by_id(program_id)
            .await
            .context("Failed to get program")?
            .is_none()
        {
            return Err(AccountServiceError::NotFound(format!(
                "Program {} not found",
                program_id
            )));
        }
        Ok(())
    }
}

/// Provisioning runs as an event listener whose errors are only logged, so
/// callers check the outcome on the reloaded row
fn ensure_provisioned(user: &User) -> Result<(), AccountServiceError> {
    if user.activation_key.is_none() || user.username.starts_with(PENDING_USERNAME_PREFIX) {
        return Err(AccountServiceError::InternalError(anyhow::anyhow!(
            "Account {} was not provisioned",
            user.id
        )));
    }
    Ok(())
}

/// Trim and lowercase an address; reject anything without `local@domain`
pub fn normalize_email(email: &str) -> Result<String, AccountServiceError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(AccountServiceError::ValidationError(format!(
            "Invalid email address: {}",
            email
        ))),
    }
}
