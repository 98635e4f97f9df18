//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{NewUser, User, UserCredentials, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Columns selected for every user query
pub(crate) const USER_COLUMNS: &str = "id, username, email, first_name, last_name, password_hash, \
    is_student, is_lecturer, is_superuser, is_active, activation_key, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &NewUser) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get user by pending activation token
    async fn get_by_activation_key(&self, key: &str) -> Result<Option<User>>;

    /// Store provisioned credentials and deactivate the account until confirmation
    async fn set_credentials(&self, id: i64, credentials: &UserCredentials) -> Result<User>;

    /// Mark the account active and clear its activation token
    async fn activate(&self, id: i64) -> Result<()>;

    /// Delete a user
    async fn delete(&self, id: i64) -> Result<()>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// Count users holding the given role flag
    async fn count_by_role(&self, role: UserRole) -> Result<i64>;

    /// List users holding the given role flag, ordered by name
    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.as_sqlite().unwrap(), user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.as_mysql().unwrap(), user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_sqlite(self.pool.as_sqlite().unwrap(), "id", UserKey::Id(id)).await
            }
            DatabaseDriver::Mysql => {
                get_user_by_mysql(self.pool.as_mysql().unwrap(), "id", UserKey::Id(id)).await
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let key = UserKey::Text(username);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_sqlite(self.pool.as_sqlite().unwrap(), "username", key).await
            }
            DatabaseDriver::Mysql => {
                get_user_by_mysql(self.pool.as_mysql().unwrap(), "username", key).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let key = UserKey::Text(email);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_sqlite(self.pool.as_sqlite().unwrap(), "email", key).await
            }
            DatabaseDriver::Mysql => {
                get_user_by_mysql(self.pool.as_mysql().unwrap(), "email", key).await
            }
        }
    }

    async fn get_by_activation_key(&self, key: &str) -> Result<Option<User>> {
        let key = UserKey::Text(key);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_sqlite(self.pool.as_sqlite().unwrap(), "activation_key", key).await
            }
            DatabaseDriver::Mysql => {
                get_user_by_mysql(self.pool.as_mysql().unwrap(), "activation_key", key).await
            }
        }
    }

    async fn set_credentials(&self, id: i64, credentials: &UserCredentials) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_credentials_sqlite(self.pool.as_sqlite().unwrap(), id, credentials).await
            }
            DatabaseDriver::Mysql => {
                set_credentials_mysql(self.pool.as_mysql().unwrap(), id, credentials).await
            }
        }
    }

    async fn activate(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => activate_user_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => activate_user_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_user_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_user_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_users_sqlite(self.pool.as_sqlite().unwrap(), None).await,
            DatabaseDriver::Mysql => count_users_mysql(self.pool.as_mysql().unwrap(), None).await,
        }
    }

    async fn count_by_role(&self, role: UserRole) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_users_sqlite(self.pool.as_sqlite().unwrap(), Some(role)).await
            }
            DatabaseDriver::Mysql => {
                count_users_mysql(self.pool.as_mysql().unwrap(), Some(role)).await
            }
        }
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_users_by_role_sqlite(self.pool.as_sqlite().unwrap(), role).await
            }
            DatabaseDriver::Mysql => {
                list_users_by_role_mysql(self.pool.as_mysql().unwrap(), role).await
            }
        }
    }
}

/// Lookup value for single-user queries
#[derive(Clone, Copy)]
enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

/// Column holding the flag for a role
fn role_column(role: UserRole) -> &'static str {
    match role {
        UserRole::Student => "is_student",
        UserRole::Lecturer => "is_lecturer",
        UserRole::Admin => "is_superuser",
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &NewUser) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password_hash,
                           is_student, is_lecturer, is_superuser, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(user.role == UserRole::Student)
    .bind(user.role == UserRole::Lecturer)
    .bind(user.role == UserRole::Admin)
    .bind(user.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    let id = result.last_insert_rowid();

    get_user_by_sqlite(pool, "id", UserKey::Id(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after insert"))
}

async fn get_user_by_sqlite(
    pool: &SqlitePool,
    column: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", column))?;

    match row {
        Some(row) => Ok(Some(row_to_user_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn set_credentials_sqlite(
    pool: &SqlitePool,
    id: i64,
    credentials: &UserCredentials,
) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, password_hash = ?, activation_key = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&credentials.username)
    .bind(&credentials.password_hash)
    .bind(&credentials.activation_key)
    .bind(false)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to store user credentials")?;

    get_user_by_sqlite(pool, "id", UserKey::Id(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn activate_user_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET is_active = ?, activation_key = NULL, updated_at = ? WHERE id = ?")
        .bind(true)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to activate user")?;
    Ok(())
}

async fn delete_user_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete user")?;
    Ok(())
}

async fn count_users_sqlite(pool: &SqlitePool, role: Option<UserRole>) -> Result<i64> {
    let sql = match role {
        Some(role) => format!("SELECT COUNT(*) as count FROM users WHERE {} = ?", role_column(role)),
        None => "SELECT COUNT(*) as count FROM users".to_string(),
    };
    let mut query = sqlx::query(&sql);
    if role.is_some() {
        query = query.bind(true);
    }
    let row = query
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(row.get("count"))
}

async fn list_users_by_role_sqlite(pool: &SqlitePool, role: UserRole) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE {} = ? ORDER BY first_name, last_name, username",
        USER_COLUMNS,
        role_column(role)
    );
    let rows = sqlx::query(&sql)
        .bind(true)
        .fetch_all(pool)
        .await
        .context("Failed to list users by role")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

pub(crate) fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        is_student: row.get("is_student"),
        is_lecturer: row.get("is_lecturer"),
        is_superuser: row.get("is_superuser"),
        is_active: row.get("is_active"),
        activation_key: row.get("activation_key"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &NewUser) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password_hash,
                           is_student, is_lecturer, is_superuser, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(user.role == UserRole::Student)
    .bind(user.role == UserRole::Lecturer)
    .bind(user.role == UserRole::Admin)
    .bind(user.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    let id = result.last_insert_id() as i64;

    get_user_by_mysql(pool, "id", UserKey::Id(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after insert"))
}

async fn get_user_by_mysql(
    pool: &MySqlPool,
    column: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", column))?;

    match row {
        Some(row) => Ok(Some(row_to_user_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn set_credentials_mysql(
    pool: &MySqlPool,
    id: i64,
    credentials: &UserCredentials,
) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, password_hash = ?, activation_key = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&credentials.username)
    .bind(&credentials.password_hash)
    .bind(&credentials.activation_key)
    .bind(false)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to store user credentials")?;

    get_user_by_mysql(pool, "id", UserKey::Id(id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn activate_user_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET is_active = ?, activation_key = NULL, updated_at = ? WHERE id = ?")
        .bind(true)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to activate user")?;
    Ok(())
}

async fn delete_user_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete user")?;
    Ok(())
}

async fn count_users_mysql(pool: &MySqlPool, role: Option<UserRole>) -> Result<i64> {
    let sql = match role {
        Some(role) => format!("SELECT COUNT(*) as count FROM users WHERE {} = ?", role_column(role)),
        None => "SELECT COUNT(*) as count FROM users".to_string(),
    };
    let mut query = sqlx::query(&sql);
    if role.is_some() {
        query = query.bind(true);
    }
    let row = query
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(row.get("count"))
}

async fn list_users_by_role_mysql(pool: &MySqlPool, role: UserRole) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE {} = ? ORDER BY first_name, last_name, username",
        USER_COLUMNS,
        role_column(role)
    );
    let rows = sqlx::query(&sql)
        .bind(true)
        .fetch_all(pool)
        .await
        .context("Failed to list users by role")?;

    rows.iter().map(row_to_user_mysql).collect()
}

pub(crate) fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        is_student: row.get("is_student"),
        is_lecturer: row.get("is_lecturer"),
        is_superuser: row.get("is_superuser"),
        is_active: row.get("is_active"),
        activation_key: row.get("activation_key"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> Arc<dyn UserRepository> {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxUserRepository::boxed(pool)
    }

    fn new_user(username: &str, role: UserRole) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password_hash: "hash".to_string(),
            role,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup().await;
        let user = repo.create(&new_user("alice", UserRole::Student)).await.unwrap();

        assert!(user.id > 0);
        assert!(user.is_student);
        assert!(!user.is_lecturer);
        assert!(user.is_active);

        let by_name = repo.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        let by_email = repo.get_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = setup().await;
        repo.create(&new_user("bob", UserRole::Lecturer)).await.unwrap();
        let mut dup = new_user("bob2", UserRole::Lecturer);
        dup.email = "bob@example.com".to_string();
        assert!(repo.create(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_credentials_and_activation() {
        let repo = setup().await;
        let user = repo.create(&new_user("carol", UserRole::Student)).await.unwrap();

        let credentials = UserCredentials {
            username: "STU-2026-1".to_string(),
            password_hash: "newhash".to_string(),
            activation_key: "token123".to_string(),
        };
        let updated = repo.set_credentials(user.id, &credentials).await.unwrap();
        assert_eq!(updated.username, "STU-2026-1");
        assert!(!updated.is_active);
        assert_eq!(updated.activation_key.as_deref(), Some("token123"));

        let found = repo.get_by_activation_key("token123").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        repo.activate(user.id).await.unwrap();
        let active = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(active.is_active);
        assert!(active.activation_key.is_none());
        assert!(repo.get_by_activation_key("token123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_and_list_by_role() {
        let repo = setup().await;
        repo.create(&new_user("s1", UserRole::Student)).await.unwrap();
        repo.create(&new_user("s2", UserRole::Student)).await.unwrap();
        repo.create(&new_user("l1", UserRole::Lecturer)).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.count_by_role(UserRole::Student).await.unwrap(), 2);
        assert_eq!(repo.count_by_role(UserRole::Lecturer).await.unwrap(), 1);
        assert_eq!(repo.count_by_role(UserRole::Admin).await.unwrap(), 0);

        let lecturers = repo.list_by_role(UserRole::Lecturer).await.unwrap();
        assert_eq!(lecturers.len(), 1);
        assert_eq!(lecturers[0].username, "l1");
    }
}
