//! Database connection pools
//!
//! [`DatabasePool`] hides whether CourseHub runs on SQLite or MySQL.
//! Repositories ask for the concrete sqlx pool through `as_sqlite` /
//! `as_mysql` after matching on [`DatabasePool::driver`].
//!
//! SQLite connections are opened with foreign keys enforced on every
//! connection, since course deletion relies on `ON DELETE CASCADE`. File
//! databases use WAL so readers are not blocked by enrollment writes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// How long a SQLite writer waits for a lock before failing
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Run a statement that returns no rows (used by migrations)
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Round-trip to the server
    async fn ping(&self) -> Result<()>;

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;
}

pub type DynDatabasePool = Arc<dyn DatabasePool>;

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open `url`, which may be `:memory:`, a `sqlite:` URL or a plain path.
    /// Parent directories of file databases are created.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = sqlite_options(url)?;
        if let Some(parent) = sqlite_file_path(url).and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database {}", url))?;
        Ok(Self { pool })
    }
}

fn is_memory_url(url: &str) -> bool {
    matches!(url, ":memory:" | "sqlite::memory:" | "sqlite://:memory:")
}

/// Filesystem path of a file database, `None` for in-memory ones
fn sqlite_file_path(url: &str) -> Option<&Path> {
    if is_memory_url(url) {
        return None;
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    Some(Path::new(path))
}

fn sqlite_options(url: &str) -> Result<SqliteConnectOptions> {
    if is_memory_url(url) {
        // Shared-cache in-memory database, visible to every pooled connection
        return Ok(SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .busy_timeout(SQLITE_BUSY_TIMEOUT));
    }

    let options = if url.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid SQLite URL {}", url))?
    } else {
        SqliteConnectOptions::new().filename(url)
    };
    Ok(options
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(SQLITE_BUSY_TIMEOUT))
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("SQLite ping failed")?;
        Ok(())
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        Some(&self.pool)
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        None
    }
}

pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    /// Connect to `url`; a missing `mysql://` scheme is added
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await
            .context("Failed to connect to MySQL")?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for MysqlDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("MySQL ping failed")?;
        Ok(())
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Mysql
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        None
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        Some(&self.pool)
    }
}

/// Open the pool selected by `config.driver`
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool: DynDatabasePool = match config.driver {
        DatabaseDriver::Sqlite => {
            Arc::new(SqliteDatabase::connect(&config.url, config.max_connections).await?)
        }
        DatabaseDriver::Mysql => {
            Arc::new(MysqlDatabase::connect(&config.url, config.max_connections).await?)
        }
    };
    Ok(pool)
}

/// Fresh in-memory SQLite database, without migrations
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    create_pool(&DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
        max_connections: 4,
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(sqlite_file_path(":memory:"), None);
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(
            sqlite_file_path("data/coursehub.db"),
            Some(Path::new("data/coursehub.db"))
        );
        assert_eq!(
            sqlite_file_path("sqlite:data/coursehub.db?mode=rwc"),
            Some(Path::new("data/coursehub.db"))
        );
        assert_eq!(
            sqlite_file_path("sqlite:///var/lib/coursehub.db"),
            Some(Path::new("/var/lib/coursehub.db"))
        );
    }

    #[tokio::test]
    async fn test_memory_pool_is_shared_across_connections() {
        let pool = create_test_pool().await.unwrap();
        assert_eq!(pool.driver(), DatabaseDriver::Sqlite);
        assert!(pool.as_mysql().is_none());

        pool.execute("CREATE TABLE shared_check (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();
        // Hold one connection so the next query needs another
        let sqlite = pool.as_sqlite().unwrap();
        let _held = sqlite.acquire().await.unwrap();
        let mut other = sqlite.acquire().await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shared_check")
            .fetch_one(&mut *other)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced_on_every_connection() {
        let pool = create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE parent (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();
        pool.execute(
            "CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER NOT NULL REFERENCES parent(id))",
        )
        .await
        .unwrap();

        let sqlite = pool.as_sqlite().unwrap();
        let _held = sqlite.acquire().await.unwrap();
        let mut other = sqlite.acquire().await.unwrap();
        let result = sqlx::query("INSERT INTO child (parent_id) VALUES (42)")
            .execute(&mut *other)
            .await;
        assert!(result.is_err(), "dangling foreign key must be rejected");
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("coursehub.db");

        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: db_path.to_string_lossy().to_string(),
            max_connections: 2,
        })
        .await
        .unwrap();
        pool.ping().await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    #[ignore = "Requires MySQL server (MYSQL_TEST_URL)"]
    async fn test_mysql_pool() {
        let url = std::env::var("MYSQL_TEST_URL")
            .unwrap_or_else(|_| "mysql://root@localhost/coursehub_test".to_string());
        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Mysql,
            url,
            max_connections: 2,
        })
        .await
        .unwrap();
        assert!(pool.as_mysql().is_some());
        pool.ping().await.unwrap();
    }
}
