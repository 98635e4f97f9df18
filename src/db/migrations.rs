//! Database migrations module
//!
//! Code-based migrations for CourseHub. All migrations are embedded directly
//! in Rust code as SQL strings, one variant for SQLite and one for MySQL.
//!
//! # Usage
//!
//! ```ignore
//! use coursehub::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    /// Migration version number
    pub version: i64,
    /// Migration name/description
    pub name: String,
    /// When the migration was applied
    pub applied_at: DateTime<Utc>,
}

/// All CourseHub migrations.
/// These are embedded in the binary for single-binary deployment.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                first_name VARCHAR(150) NOT NULL DEFAULT '',
                last_name VARCHAR(150) NOT NULL DEFAULT '',
                password_hash VARCHAR(255) NOT NULL,
                is_student BOOLEAN NOT NULL DEFAULT 0,
                is_lecturer BOOLEAN NOT NULL DEFAULT 0,
                is_superuser BOOLEAN NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                activation_key VARCHAR(64),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_activation_key ON users(activation_key);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                first_name VARCHAR(150) NOT NULL DEFAULT '',
                last_name VARCHAR(150) NOT NULL DEFAULT '',
                password_hash VARCHAR(255) NOT NULL,
                is_student BOOLEAN NOT NULL DEFAULT FALSE,
                is_lecturer BOOLEAN NOT NULL DEFAULT FALSE,
                is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                activation_key VARCHAR(64) NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_users_activation_key ON users(activation_key);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_academic_calendar",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS academic_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(50) NOT NULL UNIQUE,
                is_current BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS semesters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(20) NOT NULL,
                academic_session_id INTEGER,
                is_current BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (academic_session_id) REFERENCES academic_sessions(id) ON DELETE SET NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS academic_sessions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(50) NOT NULL UNIQUE,
                is_current BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS semesters (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(20) NOT NULL,
                academic_session_id BIGINT NULL,
                is_current BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (academic_session_id) REFERENCES academic_sessions(id) ON DELETE SET NULL
            );
        "#,
    },
    Migration {
        version: 4,
        name: "create_programs",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS programs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL UNIQUE,
                summary TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS programs (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL UNIQUE,
                summary TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 5,
        name: "create_profiles",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS students (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                program_id INTEGER,
                level VARCHAR(25),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (program_id) REFERENCES programs(id) ON DELETE SET NULL
            );
            CREATE TABLE IF NOT EXISTS department_heads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                program_id INTEGER,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (program_id) REFERENCES programs(id) ON DELETE SET NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS students (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL UNIQUE,
                program_id BIGINT NULL,
                level VARCHAR(25) NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (program_id) REFERENCES programs(id) ON DELETE SET NULL
            );
            CREATE TABLE IF NOT EXISTS department_heads (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL UNIQUE,
                program_id BIGINT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (program_id) REFERENCES programs(id) ON DELETE SET NULL
            );
        "#,
    },
    Migration {
        version: 6,
        name: "create_courses",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(255) NOT NULL UNIQUE,
                title VARCHAR(255) NOT NULL DEFAULT '',
                code VARCHAR(200) NOT NULL UNIQUE,
                credit INTEGER NOT NULL DEFAULT 0,
                summary TEXT NOT NULL DEFAULT '',
                program_id INTEGER NOT NULL,
                level VARCHAR(25) NOT NULL,
                year INTEGER NOT NULL DEFAULT 1,
                semester VARCHAR(20) NOT NULL,
                is_elective BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (program_id) REFERENCES programs(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_courses_program_id ON courses(program_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS courses (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(255) NOT NULL UNIQUE,
                title VARCHAR(255) NOT NULL DEFAULT '',
                code VARCHAR(200) NOT NULL UNIQUE,
                credit INT NOT NULL DEFAULT 0,
                summary TEXT NOT NULL,
                program_id BIGINT NOT NULL,
                level VARCHAR(25) NOT NULL,
                year INT NOT NULL DEFAULT 1,
                semester VARCHAR(20) NOT NULL,
                is_elective BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (program_id) REFERENCES programs(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_courses_program_id ON courses(program_id);
        "#,
    },
    Migration {
        version: 7,
        name: "create_course_allocations",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS course_allocations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lecturer_id INTEGER NOT NULL UNIQUE,
                academic_session_id INTEGER,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (lecturer_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (academic_session_id) REFERENCES academic_sessions(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS allocation_courses (
                allocation_id INTEGER NOT NULL,
                course_id INTEGER NOT NULL,
                PRIMARY KEY (allocation_id, course_id),
                FOREIGN KEY (allocation_id) REFERENCES course_allocations(id) ON DELETE CASCADE,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_allocation_courses_course_id ON allocation_courses(course_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS course_allocations (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                lecturer_id BIGINT NOT NULL UNIQUE,
                academic_session_id BIGINT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (lecturer_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (academic_session_id) REFERENCES academic_sessions(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS allocation_courses (
                allocation_id BIGINT NOT NULL,
                course_id BIGINT NOT NULL,
                PRIMARY KEY (allocation_id, course_id),
                FOREIGN KEY (allocation_id) REFERENCES course_allocations(id) ON DELETE CASCADE,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_allocation_courses_course_id ON allocation_courses(course_id);
        "#,
    },
    Migration {
        version: 8,
        name: "create_materials",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS uploads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                course_id INTEGER NOT NULL,
                module_number INTEGER NOT NULL DEFAULT 0,
                file_path VARCHAR(255) NOT NULL,
                is_available BOOLEAN NOT NULL DEFAULT 1,
                upload_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_uploads_course_id ON uploads(course_id);
            CREATE INDEX IF NOT EXISTS idx_uploads_file_path ON uploads(file_path);
            CREATE TABLE IF NOT EXISTS upload_videos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                slug VARCHAR(255) NOT NULL UNIQUE,
                course_id INTEGER NOT NULL,
                module_number INTEGER NOT NULL DEFAULT 0,
                video_path VARCHAR(255) NOT NULL,
                is_available BOOLEAN NOT NULL DEFAULT 1,
                summary TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_upload_videos_course_id ON upload_videos(course_id);
            CREATE INDEX IF NOT EXISTS idx_upload_videos_video_path ON upload_videos(video_path);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS uploads (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                course_id BIGINT NOT NULL,
                module_number INT NOT NULL DEFAULT 0,
                file_path VARCHAR(255) NOT NULL,
                is_available BOOLEAN NOT NULL DEFAULT TRUE,
                upload_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_uploads_course_id ON uploads(course_id);
            CREATE INDEX idx_uploads_file_path ON uploads(file_path);
            CREATE TABLE IF NOT EXISTS upload_videos (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL DEFAULT '',
                slug VARCHAR(255) NOT NULL UNIQUE,
                course_id BIGINT NOT NULL,
                module_number INT NOT NULL DEFAULT 0,
                video_path VARCHAR(255) NOT NULL,
                is_available BOOLEAN NOT NULL DEFAULT TRUE,
                summary TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_upload_videos_course_id ON upload_videos(course_id);
            CREATE INDEX idx_upload_videos_video_path ON upload_videos(video_path);
        "#,
    },
    Migration {
        version: 9,
        name: "create_quizzes",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS quizzes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id INTEGER NOT NULL,
                title VARCHAR(255) NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                pass_mark INTEGER,
                single_attempt BOOLEAN NOT NULL DEFAULT 0,
                random_order BOOLEAN NOT NULL DEFAULT 0,
                answers_at_end BOOLEAN NOT NULL DEFAULT 0,
                exam_paper BOOLEAN NOT NULL DEFAULT 0,
                draft BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_quizzes_course_id ON quizzes(course_id);
            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS quiz_questions (
                quiz_id INTEGER NOT NULL,
                question_id INTEGER NOT NULL,
                PRIMARY KEY (quiz_id, question_id),
                FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS quizzes (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                course_id BIGINT NOT NULL,
                title VARCHAR(255) NOT NULL,
                description TEXT NOT NULL,
                pass_mark INT NULL,
                single_attempt BOOLEAN NOT NULL DEFAULT FALSE,
                random_order BOOLEAN NOT NULL DEFAULT FALSE,
                answers_at_end BOOLEAN NOT NULL DEFAULT FALSE,
                exam_paper BOOLEAN NOT NULL DEFAULT FALSE,
                draft BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_quizzes_course_id ON quizzes(course_id);
            CREATE TABLE IF NOT EXISTS questions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                content TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS quiz_questions (
                quiz_id BIGINT NOT NULL,
                question_id BIGINT NOT NULL,
                PRIMARY KEY (quiz_id, question_id),
                FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 10,
        name: "create_enrollment",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS taken_courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id INTEGER NOT NULL,
                course_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_taken_courses_student_course ON taken_courses(student_id, course_id);
            CREATE TABLE IF NOT EXISTS student_material_progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                taken_course_id INTEGER NOT NULL,
                material_id INTEGER NOT NULL,
                material_type VARCHAR(10) NOT NULL,
                completed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (taken_course_id, material_id, material_type),
                FOREIGN KEY (taken_course_id) REFERENCES taken_courses(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS taken_courses (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                student_id BIGINT NOT NULL,
                course_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_taken_courses_student_course ON taken_courses(student_id, course_id);
            CREATE TABLE IF NOT EXISTS student_material_progress (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                taken_course_id BIGINT NOT NULL,
                material_id BIGINT NOT NULL,
                material_type VARCHAR(10) NOT NULL,
                completed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_progress_material (taken_course_id, material_id, material_type),
                FOREIGN KEY (taken_course_id) REFERENCES taken_courses(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 11,
        name: "create_activity_logs",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS activity_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS activity_logs (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                message TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
];

/// Run all pending migrations
///
/// This function:
/// 1. Creates the migrations tracking table if it doesn't exist
/// 2. Checks which migrations have already been applied
/// 3. Runs any pending migrations in order
///
/// # Arguments
///
/// * `pool` - Database connection pool
///
/// # Returns
///
/// Number of migrations applied
///
/// # Errors
///
/// Returns an error if any migration fails to apply
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    // Create migrations table
    create_migrations_table(pool).await?;

    // Get applied migrations
    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(pool.as_sqlite().unwrap()).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(pool.as_mysql().unwrap()).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows =
        sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }

    Ok(records)
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows =
        sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }

    Ok(records)
}

/// Apply a single migration
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => {
            apply_migration_sqlite(pool.as_sqlite().unwrap(), migration).await
        }
        DatabaseDriver::Mysql => {
            apply_migration_mysql(pool.as_mysql().unwrap(), migration).await
        }
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    // Execute migration SQL (may contain multiple statements)
    for statement in split_sql_statements(migration.up_sqlite) {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
    }

    // Record the migration
    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    // Execute migration SQL (may contain multiple statements)
    for statement in split_sql_statements(migration.up_mysql) {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
    }

    // Record the migration
    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        format!("{}...", &sql[..100])
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements, handling comments properly
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut current_start = 0;
    let mut in_statement = false;

    for (i, c) in sql.char_indices() {
        match c {
            ';' => {
                if in_statement {
                    let stmt = sql[current_start..i].trim();
                    if !stmt.is_empty() && !is_comment_only(stmt) {
                        statements.push(stmt);
                    }
                    in_statement = false;
                }
                current_start = i + 1;
            }
            _ if !c.is_whitespace() && !in_statement => {
                current_start = i;
                in_statement = true;
            }
            _ => {}
        }
    }

    // Handle last statement without trailing semicolon
    if in_statement {
        let stmt = sql[current_start..].trim();
        if !stmt.is_empty() && !is_comment_only(stmt) {
            statements.push(stmt);
        }
    }

    statements
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    for line in s.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with("--") {
            return false;
        }
    }
    true
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    // Try to create migrations table (in case it doesn't exist)
    let _ = create_migrations_table(pool).await;

    let applied = get_applied_migrations(pool).await?;
    Ok(applied.len() == MIGRATIONS.len())
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    // Try to create migrations table (in case it doesn't exist)
    let _ = create_migrations_table(pool).await;

    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

/// Get the total number of migrations defined
pub fn total_migrations() -> usize {
    MIGRATIONS.len()
}

/// Get migration by version
pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.unwrap();

        let count = run_migrations(&pool).await.unwrap();
        assert_eq!(count, MIGRATIONS.len());

        // Running again applies nothing
        let count = run_migrations(&pool).await.unwrap();
        assert_eq!(count, 0);
        assert!(is_up_to_date(&pool).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_course_tables_created() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let sqlite = pool.as_sqlite().unwrap();
        sqlx::query("INSERT INTO programs (title, summary) VALUES ('Computer Science', '')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO courses (slug, title, code, credit, program_id, level, year, semester) \
             VALUES ('intro', 'Intro', 'CS101', 3, 1, 'Bachelor', 1, 'First')",
        )
        .execute(sqlite)
        .await
        .unwrap();

        let dup = sqlx::query(
            "INSERT INTO courses (slug, title, code, credit, program_id, level, year, semester) \
             VALUES ('intro-2', 'Intro', 'CS101', 3, 1, 'Bachelor', 1, 'First')",
        )
        .execute(sqlite)
        .await;
        assert!(dup.is_err(), "course codes must be unique");
    }

    #[tokio::test]
    async fn test_progress_triple_unique() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();

        for sql in [
            "INSERT INTO users (username, email, password_hash, is_student) VALUES ('s1', 's1@x.io', 'h', 1)",
            "INSERT INTO programs (title, summary) VALUES ('P', '')",
            "INSERT INTO students (user_id, program_id) VALUES (1, 1)",
            "INSERT INTO courses (slug, title, code, program_id, level, semester) VALUES ('c', 'C', 'C1', 1, 'Bachelor', 'First')",
            "INSERT INTO taken_courses (student_id, course_id) VALUES (1, 1)",
            "INSERT INTO student_material_progress (taken_course_id, material_id, material_type) VALUES (1, 7, 'file')",
            "INSERT INTO student_material_progress (taken_course_id, material_id, material_type) VALUES (1, 7, 'video')",
        ] {
            sqlx::query(sql).execute(sqlite).await.unwrap();
        }

        let dup = sqlx::query(
            "INSERT INTO student_material_progress (taken_course_id, material_id, material_type) VALUES (1, 7, 'file')",
        )
        .execute(sqlite)
        .await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_course_delete_cascades() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();

        for sql in [
            "INSERT INTO programs (title, summary) VALUES ('P', '')",
            "INSERT INTO courses (slug, title, code, program_id, level, semester) VALUES ('c', 'C', 'C1', 1, 'Bachelor', 'First')",
            "INSERT INTO uploads (title, course_id, file_path) VALUES ('notes', 1, 'course_files/a.pdf')",
            "INSERT INTO quizzes (course_id, title) VALUES (1, 'Quiz 1')",
            "DELETE FROM courses WHERE id = 1",
        ] {
            sqlx::query(sql).execute(sqlite).await.unwrap();
        }

        let (uploads,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM uploads")
            .fetch_one(sqlite)
            .await
            .unwrap();
        let (quizzes,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM quizzes")
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(uploads, 0);
        assert_eq!(quizzes, 0);
    }

    #[test]
    fn test_migration_versions_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, (i + 1) as i32);
        }
        assert_eq!(total_migrations(), MIGRATIONS.len());
        assert_eq!(get_migration(4).unwrap().name, "create_programs");
        assert!(get_migration(999).is_none());
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT);\n-- comment only\n;CREATE TABLE b (id INT);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("TABLE a"));
        assert!(statements[1].contains("TABLE b"));
    }
}
