//! Quiz repository (quizzes, questions and their association)

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Question, Quiz, QuizInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn create(&self, course_id: i64, input: &QuizInput) -> Result<Quiz>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Quiz>>;

    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Quiz>>;

    async fn create_question(&self, content: &str) -> Result<Question>;

    /// Link a question to a quiz; linking twice is a no-op
    async fn attach_question(&self, quiz_id: i64, question_id: i64) -> Result<()>;

    async fn questions(&self, quiz_id: i64) -> Result<Vec<Question>>;
}

pub struct SqlxQuizRepository {
    pool: DynDatabasePool,
}

impl SqlxQuizRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn QuizRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl QuizRepository for SqlxQuizRepository {
    async fn create(&self, course_id: i64, input: &QuizInput) -> Result<Quiz> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_quiz_sqlite(self.pool.as_sqlite().unwrap(), course_id, input).await
            }
            DatabaseDriver::Mysql => create_quiz_mysql(self.pool.as_mysql().unwrap(), course_id, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Quiz>> {
        let quizzes = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                select_quizzes_sqlite(self.pool.as_sqlite().unwrap(), "id", id).await?
            }
            DatabaseDriver::Mysql => select_quizzes_mysql(self.pool.as_mysql().unwrap(), "id", id).await?,
        };
        Ok(quizzes.into_iter().next())
    }

    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Quiz>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                select_quizzes_sqlite(self.pool.as_sqlite().unwrap(), "course_id", course_id).await
            }
            DatabaseDriver::Mysql => {
                select_quizzes_mysql(self.pool.as_mysql().unwrap(), "course_id", course_id).await
            }
        }
    }

    async fn create_question(&self, content: &str) -> Result<Question> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_question_sqlite(self.pool.as_sqlite().unwrap(), content).await
            }
            DatabaseDriver::Mysql => create_question_mysql(self.pool.as_mysql().unwrap(), content).await,
        }
    }

    async fn attach_question(&self, quiz_id: i64, question_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT OR IGNORE INTO quiz_questions (quiz_id, question_id) VALUES (?, ?)",
            )
            .bind(quiz_id)
            .bind(question_id)
            .execute(self.pool.as_sqlite().unwrap())
            .await
            .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(
                "INSERT IGNORE INTO quiz_questions (quiz_id, question_id) VALUES (?, ?)",
            )
            .bind(quiz_id)
            .bind(question_id)
            .execute(self.pool.as_mysql().unwrap())
            .await
            .map(|_| ()),
        }
        .context("Failed to attach question to quiz")
    }

    async fn questions(&self, quiz_id: i64) -> Result<Vec<Question>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                quiz_questions_sqlite(self.pool.as_sqlite().unwrap(), quiz_id).await
            }
            DatabaseDriver::Mysql => quiz_questions_mysql(self.pool.as_mysql().unwrap(), quiz_id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_quiz_sqlite(pool: &SqlitePool, course_id: i64, input: &QuizInput) -> Result<Quiz> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO quizzes (course_id, title, description, pass_mark, single_attempt,
                             random_order, answers_at_end, exam_paper, draft, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(course_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.pass_mark)
    .bind(input.single_attempt)
    .bind(input.random_order)
    .bind(input.answers_at_end)
    .bind(input.exam_paper)
    .bind(input.draft)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create quiz")?;

    Ok(Quiz {
        id: result.last_insert_rowid(),
        course_id,
        title: input.title.clone(),
        description: input.description.clone(),
        pass_mark: input.pass_mark,
        single_attempt: input.single_attempt,
        random_order: input.random_order,
        answers_at_end: input.answers_at_end,
        exam_paper: input.exam_paper,
        draft: input.draft,
        created_at: now,
    })
}

async fn select_quizzes_sqlite(pool: &SqlitePool, column: &str, value: i64) -> Result<Vec<Quiz>> {
    let sql = format!(
        "SELECT id, course_id, title, description, pass_mark, single_attempt, random_order, \
         answers_at_end, exam_paper, draft, created_at FROM quizzes WHERE {} = ? ORDER BY id",
        column
    );
    let rows = sqlx::query(&sql)
        .bind(value)
        .fetch_all(pool)
        .await
        .context("Failed to list quizzes")?;

    Ok(rows
        .iter()
        .map(|row| Quiz {
            id: row.get("id"),
            course_id: row.get("course_id"),
            title: row.get("title"),
            description: row.get("description"),
            pass_mark: row.get("pass_mark"),
            single_attempt: row.get("single_attempt"),
            random_order: row.get("random_order"),
            answers_at_end: row.get("answers_at_end"),
            exam_paper: row.get("exam_paper"),
            draft: row.get("draft"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn create_question_sqlite(pool: &SqlitePool, content: &str) -> Result<Question> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO questions (content, created_at) VALUES (?, ?)")
        .bind(content)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create question")?;

    Ok(Question {
        id: result.last_insert_rowid(),
        content: content.to_string(),
        created_at: now,
    })
}

async fn quiz_questions_sqlite(pool: &SqlitePool, quiz_id: i64) -> Result<Vec<Question>> {
    let rows = sqlx::query(
        r#"
        SELECT q.id, q.content, q.created_at
        FROM questions q
        JOIN quiz_questions qq ON qq.question_id = q.id
        WHERE qq.quiz_id = ?
        ORDER BY q.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await
    .context("Failed to list quiz questions")?;

    Ok(rows
        .iter()
        .map(|row| Question {
            id: row.get("id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        })
        .collect())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_quiz_mysql(pool: &MySqlPool, course_id: i64, input: &QuizInput) -> Result<Quiz> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO quizzes (course_id, title, description, pass_mark, single_attempt,
                             random_order, answers_at_end, exam_paper, draft, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(course_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.pass_mark)
    .bind(input.single_attempt)
    .bind(input.random_order)
    .bind(input.answers_at_end)
    .bind(input.exam_paper)
    .bind(input.draft)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create quiz")?;

    Ok(Quiz {
        id: result.last_insert_id() as i64,
        course_id,
        title: input.title.clone(),
        description: input.description.clone(),
        pass_mark: input.pass_mark,
        single_attempt: input.single_attempt,
        random_order: input.random_order,
        answers_at_end: input.answers_at_end,
        exam_paper: input.exam_paper,
        draft: input.draft,
        created_at: now,
    })
}

async fn select_quizzes_mysql(pool: &MySqlPool, column: &str, value: i64) -> Result<Vec<Quiz>> {
    let sql = format!(
        "SELECT id, course_id, title, description, pass_mark, single_attempt, random_order, \
         answers_at_end, exam_paper, draft, created_at FROM quizzes WHERE {} = ? ORDER BY id",
        column
    );
    let rows = sqlx::query(&sql)
        .bind(value)
        .fetch_all(pool)
        .await
        .context("Failed to list quizzes")?;

    Ok(rows
        .iter()
        .map(|row| Quiz {
            id: row.get("id"),
            course_id: row.get("course_id"),
            title: row.get("title"),
            description: row.get("description"),
            pass_mark: row.get("pass_mark"),
            single_attempt: row.get("single_attempt"),
            random_order: row.get("random_order"),
            answers_at_end: row.get("answers_at_end"),
            exam_paper: row.get("exam_paper"),
            draft: row.get("draft"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn create_question_mysql(pool: &MySqlPool, content: &str) -> Result<Question> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO questions (content, created_at) VALUES (?, ?)")
        .bind(content)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create question")?;

    Ok(Question {
        id: result.last_insert_id() as i64,
        content: content.to_string(),
        created_at: now,
    })
}

async fn quiz_questions_mysql(pool: &MySqlPool, quiz_id: i64) -> Result<Vec<Question>> {
    let rows = sqlx::query(
        r#"
        SELECT q.id, q.content, q.created_at
        FROM questions q
        JOIN quiz_questions qq ON qq.question_id = q.id
        WHERE qq.quiz_id = ?
        ORDER BY q.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await
    .context("Failed to list quiz questions")?;

    Ok(rows
        .iter()
        .map(|row| Question {
            id: row.get("id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_quiz_with_questions() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();
        let now = Utc::now();
        sqlx::query("INSERT INTO programs (title, summary, created_at, updated_at) VALUES ('CS', '', ?, ?)")
            .bind(now).bind(now)
            .execute(sqlite).await.unwrap();
        sqlx::query("INSERT INTO courses (slug, title, code, credit, summary, program_id, level, year, semester, is_elective, created_at, updated_at) VALUES ('c', 'C', 'C1', 3, '', 1, 'Bachelor', 1, 'First', 0, ?, ?)")
            .bind(now).bind(now)
            .execute(sqlite).await.unwrap();

        let repo = SqlxQuizRepository::boxed(pool);
        let quiz = repo
            .create(
                1,
                &QuizInput {
                    title: "Midterm".to_string(),
                    description: String::new(),
                    pass_mark: Some(60),
                    single_attempt: true,
                    random_order: false,
                    answers_at_end: false,
                    exam_paper: true,
                    draft: false,
                },
            )
            .await
            .unwrap();
        let q1 = repo.create_question("What is a monad?").await.unwrap();
        let q2 = repo.create_question("Define a functor.").await.unwrap();
        repo.attach_question(quiz.id, q1.id).await.unwrap();
        repo.attach_question(quiz.id, q2.id).await.unwrap();
        repo.attach_question(quiz.id, q2.id).await.unwrap();

        assert_eq!(repo.questions(quiz.id).await.unwrap().len(), 2);
        let stored = repo.get_by_id(quiz.id).await.unwrap().unwrap();
        assert_eq!(stored.pass_mark, Some(60));
        assert!(stored.exam_paper);
        assert_eq!(repo.list_by_course(1).await.unwrap().len(), 1);
    }
}
