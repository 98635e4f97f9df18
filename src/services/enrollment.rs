//! Enrollment service
//!
//! Staff enroll students by email, one address or a pasted list at a time;
//! unknown addresses get a student account through the normal provisioning
//! path. Students register for and drop courses of the current semester
//! themselves. Every path checks for an existing enrollment before inserting.

use crate::config::EnrollmentConfig;
use crate::db::repositories::{
    AllocationRepository, CalendarRepository, CourseRepository, EnrollmentRepository,
    ProfileRepository,
};
use crate::models::{
    BulkEnrollResult, Course, EnrollOutcome, RegistrationOverview, SemesterName,
    SingleEnrollResult, Student, TakenCourse, User,
};
use crate::services::account::{AccountService, AccountServiceError};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static EMAIL_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\n\r ]+").expect("valid separator pattern"));

/// Error types for enrollment operations
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentServiceError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Only students can register for courses")]
    NotAStudent,

    #[error("No active semester found.")]
    NoActiveSemester,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<AccountServiceError> for EnrollmentServiceError {
    fn from(err: AccountServiceError) -> Self {
        match err {
            AccountServiceError::ValidationError(msg) => EnrollmentServiceError::ValidationError(msg),
            AccountServiceError::NotFound(msg) => EnrollmentServiceError::NotFound(msg),
            AccountServiceError::UserExists(msg) => EnrollmentServiceError::ValidationError(msg),
            AccountServiceError::InternalError(e) => EnrollmentServiceError::InternalError(e),
        }
    }
}

/// Split a pasted address list on commas, whitespace and newlines
pub fn parse_email_list(input: &str) -> Vec<String> {
    EMAIL_SEPARATORS
        .split(input)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct EnrollmentService {
    repo: Arc<dyn EnrollmentRepository>,
    course_repo: Arc<dyn CourseRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    allocation_repo: Arc<dyn AllocationRepository>,
    calendar_repo: Arc<dyn CalendarRepository>,
    accounts: Arc<AccountService>,
    config: EnrollmentConfig,
}

impl EnrollmentService {
    pub fn new(
        repo: Arc<dyn EnrollmentRepository>,
        course_repo: Arc<dyn CourseRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
        allocation_repo: Arc<dyn AllocationRepository>,
        calendar_repo: Arc<dyn CalendarRepository>,
        accounts: Arc<AccountService>,
        config: EnrollmentConfig,
    ) -> Self {
        Self {
            repo,
            course_repo,
            profile_repo,
            allocation_repo,
            calendar_repo,
            accounts,
            config,
        }
    }

    /// Enroll every address of a pasted list. Not atomic: addresses
    /// processed before a failure stay enrolled.
    pub async fn bulk_enroll(
        &self,
        course_id: i64,
        emails: &str,
    ) -> Result<BulkEnrollResult, EnrollmentServiceError> {
        let course = self.course(course_id).await?;
        let emails = parse_email_list(emails);
        if emails.len() > self.config.bulk_limit {
            return Err(EnrollmentServiceError::ValidationError(format!(
                "You can only add up to {} students at a time.",
                self.config.bulk_limit
            )));
        }

        let mut result = BulkEnrollResult::default();
        for email in emails {
            let (user, student, created) =
                match self.accounts.find_or_create_student(&email, "", "").await {
                    Ok(found) => found,
                    Err(AccountServiceError::ValidationError(_)) => {
                        result.invalid.push(email);
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

            if created {
                result.created.push(user.email.clone());
            }
            match self.enroll(&student, course.id).await? {
                EnrollOutcome::Added => result.added.push(user.email),
                EnrollOutcome::AlreadyEnrolled => result.already.push(user.email),
            }
        }

        tracing::info!(
            "Bulk enrollment into {}: {} added, {} already enrolled, {} accounts created, {} invalid",
            course,
            result.added.len(),
            result.already.len(),
            result.created.len(),
            result.invalid.len()
        );
        Ok(result)
    }

    pub async fn enroll_single(
        &self,
        course_id: i64,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<SingleEnrollResult, EnrollmentServiceError> {
        let course = self.course(course_id).await?;
        let (user, student, account_created) = self
            .accounts
            .find_or_create_student(email, first_name, last_name)
            .await?;
        let outcome = self.enroll(&student, course.id).await?;

        Ok(SingleEnrollResult {
            email: user.email,
            outcome,
            account_created,
        })
    }

    /// Register the student in the given courses, skipping ones already
    /// taken. Returns the newly registered courses.
    pub async fn register_courses(
        &self,
        user: &User,
        course_ids: &[i64],
    ) -> Result<Vec<Course>, EnrollmentServiceError> {
        let student = self.student_of(user).await?;

        let mut courses = Vec::with_capacity(course_ids.len());
        for id in course_ids {
            courses.push(self.course(*id).await?);
        }

        let mut registered = Vec::new();
        for course in courses {
            if self.enroll(&student, course.id).await? == EnrollOutcome::Added {
                registered.push(course);
            }
        }
        Ok(registered)
    }

    /// Remove the student's enrollment in each of the given courses
    pub async fn drop_courses(
        &self,
        user: &User,
        course_ids: &[i64],
    ) -> Result<u64, EnrollmentServiceError> {
        let student = self.student_of(user).await?;

        let mut dropped = 0;
        for id in course_ids {
            let course = self.course(*id).await?;
            dropped += self
                .repo
                .delete_taken(student.id, course.id)
                .await
                .context("Failed to drop course")?;
        }
        Ok(dropped)
    }

    /// Courses offered to the student this semester and what they already took
    pub async fn overview(&self, user: &User) -> Result<RegistrationOverview, EnrollmentServiceError> {
        let semester = self
            .calendar_repo
            .get_current_semester()
            .await
            .context("Failed to get current semester")?
            .ok_or(EnrollmentServiceError::NoActiveSemester)?;
        let student = self.student_of(user).await?;

        let taken = self
            .repo
            .taken_courses(student.id)
            .await
            .context("Failed to list taken courses")?;

        let (offered, all_count) = match student.program_id {
            Some(program_id) => {
                let level = student.level.as_deref();
                let offered = self
                    .course_repo
                    .list_offered(Some(program_id), level, semester.name.as_str())
                    .await
                    .context("Failed to list offered courses")?;
                let mut all_count = 0;
                for name in SemesterName::ALL {
                    all_count += self
                        .course_repo
                        .list_offered(Some(program_id), level, name.as_str())
                        .await
                        .context("Failed to list program courses")?
                        .len();
                }
                (offered, all_count)
            }
            None => (Vec::new(), 0),
        };

        let courses: Vec<Course> = offered
            .into_iter()
            .filter(|c| !taken.iter().any(|t| t.id == c.id))
            .collect();
        let registered_courses: Vec<Course> = taken
            .into_iter()
            .filter(|c| match &student.level {
                Some(level) => &c.level == level,
                None => true,
            })
            .collect();

        let credit_in = |name: SemesterName| -> i64 {
            courses
                .iter()
                .filter(|c| c.semester == name.as_str())
                .map(|c| i64::from(c.credit))
                .sum()
        };
        let total_first_semester_credit = credit_in(SemesterName::First);
        let total_sec_semester_credit = credit_in(SemesterName::Second);
        let total_registered_credit = registered_courses.iter().map(|c| i64::from(c.credit)).sum();

        Ok(RegistrationOverview {
            current_semester: semester.name.as_str().to_string(),
            no_course_is_registered: registered_courses.is_empty(),
            all_courses_are_registered: registered_courses.len() == all_count,
            courses,
            registered_courses,
            total_first_semester_credit,
            total_sec_semester_credit,
            total_registered_credit,
        })
    }

    /// Lecturers see their allocated courses, students the ones they take
    pub async fn my_courses(&self, user: &User) -> Result<Vec<Course>, EnrollmentServiceError> {
        if user.is_lecturer {
            return Ok(self
                .allocation_repo
                .courses_of_lecturer(user.id)
                .await
                .context("Failed to list allocated courses")?);
        }
        if user.is_student {
            let student = self.student_of(user).await?;
            return Ok(self
                .repo
                .taken_courses(student.id)
                .await
                .context("Failed to list taken courses")?);
        }
        Ok(Vec::new())
    }

    /// The viewer's enrollment in a course, if they are a student taking it
    pub async fn taken_course(
        &self,
        user: &User,
        course_id: i64,
    ) -> Result<Option<TakenCourse>, EnrollmentServiceError> {
        if !user.is_student {
            return Ok(None);
        }
        let student = match self
            .profile_repo
            .get_student_by_user(user.id)
            .await
            .context("Failed to get student profile")?
        {
            Some(student) => student,
            None => return Ok(None),
        };
        Ok(self
            .repo
            .find_taken(student.id, course_id)
            .await
            .context("Failed to check enrollment")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn enroll(&self, student: &Student, course_id: i64) -> Result<EnrollOutcome, EnrollmentServiceError> {
        if self
            .repo
            .find_taken(student.id, course_id)
            .await
            .context("Failed to check enrollment")?
            .is_some()
        {
            return Ok(EnrollOutcome::AlreadyEnrolled);
        }
        self.repo
            .create_taken(student.id, course_id)
            .await
            .context("Failed to enroll student")?;
        Ok(EnrollOutcome::Added)
    }

    async fn course(&self, id: i64) -> Result<Course, EnrollmentServiceError> {
        self.course_repo
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .ok_or_else(|| EnrollmentServiceError::NotFound(format!("Course {}", id)))
    }

    async fn student_of(&self, user: &User) -> Result<Student, EnrollmentServiceError> {
        if !user.is_student {
            return Err(EnrollmentServiceError::NotAStudent);
        }
        self.profile_repo
            .get_student_by_user(user.id)
            .await
            .context("Failed to get student profile")?
            .ok_or_else(|| EnrollmentServiceError::NotFound("Student profile".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxAllocationRepository, SqlxCalendarRepository, SqlxCourseRepository,
        SqlxEnrollmentRepository, SqlxProfileRepository, SqlxProgramRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::events::EventBus;
    use crate::models::{CourseInput, ProgramInput};
    use crate::services::account::test_support::account_service;
    use crate::services::account::{CreateLecturerInput, CreateStudentInput};
    use crate::services::email::testing::{wait_for_emails, RecordingMailer};
    use proptest::prelude::*;

    struct Fixture {
        pool: DynDatabasePool,
        service: EnrollmentService,
        accounts: Arc<AccountService>,
        mailer: Arc<RecordingMailer>,
        program_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let program = SqlxProgramRepository::boxed(pool.clone())
            .create(&ProgramInput {
                title: "Mathematics".to_string(),
                summary: String::new(),
            })
            .await
            .unwrap();
        let (accounts, mailer) = account_service(&pool, Arc::new(EventBus::new()));
        let accounts = Arc::new(accounts);
        let service = EnrollmentService::new(
            SqlxEnrollmentRepository::boxed(pool.clone()),
            SqlxCourseRepository::boxed(pool.clone()),
            SqlxProfileRepository::boxed(pool.clone()),
            SqlxAllocationRepository::boxed(pool.clone()),
            SqlxCalendarRepository::boxed(pool.clone()),
            accounts.clone(),
            EnrollmentConfig::default(),
        );
        Fixture {
            pool,
            service,
            accounts,
            mailer,
            program_id: program.id,
        }
    }

    async fn course(fx: &Fixture, code: &str, semester: &str, credit: i32) -> Course {
        SqlxCourseRepository::boxed(fx.pool.clone())
            .create(
                &CourseInput {
                    title: format!("Course {}", code),
                    code: code.to_string(),
                    credit,
                    summary: String::new(),
                    program_id: fx.program_id,
                    level: "Bachelor".to_string(),
                    year: 1,
                    semester: semester.to_string(),
                    is_elective: false,
                },
                &code.to_lowercase(),
            )
            .await
            .unwrap()
    }

    async fn student(fx: &Fixture, email: &str) -> User {
        fx.accounts
            .create_student(CreateStudentInput {
                email: email.to_string(),
                first_name: "Sam".to_string(),
                last_name: "Stone".to_string(),
                program_id: Some(fx.program_id),
                level: Some("Bachelor".to_string()),
            })
            .await
            .unwrap()
            .user
    }

    async fn open_semester(fx: &Fixture, name: SemesterName) {
        let calendar = SqlxCalendarRepository::boxed(fx.pool.clone());
        let session = calendar.create_session("2026/2027").await.unwrap();
        calendar.set_current_session(session.id).await.unwrap();
        let semester = calendar.create_semester(name, Some(session.id)).await.unwrap();
        calendar.set_current_semester(semester.id).await.unwrap();
    }

    #[test]
    fn test_parse_email_list() {
        assert_eq!(
            parse_email_list(" a@x.io,b@x.io\r\n c@x.io ,, \n"),
            vec!["a@x.io", "b@x.io", "c@x.io"]
        );
        assert!(parse_email_list(" \n, ").is_empty());
    }

    proptest! {
        #[test]
        fn prop_parsed_entries_have_no_separators(input in "[a-z@., \n\r]{0,80}") {
            for entry in parse_email_list(&input) {
                prop_assert!(!entry.is_empty());
                prop_assert!(!entry.contains(|c| c == ',' || c == ' ' || c == '\n' || c == '\r'));
            }
        }

        #[test]
        fn prop_joined_addresses_are_recovered(
            addresses in prop::collection::vec("[a-z]{1,8}@[a-z]{1,8}\\.io", 0..20),
            sep in prop::sample::select(vec![",", " ", "\n", "\r\n", ", "]),
        ) {
            let joined = addresses.join(sep);
            prop_assert_eq!(parse_email_list(&joined), addresses);
        }
    }

    #[tokio::test]
    async fn test_bulk_enroll_buckets() {
        let fx = setup().await;
        let c = course(&fx, "MTH101", "First", 3).await;
        student(&fx, "old@example.com").await;
        wait_for_emails(&fx.mailer, 1).await;

        let result = fx
            .service
            .bulk_enroll(c.id, "old@example.com, NEW@example.com\nnot-an-address")
            .await
            .unwrap();
        assert_eq!(result.added, vec!["old@example.com", "new@example.com"]);
        assert_eq!(result.created, vec!["new@example.com"]);
        assert_eq!(result.invalid, vec!["not-an-address"]);
        assert!(result.already.is_empty());
        wait_for_emails(&fx.mailer, 2).await;

        let again = fx
            .service
            .bulk_enroll(c.id, "old@example.com new@example.com")
            .await
            .unwrap();
        assert_eq!(again.already.len(), 2);
        assert!(again.added.is_empty());
        assert!(again.created.is_empty());
        assert!(again.summary().starts_with("Already enrolled: "));
    }

    #[tokio::test]
    async fn test_bulk_enroll_limit() {
        let fx = setup().await;
        let c = course(&fx, "MTH101", "First", 3).await;
        let emails: Vec<String> = (0..51).map(|i| format!("s{}@example.com", i)).collect();

        let err = fx.service.bulk_enroll(c.id, &emails.join(",")).await.unwrap_err();
        assert_eq!(err.to_string(), "You can only add up to 50 students at a time.");
        assert!(matches!(
            fx.service.bulk_enroll(999, "a@example.com").await,
            Err(EnrollmentServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_enroll_single_twice() {
        let fx = setup().await;
        let c = course(&fx, "MTH101", "First", 3).await;

        let first = fx
            .service
            .enroll_single(c.id, "ann@example.com", "Ann", "Bell")
            .await
            .unwrap();
        assert_eq!(first.outcome, EnrollOutcome::Added);
        assert!(first.account_created);

        let second = fx
            .service
            .enroll_single(c.id, "ann@example.com", "Ann", "Bell")
            .await
            .unwrap();
        assert_eq!(second.outcome, EnrollOutcome::AlreadyEnrolled);
        assert!(!second.account_created);
    }

    #[tokio::test]
    async fn test_overview_requires_current_semester() {
        let fx = setup().await;
        let user = student(&fx, "sam@example.com").await;
        assert!(matches!(
            fx.service.overview(&user).await,
            Err(EnrollmentServiceError::NoActiveSemester)
        ));
    }

    #[tokio::test]
    async fn test_register_overview_and_drop() {
        let fx = setup().await;
        open_semester(&fx, SemesterName::First).await;
        let algebra = course(&fx, "MTH101", "First", 3).await;
        let calculus = course(&fx, "MTH102", "First", 4).await;
        let stats = course(&fx, "MTH201", "Second", 2).await;
        let user = student(&fx, "sam@example.com").await;

        let overview = fx.service.overview(&user).await.unwrap();
        assert_eq!(overview.current_semester, "First");
        assert_eq!(overview.courses.len(), 2);
        assert_eq!(overview.total_first_semester_credit, 7);
        assert_eq!(overview.total_sec_semester_credit, 0);
        assert!(overview.no_course_is_registered);
        assert!(!overview.all_courses_are_registered);

        let registered = fx
            .service
            .register_courses(&user, &[algebra.id, algebra.id, stats.id])
            .await
            .unwrap();
        assert_eq!(registered.len(), 2);

        let overview = fx.service.overview(&user).await.unwrap();
        assert_eq!(overview.courses.len(), 1);
        assert_eq!(overview.courses[0].id, calculus.id);
        assert_eq!(overview.total_registered_credit, 5);
        assert!(!overview.no_course_is_registered);

        fx.service.register_courses(&user, &[calculus.id]).await.unwrap();
        assert!(fx.service.overview(&user).await.unwrap().all_courses_are_registered);

        assert_eq!(fx.service.drop_courses(&user, &[stats.id]).await.unwrap(), 1);
        assert_eq!(fx.service.my_courses(&user).await.unwrap().len(), 2);
        assert!(matches!(
            fx.service.drop_courses(&user, &[999]).await,
            Err(EnrollmentServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_non_students_cannot_register() {
        let fx = setup().await;
        let c = course(&fx, "MTH101", "First", 3).await;
        let lecturer = fx
            .accounts
            .create_lecturer(CreateLecturerInput {
                email: "lee@example.com".to_string(),
                first_name: "Lee".to_string(),
                last_name: "Park".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(
            fx.service.register_courses(&lecturer, &[c.id]).await,
            Err(EnrollmentServiceError::NotAStudent)
        ));
        assert!(fx.service.my_courses(&lecturer).await.unwrap().is_empty());
    }
}
