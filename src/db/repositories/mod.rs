//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one aggregate, for both SQLite and MySQL.

pub mod activity;
pub mod allocation;
pub mod calendar;
pub mod course;
pub mod enrollment;
pub mod material;
pub mod profile;
pub mod program;
pub mod quiz;
pub mod session;
pub mod user;

pub use activity::{ActivityLogRepository, SqlxActivityLogRepository};
pub use allocation::{AllocationRepository, SqlxAllocationRepository};
pub use calendar::{CalendarRepository, SqlxCalendarRepository};
pub use course::{CourseRepository, SqlxCourseRepository};
pub use enrollment::{EnrollmentRepository, SqlxEnrollmentRepository};
pub use material::{MaterialRepository, SqlxMaterialRepository};
pub use profile::{ProfileRepository, SqlxProfileRepository};
pub use program::{ProgramRepository, SqlxProgramRepository};
pub use quiz::{QuizRepository, SqlxQuizRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
