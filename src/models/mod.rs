//! Data models
//!
//! Plain data structures shared by the repositories, services and API:
//! - Database entities (User, Program, Course, Upload, TakenCourse, ...)
//! - Inputs accepted by the services
//! - Aggregated views returned to clients

mod activity;
mod allocation;
mod calendar;
mod course;
mod enrollment;
mod material;
mod pagination;
mod profile;
mod program;
mod quiz;
mod session;
mod user;

pub use activity::ActivityLog;
pub use allocation::{AllocationDetail, AllocationFilter, AllocationInput, CourseAllocation};
pub use calendar::{AcademicSession, Semester, SemesterName};
pub use course::{Course, CourseDetail, CourseInput, DuplicationCounts};
pub use enrollment::{
    BulkEnrollResult, EnrollOutcome, MaterialProgress, ProgressSummary, RegistrationOverview,
    SingleEnrollResult, TakenCourse,
};
pub use material::{
    extension_of, FileKind, MaterialKind, MaterialUpdate, NewUpload, NewUploadVideo, Upload,
    UploadVideo,
};
pub use pagination::{ListParams, PagedResult, DEFAULT_PER_PAGE};
pub use profile::{DepartmentHead, Student, StudentWithUser};
pub use program::{Program, ProgramDetail, ProgramInput};
pub use quiz::{Question, Quiz, QuizInput};
pub use session::Session;
pub use user::{NewUser, User, UserCredentials, UserRole};
