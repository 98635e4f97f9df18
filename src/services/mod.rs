//! Services layer - Business logic
//!
//! This module contains the business logic of CourseHub.
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories, cache, storage and the event bus
//! - Handling validation and error cases

pub mod account;
pub mod activity;
pub mod allocation;
pub mod calendar;
pub mod course;
pub mod email;
pub mod enrollment;
pub mod material;
pub mod password;
pub mod program;
pub mod progress;
pub mod rate_limiter;
pub mod slug;
pub mod user;

pub use account::{
    AccountProvisioner, AccountService, AccountServiceError, CreateLecturerInput,
    CreateStudentInput, StudentAccount,
};
pub use activity::{ActivityLogger, ActivityService};
pub use allocation::{AllocationService, AllocationServiceError};
pub use calendar::{CalendarService, CalendarServiceError, SemesterInput};
pub use course::{CourseService, CourseServiceError};
pub use email::{create_mailer, EmailOutbox, EmailTemplates};
pub use enrollment::{parse_email_list, EnrollmentService, EnrollmentServiceError};
pub use material::{MaterialInput, MaterialService, MaterialServiceError};
pub use password::{hash_password, verify_password};
pub use program::{ProgramService, ProgramServiceError};
pub use progress::{ProgressService, ProgressServiceError, ProgressToggle, ToggleAction};
pub use rate_limiter::LoginRateLimiter;
pub use slug::generate_slug;
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
