//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Auth: registration of the first administrator, login, activation
//! - Catalog: programs and courses
//! - Materials: course files and videos
//! - Allocation of courses to lecturers
//! - Enrollment, course registration and progress tracking
//! - Administration: accounts, academic calendar, activity log

pub mod accounts;
pub mod activity;
pub mod allocations;
pub mod auth;
pub mod calendar;
pub mod common;
pub mod courses;
pub mod enrollment;
pub mod materials;
pub mod middleware;
pub mod programs;
pub mod responses;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Room for multipart boundaries and text fields on top of the file itself
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Administrator routes
    let admin_routes = Router::new()
        .merge(accounts::admin_router())
        .merge(calendar::admin_router())
        .merge(activity::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Staff (administrator or lecturer) routes
    let staff_routes = Router::new()
        .merge(programs::staff_router())
        .merge(courses::staff_router())
        .merge(allocations::staff_router())
        .merge(materials::staff_router())
        .merge(enrollment::staff_router())
        .merge(accounts::staff_router())
        .route_layer(axum_middleware::from_fn(middleware::require_staff))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Material uploads carry their own body limit
    let upload_limit = state
        .config
        .storage
        .max_file_size
        .max(state.config.storage.max_video_size)
        .saturating_add(MULTIPART_OVERHEAD);
    let upload_routes = materials::upload_router()
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            usize::try_from(upload_limit).unwrap_or(usize::MAX),
        ))
        .route_layer(axum_middleware::from_fn(middleware::require_staff))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Student routes
    let student_routes = enrollment::student_router()
        .route_layer(axum_middleware::from_fn(middleware::require_student))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Any signed-in user
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(programs::router())
        .merge(courses::router())
        .merge(materials::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(admin_routes)
        .merge(staff_routes)
        .merge(upload_routes)
        .merge(student_routes)
        .merge(protected_routes)
}

/// CORS for cookie authentication from the configured front-end origin
fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    // Credentials cannot be combined with a wildcard origin
    if cors_origin.trim() == "*" {
        return cors.allow_origin(tower_http::cors::Any);
    }

    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin '{}': {}", cors_origin, e);
            cors
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::db::repositories::{SqlxProfileRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{NewUser, UserRole};
    use crate::services::email::testing::recording_outbox;
    use crate::services::hash_password;
    use crate::storage::LocalStorage;

    struct TestApp {
        server: TestServer,
        pool: DynDatabasePool,
        _dir: TempDir,
    }

    async fn test_app() -> TestApp {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.path = dir.path().to_path_buf();
        let storage = Arc::new(LocalStorage::new(dir.path()));
        let (outbox, _mailer) = recording_outbox();

        let state = AppState::build(pool.clone(), &config, storage, outbox);
        let server = TestServer::new(build_router(state, &config.server.cors_origin)).unwrap();
        TestApp {
            server,
            pool,
            _dir: dir,
        }
    }

    async fn register_admin(app: &TestApp) -> String {
        let response = app
            .server
            .post("/api/v1/auth/register")
            .json(&json!({
                "username": "admin",
                "email": "admin@example.com",
                "password": "password123",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["token"].as_str().unwrap().to_string()
    }

    async fn create_program(app: &TestApp, token: &str) -> i64 {
        let response = app
            .server
            .post("/api/v1/programs")
            .authorization_bearer(token)
            .json(&json!({ "title": "Computer Science" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_i64().unwrap()
    }

    async fn create_course(app: &TestApp, token: &str, program_id: i64) -> Value {
        let response = app
            .server
            .post("/api/v1/courses")
            .authorization_bearer(token)
            .json(&json!({
                "title": "Intro to Rust",
                "code": "CS101",
                "credit": 3,
                "program_id": program_id,
                "level": "Bachelor",
                "semester": "First",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()
    }

    /// Active student with a profile in `program_id`; returns a session token
    async fn student_token(app: &TestApp, program_id: i64) -> String {
        let users = SqlxUserRepository::boxed(app.pool.clone());
        let user = users
            .create(&NewUser {
                username: "stu1".to_string(),
                email: "stu@example.com".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Obi".to_string(),
                password_hash: hash_password("password123").unwrap(),
                role: UserRole::Student,
                is_active: true,
            })
            .await
            .unwrap();
        SqlxProfileRepository::boxed(app.pool.clone())
            .get_or_create_student(user.id, Some(program_id), Some("Bachelor"))
            .await
            .unwrap();

        let response = app
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "username_or_email": "stu1", "password": "password123" }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let app = test_app().await;
        let response = app.server.get("/api/v1/courses").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_catalog_flow() {
        let app = test_app().await;
        let token = register_admin(&app).await;
        let program_id = create_program(&app, &token).await;
        let course = create_course(&app, &token, program_id).await;
        assert_eq!(course["slug"], "intro-to-rust");

        let detail = app
            .server
            .get("/api/v1/courses/intro-to-rust")
            .authorization_bearer(&token)
            .await
            .json::<Value>();
        assert_eq!(detail["course"]["code"], "CS101");
        assert_eq!(detail["files"].as_array().unwrap().len(), 0);
        assert!(detail.get("taken_course_id").is_none());

        // Same code again
        let response = app
            .server
            .post("/api/v1/courses")
            .authorization_bearer(&token)
            .json(&json!({
                "title": "Rust Again",
                "code": "CS101",
                "program_id": program_id,
                "level": "Bachelor",
                "semester": "First",
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);

        let activity = app
            .server
            .get("/api/v1/activity")
            .authorization_bearer(&token)
            .await
            .json::<Value>();
        let messages: Vec<&str> = activity["items"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|item| item["message"].as_str())
            .collect();
        assert!(messages.contains(&"The program 'Computer Science' has been created."));
    }

    #[tokio::test]
    async fn test_upload_enroll_and_toggle_progress() {
        let app = test_app().await;
        let token = register_admin(&app).await;
        let program_id = create_program(&app, &token).await;
        create_course(&app, &token, program_id).await;

        let form = MultipartForm::new()
            .add_text("title", "Week 1 notes")
            .add_text("module_number", "1")
            .add_part("file", Part::bytes(b"%PDF-1.4".to_vec()).file_name("notes.pdf"));
        let response = app
            .server
            .post("/api/v1/courses/intro-to-rust/files")
            .authorization_bearer(&token)
            .multipart(form)
            .await;
        response.assert_status(StatusCode::CREATED);
        let upload = response.json::<Value>();
        assert!(upload["file_path"]
            .as_str()
            .unwrap()
            .starts_with("course_files/"));
        let file_id = upload["id"].as_i64().unwrap();

        let student = student_token(&app, program_id).await;
        let enrolled = app
            .server
            .post("/api/v1/courses/intro-to-rust/students")
            .authorization_bearer(&token)
            .json(&json!({ "email": "stu@example.com" }))
            .await
            .json::<Value>();
        assert_eq!(enrolled["outcome"], "added");
        assert_eq!(enrolled["account_created"], false);

        let detail = app
            .server
            .get("/api/v1/courses/intro-to-rust")
            .authorization_bearer(&student)
            .await
            .json::<Value>();
        let taken_course_id = detail["taken_course_id"].as_i64().unwrap();

        let response = app
            .server
            .post("/api/v1/progress/toggle")
            .authorization_bearer(&student)
            .json(&json!({
                "material_id": file_id,
                "material_type": "file",
                "is_checked": true,
                "taken_course_id": taken_course_id,
            }))
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["status"], "success");
        assert_eq!(body["action"], "checked");
        assert_eq!(body["progress"]["completed"], 1);

        let response = app
            .server
            .post("/api/v1/progress/toggle")
            .authorization_bearer(&student)
            .json(&json!({
                "material_id": file_id,
                "material_type": "quiz",
                "is_checked": true,
                "taken_course_id": taken_course_id,
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["status"], "error");

        let response = app
            .server
            .post("/api/v1/progress/toggle")
            .authorization_bearer(&student)
            .json(&json!({
                "material_id": file_id,
                "material_type": "file",
                "is_checked": false,
                "taken_course_id": taken_course_id,
            }))
            .await;
        assert_eq!(response.json::<Value>()["action"], "unchecked");

        // Students cannot write to the catalog
        app.server
            .delete("/api/v1/courses/intro-to-rust")
            .authorization_bearer(&student)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bulk_enroll_over_limit_is_rejected() {
        let app = test_app().await;
        let token = register_admin(&app).await;
        let program_id = create_program(&app, &token).await;
        create_course(&app, &token, program_id).await;

        let emails: Vec<String> = (0..51).map(|i| format!("s{}@example.com", i)).collect();
        let response = app
            .server
            .post("/api/v1/courses/intro-to-rust/students/bulk")
            .authorization_bearer(&token)
            .json(&json!({ "emails": emails.join(",") }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["error"]["message"],
            "You can only add up to 50 students at a time."
        );
    }

    #[tokio::test]
    async fn test_registration_requires_current_semester() {
        let app = test_app().await;
        let token = register_admin(&app).await;
        let program_id = create_program(&app, &token).await;
        let student = student_token(&app, program_id).await;

        let response = app
            .server
            .get("/api/v1/registration")
            .authorization_bearer(&student)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["error"]["message"],
            "No active semester found."
        );

        // Staff accounts are not students
        app.server
            .get("/api/v1/registration")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
