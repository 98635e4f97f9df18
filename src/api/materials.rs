//! Course material API endpoints
//!
//! Uploads are multipart/form-data with the fields `title`, `module_number`,
//! `is_available`, `summary` (videos) and `file`.
//!
//! - POST /api/v1/courses/{slug}/files (staff)
//! - POST /api/v1/courses/{slug}/videos (staff)
//! - GET /api/v1/files/{id}
//! - PUT/DELETE /api/v1/files/{id} (staff)
//! - GET /api/v1/videos/{slug}
//! - PUT/DELETE /api/v1/videos/{slug} (staff)

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{MaterialUpdate, Upload, UploadVideo};
use crate::services::{MaterialInput, MaterialServiceError};

impl From<MaterialServiceError> for ApiError {
    fn from(err: MaterialServiceError) -> Self {
        match err {
            MaterialServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            MaterialServiceError::TooLarge(_) => ApiError::payload_too_large(err.to_string()),
            MaterialServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
            MaterialServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files/{id}", get(get_file))
        .route("/videos/{slug}", get(get_video))
}

/// Routes that accept material bodies; the caller applies the body limit
pub fn upload_router() -> Router<AppState> {
    Router::new()
        .route("/courses/{slug}/files", post(upload_file))
        .route("/courses/{slug}/videos", post(upload_video))
}

pub fn staff_router() -> Router<AppState> {
    Router::new()
        .route(
            "/files/{id}",
            axum::routing::put(update_file).delete(delete_file),
        )
        .route(
            "/videos/{slug}",
            axum::routing::put(update_video).delete(delete_video),
        )
}

/// Collect the material form fields
async fn read_material_form(mut multipart: Multipart) -> Result<MaterialInput, ApiError> {
    let mut input = MaterialInput {
        is_available: true,
        ..Default::default()
    };
    let mut has_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                input.filename = field.file_name().unwrap_or("").to_string();
                input.data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?
                    .to_vec();
                has_file = true;
            }
            "title" | "module_number" | "is_available" | "summary" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation_error(format!("Invalid field {}: {}", name, e)))?;
                apply_text_field(&mut input, &name, value.trim())?;
            }
            _ => {}
        }
    }

    if !has_file {
        return Err(ApiError::validation_error("No file provided"));
    }
    Ok(input)
}

fn apply_text_field(input: &mut MaterialInput, name: &str, value: &str) -> Result<(), ApiError> {
    match name {
        "title" => input.title = value.to_string(),
        "summary" => input.summary = value.to_string(),
        "module_number" => {
            input.module_number = value
                .parse()
                .map_err(|_| ApiError::validation_error("module_number must be an integer"))?;
        }
        "is_available" => {
            input.is_available = matches!(value.to_ascii_lowercase().as_str(), "true" | "on" | "1");
        }
        _ => {}
    }
    Ok(())
}

async fn upload_file(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Upload>), ApiError> {
    let course = state.course_service.get_by_slug(&slug).await?;
    let input = read_material_form(multipart).await?;
    let upload = state.material_service.upload_file(course.id, input).await?;
    Ok((StatusCode::CREATED, Json(upload)))
}

async fn upload_video(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadVideo>), ApiError> {
    let course = state.course_service.get_by_slug(&slug).await?;
    let input = read_material_form(multipart).await?;
    let video = state.material_service.upload_video(course.id, input).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

async fn get_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Upload>, ApiError> {
    let upload = state.material_service.get_file(id).await?;
    if !upload.is_available && !user.0.is_staff() {
        return Err(ApiError::not_found(format!("File {} not found", id)));
    }
    Ok(Json(upload))
}

async fn update_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<MaterialUpdate>,
) -> Result<Json<Upload>, ApiError> {
    Ok(Json(state.material_service.update_file(id, body).await?))
}

async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.material_service.delete_file(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_video(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<UploadVideo>, ApiError> {
    Ok(Json(state.material_service.video_by_slug(&slug, &user.0).await?))
}

async fn update_video(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<MaterialUpdate>,
) -> Result<Json<UploadVideo>, ApiError> {
    let video = state.material_service.video_by_slug(&slug, &user.0).await?;
    Ok(Json(state.material_service.update_video(video.id, body).await?))
}

async fn delete_video(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    let video = state.material_service.video_by_slug(&slug, &user.0).await?;
    state.material_service.delete_video(video.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_text_field() {
        let mut input = MaterialInput::default();
        apply_text_field(&mut input, "title", "Week 1").unwrap();
        apply_text_field(&mut input, "module_number", "3").unwrap();
        apply_text_field(&mut input, "is_available", "on").unwrap();
        assert_eq!(input.title, "Week 1");
        assert_eq!(input.module_number, 3);
        assert!(input.is_available);

        apply_text_field(&mut input, "is_available", "false").unwrap();
        assert!(!input.is_available);
        assert!(apply_text_field(&mut input, "module_number", "three").is_err());
    }
}
