//! Multipart uploads: content files for posts and announcements, and the
//! shared helpers the profile image upload uses.
//!
//! Stored names are `{user_id}_{uuid}_{sanitized original}` so two uploads
//! never collide and the original name stays recognisable.

use crate::api::{require_editor, ApiError};
use crate::{middleware::CurrentUser, AppState};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Extension, Multipart},
    http::StatusCode,
    Json,
};
use intranet_content::UPLOADS_PREFIX;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Name used when sanitizing leaves nothing of the original.
const FALLBACK_NAME: &str = "file";

/// A file read out of a multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    /// Sanitized client-side name.
    pub name: String,
    pub data: Bytes,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Public URL, `/uploads/<stored name>`.
    pub url: String,
    pub name: String,
}

/// Reduces a client-supplied file name to a safe single path segment.
///
/// Keeps ASCII letters, digits, `.`, `-` and `_`; whitespace becomes `_`;
/// everything else is dropped. Leading dots are stripped so the result is
/// never hidden or a parent reference.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Stored name for an upload by `user_id`.
pub fn stored_filename(user_id: i64, sanitized: &str) -> String {
    format!("{}_{}_{}", user_id, Uuid::new_v4().simple(), sanitized)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(format!("multipart error: {}", e.body_text()))
    }
}

/// Reads the multipart field called `field_name`, skipping any others.
pub async fn read_file_field(
    multipart: &mut Multipart,
    field_name: &str,
) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        if original.trim().is_empty() {
            return Err(ApiError::BadRequest("no file selected".to_string()));
        }
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok(UploadedFile {
            name: sanitize_filename(&original),
            data,
        });
    }
    Err(ApiError::BadRequest(format!(
        "no file found under the '{}' field",
        field_name
    )))
}

/// Writes `file` into the upload directory and returns the stored name.
pub async fn save_upload(
    state: &AppState,
    user_id: i64,
    file: &UploadedFile,
) -> Result<String, ApiError> {
    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| ApiError::InternalServerError(format!("failed to create upload dir: {}", e)))?;

    let stored = stored_filename(user_id, &file.name);
    let path = Path::new(&state.upload_dir).join(&stored);
    tokio::fs::write(&path, &file.data)
        .await
        .map_err(|e| ApiError::InternalServerError(format!("failed to write file: {}", e)))?;

    tracing::info!(user_id, file = %stored, bytes = file.data.len(), "stored upload");
    Ok(stored)
}

/// Removes a stored upload. Only the final path component of `name` is
/// used, so a crafted value cannot escape the upload directory.
pub async fn remove_upload(upload_dir: &str, name: &str) {
    let Some(file_name) = Path::new(name).file_name() else {
        return;
    };
    let path = Path::new(upload_dir).join(file_name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::info!(path = %path.display(), "removed upload"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove upload"),
    }
}

/// Handler for `POST /api/uploads`.
///
/// Accepts the `upload` field. Editors and superusers only.
pub async fn upload_file_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    require_editor(&user)?;

    let file = read_file_field(&mut multipart, "upload").await?;
    let stored = save_upload(&state, user.id, &file).await?;

    Ok(Json(UploadResponse {
        url: format!("{}{}", UPLOADS_PREFIX, stored),
        name: file.name,
    }))
}
