//! Error type and helpers shared by every handler module.

use crate::AppState;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use intranet_accounts::{AccountError, User};
use intranet_calendar::CalendarError;
use intranet_content::ContentError;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("upstream failure: {0}")]
    BadGateway(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::InternalServerError(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::NotFound(_) | AccountError::NoBirthdayGif { .. } => {
                ApiError::NotFound(e.to_string())
            }
            AccountError::DuplicateUsername => ApiError::Conflict(e.to_string()),
            AccountError::InvalidEmail
            | AccountError::PasswordMismatch
            | AccountError::WeakPassword(_) => ApiError::BadRequest(e.to_string()),
            AccountError::Token(_) => ApiError::Unauthorized(e.to_string()),
            AccountError::Database(_) | AccountError::Hash(_) => {
                ApiError::InternalServerError(e.to_string())
            }
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            ContentError::MissingField(_) => ApiError::BadRequest(e.to_string()),
            ContentError::AttachmentInUse(_) => ApiError::Conflict(e.to_string()),
            ContentError::Database(_) => ApiError::InternalServerError(e.to_string()),
        }
    }
}

impl From<CalendarError> for ApiError {
    fn from(e: CalendarError) -> Self {
        match e {
            CalendarError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            CalendarError::MissingField(_)
            | CalendarError::Time(_)
            | CalendarError::EndBeforeStart
            | CalendarError::InvalidSlot(_) => ApiError::BadRequest(e.to_string()),
            CalendarError::DuplicateDate(_) => ApiError::Conflict(e.to_string()),
            CalendarError::Database(_) | CalendarError::Json(_) => {
                ApiError::InternalServerError(e.to_string())
            }
        }
    }
}

/// Runs `f` on a pooled connection on the blocking thread pool.
pub async fn with_conn<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Connection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let pool = state.pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        f(&conn)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?
}

/// `{"message": text}`, the body of every mutation without a richer result.
pub fn message(text: impl Into<String>) -> Json<Value> {
    Json(json!({ "message": text.into() }))
}

/// Editors and superusers only.
pub(crate) fn require_editor(user: &User) -> Result<(), ApiError> {
    if user.actor().is_editor_or_above() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "editor or superuser role required".to_string(),
        ))
    }
}

/// Trims `value` and maps an empty result to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
