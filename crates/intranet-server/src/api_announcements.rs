//! Company-wide announcements.

use crate::api::{message, with_conn, ApiError};
use crate::api_posts::{to_new_attachments, AttachmentRequest};
use crate::middleware::CurrentUser;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
};
use intranet_content::{
    create_announcement, delete_announcement, get_announcement, list_announcements, Announcement,
    AnnouncementPage, NewAnnouncement,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnnouncementRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRequest>,
}

/// Handler for `GET /api/announcements?page=N`.
pub async fn list_announcements_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<AnnouncementPage>, ApiError> {
    let page = query.page.unwrap_or(1);
    let page = with_conn(&state, move |conn| Ok(list_announcements(conn, page)?)).await?;
    Ok(Json(page))
}

/// Handler for `POST /api/announcements`.
///
/// Superusers and editors of the admin sector.
pub async fn create_announcement_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>), ApiError> {
    if !user.actor().can_administer_site(&state.site) {
        return Err(ApiError::Forbidden(
            "you cannot publish announcements".to_string(),
        ));
    }
    if payload.subject.trim().is_empty() || payload.content.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "subject and content are required".to_string(),
        ));
    }

    let announcement = NewAnnouncement {
        subject: payload.subject,
        content: payload.content,
        attachments: to_new_attachments(payload.attachments)?,
    };
    let author_id = user.id;
    let created = with_conn(&state, move |conn| {
        Ok(create_announcement(conn, author_id, &announcement)?)
    })
    .await?;

    tracing::info!(announcement_id = created.id, author_id, "announcement published");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Handler for `DELETE /api/announcements/{id}`.
pub async fn delete_announcement_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let actor = user.actor();
    with_conn(&state, move |conn| {
        let existing = get_announcement(conn, id)?;
        if !actor.can_delete_authored(existing.author_id) {
            return Err(ApiError::Forbidden(
                "only the author or a superuser may delete this announcement".to_string(),
            ));
        }
        Ok(delete_announcement(conn, id)?)
    })
    .await?;

    tracing::info!(announcement_id = id, deleted_by = user.id, "announcement deleted");
    Ok(message("announcement deleted"))
}
