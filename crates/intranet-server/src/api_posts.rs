//! Sector posts.

use crate::api::{message, with_conn, ApiError};
use crate::middleware::CurrentUser;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use intranet_content::{
    create_post, delete_post, get_post, list_posts_by_sector, update_post, NewAttachment, NewPost,
    Post, PostUpdate,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// An already uploaded file referenced by its public URL.
#[derive(Debug, Deserialize)]
pub struct AttachmentRequest {
    #[serde(alias = "original_filename")]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub mimetype: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Replaces every attachment when present.
    #[serde(default)]
    pub attachments: Option<Vec<AttachmentRequest>>,
}

pub(crate) fn to_new_attachments(
    requests: Vec<AttachmentRequest>,
) -> Result<Vec<NewAttachment>, ApiError> {
    requests
        .iter()
        .map(|a| NewAttachment::from_link(&a.name, &a.url, a.mimetype.as_deref()))
        .collect::<Result<_, _>>()
        .map_err(ApiError::from)
}

/// Handler for `GET /api/sectors/{sector}/posts`.
pub async fn list_sector_posts_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(sector): Path<String>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = with_conn(&state, move |conn| Ok(list_posts_by_sector(conn, &sector)?)).await?;
    Ok(Json(posts))
}

/// Handler for `POST /api/posts`.
///
/// Superusers may post anywhere; editors only in their own sector.
pub async fn create_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let sector = payload.sector.trim().to_string();
    if sector.is_empty() || payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "sector and title are required".to_string(),
        ));
    }
    if !user.actor().can_write_sector(&sector) {
        return Err(ApiError::Forbidden(format!(
            "you cannot publish in sector '{}'",
            sector
        )));
    }

    let new_post = NewPost {
        sector,
        title: payload.title,
        content: payload.content,
        attachments: to_new_attachments(payload.attachments)?,
    };
    let author_id = user.id;
    let post = with_conn(&state, move |conn| Ok(create_post(conn, author_id, &new_post)?)).await?;

    tracing::info!(post_id = post.id, sector = %post.sector, author_id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// Handler for `GET /api/posts/{id}`.
pub async fn get_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    let post = with_conn(&state, move |conn| Ok(get_post(conn, id)?)).await?;
    Ok(Json(post))
}

/// Handler for `PUT /api/posts/{id}`.
pub async fn update_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    let update = PostUpdate {
        title: payload.title,
        content: payload.content,
        attachments: payload.attachments.map(to_new_attachments).transpose()?,
    };
    let actor = user.actor();

    let post = with_conn(&state, move |conn| {
        let existing = get_post(conn, id)?;
        if !actor.can_write_sector(&existing.sector) {
            return Err(ApiError::Forbidden(
                "you cannot edit posts of this sector".to_string(),
            ));
        }
        Ok(update_post(conn, id, &update)?)
    })
    .await?;

    tracing::info!(post_id = id, editor = user.id, "post updated");
    Ok(Json(post))
}

/// Handler for `DELETE /api/posts/{id}`.
pub async fn delete_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let actor = user.actor();
    with_conn(&state, move |conn| {
        let existing = get_post(conn, id)?;
        if !actor.can_delete_authored(existing.author_id) {
            return Err(ApiError::Forbidden(
                "only the author or a superuser may delete this post".to_string(),
            ));
        }
        Ok(delete_post(conn, id)?)
    })
    .await?;

    tracing::info!(post_id = id, deleted_by = user.id, "post deleted");
    Ok(message("post deleted"))
}
