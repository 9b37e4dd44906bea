//! Shared contact directory.

use crate::api::{message, require_editor, with_conn, ApiError};
use crate::middleware::CurrentUser;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use intranet_content::{
    create_contact, delete_contact, list_contacts, update_contact, Contact, ContactInput,
};
use serde_json::Value;
use std::sync::Arc;

/// Handler for `GET /api/contacts`.
pub async fn list_contacts_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Contact>>, ApiError> {
    let contacts = with_conn(&state, |conn| Ok(list_contacts(conn)?)).await?;
    Ok(Json(contacts))
}

/// Handler for `POST /api/contacts`.
pub async fn create_contact_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(input): Json<ContactInput>,
) -> Result<(StatusCode, Json<Contact>), ApiError> {
    require_editor(&user)?;
    let contact = with_conn(&state, move |conn| Ok(create_contact(conn, &input)?)).await?;
    tracing::info!(contact_id = contact.id, by = user.id, "contact created");
    Ok((StatusCode::CREATED, Json(contact)))
}

/// Handler for `PUT /api/contacts/{id}`. Replaces every field.
pub async fn update_contact_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<ContactInput>,
) -> Result<Json<Contact>, ApiError> {
    require_editor(&user)?;
    let contact = with_conn(&state, move |conn| Ok(update_contact(conn, id, &input)?)).await?;
    tracing::info!(contact_id = id, by = user.id, "contact updated");
    Ok(Json(contact))
}

/// Handler for `DELETE /api/contacts/{id}`.
pub async fn delete_contact_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_editor(&user)?;
    with_conn(&state, move |conn| Ok(delete_contact(conn, id)?)).await?;
    tracing::info!(contact_id = id, by = user.id, "contact deleted");
    Ok(message("contact deleted"))
}
