//! Own profile, other users' profiles and the staff directory.

use crate::api::{non_blank, with_conn, ApiError};
use crate::api_upload::{read_file_field, remove_upload, save_upload};
use crate::middleware::CurrentUser;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Multipart, Path},
    response::{IntoResponse, Response},
};
use intranet_accounts::{
    get_user, list_directory, set_profile_image, update_profile, ProfileUpdate, UserProfile,
    DEFAULT_PROFILE_IMAGE,
};
use intranet_types::{is_on_call_group, time::parse_date};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub extension: Option<String>,
    pub sector: Option<String>,
    pub branch: Option<String>,
    /// `YYYY-MM-DD`; blank or absent leaves the stored date alone.
    pub birth_date: Option<String>,
    /// Integer or numeric string; anything outside `1..=4` clears the group.
    pub on_call_group: Option<Value>,
}

/// Rota group from loosely typed JSON input.
fn parse_on_call_group(value: Option<&Value>) -> Option<u8> {
    let n = match value? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if is_on_call_group(n) {
        u8::try_from(n).ok()
    } else {
        None
    }
}

impl ProfileRequest {
    fn into_update(self) -> Result<ProfileUpdate, ApiError> {
        let birth_date = non_blank(self.birth_date)
            .map(|d| parse_date(&d))
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(ProfileUpdate {
            on_call_group: parse_on_call_group(self.on_call_group.as_ref()),
            first_name: non_blank(self.first_name),
            last_name: non_blank(self.last_name),
            extension: non_blank(self.extension),
            sector: non_blank(self.sector),
            branch: non_blank(self.branch),
            birth_date,
        })
    }
}

/// Handler for `GET /api/profile`.
pub async fn get_own_profile_handler(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<UserProfile> {
    Json(user.profile())
}

/// Handler for `PUT /api/profile`.
///
/// Name, extension, sector and branch are replaced as given.
pub async fn update_own_profile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<ProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    let update = payload.into_update()?;
    let user_id = user.id;
    let updated = with_conn(&state, move |conn| Ok(update_profile(conn, user_id, &update)?)).await?;

    tracing::info!(user_id, "profile updated");
    Ok(Json(json!({
        "message": "profile updated",
        "profile": updated.profile(),
        "profile_incomplete": updated.profile_incomplete(),
    })))
}

/// Handler for `POST /api/profile/image`.
///
/// Accepts the `profile_pic` field. The previous picture is deleted unless
/// it is the shared default.
pub async fn upload_profile_image_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let file = read_file_field(&mut multipart, "profile_pic").await?;
    let stored = save_upload(&state, user.id, &file).await?;

    let user_id = user.id;
    let stored_name = stored.clone();
    with_conn(&state, move |conn| {
        Ok(set_profile_image(conn, user_id, &stored_name)?)
    })
    .await?;

    if user.profile_image != DEFAULT_PROFILE_IMAGE {
        remove_upload(&state.upload_dir, &user.profile_image).await;
    }

    Ok(Json(json!({
        "message": "profile image updated",
        "profile_image": stored,
    }))
    .into_response())
}

/// Handler for `GET /api/users/{id}/profile`.
pub async fn get_user_profile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = with_conn(&state, move |conn| Ok(get_user(conn, id)?)).await?;
    Ok(Json(user.profile()))
}

/// Handler for `GET /api/directory`.
pub async fn directory_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let profiles = with_conn(&state, |conn| Ok(list_directory(conn)?)).await?;
    Ok(Json(profiles))
}
