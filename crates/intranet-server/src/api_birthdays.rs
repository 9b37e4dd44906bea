//! Today's birthdays and their GIFs.

use crate::api::{with_conn, ApiError};
use crate::middleware::CurrentUser;
use crate::AppState;
use axum::extract::{Extension, Json, Path};
use chrono::{Local, NaiveDate};
use intranet_accounts::{
    birthdays_on, get_birthday_gif, insert_birthday_gif_if_absent, replace_birthday_gif,
    AccountError,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct BirthdayEntry {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub sector: Option<String>,
    pub profile_image: String,
    pub gif_url: Option<String>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Handler for `GET /api/birthdays/today`.
///
/// Anyone without a GIF for today gets one from the provider on first view.
/// A provider failure leaves `gif_url` empty for this response only.
pub async fn todays_birthdays_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<BirthdayEntry>>, ApiError> {
    let date = today();
    let celebrated = with_conn(&state, move |conn| {
        let mut entries = Vec::new();
        for user in birthdays_on(conn, date)? {
            let gif_url = get_birthday_gif(conn, user.id, date)?;
            entries.push(BirthdayEntry {
                id: user.id,
                first_name: user.first_name,
                last_name: user.last_name,
                sector: user.sector,
                profile_image: user.profile_image,
                gif_url,
            });
        }
        Ok(entries)
    })
    .await?;

    let mut result = Vec::with_capacity(celebrated.len());
    for mut entry in celebrated {
        if entry.gif_url.is_none() {
            entry.gif_url = match state.gifs.random_birthday_gif().await {
                Ok(url) => {
                    let user_id = entry.id;
                    let stored = with_conn(&state, move |conn| {
                        Ok(insert_birthday_gif_if_absent(conn, user_id, date, &url)?)
                    })
                    .await?;
                    Some(stored)
                }
                Err(e) => {
                    tracing::warn!(user_id = entry.id, error = %e, "birthday gif lookup failed");
                    None
                }
            };
        }
        result.push(entry);
    }
    Ok(Json(result))
}

/// Handler for `POST /api/birthdays/{user_id}/gif`.
///
/// Swaps today's GIF for another random one.
pub async fn change_gif_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !caller.actor().can_change_birthday_gif(user_id) {
        return Err(ApiError::Forbidden(
            "you can only change your own birthday gif".to_string(),
        ));
    }

    let date = today();
    let current = with_conn(&state, move |conn| Ok(get_birthday_gif(conn, user_id, date)?)).await?;
    if current.is_none() {
        return Err(AccountError::NoBirthdayGif { user_id }.into());
    }

    let new_url = state
        .gifs
        .random_birthday_gif()
        .await
        .map_err(|e| ApiError::BadGateway(format!("could not fetch a new gif: {}", e)))?;

    let stored = new_url.clone();
    with_conn(&state, move |conn| {
        Ok(replace_birthday_gif(conn, user_id, date, &stored)?)
    })
    .await?;

    tracing::info!(user_id, changed_by = caller.id, "birthday gif replaced");
    Ok(Json(json!({
        "message": "birthday gif updated",
        "new_gif_url": new_url,
    })))
}
