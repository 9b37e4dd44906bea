//! Company events and registrations.

use crate::api::{message, non_blank, require_editor, with_conn, ApiError};
use crate::api_upload::remove_upload;
use crate::middleware::CurrentUser;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use chrono::Utc;
use intranet_calendar::{
    create_event, delete_event, get_event, get_registration, list_registrations, list_upcoming,
    registered_event_ids, update_event, upsert_registration, visible_to, Event, EventListing,
    EventUpdate, NewEvent, Registration, RegistrationInput,
};
use intranet_types::deserialize_id_list;
use intranet_types::time::parse_timestamp;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventRequest {
    pub title: Option<String>,
    pub banner_image: Option<String>,
    pub location_text: Option<String>,
    pub map_url: Option<String>,
    pub starts_at: Option<String>,
    pub details: Option<String>,
    pub venue: Option<String>,
    pub form_schema: Option<Value>,
    #[serde(deserialize_with = "deserialize_id_list")]
    pub hidden_from_users: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationRequest {
    pub participates: bool,
    pub user_notes: Option<String>,
    pub answers: Option<Value>,
}

/// Banners are stored by bare file name; clients may send the `/uploads/...`
/// URL the upload route returned.
fn banner_file_name(value: Option<String>) -> Option<String> {
    let value = non_blank(value)?;
    value
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

impl EventRequest {
    fn starts_at(&self) -> Result<Option<chrono::DateTime<Utc>>, ApiError> {
        self.starts_at
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))
    }

    fn into_new(self) -> Result<NewEvent, ApiError> {
        let starts_at = self.starts_at()?;
        let (title, starts_at, venue) =
            match (non_blank(self.title), starts_at, non_blank(self.venue)) {
                (Some(title), Some(starts_at), Some(venue)) => (title, starts_at, venue),
                _ => {
                    return Err(ApiError::BadRequest(
                        "title, starts_at and venue are required".to_string(),
                    ))
                }
            };
        Ok(NewEvent {
            title,
            banner_image: banner_file_name(self.banner_image),
            location_text: non_blank(self.location_text),
            map_url: non_blank(self.map_url),
            starts_at,
            details: non_blank(self.details),
            venue,
            form_schema: self.form_schema.filter(|v| !v.is_null()),
            hidden_from_users: self.hidden_from_users.unwrap_or_default(),
        })
    }

    fn into_update(self) -> Result<EventUpdate, ApiError> {
        let starts_at = self.starts_at()?;
        Ok(EventUpdate {
            title: self.title,
            banner_image: banner_file_name(self.banner_image),
            location_text: self.location_text,
            map_url: self.map_url,
            starts_at,
            details: self.details,
            venue: self.venue,
            form_schema: self.form_schema.filter(|v| !v.is_null()),
            hidden_from_users: self.hidden_from_users,
        })
    }
}

/// Handler for `GET /api/events`.
///
/// Upcoming events the caller may see, each flagged with whether the caller
/// has already answered.
pub async fn list_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<EventListing>>, ApiError> {
    let actor = user.actor();
    let company_location = state.site.company_location.clone();

    let listings = with_conn(&state, move |conn| {
        let events = visible_to(list_upcoming(conn, &Utc::now())?, &actor, &company_location);
        let registered = registered_event_ids(conn, actor.user_id)?;
        Ok(events
            .into_iter()
            .map(|event| EventListing {
                is_registered: registered.contains(&event.id),
                event,
            })
            .collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(listings))
}

/// Handler for `POST /api/events`.
pub async fn create_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<EventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    require_editor(&user)?;
    let event = payload.into_new()?;
    let creator_id = user.id;
    let created = with_conn(&state, move |conn| Ok(create_event(conn, creator_id, &event)?)).await?;

    tracing::info!(event_id = created.id, venue = %created.venue, creator_id, "event created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Handler for `GET /api/events/{id}`.
pub async fn get_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Event>, ApiError> {
    let event = with_conn(&state, move |conn| Ok(get_event(conn, id)?)).await?;
    Ok(Json(event))
}

/// Handler for `PUT /api/events/{id}`.
///
/// A new banner replaces the old file on disk.
pub async fn update_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<EventRequest>,
) -> Result<Json<Event>, ApiError> {
    require_editor(&user)?;
    let update = payload.into_update()?;

    let (previous_banner, event) = with_conn(&state, move |conn| {
        let previous = get_event(conn, id)?.banner_image;
        Ok((previous, update_event(conn, id, &update)?))
    })
    .await?;

    if let Some(old) = previous_banner {
        if event.banner_image.as_deref() != Some(old.as_str()) {
            remove_upload(&state.upload_dir, &old).await;
        }
    }

    tracing::info!(event_id = id, editor = user.id, "event updated");
    Ok(Json(event))
}

/// Handler for `DELETE /api/events/{id}`.
pub async fn delete_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_editor(&user)?;
    let removed = with_conn(&state, move |conn| Ok(delete_event(conn, id)?)).await?;

    if let Some(banner) = removed.banner_image.as_deref() {
        remove_upload(&state.upload_dir, banner).await;
    }

    tracing::info!(event_id = id, deleted_by = user.id, "event deleted");
    Ok(message("event deleted"))
}

/// Handler for `GET /api/events/{id}/registration`.
///
/// Responds with JSON `null` when the caller has not answered yet.
pub async fn get_own_registration_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Option<Registration>>, ApiError> {
    let user_id = user.id;
    let registration =
        with_conn(&state, move |conn| Ok(get_registration(conn, user_id, id)?)).await?;
    Ok(Json(registration))
}

/// Handler for `POST /api/events/{id}/registration`.
pub async fn register_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<RegistrationRequest>,
) -> Result<Json<Registration>, ApiError> {
    let input = RegistrationInput {
        participates: payload.participates,
        user_notes: non_blank(payload.user_notes),
        answers: payload.answers.filter(|v| !v.is_null()),
    };
    let user_id = user.id;
    let registration = with_conn(&state, move |conn| {
        Ok(upsert_registration(conn, user_id, id, &input)?)
    })
    .await?;

    tracing::info!(event_id = id, user_id, participates = registration.participates, "registration saved");
    Ok(Json(registration))
}

/// Handler for `GET /api/events/{id}/registrations`.
pub async fn list_registrations_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Registration>>, ApiError> {
    require_editor(&user)?;
    let registrations = with_conn(&state, move |conn| Ok(list_registrations(conn, id)?)).await?;
    Ok(Json(registrations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hidden_users_accept_strings_and_numbers() {
        let request: EventRequest = serde_json::from_value(json!({
            "title": "Summer party",
            "starts_at": "2030-07-01T20:00",
            "venue": "Julia Tours",
            "hidden_from_users": [3, "5"]
        }))
        .unwrap();
        let event = request.into_new().unwrap();
        assert_eq!(event.hidden_from_users, vec![3, 5]);
    }

    #[test]
    fn absent_hidden_list_is_kept_on_update() {
        let request: EventRequest = serde_json::from_value(json!({ "title": "Renamed" })).unwrap();
        let update = request.into_update().unwrap();
        assert_eq!(update.title.as_deref(), Some("Renamed"));
        assert_eq!(update.hidden_from_users, None);
        assert_eq!(update.starts_at, None);
    }

    #[test]
    fn new_event_requires_venue() {
        let request: EventRequest = serde_json::from_value(json!({
            "title": "Quiz night",
            "starts_at": "2030-07-01T20:00:00Z"
        }))
        .unwrap();
        assert!(matches!(request.into_new(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn banner_urls_are_reduced_to_file_names() {
        let request: EventRequest = serde_json::from_value(json!({
            "banner_image": "/uploads/7_abc_banner.png"
        }))
        .unwrap();
        let update = request.into_update().unwrap();
        assert_eq!(update.banner_image.as_deref(), Some("7_abc_banner.png"));

        assert_eq!(banner_file_name(Some("banner.png".into())).as_deref(), Some("banner.png"));
        assert_eq!(banner_file_name(Some("/uploads/".into())), None);
        assert_eq!(banner_file_name(Some("  ".into())), None);
    }

    #[test]
    fn registration_defaults_to_not_participating() {
        let request: RegistrationRequest = serde_json::from_value(json!({})).unwrap();
        assert!(!request.participates);
        assert_eq!(request.answers, None);
    }
}
