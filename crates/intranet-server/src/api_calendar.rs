//! Shared calendar: meetings and the on-call rota.

use crate::api::{message, non_blank, require_editor, with_conn, ApiError};
use crate::middleware::CurrentUser;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use intranet_calendar::{
    create_meeting, create_on_call_date, delete_meeting, delete_on_call_date, derive_calendar,
    list_meetings, list_on_call_dates, update_meeting, CalendarEntry, Meeting,
    MeetingUpdate, NewMeeting, OnCallDate,
};
use intranet_types::time::{parse_date, parse_timestamp};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Body of `POST /api/meetings` and `PUT /api/meetings/{id}`.
///
/// Field names follow the calendar widget, so `title`, `start` and `end`
/// are accepted next to the stored names.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MeetingRequest {
    #[serde(alias = "title")]
    pub topic: Option<String>,
    #[serde(alias = "start")]
    pub start_at: Option<String>,
    #[serde(alias = "end")]
    pub end_at: Option<String>,
    pub location: Option<String>,
    pub attendee_count: Option<i64>,
    pub video_link: Option<String>,
    pub convener: Option<String>,
    pub provider: Option<String>,
    pub needs_drinks: Option<bool>,
    pub food_request: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OnCallDateRequest {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub slot: Option<i64>,
}

fn timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    non_blank(value)
        .map(|v| parse_timestamp(&v))
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

impl MeetingRequest {
    fn into_new(self) -> Result<NewMeeting, ApiError> {
        let missing = || ApiError::BadRequest("topic, start and end are required".to_string());
        let topic = non_blank(self.topic).ok_or_else(missing)?;
        let start_at = timestamp(self.start_at)?.ok_or_else(missing)?;
        let end_at = timestamp(self.end_at)?.ok_or_else(missing)?;
        Ok(NewMeeting {
            topic,
            start_at,
            end_at,
            location: non_blank(self.location),
            attendee_count: self.attendee_count,
            video_link: non_blank(self.video_link),
            convener: non_blank(self.convener),
            provider: non_blank(self.provider),
            needs_drinks: self.needs_drinks.unwrap_or(false),
            food_request: non_blank(self.food_request),
        })
    }

    fn into_update(self) -> Result<MeetingUpdate, ApiError> {
        Ok(MeetingUpdate {
            topic: non_blank(self.topic),
            start_at: timestamp(self.start_at)?,
            end_at: timestamp(self.end_at)?,
            location: self.location,
            attendee_count: self.attendee_count,
            video_link: self.video_link,
            convener: self.convener,
            provider: self.provider,
            needs_drinks: self.needs_drinks,
            food_request: self.food_request,
        })
    }
}

/// Handler for `GET /api/calendar`.
pub async fn calendar_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<CalendarEntry>>, ApiError> {
    let entries = with_conn(&state, |conn| {
        let meetings = list_meetings(conn)?;
        let dates = list_on_call_dates(conn)?;
        Ok(derive_calendar(&meetings, &dates))
    })
    .await?;
    Ok(Json(entries))
}

/// Handler for `POST /api/meetings`.
pub async fn create_meeting_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<MeetingRequest>,
) -> Result<(StatusCode, Json<Meeting>), ApiError> {
    require_editor(&user)?;
    let meeting = payload.into_new()?;
    let creator_id = user.id;
    let created =
        with_conn(&state, move |conn| Ok(create_meeting(conn, creator_id, &meeting)?)).await?;

    tracing::info!(meeting_id = created.id, creator_id, "meeting created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Handler for `PUT /api/meetings/{id}`.
pub async fn update_meeting_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<MeetingRequest>,
) -> Result<Json<Meeting>, ApiError> {
    require_editor(&user)?;
    let update = payload.into_update()?;
    let meeting = with_conn(&state, move |conn| Ok(update_meeting(conn, id, &update)?)).await?;

    tracing::info!(meeting_id = id, editor = user.id, "meeting updated");
    Ok(Json(meeting))
}

/// Handler for `DELETE /api/meetings/{id}`.
pub async fn delete_meeting_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_editor(&user)?;
    with_conn(&state, move |conn| Ok(delete_meeting(conn, id)?)).await?;

    tracing::info!(meeting_id = id, deleted_by = user.id, "meeting deleted");
    Ok(message("meeting deleted"))
}

/// Handler for `GET /api/on-call-dates`.
pub async fn list_on_call_dates_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<OnCallDate>>, ApiError> {
    let dates = with_conn(&state, |conn| Ok(list_on_call_dates(conn)?)).await?;
    Ok(Json(dates))
}

/// Handler for `POST /api/on-call-dates`.
pub async fn create_on_call_date_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<OnCallDateRequest>,
) -> Result<(StatusCode, Json<OnCallDate>), ApiError> {
    if !user.actor().can_administer_site(&state.site) {
        return Err(ApiError::Forbidden(
            "only site administrators may edit the on-call calendar".to_string(),
        ));
    }
    let (date, slot) = match (non_blank(payload.date), payload.slot) {
        (Some(date), Some(slot)) => (date, slot),
        _ => {
            return Err(ApiError::BadRequest(
                "date and slot are required".to_string(),
            ))
        }
    };
    let date = parse_date(&date).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let created = with_conn(&state, move |conn| Ok(create_on_call_date(conn, date, slot)?)).await?;

    tracing::info!(date = %created.date, slot = created.slot, admin = user.id, "on-call date assigned");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Handler for `DELETE /api/on-call-dates/{id}`.
pub async fn delete_on_call_date_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !user.actor().can_administer_site(&state.site) {
        return Err(ApiError::Forbidden(
            "only site administrators may edit the on-call calendar".to_string(),
        ));
    }
    with_conn(&state, move |conn| Ok(delete_on_call_date(conn, id)?)).await?;

    tracing::info!(on_call_date_id = id, admin = user.id, "on-call date removed");
    Ok(message("on-call date deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_field_names_are_accepted() {
        let request: MeetingRequest = serde_json::from_value(serde_json::json!({
            "title": "Budget review",
            "start": "2025-03-04T10:00",
            "end": "2025-03-04 11:30",
            "needs_drinks": true
        }))
        .unwrap();
        let meeting = request.into_new().unwrap();
        assert_eq!(meeting.topic, "Budget review");
        assert!(meeting.needs_drinks);
        assert!(meeting.end_at > meeting.start_at);
    }

    #[test]
    fn new_meeting_requires_topic_and_times() {
        let request = MeetingRequest {
            topic: Some("Standup".into()),
            start_at: Some("2025-03-04T10:00:00Z".into()),
            ..MeetingRequest::default()
        };
        assert!(matches!(request.into_new(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn unparsable_time_is_a_bad_request() {
        let request = MeetingRequest {
            start_at: Some("next tuesday".into()),
            ..MeetingRequest::default()
        };
        assert!(matches!(request.into_update(), Err(ApiError::BadRequest(_))));
    }
}
