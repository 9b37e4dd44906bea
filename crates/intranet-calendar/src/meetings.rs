//! Room bookings and meetings shown on the shared calendar.

use crate::CalendarError;
use chrono::{DateTime, Utc};
use intranet_types::time::format_timestamp;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

/// Shown as the creator once the account is gone.
pub const DELETED_CREATOR: &str = "Deleted user";

const MEETING_SELECT: &str = "SELECT m.id, m.topic, m.start_at, m.end_at, m.location,
        m.attendee_count, m.video_link, m.convener, m.provider, m.needs_drinks,
        m.food_request, m.creator_id, u.id, u.first_name, u.last_name, u.username
    FROM meetings m LEFT JOIN users u ON u.id = m.creator_id";

/// A meeting, serialized in the shape the calendar widget expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meeting {
    pub id: i64,
    #[serde(rename = "title")]
    pub topic: String,
    #[serde(rename = "start")]
    pub start_at: String,
    #[serde(rename = "end")]
    pub end_at: String,
    pub location: Option<String>,
    pub attendee_count: Option<i64>,
    pub video_link: Option<String>,
    pub convener: Option<String>,
    pub provider: Option<String>,
    pub needs_drinks: bool,
    pub food_request: Option<String>,
    #[serde(skip)]
    pub creator_id: Option<i64>,
    /// Display name of whoever booked it.
    pub creator: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMeeting {
    pub topic: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: Option<String>,
    pub attendee_count: Option<i64>,
    pub video_link: Option<String>,
    pub convener: Option<String>,
    pub provider: Option<String>,
    pub needs_drinks: bool,
    pub food_request: Option<String>,
}

/// Partial edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingUpdate {
    pub topic: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub attendee_count: Option<i64>,
    pub video_link: Option<String>,
    pub convener: Option<String>,
    pub provider: Option<String>,
    pub needs_drinks: Option<bool>,
    pub food_request: Option<String>,
}

fn creator_name(
    id: Option<i64>,
    first: Option<String>,
    last: Option<String>,
    username: Option<String>,
) -> String {
    if id.is_none() {
        return DELETED_CREATOR.to_string();
    }
    match first {
        Some(first) => format!("{} {}", first, last.unwrap_or_default())
            .trim()
            .to_string(),
        None => username.unwrap_or_else(|| DELETED_CREATOR.to_string()),
    }
}

fn map_row_to_meeting(row: &Row) -> rusqlite::Result<Meeting> {
    Ok(Meeting {
        id: row.get(0)?,
        topic: row.get(1)?,
        start_at: row.get(2)?,
        end_at: row.get(3)?,
        location: row.get(4)?,
        attendee_count: row.get(5)?,
        video_link: row.get(6)?,
        convener: row.get(7)?,
        provider: row.get(8)?,
        needs_drinks: row.get(9)?,
        food_request: row.get(10)?,
        creator_id: row.get(11)?,
        creator: creator_name(row.get(12)?, row.get(13)?, row.get(14)?, row.get(15)?),
    })
}

pub fn create_meeting(
    conn: &Connection,
    creator_id: i64,
    meeting: &NewMeeting,
) -> Result<Meeting, CalendarError> {
    if meeting.topic.trim().is_empty() {
        return Err(CalendarError::MissingField("topic"));
    }
    if meeting.end_at < meeting.start_at {
        return Err(CalendarError::EndBeforeStart);
    }

    conn.execute(
        "INSERT INTO meetings (topic, start_at, end_at, location, attendee_count, video_link,
            convener, provider, needs_drinks, food_request, creator_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            meeting.topic,
            format_timestamp(&meeting.start_at),
            format_timestamp(&meeting.end_at),
            meeting.location,
            meeting.attendee_count,
            meeting.video_link,
            meeting.convener,
            meeting.provider,
            meeting.needs_drinks,
            meeting.food_request,
            creator_id
        ],
    )?;
    get_meeting(conn, conn.last_insert_rowid())
}

pub fn get_meeting(conn: &Connection, id: i64) -> Result<Meeting, CalendarError> {
    conn.query_row(
        &format!("{} WHERE m.id = ?1", MEETING_SELECT),
        [id],
        map_row_to_meeting,
    )
    .optional()?
    .ok_or(CalendarError::NotFound { kind: "meeting", id })
}

/// Every meeting, earliest first.
pub fn list_meetings(conn: &Connection) -> Result<Vec<Meeting>, CalendarError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY m.start_at ASC, m.id ASC", MEETING_SELECT))?;
    let rows = stmt.query_map([], map_row_to_meeting)?;
    let mut meetings = Vec::new();
    for row in rows {
        meetings.push(row?);
    }
    Ok(meetings)
}

/// Applies `update` and re-checks that the meeting does not end before it
/// starts.
pub fn update_meeting(
    conn: &Connection,
    id: i64,
    update: &MeetingUpdate,
) -> Result<Meeting, CalendarError> {
    let tx = conn.unchecked_transaction()?;
    let current = get_meeting(&tx, id)?;

    let start_at = update
        .start_at
        .as_ref()
        .map(format_timestamp)
        .unwrap_or(current.start_at);
    let end_at = update
        .end_at
        .as_ref()
        .map(format_timestamp)
        .unwrap_or(current.end_at);
    // Both are stored in the same UTC layout, so text order is time order.
    if end_at < start_at {
        return Err(CalendarError::EndBeforeStart);
    }
    if matches!(&update.topic, Some(t) if t.trim().is_empty()) {
        return Err(CalendarError::MissingField("topic"));
    }

    tx.execute(
        "UPDATE meetings SET
            topic = COALESCE(?1, topic), start_at = ?2, end_at = ?3,
            location = COALESCE(?4, location),
            attendee_count = COALESCE(?5, attendee_count),
            video_link = COALESCE(?6, video_link),
            convener = COALESCE(?7, convener),
            provider = COALESCE(?8, provider),
            needs_drinks = COALESCE(?9, needs_drinks),
            food_request = COALESCE(?10, food_request)
         WHERE id = ?11",
        params![
            update.topic,
            start_at,
            end_at,
            update.location,
            update.attendee_count,
            update.video_link,
            update.convener,
            update.provider,
            update.needs_drinks,
            update.food_request,
            id
        ],
    )?;
    tx.commit()?;
    get_meeting(conn, id)
}

pub fn delete_meeting(conn: &Connection, id: i64) -> Result<(), CalendarError> {
    let count = conn.execute("DELETE FROM meetings WHERE id = ?1", [id])?;
    if count == 0 {
        return Err(CalendarError::NotFound { kind: "meeting", id });
    }
    Ok(())
}
