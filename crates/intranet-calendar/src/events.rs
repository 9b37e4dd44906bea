//! Company events with per-branch visibility.
//!
//! An event belongs to a venue: a branch name, or the company-wide location
//! that every branch sees. Individual accounts can additionally be hidden
//! from an event.

use crate::CalendarError;
use chrono::{DateTime, Utc};
use intranet_types::time::format_timestamp;
use intranet_types::Actor;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::Value;

const EVENT_SELECT: &str = "SELECT e.id, e.title, e.banner_image, e.location_text, e.map_url,
        e.starts_at, e.details, e.venue, e.form_schema, e.hidden_from_users, e.creator_id,
        u.id, u.first_name, u.last_name
    FROM events e LEFT JOIN users u ON u.id = e.creator_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonName {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    /// Stored file name of the banner in the upload directory.
    pub banner_image: Option<String>,
    pub location_text: Option<String>,
    pub map_url: Option<String>,
    pub starts_at: String,
    pub details: Option<String>,
    /// Branch the event is held for, or the company-wide location.
    pub venue: String,
    /// Extra registration questions, opaque to the server.
    pub form_schema: Option<Value>,
    pub hidden_from_users: Vec<i64>,
    #[serde(skip)]
    pub creator_id: Option<i64>,
    pub creator: Option<PersonName>,
}

/// An event as listed for one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventListing {
    #[serde(flatten)]
    pub event: Event,
    pub is_registered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub banner_image: Option<String>,
    pub location_text: Option<String>,
    pub map_url: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub details: Option<String>,
    pub venue: String,
    pub form_schema: Option<Value>,
    pub hidden_from_users: Vec<i64>,
}

/// Partial edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub banner_image: Option<String>,
    pub location_text: Option<String>,
    pub map_url: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub details: Option<String>,
    pub venue: Option<String>,
    pub form_schema: Option<Value>,
    pub hidden_from_users: Option<Vec<i64>>,
}

impl Event {
    /// Whether `actor` gets to see this event in listings.
    pub fn is_visible_to(&self, actor: &Actor, company_location: &str) -> bool {
        if actor.is_superuser() {
            return true;
        }
        let for_actor = self.venue == company_location
            || actor.branch.as_deref() == Some(self.venue.as_str());
        for_actor && !self.hidden_from_users.contains(&actor.user_id)
    }
}

/// Keeps the events `actor` may see, preserving order.
pub fn visible_to(events: Vec<Event>, actor: &Actor, company_location: &str) -> Vec<Event> {
    events
        .into_iter()
        .filter(|e| e.is_visible_to(actor, company_location))
        .collect()
}

fn json_column(idx: usize, text: Option<String>) -> rusqlite::Result<Option<Value>> {
    text.map(|t| serde_json::from_str(&t))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn map_row_to_event(row: &Row) -> rusqlite::Result<Event> {
    let hidden: String = row.get(9)?;
    let hidden_from_users: Vec<i64> = serde_json::from_str(&hidden).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let creator_row: Option<i64> = row.get(11)?;
    let creator = match creator_row {
        Some(_) => Some(PersonName {
            first_name: row.get(12)?,
            last_name: row.get(13)?,
        }),
        None => None,
    };

    Ok(Event {
        id: row.get(0)?,
        title: row.get(1)?,
        banner_image: row.get(2)?,
        location_text: row.get(3)?,
        map_url: row.get(4)?,
        starts_at: row.get(5)?,
        details: row.get(6)?,
        venue: row.get(7)?,
        form_schema: json_column(8, row.get(8)?)?,
        hidden_from_users,
        creator_id: row.get(10)?,
        creator,
    })
}

fn to_json_text(value: &Option<Value>) -> Result<Option<String>, CalendarError> {
    Ok(value.as_ref().map(serde_json::to_string).transpose()?)
}

pub fn create_event(
    conn: &Connection,
    creator_id: i64,
    event: &NewEvent,
) -> Result<Event, CalendarError> {
    if event.title.trim().is_empty() {
        return Err(CalendarError::MissingField("title"));
    }
    if event.venue.trim().is_empty() {
        return Err(CalendarError::MissingField("venue"));
    }

    conn.execute(
        "INSERT INTO events (title, banner_image, location_text, map_url, starts_at, details,
            venue, form_schema, hidden_from_users, creator_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            event.title,
            event.banner_image,
            event.location_text,
            event.map_url,
            format_timestamp(&event.starts_at),
            event.details,
            event.venue,
            to_json_text(&event.form_schema)?,
            serde_json::to_string(&event.hidden_from_users)?,
            creator_id
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(event_id = id, venue = %event.venue, "event created");
    get_event(conn, id)
}

pub fn get_event(conn: &Connection, id: i64) -> Result<Event, CalendarError> {
    conn.query_row(
        &format!("{} WHERE e.id = ?1", EVENT_SELECT),
        [id],
        map_row_to_event,
    )
    .optional()?
    .ok_or(CalendarError::NotFound { kind: "event", id })
}

pub(crate) fn ensure_event_exists(conn: &Connection, id: i64) -> Result<(), CalendarError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(CalendarError::NotFound { kind: "event", id });
    }
    Ok(())
}

/// Events starting at or after `now`, soonest first. No visibility
/// filtering; see [`visible_to`].
pub fn list_upcoming(conn: &Connection, now: &DateTime<Utc>) -> Result<Vec<Event>, CalendarError> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE e.starts_at >= ?1 ORDER BY e.starts_at ASC, e.id ASC",
        EVENT_SELECT
    ))?;
    let rows = stmt.query_map([format_timestamp(now)], map_row_to_event)?;
    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

pub fn update_event(
    conn: &Connection,
    id: i64,
    update: &EventUpdate,
) -> Result<Event, CalendarError> {
    if matches!(&update.title, Some(t) if t.trim().is_empty()) {
        return Err(CalendarError::MissingField("title"));
    }
    if matches!(&update.venue, Some(v) if v.trim().is_empty()) {
        return Err(CalendarError::MissingField("venue"));
    }

    let form_schema = match &update.form_schema {
        Some(v) => Some(serde_json::to_string(v)?),
        None => None,
    };
    let hidden = update
        .hidden_from_users
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let count = conn.execute(
        "UPDATE events SET
            title = COALESCE(?1, title),
            banner_image = COALESCE(?2, banner_image),
            location_text = COALESCE(?3, location_text),
            map_url = COALESCE(?4, map_url),
            starts_at = COALESCE(?5, starts_at),
            details = COALESCE(?6, details),
            venue = COALESCE(?7, venue),
            form_schema = COALESCE(?8, form_schema),
            hidden_from_users = COALESCE(?9, hidden_from_users)
         WHERE id = ?10",
        params![
            update.title,
            update.banner_image,
            update.location_text,
            update.map_url,
            update.starts_at.as_ref().map(format_timestamp),
            update.details,
            update.venue,
            form_schema,
            hidden,
            id
        ],
    )?;
    if count == 0 {
        return Err(CalendarError::NotFound { kind: "event", id });
    }
    get_event(conn, id)
}

/// Deletes an event with its registrations and returns what was removed,
/// so the caller can clean up the banner file.
pub fn delete_event(conn: &Connection, id: i64) -> Result<Event, CalendarError> {
    let event = get_event(conn, id)?;
    conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
    Ok(event)
}
