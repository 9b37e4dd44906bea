//! Event sign-ups. One row per account and event, rewritten on every
//! submission.

use crate::events::{ensure_event_exists, PersonName};
use crate::CalendarError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

const REGISTRATION_SELECT: &str = "SELECT r.id, r.user_id, r.event_id, r.participates,
        r.user_notes, r.answers, u.first_name, u.last_name
    FROM event_registrations r JOIN users u ON u.id = r.user_id";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
    pub participates: bool,
    pub user_notes: Option<String>,
    /// Answers to the event's extra questions.
    pub answers: Option<Value>,
    pub user: PersonName,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationInput {
    pub participates: bool,
    pub user_notes: Option<String>,
    pub answers: Option<Value>,
}

fn map_row_to_registration(row: &Row) -> rusqlite::Result<Registration> {
    let answers: Option<String> = row.get(5)?;
    let answers = answers
        .map(|a| serde_json::from_str(&a))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(Registration {
        id: row.get(0)?,
        user_id: row.get(1)?,
        event_id: row.get(2)?,
        participates: row.get(3)?,
        user_notes: row.get(4)?,
        answers,
        user: PersonName {
            first_name: row.get(6)?,
            last_name: row.get(7)?,
        },
    })
}

/// Creates or overwrites the registration of `user_id` for `event_id`.
pub fn upsert_registration(
    conn: &Connection,
    user_id: i64,
    event_id: i64,
    input: &RegistrationInput,
) -> Result<Registration, CalendarError> {
    ensure_event_exists(conn, event_id)?;
    let answers = input
        .answers
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO event_registrations (user_id, event_id, participates, user_notes, answers)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (user_id, event_id) DO UPDATE SET
            participates = excluded.participates,
            user_notes = excluded.user_notes,
            answers = excluded.answers",
        params![user_id, event_id, input.participates, input.user_notes, answers],
    )?;

    get_registration(conn, user_id, event_id)?.ok_or(CalendarError::NotFound {
        kind: "registration",
        id: event_id,
    })
}

pub fn get_registration(
    conn: &Connection,
    user_id: i64,
    event_id: i64,
) -> Result<Option<Registration>, CalendarError> {
    let registration = conn
        .query_row(
            &format!(
                "{} WHERE r.user_id = ?1 AND r.event_id = ?2",
                REGISTRATION_SELECT
            ),
            params![user_id, event_id],
            map_row_to_registration,
        )
        .optional()?;
    Ok(registration)
}

/// Everyone who answered for `event_id`, in submission order.
pub fn list_registrations(
    conn: &Connection,
    event_id: i64,
) -> Result<Vec<Registration>, CalendarError> {
    ensure_event_exists(conn, event_id)?;
    let mut stmt = conn.prepare(&format!(
        "{} WHERE r.event_id = ?1 ORDER BY r.id ASC",
        REGISTRATION_SELECT
    ))?;
    let rows = stmt.query_map([event_id], map_row_to_registration)?;
    let mut registrations = Vec::new();
    for row in rows {
        registrations.push(row?);
    }
    Ok(registrations)
}

/// Ids of every event `user_id` has a registration for.
pub fn registered_event_ids(conn: &Connection, user_id: i64) -> Result<HashSet<i64>, CalendarError> {
    let mut stmt = conn.prepare("SELECT event_id FROM event_registrations WHERE user_id = ?1")?;
    let rows = stmt.query_map([user_id], |row| row.get(0))?;
    let mut ids = HashSet::new();
    for row in rows {
        ids.insert(row?);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{create_event, delete_event, NewEvent};
    use crate::tests::{setup_db, user};
    use chrono::{Duration, Utc};

    fn event(conn: &Connection, creator: i64) -> i64 {
        create_event(
            conn,
            creator,
            &NewEvent {
                title: "Party".into(),
                banner_image: None,
                location_text: None,
                map_url: None,
                starts_at: Utc::now() + Duration::days(2),
                details: None,
                venue: "Julia Tours".into(),
                form_schema: None,
                hidden_from_users: Vec::new(),
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn second_submission_overwrites_the_first() {
        let conn = setup_db();
        let ana = user(&conn, "ana@example.com", Some("Ana"));
        let event_id = event(&conn, ana);

        let first = upsert_registration(
            &conn,
            ana,
            event_id,
            &RegistrationInput {
                participates: true,
                user_notes: Some("vegetarian".into()),
                answers: Some(serde_json::json!({"menu": "veggie"})),
            },
        )
        .unwrap();
        let second = upsert_registration(&conn, ana, event_id, &RegistrationInput::default()).unwrap();

        assert_eq!(first.id, second.id);
        assert!(!second.participates);
        assert_eq!(second.user_notes, None);
        assert_eq!(second.answers, None);
        assert_eq!(list_registrations(&conn, event_id).unwrap().len(), 1);
    }

    #[test]
    fn unknown_event_is_not_found() {
        let conn = setup_db();
        let ana = user(&conn, "ana@example.com", None);
        assert!(matches!(
            upsert_registration(&conn, ana, 99, &RegistrationInput::default()),
            Err(CalendarError::NotFound { kind: "event", id: 99 })
        ));
        assert!(matches!(
            list_registrations(&conn, 99),
            Err(CalendarError::NotFound { kind: "event", .. })
        ));
    }

    #[test]
    fn own_registration_and_registered_ids() {
        let conn = setup_db();
        let ana = user(&conn, "ana@example.com", Some("Ana"));
        let beto = user(&conn, "beto@example.com", Some("Beto"));
        let e1 = event(&conn, ana);
        let e2 = event(&conn, ana);

        upsert_registration(&conn, ana, e1, &RegistrationInput::default()).unwrap();
        assert!(get_registration(&conn, beto, e1).unwrap().is_none());
        let mine = get_registration(&conn, ana, e1).unwrap().unwrap();
        assert_eq!(mine.user.first_name.as_deref(), Some("Ana"));

        let ids = registered_event_ids(&conn, ana).unwrap();
        assert!(ids.contains(&e1));
        assert!(!ids.contains(&e2));
    }

    #[test]
    fn deleting_the_event_removes_registrations() {
        let conn = setup_db();
        let ana = user(&conn, "ana@example.com", None);
        let e1 = event(&conn, ana);
        upsert_registration(&conn, ana, e1, &RegistrationInput::default()).unwrap();
        delete_event(&conn, e1).unwrap();
        assert!(registered_event_ids(&conn, ana).unwrap().is_empty());
    }
}
