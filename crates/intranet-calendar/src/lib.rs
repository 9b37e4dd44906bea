//! Calendar data for the intranet: meetings, the on-call rota, company
//! events and their registrations.
//!
//! [`derive_calendar`] merges meetings and on-call dates into the single
//! feed the front end renders; it is pure so the layout rules can be tested
//! without a database.

mod display;
mod error;
pub mod events;
pub mod meetings;
pub mod on_call;
pub mod registrations;

pub use display::{derive_calendar, CalendarEntry, OnCallEntry};
pub use error::CalendarError;
pub use events::{
    create_event, delete_event, get_event, list_upcoming, update_event, visible_to, Event,
    EventListing, EventUpdate, NewEvent, PersonName,
};
pub use meetings::{
    create_meeting, delete_meeting, get_meeting, list_meetings, update_meeting, Meeting,
    MeetingUpdate, NewMeeting,
};
pub use on_call::{
    create_on_call_date, delete_on_call_date, get_on_call_date, list_on_call_dates, OnCallDate,
};
pub use registrations::{
    get_registration, list_registrations, registered_event_ids, upsert_registration,
    Registration, RegistrationInput,
};

#[cfg(test)]
pub(crate) mod tests {
    use intranet_db::run_migrations;
    use rusqlite::{params, Connection};

    pub fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("failed to enable foreign keys");
        run_migrations(&conn).expect("failed to run migrations");
        conn
    }

    pub fn user(conn: &Connection, username: &str, first_name: Option<&str>) -> i64 {
        conn.execute(
            "INSERT INTO users (username, password_hash, first_name) VALUES (?1, 'x', ?2)",
            params![username, first_name],
        )
        .expect("failed to insert user");
        conn.last_insert_rowid()
    }
}
