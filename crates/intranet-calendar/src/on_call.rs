//! Dated on-call rota assignments and company holidays.

use crate::CalendarError;
use chrono::NaiveDate;
use intranet_db::is_constraint_violation;
use intranet_types::time::{format_date, parse_date};
use intranet_types::OnCallSlot;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnCallDate {
    pub id: i64,
    pub date: NaiveDate,
    /// Rota group `1..=4`, or `5` for a holiday.
    pub slot: u8,
}

impl OnCallDate {
    pub fn kind(&self) -> Option<OnCallSlot> {
        OnCallSlot::from_number(i64::from(self.slot))
    }
}

fn map_row_to_on_call_date(row: &Row) -> rusqlite::Result<OnCallDate> {
    let date: String = row.get(1)?;
    let date = parse_date(&date).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(OnCallDate {
        id: row.get(0)?,
        date,
        slot: row.get(2)?,
    })
}

/// Assigns `slot` to `date`. Each date holds at most one assignment.
pub fn create_on_call_date(
    conn: &Connection,
    date: NaiveDate,
    slot: i64,
) -> Result<OnCallDate, CalendarError> {
    let slot = OnCallSlot::from_number(slot).ok_or(CalendarError::InvalidSlot(slot))?;
    let day = format_date(&date);
    conn.execute(
        "INSERT INTO on_call_dates (date, slot) VALUES (?1, ?2)",
        params![day, slot.number()],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            CalendarError::DuplicateDate(day.clone())
        } else {
            CalendarError::Database(e)
        }
    })?;
    Ok(OnCallDate {
        id: conn.last_insert_rowid(),
        date,
        slot: slot.number(),
    })
}

pub fn get_on_call_date(conn: &Connection, id: i64) -> Result<OnCallDate, CalendarError> {
    conn.query_row(
        "SELECT id, date, slot FROM on_call_dates WHERE id = ?1",
        [id],
        map_row_to_on_call_date,
    )
    .optional()?
    .ok_or(CalendarError::NotFound {
        kind: "on-call date",
        id,
    })
}

/// Every assignment, by date.
pub fn list_on_call_dates(conn: &Connection) -> Result<Vec<OnCallDate>, CalendarError> {
    let mut stmt = conn.prepare("SELECT id, date, slot FROM on_call_dates ORDER BY date ASC")?;
    let rows = stmt.query_map([], map_row_to_on_call_date)?;
    let mut dates = Vec::new();
    for row in rows {
        dates.push(row?);
    }
    Ok(dates)
}

pub fn delete_on_call_date(conn: &Connection, id: i64) -> Result<(), CalendarError> {
    let count = conn.execute("DELETE FROM on_call_dates WHERE id = ?1", [id])?;
    if count == 0 {
        return Err(CalendarError::NotFound {
            kind: "on-call date",
            id,
        });
    }
    Ok(())
}
