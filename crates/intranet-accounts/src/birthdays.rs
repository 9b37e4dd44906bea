//! Whose birthday is it, and which GIF they got.

use crate::store::{map_row_to_user, User, USER_COLUMNS};
use crate::AccountError;
use chrono::{Datelike, NaiveDate};
use intranet_types::time::format_date;
use rusqlite::{params, Connection, OptionalExtension};

fn month_day(date: &NaiveDate) -> String {
    format!("{:02}-{:02}", date.month(), date.day())
}

/// Accounts whose birthday falls on `date`, ordered by first name.
///
/// In years without a 29 February, those born on it are listed on the 28th.
pub fn birthdays_on(conn: &Connection, date: NaiveDate) -> Result<Vec<User>, AccountError> {
    let today = month_day(&date);
    let leap_day = if date.month() == 2 && date.day() == 28 && !date.leap_year() {
        "02-29".to_string()
    } else {
        today.clone()
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users
         WHERE birth_date IS NOT NULL AND strftime('%m-%d', birth_date) IN (?1, ?2)
         ORDER BY first_name COLLATE NOCASE ASC, id ASC",
        USER_COLUMNS
    ))?;
    let rows = stmt.query_map(params![today, leap_day], map_row_to_user)?;
    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

pub fn get_birthday_gif(
    conn: &Connection,
    user_id: i64,
    date: NaiveDate,
) -> Result<Option<String>, AccountError> {
    let url = conn
        .query_row(
            "SELECT gif_url FROM birthday_gifs WHERE user_id = ?1 AND date = ?2",
            params![user_id, format_date(&date)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(url)
}

/// Stores `gif_url` unless a GIF is already recorded for that day, and
/// returns whichever URL ends up stored. Two concurrent first visits agree
/// on a single GIF.
pub fn insert_birthday_gif_if_absent(
    conn: &Connection,
    user_id: i64,
    date: NaiveDate,
    gif_url: &str,
) -> Result<String, AccountError> {
    let day = format_date(&date);
    conn.execute(
        "INSERT OR IGNORE INTO birthday_gifs (user_id, date, gif_url) VALUES (?1, ?2, ?3)",
        params![user_id, day, gif_url],
    )?;
    let stored = conn.query_row(
        "SELECT gif_url FROM birthday_gifs WHERE user_id = ?1 AND date = ?2",
        params![user_id, day],
        |row| row.get(0),
    )?;
    Ok(stored)
}

/// Swaps the GIF already recorded for that day.
///
/// # Errors
///
/// `AccountError::NoBirthdayGif` if nothing is recorded yet.
pub fn replace_birthday_gif(
    conn: &Connection,
    user_id: i64,
    date: NaiveDate,
    gif_url: &str,
) -> Result<(), AccountError> {
    let count = conn.execute(
        "UPDATE birthday_gifs SET gif_url = ?1 WHERE user_id = ?2 AND date = ?3",
        params![gif_url, user_id, format_date(&date)],
    )?;
    if count == 0 {
        return Err(AccountError::NoBirthdayGif { user_id });
    }
    Ok(())
}
