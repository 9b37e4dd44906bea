//! External contact book.

use crate::ContentError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub website: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub details: Option<String>,
}

/// Every field of a contact. Updates replace the stored row with this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContactInput {
    pub name: String,
    pub address: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub website: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub details: Option<String>,
}

impl ContactInput {
    fn validate(&self) -> Result<(), ContentError> {
        if self.name.trim().is_empty() {
            return Err(ContentError::MissingField("name"));
        }
        if self.phone.trim().is_empty() {
            return Err(ContentError::MissingField("phone"));
        }
        Ok(())
    }
}

const CONTACT_COLUMNS: &str =
    "id, name, address, phone, email, website, country, province, city, details";

fn map_row_to_contact(row: &Row) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        website: row.get(5)?,
        country: row.get(6)?,
        province: row.get(7)?,
        city: row.get(8)?,
        details: row.get(9)?,
    })
}

pub fn create_contact(conn: &Connection, input: &ContactInput) -> Result<Contact, ContentError> {
    input.validate()?;
    conn.execute(
        "INSERT INTO contacts (name, address, phone, email, website, country, province, city, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            input.name,
            input.address,
            input.phone,
            input.email,
            input.website,
            input.country,
            input.province,
            input.city,
            input.details
        ],
    )?;
    get_contact(conn, conn.last_insert_rowid())
}

pub fn get_contact(conn: &Connection, id: i64) -> Result<Contact, ContentError> {
    conn.query_row(
        &format!("SELECT {} FROM contacts WHERE id = ?1", CONTACT_COLUMNS),
        [id],
        map_row_to_contact,
    )
    .optional()?
    .ok_or(ContentError::NotFound { kind: "contact", id })
}

/// All contacts, alphabetical by name.
pub fn list_contacts(conn: &Connection) -> Result<Vec<Contact>, ContentError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM contacts ORDER BY name COLLATE NOCASE ASC, id ASC",
        CONTACT_COLUMNS
    ))?;
    let rows = stmt.query_map([], map_row_to_contact)?;
    let mut contacts = Vec::new();
    for row in rows {
        contacts.push(row?);
    }
    Ok(contacts)
}

pub fn update_contact(
    conn: &Connection,
    id: i64,
    input: &ContactInput,
) -> Result<Contact, ContentError> {
    input.validate()?;
    let count = conn.execute(
        "UPDATE contacts SET name = ?1, address = ?2, phone = ?3, email = ?4, website = ?5,
            country = ?6, province = ?7, city = ?8, details = ?9
         WHERE id = ?10",
        params![
            input.name,
            input.address,
            input.phone,
            input.email,
            input.website,
            input.country,
            input.province,
            input.city,
            input.details,
            id
        ],
    )?;
    if count == 0 {
        return Err(ContentError::NotFound { kind: "contact", id });
    }
    get_contact(conn, id)
}

pub fn delete_contact(conn: &Connection, id: i64) -> Result<(), ContentError> {
    let count = conn.execute("DELETE FROM contacts WHERE id = ?1", [id])?;
    if count == 0 {
        return Err(ContentError::NotFound { kind: "contact", id });
    }
    Ok(())
}
