//! Files attached to posts and announcements.
//!
//! The file itself lives in the upload directory; a row only records its
//! stored name and how to present it.

use crate::ContentError;
use intranet_db::is_constraint_violation;
use rusqlite::{params, Connection, Row};
use serde::Serialize;

/// MIME type recorded when the client does not send one.
pub const DEFAULT_MIMETYPE: &str = "application/octet-stream";

/// URL prefix under which uploaded files are served.
pub const UPLOADS_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub original_filename: String,
    /// Public link, `/uploads/<stored name>`.
    pub url: String,
    pub mimetype: String,
}

/// An attachment about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub original_filename: String,
    pub saved_filename: String,
    pub mimetype: String,
}

impl NewAttachment {
    /// Builds an attachment from the `{name, url}` pair the upload endpoint
    /// handed back. The stored name is the last path segment of `url`.
    pub fn from_link(name: &str, url: &str, mimetype: Option<&str>) -> Result<Self, ContentError> {
        let saved = url.rsplit('/').next().unwrap_or_default().trim();
        if saved.is_empty() {
            return Err(ContentError::MissingField("attachment url"));
        }
        let original = if name.trim().is_empty() { saved } else { name.trim() };
        Ok(Self {
            original_filename: original.to_string(),
            saved_filename: saved.to_string(),
            mimetype: mimetype
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(DEFAULT_MIMETYPE)
                .to_string(),
        })
    }
}

/// What an attachment hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Post(i64),
    Announcement(i64),
}

impl Owner {
    fn column(self) -> &'static str {
        match self {
            Self::Post(_) => "post_id",
            Self::Announcement(_) => "announcement_id",
        }
    }

    fn id(self) -> i64 {
        match self {
            Self::Post(id) | Self::Announcement(id) => id,
        }
    }
}

pub(crate) fn insert_all(
    conn: &Connection,
    owner: Owner,
    attachments: &[NewAttachment],
) -> Result<(), ContentError> {
    let sql = format!(
        "INSERT INTO attachments (original_filename, saved_filename, mimetype, {})
         VALUES (?1, ?2, ?3, ?4)",
        owner.column()
    );
    for att in attachments {
        conn.execute(
            &sql,
            params![att.original_filename, att.saved_filename, att.mimetype, owner.id()],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ContentError::AttachmentInUse(att.saved_filename.clone())
            } else {
                ContentError::Database(e)
            }
        })?;
    }
    Ok(())
}

pub(crate) fn delete_all(conn: &Connection, owner: Owner) -> Result<(), ContentError> {
    conn.execute(
        &format!("DELETE FROM attachments WHERE {} = ?1", owner.column()),
        [owner.id()],
    )?;
    Ok(())
}

/// Attachments of `owner`, in the order they were added.
pub fn list_attachments(conn: &Connection, owner: Owner) -> Result<Vec<Attachment>, ContentError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, original_filename, saved_filename, mimetype
         FROM attachments WHERE {} = ?1 ORDER BY id ASC",
        owner.column()
    ))?;
    let rows = stmt.query_map([owner.id()], map_row_to_attachment)?;
    let mut attachments = Vec::new();
    for row in rows {
        attachments.push(row?);
    }
    Ok(attachments)
}

fn map_row_to_attachment(row: &Row) -> rusqlite::Result<Attachment> {
    let saved: String = row.get(2)?;
    Ok(Attachment {
        id: row.get(0)?,
        original_filename: row.get(1)?,
        url: format!("{}{}", UPLOADS_PREFIX, saved),
        mimetype: row.get(3)?,
    })
}
