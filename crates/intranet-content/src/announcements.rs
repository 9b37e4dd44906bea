//! Company-wide announcements, read a page at a time.

use crate::attachments::{insert_all, list_attachments, Owner};
use crate::{Attachment, AuthorSummary, ContentError, NewAttachment};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

pub const ANNOUNCEMENTS_PER_PAGE: i64 = 10;

const ANNOUNCEMENT_SELECT: &str = "SELECT a.id, a.subject, a.content, a.created_at, a.author_id,
        u.id, u.first_name, u.last_name, u.profile_image
    FROM announcements a LEFT JOIN users u ON u.id = a.author_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Announcement {
    pub id: i64,
    pub subject: String,
    pub content: String,
    pub created_at: String,
    #[serde(skip)]
    pub author_id: Option<i64>,
    pub author: AuthorSummary,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAnnouncement {
    pub subject: String,
    pub content: String,
    pub attachments: Vec<NewAttachment>,
}

/// One page of announcements, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnouncementPage {
    pub announcements: Vec<Announcement>,
    pub total_pages: i64,
    pub current_page: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

fn map_row_to_announcement(row: &Row) -> rusqlite::Result<Announcement> {
    Ok(Announcement {
        id: row.get(0)?,
        subject: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        author_id: row.get(4)?,
        author: AuthorSummary::from_joined_row(row, 5)?,
        attachments: Vec::new(),
    })
}

pub fn create_announcement(
    conn: &Connection,
    author_id: i64,
    announcement: &NewAnnouncement,
) -> Result<Announcement, ContentError> {
    if announcement.subject.trim().is_empty() {
        return Err(ContentError::MissingField("subject"));
    }
    if announcement.content.trim().is_empty() {
        return Err(ContentError::MissingField("content"));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO announcements (subject, content, author_id) VALUES (?1, ?2, ?3)",
        params![announcement.subject, announcement.content, author_id],
    )?;
    let id = tx.last_insert_rowid();
    insert_all(&tx, Owner::Announcement(id), &announcement.attachments)?;
    tx.commit()?;

    get_announcement(conn, id)
}

pub fn get_announcement(conn: &Connection, id: i64) -> Result<Announcement, ContentError> {
    let mut announcement = conn
        .query_row(
            &format!("{} WHERE a.id = ?1", ANNOUNCEMENT_SELECT),
            [id],
            map_row_to_announcement,
        )
        .optional()?
        .ok_or(ContentError::NotFound {
            kind: "announcement",
            id,
        })?;
    announcement.attachments = list_attachments(conn, Owner::Announcement(id))?;
    Ok(announcement)
}

/// Returns page `page` (1-based; anything below 1 reads as 1). Pages past
/// the end come back empty with the real page count.
pub fn list_announcements(conn: &Connection, page: i64) -> Result<AnnouncementPage, ContentError> {
    let page = page.max(1);
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM announcements", [], |row| row.get(0))?;
    let total_pages = (total + ANNOUNCEMENTS_PER_PAGE - 1) / ANNOUNCEMENTS_PER_PAGE;

    let mut stmt = conn.prepare(&format!(
        "{} ORDER BY a.created_at DESC, a.id DESC LIMIT ?1 OFFSET ?2",
        ANNOUNCEMENT_SELECT
    ))?;
    let offset = (page - 1).saturating_mul(ANNOUNCEMENTS_PER_PAGE);
    let rows = stmt.query_map(
        params![ANNOUNCEMENTS_PER_PAGE, offset],
        map_row_to_announcement,
    )?;
    let mut announcements = Vec::new();
    for row in rows {
        let mut announcement = row?;
        announcement.attachments = list_attachments(conn, Owner::Announcement(announcement.id))?;
        announcements.push(announcement);
    }

    Ok(AnnouncementPage {
        announcements,
        total_pages,
        current_page: page,
        has_next: page < total_pages,
        has_prev: page > 1,
    })
}

pub fn delete_announcement(conn: &Connection, id: i64) -> Result<(), ContentError> {
    let count = conn.execute("DELETE FROM announcements WHERE id = ?1", [id])?;
    if count == 0 {
        return Err(ContentError::NotFound {
            kind: "announcement",
            id,
        });
    }
    Ok(())
}
