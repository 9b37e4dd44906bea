use rusqlite::Row;
use serde::Serialize;

/// Who wrote a post or announcement, as shown next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorSummary {
    /// `None` once the account has been deleted.
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image: String,
}

impl AuthorSummary {
    /// Placeholder for content whose author account no longer exists.
    pub fn deleted() -> Self {
        Self {
            id: None,
            first_name: Some("Deleted".to_string()),
            last_name: Some("User".to_string()),
            profile_image: "default.png".to_string(),
        }
    }

    /// Reads `u.id, u.first_name, u.last_name, u.profile_image` starting at
    /// column `start` of a `LEFT JOIN users u`.
    pub(crate) fn from_joined_row(row: &Row, start: usize) -> rusqlite::Result<Self> {
        let id: Option<i64> = row.get(start)?;
        match id {
            None => Ok(Self::deleted()),
            Some(id) => Ok(Self {
                id: Some(id),
                first_name: row.get(start + 1)?,
                last_name: row.get(start + 2)?,
                profile_image: row.get(start + 3)?,
            }),
        }
    }
}
