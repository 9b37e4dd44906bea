//! Per-sector information posts.

use crate::attachments::{delete_all, insert_all, list_attachments, Owner};
use crate::{Attachment, AuthorSummary, ContentError, NewAttachment};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

const POST_SELECT: &str = "SELECT p.id, p.sector, p.title, p.content, p.created_at, p.author_id,
        u.id, u.first_name, u.last_name, u.profile_image
    FROM posts p LEFT JOIN users u ON u.id = p.author_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: i64,
    pub sector: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    #[serde(skip)]
    pub author_id: Option<i64>,
    pub author: AuthorSummary,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub sector: String,
    pub title: String,
    pub content: String,
    pub attachments: Vec<NewAttachment>,
}

/// Partial edit. `attachments: Some(_)` replaces the whole set.
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub attachments: Option<Vec<NewAttachment>>,
}

fn map_row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        sector: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        author_id: row.get(5)?,
        author: AuthorSummary::from_joined_row(row, 6)?,
        attachments: Vec::new(),
    })
}

fn with_attachments(conn: &Connection, mut post: Post) -> Result<Post, ContentError> {
    post.attachments = list_attachments(conn, Owner::Post(post.id))?;
    Ok(post)
}

/// Creates a post together with its attachments, atomically.
pub fn create_post(
    conn: &Connection,
    author_id: i64,
    post: &NewPost,
) -> Result<Post, ContentError> {
    if post.sector.trim().is_empty() {
        return Err(ContentError::MissingField("sector"));
    }
    if post.title.trim().is_empty() {
        return Err(ContentError::MissingField("title"));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO posts (sector, title, content, author_id) VALUES (?1, ?2, ?3, ?4)",
        params![post.sector, post.title, post.content, author_id],
    )?;
    let id = tx.last_insert_rowid();
    insert_all(&tx, Owner::Post(id), &post.attachments)?;
    tx.commit()?;

    tracing::debug!(post_id = id, sector = %post.sector, "post created");
    get_post(conn, id)
}

pub fn get_post(conn: &Connection, id: i64) -> Result<Post, ContentError> {
    let post = conn
        .query_row(
            &format!("{} WHERE p.id = ?1", POST_SELECT),
            [id],
            map_row_to_post,
        )
        .optional()?
        .ok_or(ContentError::NotFound { kind: "post", id })?;
    with_attachments(conn, post)
}

/// Posts of `sector`, newest first.
pub fn list_posts_by_sector(conn: &Connection, sector: &str) -> Result<Vec<Post>, ContentError> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE p.sector = ?1 ORDER BY p.created_at DESC, p.id DESC",
        POST_SELECT
    ))?;
    let rows = stmt.query_map([sector], map_row_to_post)?;
    let mut posts = Vec::new();
    for row in rows {
        posts.push(with_attachments(conn, row?)?);
    }
    Ok(posts)
}

pub fn update_post(
    conn: &Connection,
    id: i64,
    update: &PostUpdate,
) -> Result<Post, ContentError> {
    let tx = conn.unchecked_transaction()?;
    let count = tx.execute(
        "UPDATE posts SET title = COALESCE(?1, title), content = COALESCE(?2, content)
         WHERE id = ?3",
        params![update.title, update.content, id],
    )?;
    if count == 0 {
        return Err(ContentError::NotFound { kind: "post", id });
    }
    if let Some(attachments) = &update.attachments {
        delete_all(&tx, Owner::Post(id))?;
        insert_all(&tx, Owner::Post(id), attachments)?;
    }
    tx.commit()?;
    get_post(conn, id)
}

/// Deletes a post. Its attachment rows go with it.
pub fn delete_post(conn: &Connection, id: i64) -> Result<(), ContentError> {
    let count = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
    if count == 0 {
        return Err(ContentError::NotFound { kind: "post", id });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{setup_db, user};

    fn attachment(name: &str) -> NewAttachment {
        NewAttachment::from_link(name, &format!("/uploads/1_x_{name}"), None).unwrap()
    }

    #[test]
    fn create_and_read_back() {
        let conn = setup_db();
        let author = user(&conn, "ana@example.com", Some("Ana"));
        let post = create_post(
            &conn,
            author,
            &NewPost {
                sector: "Sales".into(),
                title: "Price list".into(),
                content: "See attached".into(),
                attachments: vec![attachment("prices.pdf")],
            },
        )
        .unwrap();

        assert_eq!(post.author.id, Some(author));
        assert_eq!(post.author.first_name.as_deref(), Some("Ana"));
        assert_eq!(post.attachments.len(), 1);
        assert_eq!(post.attachments[0].url, "/uploads/1_x_prices.pdf");

        let json = serde_json::to_value(&post).unwrap();
        assert!(json.get("author_id").is_none());
        assert_eq!(json["author"]["first_name"], "Ana");
    }

    #[test]
    fn title_and_sector_are_required() {
        let conn = setup_db();
        let author = user(&conn, "ana@example.com", None);
        let err = create_post(
            &conn,
            author,
            &NewPost {
                sector: "Sales".into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ContentError::MissingField("title")));
    }

    #[test]
    fn listing_is_per_sector_newest_first() {
        let conn = setup_db();
        let author = user(&conn, "ana@example.com", None);
        for (sector, title) in [("Sales", "one"), ("Finance", "other"), ("Sales", "two")] {
            create_post(
                &conn,
                author,
                &NewPost {
                    sector: sector.into(),
                    title: title.into(),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let titles: Vec<_> = list_posts_by_sector(&conn, "Sales")
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["two".to_string(), "one".to_string()]);
    }

    #[test]
    fn update_replaces_attachments_only_when_given() {
        let conn = setup_db();
        let author = user(&conn, "ana@example.com", None);
        let post = create_post(
            &conn,
            author,
            &NewPost {
                sector: "Sales".into(),
                title: "t".into(),
                attachments: vec![attachment("a.pdf")],
                ..Default::default()
            },
        )
        .unwrap();

        let post = update_post(
            &conn,
            post.id,
            &PostUpdate {
                title: Some("renamed".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(post.title, "renamed");
        assert_eq!(post.attachments.len(), 1);

        let post = update_post(
            &conn,
            post.id,
            &PostUpdate {
                attachments: Some(vec![attachment("b.pdf"), attachment("c.pdf")]),
                ..Default::default()
            },
        )
        .unwrap();
        let names: Vec<_> = post.attachments.iter().map(|a| a.original_filename.as_str()).collect();
        assert_eq!(names, vec!["b.pdf", "c.pdf"]);
        assert_eq!(post.title, "renamed");
    }

    #[test]
    fn deleted_author_becomes_placeholder() {
        let conn = setup_db();
        let author = user(&conn, "ana@example.com", Some("Ana"));
        let post = create_post(
            &conn,
            author,
            &NewPost {
                sector: "Sales".into(),
                title: "t".into(),
                ..Default::default()
            },
        )
        .unwrap();
        conn.execute("DELETE FROM users WHERE id = ?1", [author]).unwrap();

        let post = get_post(&conn, post.id).unwrap();
        assert_eq!(post.author_id, None);
        assert_eq!(post.author, AuthorSummary::deleted());
    }

    #[test]
    fn delete_cascades_to_attachments() {
        let conn = setup_db();
        let author = user(&conn, "ana@example.com", None);
        let post = create_post(
            &conn,
            author,
            &NewPost {
                sector: "Sales".into(),
                title: "t".into(),
                attachments: vec![attachment("a.pdf")],
                ..Default::default()
            },
        )
        .unwrap();
        delete_post(&conn, post.id).unwrap();

        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM attachments", [], |r| r.get(0))
            .unwrap();
        assert_eq!(left, 0);
        assert!(matches!(
            delete_post(&conn, post.id),
            Err(ContentError::NotFound { kind: "post", .. })
        ));
    }
}
