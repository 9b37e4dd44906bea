//! Published content for the intranet: sector posts, announcements, their
//! attachments, and the contact book.
//!
//! Permission checks happen in the server before these functions are
//! called; this crate only enforces required fields and referential rules.

pub mod announcements;
pub mod attachments;
mod author;
pub mod contacts;
mod error;
pub mod posts;

pub use announcements::{
    create_announcement, delete_announcement, get_announcement, list_announcements,
    Announcement, AnnouncementPage, NewAnnouncement, ANNOUNCEMENTS_PER_PAGE,
};
pub use attachments::{Attachment, NewAttachment, DEFAULT_MIMETYPE, UPLOADS_PREFIX};
pub use author::AuthorSummary;
pub use contacts::{
    create_contact, delete_contact, get_contact, list_contacts, update_contact, Contact,
    ContactInput,
};
pub use error::ContentError;
pub use posts::{
    create_post, delete_post, get_post, list_posts_by_sector, update_post, NewPost, Post,
    PostUpdate,
};
