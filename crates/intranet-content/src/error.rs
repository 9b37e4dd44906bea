use thiserror::Error;

/// Errors that can occur during content operations.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("file '{0}' is already attached elsewhere")]
    AttachmentInUse(String),
}
