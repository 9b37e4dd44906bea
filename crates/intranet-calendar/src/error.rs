use intranet_types::time::TimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Time(#[from] TimeError),

    #[error("end time cannot be before start time")]
    EndBeforeStart,

    #[error("on-call slot must be between 1 and 5, got {0}")]
    InvalidSlot(i64),

    #[error("an on-call slot is already assigned for {0}")]
    DuplicateDate(String),

    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
