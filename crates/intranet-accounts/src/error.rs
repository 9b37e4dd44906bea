use thiserror::Error;

/// Errors raised by account storage, credentials and session tokens.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("account not found: {0}")]
    NotFound(i64),

    #[error("an account with this e-mail address already exists")]
    DuplicateUsername,

    #[error("invalid e-mail address format")]
    InvalidEmail,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("{0}")]
    WeakPassword(&'static str),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("invalid session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("no birthday gif stored for account {user_id} today")]
    NoBirthdayGif { user_id: i64 },
}
