//! E-mail validation, password policy and bcrypt hashing.

use crate::AccountError;
use regex::Regex;
use std::sync::OnceLock;

pub const MIN_PASSWORD_LEN: usize = 8;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .unwrap_or_else(|e| unreachable!("email pattern is a valid regex: {e}"))
    })
}

/// Checks that `username` looks like an e-mail address.
pub fn validate_email(username: &str) -> Result<(), AccountError> {
    if email_pattern().is_match(username) {
        Ok(())
    } else {
        Err(AccountError::InvalidEmail)
    }
}

/// At least eight characters with an upper-case letter, a lower-case letter
/// and a digit.
pub fn check_password_policy(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::WeakPassword(
            "password must be at least 8 characters long",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AccountError::WeakPassword(
            "password must contain at least one upper-case letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AccountError::WeakPassword(
            "password must contain at least one lower-case letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AccountError::WeakPassword(
            "password must contain at least one digit",
        ));
    }
    Ok(())
}

/// Work factors bcrypt accepts.
pub const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// bcrypt with a configurable work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, AccountError> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    /// A malformed stored hash counts as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match bcrypt::verify(password, hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is unreadable");
                false
            }
        }
    }
}
