//! Accounts for the intranet backend.
//!
//! Account rows and profiles, the password policy and bcrypt hashing,
//! verification codes and reset tokens, session tokens, and the birthday
//! listing with its per-day GIF records.
//!
//! Store functions take a plain `&rusqlite::Connection` and never know
//! about HTTP.

pub mod birthdays;
pub mod codes;
mod error;
pub mod password;
pub mod store;
pub mod token;

pub use birthdays::{
    birthdays_on, get_birthday_gif, insert_birthday_gif_if_absent, replace_birthday_gif,
};
pub use error::AccountError;
pub use password::{check_password_policy, validate_email, PasswordHasher, BCRYPT_COST_RANGE};
pub use store::{
    create_account, delete_user, find_by_reset_token, find_by_username, get_user,
    list_accounts, list_directory, mark_verified, promote_to_superuser, set_branch,
    set_extension, set_on_call_group, set_profile_image, set_reset_token, set_role, set_sector,
    set_verification_code, update_password, update_profile, AccountSummary, ProfileUpdate,
    User, UserProfile, DEFAULT_PROFILE_IMAGE,
};
pub use token::{SessionClaims, TokenIssuer};
