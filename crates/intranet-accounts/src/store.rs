//! The `users` table: accounts, profiles and administrative fields.

use crate::AccountError;
use chrono::{DateTime, NaiveDate, Utc};
use intranet_db::is_constraint_violation;
use intranet_types::time::{format_date, format_timestamp, parse_date};
use intranet_types::{Actor, Role};
use rusqlite::{params, types::ToSql, Connection, OptionalExtension, Row};
use serde::Serialize;

/// Profile image assigned to accounts that never uploaded one.
pub const DEFAULT_PROFILE_IMAGE: &str = "default.png";

pub(crate) const USER_COLUMNS: &str = "id, username, password_hash, is_verified, verification_code,
    reset_token, reset_token_expires_at, first_name, last_name, extension, birth_date,
    sector, branch, profile_image, on_call_group, role, created_at";

/// A stored account. Holds the password hash, so it is never serialized
/// directly; use [`User::profile`] or [`User::summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    /// E-mail address used to log in.
    pub username: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub verification_code: Option<String>,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Internal phone extension.
    pub extension: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sector: Option<String>,
    pub branch: Option<String>,
    pub profile_image: String,
    pub on_call_group: Option<u8>,
    pub role: Role,
    pub created_at: String,
}

/// Public profile, as shown on profile pages and in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub extension: Option<String>,
    pub birth_date: Option<String>,
    pub sector: Option<String>,
    pub branch: Option<String>,
    pub profile_image: String,
    pub on_call_group: Option<u8>,
}

/// Row of the account administration list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_verified: bool,
    pub on_call_group: Option<u8>,
    pub sector: Option<String>,
    pub branch: Option<String>,
}

/// Self-service profile edit. Text fields are replaced as given; the birth
/// date only changes when one is supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub extension: Option<String>,
    pub sector: Option<String>,
    pub branch: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub on_call_group: Option<u8>,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            role: self.role,
            sector: self.sector.clone(),
            branch: self.branch.clone(),
        }
    }

    /// `true` until every directory field has been filled in.
    pub fn profile_incomplete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        !(filled(&self.first_name)
            && filled(&self.last_name)
            && filled(&self.extension)
            && self.birth_date.is_some()
            && filled(&self.sector)
            && filled(&self.branch))
    }

    /// "First Last", or `None` when no name has been entered.
    pub fn display_name(&self) -> Option<String> {
        let first = self.first_name.as_deref()?;
        let full = format!("{} {}", first, self.last_name.as_deref().unwrap_or(""));
        Some(full.trim().to_string())
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            extension: self.extension.clone(),
            birth_date: self.birth_date.as_ref().map(format_date),
            sector: self.sector.clone(),
            branch: self.branch.clone(),
            profile_image: self.profile_image.clone(),
            on_call_group: self.on_call_group,
        }
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
            is_verified: self.is_verified,
            on_call_group: self.on_call_group,
            sector: self.sector.clone(),
            branch: self.branch.clone(),
        }
    }
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

pub(crate) fn map_row_to_user(row: &Row) -> rusqlite::Result<User> {
    let birth_date: Option<String> = row.get(10)?;
    let birth_date = birth_date
        .map(|s| parse_date(&s))
        .transpose()
        .map_err(|e| conversion_error(10, e))?;

    let role: String = row.get(15)?;
    let role: Role = role.parse().map_err(|e| conversion_error(15, e))?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        is_verified: row.get(3)?,
        verification_code: row.get(4)?,
        reset_token: row.get(5)?,
        reset_token_expires_at: row.get(6)?,
        first_name: row.get(7)?,
        last_name: row.get(8)?,
        extension: row.get(9)?,
        birth_date,
        sector: row.get(11)?,
        branch: row.get(12)?,
        profile_image: row.get(13)?,
        on_call_group: row.get(14)?,
        role,
        created_at: row.get(16)?,
    })
}

/// Inserts an unverified `VIEWER` account.
///
/// # Errors
///
/// Returns `AccountError::DuplicateUsername` if the e-mail is taken,
/// ignoring case.
pub fn create_account(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    verification_code: &str,
) -> Result<User, AccountError> {
    conn.execute(
        "INSERT INTO users (username, password_hash, is_verified, verification_code, role)
         VALUES (?1, ?2, 0, ?3, ?4)",
        params![
            username,
            password_hash,
            verification_code,
            Role::Viewer.label()
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            AccountError::DuplicateUsername
        } else {
            AccountError::Database(e)
        }
    })?;

    get_user(conn, conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, id: i64) -> Result<User, AccountError> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id],
        map_row_to_user,
    )
    .optional()?
    .ok_or(AccountError::NotFound(id))
}

/// Looks an account up by e-mail, ignoring case.
pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<User>, AccountError> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            [username.trim()],
            map_row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Marks the account verified and consumes its verification code.
pub fn mark_verified(conn: &Connection, id: i64) -> Result<(), AccountError> {
    let count = conn.execute(
        "UPDATE users SET is_verified = 1, verification_code = NULL WHERE id = ?1",
        [id],
    )?;
    if count == 0 {
        return Err(AccountError::NotFound(id));
    }
    Ok(())
}

pub fn set_verification_code(conn: &Connection, id: i64, code: &str) -> Result<(), AccountError> {
    update_column(conn, id, "verification_code", &code)
}

pub fn set_reset_token(
    conn: &Connection,
    id: i64,
    token: &str,
    expires_at: &DateTime<Utc>,
) -> Result<(), AccountError> {
    let count = conn.execute(
        "UPDATE users SET reset_token = ?1, reset_token_expires_at = ?2 WHERE id = ?3",
        params![token, format_timestamp(expires_at), id],
    )?;
    if count == 0 {
        return Err(AccountError::NotFound(id));
    }
    Ok(())
}

/// Finds the account holding `token`, provided it has not expired at `now`.
pub fn find_by_reset_token(
    conn: &Connection,
    token: &str,
    now: &DateTime<Utc>,
) -> Result<Option<User>, AccountError> {
    let user = conn
        .query_row(
            &format!(
                "SELECT {} FROM users WHERE reset_token = ?1 AND reset_token_expires_at > ?2",
                USER_COLUMNS
            ),
            params![token, format_timestamp(now)],
            map_row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Stores a new password hash and invalidates any outstanding reset token.
pub fn update_password(conn: &Connection, id: i64, password_hash: &str) -> Result<(), AccountError> {
    let count = conn.execute(
        "UPDATE users
         SET password_hash = ?1, reset_token = NULL, reset_token_expires_at = NULL
         WHERE id = ?2",
        params![password_hash, id],
    )?;
    if count == 0 {
        return Err(AccountError::NotFound(id));
    }
    Ok(())
}

pub fn update_profile(
    conn: &Connection,
    id: i64,
    update: &ProfileUpdate,
) -> Result<User, AccountError> {
    let count = conn.execute(
        "UPDATE users SET
            first_name = ?1, last_name = ?2, extension = ?3, sector = ?4, branch = ?5,
            on_call_group = ?6, birth_date = COALESCE(?7, birth_date)
         WHERE id = ?8",
        params![
            update.first_name,
            update.last_name,
            update.extension,
            update.sector,
            update.branch,
            update.on_call_group,
            update.birth_date.as_ref().map(format_date),
            id
        ],
    )?;
    if count == 0 {
        return Err(AccountError::NotFound(id));
    }
    get_user(conn, id)
}

pub fn set_profile_image(conn: &Connection, id: i64, filename: &str) -> Result<(), AccountError> {
    update_column(conn, id, "profile_image", &filename)
}

pub fn set_role(conn: &Connection, id: i64, role: Role) -> Result<(), AccountError> {
    update_column(conn, id, "role", &role.label())
}

pub fn set_on_call_group(
    conn: &Connection,
    id: i64,
    group: Option<u8>,
) -> Result<(), AccountError> {
    update_column(conn, id, "on_call_group", &group)
}

pub fn set_sector(conn: &Connection, id: i64, sector: &str) -> Result<(), AccountError> {
    update_column(conn, id, "sector", &sector)
}

pub fn set_extension(conn: &Connection, id: i64, extension: &str) -> Result<(), AccountError> {
    update_column(conn, id, "extension", &extension)
}

pub fn set_branch(conn: &Connection, id: i64, branch: &str) -> Result<(), AccountError> {
    update_column(conn, id, "branch", &branch)
}

/// `column` is always a literal from this module, never caller input.
fn update_column(
    conn: &Connection,
    id: i64,
    column: &'static str,
    value: &dyn ToSql,
) -> Result<(), AccountError> {
    let sql = format!("UPDATE users SET {} = ?1 WHERE id = ?2", column);
    let count = conn.execute(&sql, params![value, id])?;
    if count == 0 {
        return Err(AccountError::NotFound(id));
    }
    Ok(())
}

/// Deletes an account. Authored posts and announcements stay, detached from
/// their author; registrations and birthday gifs go with the account.
pub fn delete_user(conn: &Connection, id: i64) -> Result<(), AccountError> {
    let count = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    if count == 0 {
        return Err(AccountError::NotFound(id));
    }
    Ok(())
}

fn collect_users(conn: &Connection, sql: &str) -> Result<Vec<User>, AccountError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map_row_to_user)?;
    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<AccountSummary>, AccountError> {
    let users = collect_users(
        conn,
        &format!("SELECT {} FROM users ORDER BY id ASC", USER_COLUMNS),
    )?;
    Ok(users.iter().map(User::summary).collect())
}

/// Staff directory: every account that has entered a first name.
pub fn list_directory(conn: &Connection) -> Result<Vec<UserProfile>, AccountError> {
    let users = collect_users(
        conn,
        &format!(
            "SELECT {} FROM users WHERE first_name IS NOT NULL
             ORDER BY first_name COLLATE NOCASE ASC, id ASC",
            USER_COLUMNS
        ),
    )?;
    Ok(users.iter().map(User::profile).collect())
}

/// Grants `SUPERUSER` to the named account. Returns `false` if it does not
/// exist yet.
pub fn promote_to_superuser(conn: &Connection, username: &str) -> Result<bool, AccountError> {
    let count = conn.execute(
        "UPDATE users SET role = ?1 WHERE username = ?2",
        params![Role::Superuser.label(), username.trim()],
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use intranet_db::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("failed to enable foreign keys");
        run_migrations(&conn).expect("failed to run migrations");
        conn
    }

    #[test]
    fn new_accounts_are_unverified_viewers() {
        let conn = setup_db();
        let user = create_account(&conn, "ana@example.com", "hash", "123456").unwrap();
        assert_eq!(user.role, Role::Viewer);
        assert!(!user.is_verified);
        assert_eq!(user.verification_code.as_deref(), Some("123456"));
        assert_eq!(user.profile_image, DEFAULT_PROFILE_IMAGE);
        assert!(user.profile_incomplete());
    }

    #[test]
    fn duplicate_username_is_reported_ignoring_case() {
        let conn = setup_db();
        create_account(&conn, "ana@example.com", "hash", "123456").unwrap();
        let err = create_account(&conn, "Ana@Example.com", "hash", "654321").unwrap_err();
        assert!(matches!(err, AccountError::DuplicateUsername));

        let found = find_by_username(&conn, "ANA@EXAMPLE.COM").unwrap();
        assert_eq!(found.map(|u| u.username), Some("ana@example.com".to_string()));
    }

    #[test]
    fn verification_clears_the_code() {
        let conn = setup_db();
        let user = create_account(&conn, "ana@example.com", "hash", "123456").unwrap();
        mark_verified(&conn, user.id).unwrap();
        let user = get_user(&conn, user.id).unwrap();
        assert!(user.is_verified);
        assert_eq!(user.verification_code, None);
    }

    #[test]
    fn reset_tokens_expire() {
        let conn = setup_db();
        let user = create_account(&conn, "ana@example.com", "hash", "123456").unwrap();
        let now = Utc::now();
        set_reset_token(&conn, user.id, "tok", &(now + chrono::Duration::hours(1))).unwrap();

        assert!(find_by_reset_token(&conn, "tok", &now).unwrap().is_some());
        assert!(find_by_reset_token(&conn, "other", &now).unwrap().is_none());
        let later = now + chrono::Duration::hours(2);
        assert!(find_by_reset_token(&conn, "tok", &later).unwrap().is_none());

        update_password(&conn, user.id, "new-hash").unwrap();
        let user = get_user(&conn, user.id).unwrap();
        assert_eq!(user.password_hash, "new-hash");
        assert_eq!(user.reset_token, None);
    }

    #[test]
    fn profile_update_keeps_birth_date_when_absent() {
        let conn = setup_db();
        let user = create_account(&conn, "ana@example.com", "hash", "123456").unwrap();
        let birth = NaiveDate::from_ymd_opt(1990, 5, 17).unwrap();

        let full = ProfileUpdate {
            first_name: Some("Ana".into()),
            last_name: Some("Paz".into()),
            extension: Some("204".into()),
            sector: Some("Sales".into()),
            branch: Some("Centro".into()),
            birth_date: Some(birth),
            on_call_group: Some(2),
        };
        let user = update_profile(&conn, user.id, &full).unwrap();
        assert!(!user.profile_incomplete());
        assert_eq!(user.display_name().as_deref(), Some("Ana Paz"));

        let partial = ProfileUpdate {
            first_name: Some("Ana".into()),
            ..Default::default()
        };
        let user = update_profile(&conn, user.id, &partial).unwrap();
        assert_eq!(user.birth_date, Some(birth));
        assert_eq!(user.sector, None);
        assert_eq!(user.on_call_group, None);
        assert_eq!(user.profile().birth_date.as_deref(), Some("1990-05-17"));
    }

    #[test]
    fn admin_setters_report_missing_accounts() {
        let conn = setup_db();
        let user = create_account(&conn, "ana@example.com", "hash", "123456").unwrap();
        set_role(&conn, user.id, Role::Editor).unwrap();
        set_sector(&conn, user.id, "Finance").unwrap();
        set_on_call_group(&conn, user.id, Some(3)).unwrap();
        let user = get_user(&conn, user.id).unwrap();
        assert_eq!(user.role, Role::Editor);
        assert_eq!(user.sector.as_deref(), Some("Finance"));
        assert_eq!(user.on_call_group, Some(3));

        assert!(matches!(
            set_branch(&conn, 999, "Norte"),
            Err(AccountError::NotFound(999))
        ));
        assert!(matches!(delete_user(&conn, 999), Err(AccountError::NotFound(999))));
    }

    #[test]
    fn directory_lists_named_accounts_by_first_name() {
        let conn = setup_db();
        let a = create_account(&conn, "a@example.com", "hash", "1").unwrap();
        let b = create_account(&conn, "b@example.com", "hash", "2").unwrap();
        create_account(&conn, "c@example.com", "hash", "3").unwrap();
        for (id, name) in [(a.id, "Zoe"), (b.id, "bruno")] {
            let update = ProfileUpdate {
                first_name: Some(name.into()),
                ..Default::default()
            };
            update_profile(&conn, id, &update).unwrap();
        }

        let names: Vec<_> = list_directory(&conn)
            .unwrap()
            .into_iter()
            .filter_map(|p| p.first_name)
            .collect();
        assert_eq!(names, vec!["bruno".to_string(), "Zoe".to_string()]);
        assert_eq!(list_accounts(&conn).unwrap().len(), 3);
    }

    #[test]
    fn bootstrap_promotion_needs_an_existing_account() {
        let conn = setup_db();
        assert!(!promote_to_superuser(&conn, "root@example.com").unwrap());
        let user = create_account(&conn, "root@example.com", "hash", "1").unwrap();
        assert!(promote_to_superuser(&conn, "ROOT@example.com").unwrap());
        assert_eq!(get_user(&conn, user.id).unwrap().role, Role::Superuser);
    }
}
