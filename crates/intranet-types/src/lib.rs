//! Shared types for the intranet backend.
//!
//! Holds the account roles, the on-call slot numbering, the permission
//! matrix ([`Actor`]), the site policy and the timestamp helpers used by
//! every other crate in the workspace. Nothing here touches the database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod policy;
pub mod time;

pub use policy::SitePolicy;

/// Account role. Stored and transmitted by its upper-case label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Read-only access. Every new account starts here.
    #[default]
    Viewer,
    /// May create and edit content.
    Editor,
    /// May do everything, including account administration.
    Superuser,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Viewer, Role::Editor, Role::Superuser];

    /// Returns the label used in the database, tokens and JSON.
    pub fn label(self) -> &'static str {
        match self {
            Self::Viewer => "VIEWER",
            Self::Editor => "EDITOR",
            Self::Superuser => "SUPERUSER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a string is not one of the known role labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role '{0}', valid roles are VIEWER, EDITOR, SUPERUSER")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VIEWER" => Ok(Self::Viewer),
            "EDITOR" => Ok(Self::Editor),
            "SUPERUSER" => Ok(Self::Superuser),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// Lowest on-call rota group.
pub const MIN_ON_CALL_GROUP: u8 = 1;
/// Highest on-call rota group.
pub const MAX_ON_CALL_GROUP: u8 = 4;
/// Calendar slot number that marks a public holiday instead of a rota group.
pub const HOLIDAY_SLOT: u8 = 5;

/// Returns `true` if `group` is a rota group an account can belong to.
pub fn is_on_call_group(group: i64) -> bool {
    (i64::from(MIN_ON_CALL_GROUP)..=i64::from(MAX_ON_CALL_GROUP)).contains(&group)
}

/// What a dated on-call calendar slot means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnCallSlot {
    /// Rota group `1..=4` is on call that day.
    Group(u8),
    /// Company holiday.
    Holiday,
}

impl OnCallSlot {
    /// Decodes the stored slot number. Returns `None` outside `1..=5`.
    pub fn from_number(n: i64) -> Option<Self> {
        if is_on_call_group(n) {
            u8::try_from(n).ok().map(Self::Group)
        } else if n == i64::from(HOLIDAY_SLOT) {
            Some(Self::Holiday)
        } else {
            None
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::Group(n) => n,
            Self::Holiday => HOLIDAY_SLOT,
        }
    }
}

/// The authenticated account as seen by permission checks.
///
/// Built from the stored account on every request, so a role change takes
/// effect immediately rather than when the session token is renewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
    pub sector: Option<String>,
    pub branch: Option<String>,
}

impl Actor {
    pub fn is_superuser(&self) -> bool {
        self.role == Role::Superuser
    }

    /// Editors and superusers.
    pub fn is_editor_or_above(&self) -> bool {
        matches!(self.role, Role::Editor | Role::Superuser)
    }

    fn is_editor_of(&self, sector: &str) -> bool {
        self.role == Role::Editor && self.sector.as_deref() == Some(sector)
    }

    /// Account administration (roles, rota groups, deletion).
    pub fn can_manage_accounts(&self) -> bool {
        self.is_superuser()
    }

    /// Publishing or editing a post that belongs to `sector`.
    pub fn can_write_sector(&self, sector: &str) -> bool {
        self.is_superuser() || self.is_editor_of(sector)
    }

    /// Deleting a post or announcement written by `author_id`.
    pub fn can_delete_authored(&self, author_id: Option<i64>) -> bool {
        self.is_superuser() || author_id == Some(self.user_id)
    }

    /// Publishing announcements and maintaining the on-call calendar.
    pub fn can_administer_site(&self, policy: &SitePolicy) -> bool {
        self.is_superuser() || self.is_editor_of(&policy.admin_sector)
    }

    /// Replacing the birthday GIF shown for `user_id`.
    pub fn can_change_birthday_gif(&self, user_id: i64) -> bool {
        self.is_superuser() || self.user_id == user_id
    }
}

/// Deserializes a list of account ids given as integers or numeric strings.
///
/// Event visibility lists come from a form builder that is not strict about
/// the JSON type of each id.
pub fn deserialize_id_list<'de, D>(deserializer: D) -> Result<Option<Vec<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdLike {
        Int(i64),
        Text(String),
    }

    let raw: Option<Vec<IdLike>> = Option::deserialize(deserializer)?;
    raw.map(|items| {
        items
            .into_iter()
            .map(|item| match item {
                IdLike::Int(id) => Ok(id),
                IdLike::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                    serde::de::Error::custom(format!("invalid user id '{}'", s))
                }),
            })
            .collect()
    })
    .transpose()
}
