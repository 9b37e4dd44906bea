//! Account administration. Every handler requires a superuser.

use crate::api::{message, with_conn, ApiError};
use crate::middleware::CurrentUser;
use crate::AppState;
use axum::extract::{Extension, Json, Path};
use intranet_accounts::{
    delete_user, get_user, list_accounts, set_branch, set_extension, set_on_call_group, set_role,
    set_sector, AccountSummary, User,
};
use intranet_types::{is_on_call_group, Role};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Sector names must be shorter than this many characters.
const SECTOR_MAX_CHARS: usize = 100;
/// Phone extensions must be shorter than this many characters.
const EXTENSION_MAX_CHARS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OnCallGroupRequest {
    #[serde(default)]
    pub on_call_group: Value,
}

#[derive(Debug, Deserialize)]
pub struct SectorRequest {
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtensionRequest {
    #[serde(default)]
    pub extension: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BranchRequest {
    #[serde(default)]
    pub branch: Option<String>,
}

fn require_superuser(user: &User) -> Result<(), ApiError> {
    if user.actor().can_manage_accounts() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("superuser role required".to_string()))
    }
}

/// Sector, extension and branch of the caller's own account, and the account
/// itself, are out of reach of this panel.
fn reject_self(caller: &User, target_id: i64, what: &str) -> Result<(), ApiError> {
    if caller.id == target_id {
        Err(ApiError::Forbidden(format!(
            "you cannot change your own {} from the admin panel",
            what
        )))
    } else {
        Ok(())
    }
}

/// Non-empty text shorter than `max_chars` characters.
fn bounded_text(
    value: Option<String>,
    max_chars: Option<usize>,
    what: &str,
) -> Result<String, ApiError> {
    let value = value.unwrap_or_default();
    let too_long = max_chars.is_some_and(|max| value.chars().count() >= max);
    if value.trim().is_empty() || too_long {
        return Err(ApiError::BadRequest(format!("invalid {}", what)));
    }
    Ok(value)
}

/// `null` clears the group; otherwise an integer in `1..=4`.
fn parse_admin_group(value: &Value) -> Result<Option<u8>, ApiError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .filter(|n| is_on_call_group(*n))
            .and_then(|n| u8::try_from(n).ok())
            .map(Some)
            .ok_or_else(invalid_group),
        _ => Err(invalid_group()),
    }
}

fn invalid_group() -> ApiError {
    ApiError::BadRequest("on-call group must be between 1 and 4, or null".to_string())
}

/// Handler for `GET /api/admin/users`.
pub async fn list_users_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
) -> Result<Json<Vec<AccountSummary>>, ApiError> {
    require_superuser(&caller)?;
    let users = with_conn(&state, |conn| Ok(list_accounts(conn)?)).await?;
    Ok(Json(users))
}

/// Handler for `PUT /api/admin/users/{id}/role`.
pub async fn set_role_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<RoleRequest>,
) -> Result<Json<Value>, ApiError> {
    require_superuser(&caller)?;
    let role = payload
        .role
        .ok_or_else(|| ApiError::BadRequest("no role provided".to_string()))?
        .parse::<Role>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let username = with_conn(&state, move |conn| {
        let target = get_user(conn, id)?;
        set_role(conn, id, role)?;
        Ok(target.username)
    })
    .await?;

    tracing::info!(admin = caller.id, target = id, role = %role, "role changed");
    Ok(message(format!("role of {} set to {}", username, role)))
}

/// Handler for `PUT /api/admin/users/{id}/on-call-group`.
pub async fn set_on_call_group_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<OnCallGroupRequest>,
) -> Result<Json<Value>, ApiError> {
    require_superuser(&caller)?;
    let group = parse_admin_group(&payload.on_call_group)?;

    let username = with_conn(&state, move |conn| {
        let target = get_user(conn, id)?;
        set_on_call_group(conn, id, group)?;
        Ok(target.username)
    })
    .await?;

    tracing::info!(admin = caller.id, target = id, group = ?group, "on-call group changed");
    Ok(message(format!("on-call group of {} updated", username)))
}

/// Handler for `PUT /api/admin/users/{id}/sector`.
pub async fn set_sector_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<SectorRequest>,
) -> Result<Json<Value>, ApiError> {
    require_superuser(&caller)?;
    reject_self(&caller, id, "sector")?;
    let sector = bounded_text(payload.sector, Some(SECTOR_MAX_CHARS), "sector")?;

    let username = with_conn(&state, move |conn| {
        let target = get_user(conn, id)?;
        set_sector(conn, id, &sector)?;
        Ok(target.username)
    })
    .await?;

    tracing::info!(admin = caller.id, target = id, "sector changed");
    Ok(message(format!("sector of {} updated", username)))
}

/// Handler for `PUT /api/admin/users/{id}/extension`.
pub async fn set_extension_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<ExtensionRequest>,
) -> Result<Json<Value>, ApiError> {
    require_superuser(&caller)?;
    reject_self(&caller, id, "extension")?;
    let extension = bounded_text(payload.extension, Some(EXTENSION_MAX_CHARS), "extension")?;

    let username = with_conn(&state, move |conn| {
        let target = get_user(conn, id)?;
        set_extension(conn, id, &extension)?;
        Ok(target.username)
    })
    .await?;

    tracing::info!(admin = caller.id, target = id, "extension changed");
    Ok(message(format!("extension of {} updated", username)))
}

/// Handler for `PUT /api/admin/users/{id}/branch`.
pub async fn set_branch_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(payload): Json<BranchRequest>,
) -> Result<Json<Value>, ApiError> {
    require_superuser(&caller)?;
    reject_self(&caller, id, "branch")?;
    let branch = bounded_text(payload.branch, None, "branch")?;

    let username = with_conn(&state, move |conn| {
        let target = get_user(conn, id)?;
        set_branch(conn, id, &branch)?;
        Ok(target.username)
    })
    .await?;

    tracing::info!(admin = caller.id, target = id, "branch changed");
    Ok(message(format!("branch of {} updated", username)))
}

/// Handler for `DELETE /api/admin/users/{id}`.
pub async fn delete_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_superuser(&caller)?;
    if caller.id == id {
        return Err(ApiError::Forbidden(
            "you cannot delete your own account".to_string(),
        ));
    }

    let username = with_conn(&state, move |conn| {
        let target = get_user(conn, id)?;
        delete_user(conn, id)?;
        Ok(target.username)
    })
    .await?;

    tracing::info!(admin = caller.id, target = id, "account deleted");
    Ok(message(format!("account {} deleted", username)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn admin_group_is_strict() {
        assert_eq!(parse_admin_group(&Value::Null).unwrap(), None);
        assert_eq!(parse_admin_group(&json!(4)).unwrap(), Some(4));
        assert!(parse_admin_group(&json!(5)).is_err());
        assert!(parse_admin_group(&json!("2")).is_err());
        assert!(parse_admin_group(&json!(1.5)).is_err());
    }

    #[test]
    fn text_bounds() {
        assert!(bounded_text(Some("Sales".into()), Some(SECTOR_MAX_CHARS), "sector").is_ok());
        assert!(bounded_text(Some("".into()), Some(SECTOR_MAX_CHARS), "sector").is_err());
        assert!(bounded_text(None, None, "branch").is_err());
        assert!(bounded_text(Some("x".repeat(19)), Some(EXTENSION_MAX_CHARS), "extension").is_ok());
        assert!(bounded_text(Some("x".repeat(20)), Some(EXTENSION_MAX_CHARS), "extension").is_err());
    }
}
