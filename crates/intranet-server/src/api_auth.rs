//! Account registration, e-mail verification, login and password reset.

use crate::api::{message, with_conn, ApiError};
use crate::mailer::{password_reset_email, reverification_email, welcome_email};
use crate::middleware::CurrentUser;
use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use intranet_accounts::{
    check_password_policy, codes, create_account, find_by_reset_token, find_by_username,
    mark_verified, set_reset_token, set_verification_code, update_password, validate_email,
    AccountError,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub username: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

const INVALID_CREDENTIALS: &str = "invalid credentials";
const RESET_REQUESTED: &str =
    "if the address is registered, a password reset link has been sent to it";

/// Handler for `POST /api/auth/register`.
pub async fn register_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let username = payload.username.trim().to_string();
    validate_email(&username)?;
    if payload.password != payload.confirm_password {
        return Err(AccountError::PasswordMismatch.into());
    }
    check_password_policy(&payload.password)?;

    let hasher = state.hasher;
    let code = codes::verification_code();
    let user = with_conn(&state, {
        let code = code.clone();
        move |conn| {
            let hash = hasher.hash(&payload.password)?;
            Ok(create_account(conn, &username, &hash, &code)?)
        }
    })
    .await?;
    tracing::info!(user_id = user.id, "account registered");

    if let Err(e) = state
        .mailer
        .send(welcome_email(&user.username, &code))
        .await
    {
        tracing::error!(user_id = user.id, error = %e, "failed to send verification mail");
        return Err(ApiError::InternalServerError(format!(
            "account created but the verification mail could not be sent: {}",
            e
        )));
    }

    Ok((
        StatusCode::CREATED,
        message("registration successful, check your inbox for the verification code"),
    )
        .into_response())
}

/// Handler for `POST /api/auth/verify`.
pub async fn verify_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Response, ApiError> {
    let user_id = with_conn(&state, move |conn| {
        let user = find_by_username(conn, &payload.username)?
            .ok_or_else(|| ApiError::NotFound("account not found".to_string()))?;
        if user.is_verified {
            return Err(ApiError::BadRequest("account is already verified".to_string()));
        }
        if user.verification_code.as_deref() != Some(payload.code.trim()) {
            return Err(ApiError::BadRequest("incorrect verification code".to_string()));
        }
        mark_verified(conn, user.id)?;
        Ok(user.id)
    })
    .await?;

    tracing::info!(user_id, "account verified");
    Ok(message("account verified, you can now log in").into_response())
}

/// Handler for `POST /api/auth/login`.
///
/// An unverified account gets a fresh code by mail and a 403 carrying
/// `action_required: "verify"` instead of a token.
pub async fn login_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let hasher = state.hasher;
    let user = with_conn(&state, move |conn| {
        let user = find_by_username(conn, &payload.username)?;
        match user {
            Some(user) if hasher.verify(&payload.password, &user.password_hash) => Ok(user),
            _ => Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string())),
        }
    })
    .await?;

    if !user.is_verified {
        let code = codes::verification_code();
        let user_id = user.id;
        with_conn(&state, {
            let code = code.clone();
            move |conn| Ok(set_verification_code(conn, user_id, &code)?)
        })
        .await?;

        if let Err(e) = state
            .mailer
            .send(reverification_email(&user.username, &code))
            .await
        {
            tracing::error!(user_id, error = %e, "failed to resend verification mail");
            return Err(ApiError::InternalServerError(format!(
                "account is not verified and the verification mail could not be sent: {}",
                e
            )));
        }

        tracing::info!(user_id, "login refused until the account is verified");
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "account is not verified, a new code has been sent by mail",
                "action_required": "verify"
            })),
        )
            .into_response());
    }

    let token = state.tokens.issue(&user)?;
    tracing::info!(user_id = user.id, "login succeeded");
    Ok(Json(json!({ "token": token })).into_response())
}

/// Handler for `POST /api/auth/request-reset`.
///
/// Answers the same way whether or not the address is registered.
pub async fn request_reset_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ResetRequest>,
) -> Result<Response, ApiError> {
    let token = codes::reset_token();
    let expires_at = Utc::now() + Duration::minutes(state.reset_ttl_minutes);

    let user = with_conn(&state, {
        let token = token.clone();
        move |conn| {
            let Some(user) = find_by_username(conn, &payload.username)? else {
                return Ok(None);
            };
            set_reset_token(conn, user.id, &token, &expires_at)?;
            Ok(Some(user))
        }
    })
    .await?;

    if let Some(user) = user {
        let link = state.site.reset_link(&token);
        match state
            .mailer
            .send(password_reset_email(&user.username, &link))
            .await
        {
            Ok(()) => tracing::info!(user_id = user.id, "password reset requested"),
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "failed to send password reset mail")
            }
        }
    }

    Ok(message(RESET_REQUESTED).into_response())
}

/// Handler for `POST /api/auth/reset-password`.
pub async fn reset_password_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    let hasher = state.hasher;
    let user_id = with_conn(&state, move |conn| {
        let user = find_by_reset_token(conn, payload.token.trim(), &Utc::now())?
            .ok_or_else(|| ApiError::BadRequest("the token is invalid or has expired".to_string()))?;
        check_password_policy(&payload.new_password)?;
        let hash = hasher.hash(&payload.new_password)?;
        update_password(conn, user.id, &hash)?;
        Ok(user.id)
    })
    .await?;

    tracing::info!(user_id, "password reset");
    Ok(message("your password has been updated").into_response())
}

/// Handler for `POST /api/auth/refresh-token`.
pub async fn refresh_token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let token = state.tokens.issue(&user)?;
    Ok(Json(json!({ "token": token })).into_response())
}
