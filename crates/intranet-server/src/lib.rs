//! Intranet HTTP server library logic.

pub mod api;
pub mod api_admin;
pub mod api_announcements;
pub mod api_auth;
pub mod api_birthdays;
pub mod api_calendar;
pub mod api_contacts;
pub mod api_events;
pub mod api_posts;
pub mod api_profile;
pub mod api_upload;
pub mod config;
pub mod giphy;
pub mod mailer;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use giphy::GifProvider;
use intranet_accounts::{PasswordHasher, TokenIssuer};
use intranet_db::DbPool;
use intranet_types::SitePolicy;
use mailer::Mailer;
use middleware::RateLimiter;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Signs and verifies session tokens.
    pub tokens: TokenIssuer,
    pub hasher: PasswordHasher,
    /// Outbound mail for verification codes and reset links.
    pub mailer: Arc<dyn Mailer>,
    /// Source of birthday GIFs.
    pub gifs: Arc<dyn GifProvider>,
    /// Admin sector, company-wide venue and frontend URL.
    pub site: SitePolicy,
    /// Directory for uploaded files.
    pub upload_dir: String,
    /// Largest accepted multipart body on the upload routes.
    pub max_upload_bytes: usize,
    /// Per-IP request quota on the auth routes.
    pub rate_limiter: RateLimiter,
    /// Lifetime of a password reset token, in minutes.
    pub reset_ttl_minutes: i64,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/api/auth/register", post(api_auth::register_handler))
        .route("/api/auth/verify", post(api_auth::verify_handler))
        .route("/api/auth/login", post(api_auth::login_handler))
        .route(
            "/api/auth/request-reset",
            post(api_auth::request_reset_handler),
        )
        .route(
            "/api/auth/reset-password",
            post(api_auth::reset_password_handler),
        )
        .layer(axum::middleware::from_fn(middleware::rate_limit_middleware));

    let protected_routes = Router::new()
        .route(
            "/api/auth/refresh-token",
            post(api_auth::refresh_token_handler),
        )
        .route(
            "/api/profile",
            get(api_profile::get_own_profile_handler).put(api_profile::update_own_profile_handler),
        )
        .route(
            "/api/users/{id}/profile",
            get(api_profile::get_user_profile_handler),
        )
        .route("/api/directory", get(api_profile::directory_handler))
        .route("/api/admin/users", get(api_admin::list_users_handler))
        .route(
            "/api/admin/users/{id}",
            delete(api_admin::delete_user_handler),
        )
        .route(
            "/api/admin/users/{id}/role",
            put(api_admin::set_role_handler),
        )
        .route(
            "/api/admin/users/{id}/on-call-group",
            put(api_admin::set_on_call_group_handler),
        )
        .route(
            "/api/admin/users/{id}/sector",
            put(api_admin::set_sector_handler),
        )
        .route(
            "/api/admin/users/{id}/extension",
            put(api_admin::set_extension_handler),
        )
        .route(
            "/api/admin/users/{id}/branch",
            put(api_admin::set_branch_handler),
        )
        .route(
            "/api/sectors/{sector}/posts",
            get(api_posts::list_sector_posts_handler),
        )
        .route("/api/posts", post(api_posts::create_post_handler))
        .route(
            "/api/posts/{id}",
            get(api_posts::get_post_handler)
                .put(api_posts::update_post_handler)
                .delete(api_posts::delete_post_handler),
        )
        .route(
            "/api/announcements",
            get(api_announcements::list_announcements_handler)
                .post(api_announcements::create_announcement_handler),
        )
        .route(
            "/api/announcements/{id}",
            delete(api_announcements::delete_announcement_handler),
        )
        .route(
            "/api/contacts",
            get(api_contacts::list_contacts_handler).post(api_contacts::create_contact_handler),
        )
        .route(
            "/api/contacts/{id}",
            put(api_contacts::update_contact_handler).delete(api_contacts::delete_contact_handler),
        )
        .route("/api/calendar", get(api_calendar::calendar_handler))
        .route("/api/meetings", post(api_calendar::create_meeting_handler))
        .route(
            "/api/meetings/{id}",
            put(api_calendar::update_meeting_handler).delete(api_calendar::delete_meeting_handler),
        )
        .route(
            "/api/on-call-dates",
            get(api_calendar::list_on_call_dates_handler)
                .post(api_calendar::create_on_call_date_handler),
        )
        .route(
            "/api/on-call-dates/{id}",
            delete(api_calendar::delete_on_call_date_handler),
        )
        .route(
            "/api/events",
            get(api_events::list_events_handler).post(api_events::create_event_handler),
        )
        .route(
            "/api/events/{id}",
            get(api_events::get_event_handler)
                .put(api_events::update_event_handler)
                .delete(api_events::delete_event_handler),
        )
        .route(
            "/api/events/{id}/registration",
            get(api_events::get_own_registration_handler)
                .post(api_events::register_handler),
        )
        .route(
            "/api/events/{id}/registrations",
            get(api_events::list_registrations_handler),
        )
        .route(
            "/api/birthdays/today",
            get(api_birthdays::todays_birthdays_handler),
        )
        .route(
            "/api/birthdays/{user_id}/gif",
            post(api_birthdays::change_gif_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    let upload_routes = Router::new()
        .route(
            "/api/profile/image",
            post(api_profile::upload_profile_image_handler),
        )
        .route("/api/uploads", post(api_upload::upload_file_handler))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    let upload_dir = state.upload_dir.clone();
    tracing::info!(path = %upload_dir, "serving uploaded files at /uploads");

    Router::new()
        .route("/health", get(health))
        .merge(auth_routes)
        .merge(protected_routes)
        .merge(upload_routes)
        .nest_service("/uploads", ServeDir::new(&upload_dir))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
