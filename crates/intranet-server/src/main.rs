//! Intranet server binary.
//!
//! Starts an axum HTTP server with structured logging, database initialization,
//! and graceful shutdown on SIGTERM/SIGINT.

use intranet_accounts::{promote_to_superuser, PasswordHasher, TokenIssuer};
use intranet_server::config::{self, Config};
use intranet_server::giphy::{GifProvider, GiphyClient};
use intranet_server::mailer::{LogMailer, Mailer, SmtpMailer};
use intranet_server::middleware::RateLimiter;
use intranet_server::{app, AppState};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("INTRANET_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

/// Signing secret from config, or a random one that only lives as long as
/// this process.
fn session_secret(config: &Config) -> String {
    if !config.auth.secret_key.trim().is_empty() {
        return config.auth.secret_key.clone();
    }
    tracing::warn!("auth.secret_key is not set; using a random key, sessions end on restart");
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

fn build_mailer(config: &Config) -> Arc<dyn Mailer> {
    if !config.mail.enabled {
        tracing::info!("mail delivery disabled, outgoing mail will be logged");
        return Arc::new(LogMailer);
    }
    let mailer = SmtpMailer::new(&config.mail)
        .expect("failed to configure SMTP transport — check the [mail] section");
    tracing::info!(host = %config.mail.host, port = config.mail.port, "smtp mailer configured");
    Arc::new(mailer)
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = intranet_db::create_pool(
        &config.database.path,
        config.database.runtime_settings(),
    )
    .expect("failed to create database pool — check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            intranet_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }

        if let Some(username) = config.auth.bootstrap_superuser.as_deref() {
            match promote_to_superuser(&conn, username) {
                Ok(true) => tracing::info!(username, "bootstrap account promoted to superuser"),
                Ok(false) => tracing::warn!(username, "bootstrap superuser has no account yet"),
                Err(e) => tracing::error!(username, error = %e, "failed to promote bootstrap superuser"),
            }
        }
    }

    std::fs::create_dir_all(&config.uploads.dir)
        .expect("failed to create upload directory — check uploads.dir in config");

    let gifs: Arc<dyn GifProvider> = Arc::new(
        GiphyClient::new(&config.gifs).expect("failed to build HTTP client for the GIF provider"),
    );
    if config.gifs.api_key.is_none() {
        tracing::warn!("gifs.api_key is not set; birthday GIFs are disabled");
    }

    let state = AppState {
        pool,
        tokens: TokenIssuer::new(&session_secret(&config), config.auth.token_ttl_hours),
        hasher: PasswordHasher::new(config.auth.bcrypt_cost),
        mailer: build_mailer(&config),
        gifs,
        site: config.site.clone(),
        upload_dir: config.uploads.dir.clone(),
        max_upload_bytes: config.uploads.max_upload_bytes,
        rate_limiter: RateLimiter::per_minute(config.auth.rate_limit_per_minute),
        reset_ttl_minutes: config.auth.reset_ttl_minutes,
    };

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting intranet server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    tracing::info!("intranet server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_secret_is_used() {
        let mut config = Config::default();
        config.auth.secret_key = "from-config".to_string();
        assert_eq!(session_secret(&config), "from-config");
    }

    #[test]
    fn missing_secret_gets_a_random_one() {
        let config = Config::default();
        let a = session_secret(&config);
        let b = session_secret(&config);
        assert_eq!(a.len(), 48);
        assert_ne!(a, b);
    }
}
