//! Server configuration loading from file and environment variables.

use intranet_accounts::BCRYPT_COST_RANGE;
use intranet_db::DbRuntimeSettings;
use intranet_types::SitePolicy;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Session tokens, password hashing and auth rate limiting.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Outbound SMTP.
    #[serde(default)]
    pub mail: MailConfig,

    /// Birthday GIF search.
    #[serde(default)]
    pub gifs: GifConfig,

    /// Uploaded files.
    #[serde(default)]
    pub uploads: UploadConfig,

    /// Names that permission and visibility rules depend on.
    #[serde(default)]
    pub site: SitePolicy,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "intranet_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. A random per-process secret is used
    /// when empty, which invalidates every session on restart.
    #[serde(default)]
    pub secret_key: String,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    /// Lifetime of a password reset link.
    #[serde(default = "default_reset_ttl_minutes")]
    pub reset_ttl_minutes: i64,

    /// Requests per minute per client IP on the unauthenticated auth routes.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    /// Existing account promoted to SUPERUSER at startup.
    #[serde(default)]
    pub bootstrap_superuser: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct MailConfig {
    /// When false, outgoing mail is written to the log instead of sent.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// SMTP port. Implicit TLS is used.
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Sender address; falls back to `username` when empty.
    #[serde(default)]
    pub from_address: String,
}

#[derive(Clone, Deserialize)]
pub struct GifConfig {
    /// GIF search API key. Birthday GIFs are disabled when absent.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gif_base_url")]
    pub base_url: String,

    #[serde(default = "default_gif_query")]
    pub query: String,

    #[serde(default = "default_gif_limit")]
    pub limit: u32,

    #[serde(default = "default_gif_rating")]
    pub rating: String,

    #[serde(default = "default_gif_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory uploaded files are written to and served from.
    #[serde(default = "default_upload_dir")]
    pub dir: String,

    /// Largest accepted multipart body, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> String {
    "intranet.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_bcrypt_cost() -> u32 {
    12
}

fn default_reset_ttl_minutes() -> i64 {
    60
}

fn default_rate_limit_per_minute() -> u32 {
    10
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_from_name() -> String {
    "Intranet".to_string()
}

fn default_gif_base_url() -> String {
    "https://api.giphy.com/v1/gifs/search".to_string()
}

fn default_gif_query() -> String {
    "happy birthday funny".to_string()
}

fn default_gif_limit() -> u32 {
    50
}

fn default_gif_rating() -> String {
    "g".to_string()
}

fn default_gif_timeout_secs() -> u64 {
    10
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
            bcrypt_cost: default_bcrypt_cost(),
            reset_ttl_minutes: default_reset_ttl_minutes(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            bootstrap_superuser: None,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_name: default_from_name(),
            from_address: String::new(),
        }
    }
}

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gif_base_url(),
            query: default_gif_query(),
            limit: default_gif_limit(),
            rating: default_gif_rating(),
            timeout_secs: default_gif_timeout_secs(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

const REDACTED: &str = "<redacted>";

fn redact(value: &str) -> &str {
    if value.is_empty() {
        ""
    } else {
        REDACTED
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &redact(&self.secret_key))
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("reset_ttl_minutes", &self.reset_ttl_minutes)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("bootstrap_superuser", &self.bootstrap_superuser)
            .finish()
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("from_name", &self.from_name)
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl fmt::Debug for GifConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GifConfig")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("base_url", &self.base_url)
            .field("query", &self.query)
            .field("limit", &self.limit)
            .field("rating", &self.rating)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl MailConfig {
    /// Address outgoing mail is sent from.
    pub fn sender_address(&self) -> &str {
        if self.from_address.is_empty() {
            &self.username
        } else {
            &self.from_address
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting is outside the range the server can run with.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Longest session token lifetime accepted, one year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// Longest password reset link lifetime accepted, one week.
pub const MAX_RESET_TTL_MINUTES: i64 = 60 * 24 * 7;

impl DatabaseConfig {
    /// Pool tunables for `intranet_db::create_pool`.
    pub fn runtime_settings(&self) -> DbRuntimeSettings {
        DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
        }
    }
}

impl Config {
    /// Checks numeric settings after file and environment are merged.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let auth = &self.auth;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&auth.token_ttl_hours) {
            return Err(ConfigError::Invalid(format!(
                "auth.token_ttl_hours must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_HOURS, auth.token_ttl_hours
            )));
        }
        if !(1..=MAX_RESET_TTL_MINUTES).contains(&auth.reset_ttl_minutes) {
            return Err(ConfigError::Invalid(format!(
                "auth.reset_ttl_minutes must be between 1 and {}, got {}",
                MAX_RESET_TTL_MINUTES, auth.reset_ttl_minutes
            )));
        }
        if !BCRYPT_COST_RANGE.contains(&auth.bcrypt_cost) {
            return Err(ConfigError::Invalid(format!(
                "auth.bcrypt_cost must be between {} and {}, got {}",
                BCRYPT_COST_RANGE.start(),
                BCRYPT_COST_RANGE.end(),
                auth.bcrypt_cost
            )));
        }
        if auth.rate_limit_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "auth.rate_limit_per_minute must be at least 1".to_string(),
            ));
        }
        self.database
            .runtime_settings()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("database: {}", e)))
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `INTRANET_HOST` overrides `server.host`
/// - `INTRANET_PORT` overrides `server.port`
/// - `INTRANET_DB_PATH` overrides `database.path`
/// - `INTRANET_LOG_LEVEL` overrides `logging.level`
/// - `INTRANET_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `INTRANET_SECRET_KEY` overrides `auth.secret_key`
/// - `INTRANET_SMTP_HOST`, `INTRANET_SMTP_PORT`, `INTRANET_SMTP_USERNAME`,
///   `INTRANET_SMTP_PASSWORD` override the `mail` section
/// - `INTRANET_GIF_API_KEY` overrides `gifs.api_key`
/// - `INTRANET_UPLOAD_DIR` overrides `uploads.dir`
/// - `INTRANET_FRONTEND_URL` overrides `site.frontend_url`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if the merged settings fail [`Config::validate`].
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("INTRANET_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("INTRANET_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = var("INTRANET_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("INTRANET_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("INTRANET_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(secret) = var("INTRANET_SECRET_KEY") {
        config.auth.secret_key = secret;
    }
    if let Some(host) = var("INTRANET_SMTP_HOST") {
        config.mail.host = host;
    }
    if let Some(port) = var("INTRANET_SMTP_PORT") {
        if let Ok(parsed) = port.parse() {
            config.mail.port = parsed;
        }
    }
    if let Some(username) = var("INTRANET_SMTP_USERNAME") {
        config.mail.username = username;
    }
    if let Some(password) = var("INTRANET_SMTP_PASSWORD") {
        config.mail.password = password;
    }
    if let Some(key) = var("INTRANET_GIF_API_KEY") {
        config.gifs.api_key = Some(key).filter(|k| !k.trim().is_empty());
    }
    if let Some(dir) = var("INTRANET_UPLOAD_DIR") {
        config.uploads.dir = dir;
    }
    if let Some(url) = var("INTRANET_FRONTEND_URL") {
        config.site.frontend_url = url;
    }
}
