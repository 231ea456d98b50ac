//! Configuration module for environment variable parsing.
//!
//! Everything is read from environment variables. Binaries call
//! `dotenvy::dotenv()` first so a local `.env` file is honored.

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Outbound forward timeout bounds in milliseconds.
const FORWARD_TIMEOUT_MIN_MS: u64 = 5_000;
const FORWARD_TIMEOUT_MAX_MS: u64 = 30_000;

/// Upper bound for the `limit` query parameter on the inspect endpoint.
pub const INSPECT_MAX_LIMIT: i64 = 1_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Public base URL used to build webhook and inspect URLs (no trailing slash)
    pub base_url: String,

    /// Shared HMAC secret for bearer tokens
    pub jwt_secret: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of pooled database connections
    pub db_max_connections: u32,

    /// Connection attempts at startup before giving up
    pub db_connect_attempts: u32,

    /// Delay between startup connection attempts in milliseconds
    pub db_retry_delay_ms: u64,

    /// Timeout for a single forward attempt in milliseconds
    pub forward_timeout_ms: u64,

    /// Number of captured requests returned by the inspect endpoint by default
    pub inspect_default_limit: i64,

    /// Lifetime of tokens minted by `hookcatch-token`, in seconds
    pub token_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails only when `JWT_SECRET` is missing or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_or("PORT", 8080);

        let base_url = env::var("BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingVar("JWT_SECRET"))?;

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(database_url_from_parts);

        let inspect_default_limit =
            parse_or::<i64>("INSPECT_DEFAULT_LIMIT", 100).clamp(1, INSPECT_MAX_LIMIT);

        Ok(Config {
            port,
            base_url: base_url.trim_end_matches('/').to_string(),
            jwt_secret,
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            db_connect_attempts: parse_or::<u32>("DB_CONNECT_ATTEMPTS", 5).max(1),
            db_retry_delay_ms: parse_or("DB_RETRY_DELAY_MS", 2000),
            forward_timeout_ms: clamp_forward_timeout(parse_or("FORWARD_TIMEOUT_MS", 10_000)),
            inspect_default_limit,
            token_ttl_secs: parse_or("TOKEN_TTL_SECS", 86_400),
        })
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn db_retry_delay(&self) -> Duration {
        Duration::from_millis(self.db_retry_delay_ms)
    }

    /// Public URL that third parties send webhooks to.
    pub fn webhook_url(&self, id: &str) -> String {
        format!("{}/webhook/{}", self.base_url, id)
    }

    /// URL of the captured-request listing for a webhook.
    pub fn inspect_url(&self, id: &str) -> String {
        format!("{}/inspect/{}", self.base_url, id)
    }
}

// Keeps the secret and credentials out of debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_connect_attempts", &self.db_connect_attempts)
            .field("forward_timeout_ms", &self.forward_timeout_ms)
            .field("inspect_default_limit", &self.inspect_default_limit)
            .finish_non_exhaustive()
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(env_var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn clamp_forward_timeout(ms: u64) -> u64 {
    let clamped = ms.clamp(FORWARD_TIMEOUT_MIN_MS, FORWARD_TIMEOUT_MAX_MS);
    if clamped != ms {
        warn!(
            requested_ms = ms,
            effective_ms = clamped,
            "forward_timeout_clamped"
        );
    }
    clamped
}

/// Build a connection string from the individual `DB_*` variables.
///
/// TLS is required unless running in development or against localhost.
fn database_url_from_parts() -> String {
    let host = env_or("DB_HOST", "localhost");
    let development = env::var("ENVIRONMENT").map(|e| e == "development").unwrap_or(false);
    let ssl_mode = if development || host == "localhost" {
        "disable"
    } else {
        "require"
    };

    format!(
        "postgres://{}:{}@{}:{}/{}?sslmode={}",
        env_or("DB_USER", "postgres"),
        env_or("DB_PASSWORD", "postgres"),
        host,
        env_or("DB_PORT", "5432"),
        env_or("DB_NAME", "hookcatch"),
        ssl_mode,
    )
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
