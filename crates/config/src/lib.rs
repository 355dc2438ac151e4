use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::Deserialize;
use std::time::Duration;

/// Which persistence backend the API runs against.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// PostgreSQL through a deadpool connection pool.
    Postgres,
    /// Process-local store; data is lost on restart.
    Memory,
}

/// `AppConfig` holds all configuration parameters required by the application.
///
/// The configuration is loaded from environment variables (optionally via a `.env` file)
/// or uses default values if the variable is not set. Fields include database, HTTP server,
/// token signing and pagination settings. This struct is deserializable via Serde.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Storage ---
    /// Backend selection: `postgres` or `memory`.
    pub storage: StorageBackend,

    // --- Database settings ---
    /// Database hostname or service name (e.g. "postgres" in Docker Compose, "localhost" for local runs).
    pub db_host: String,
    /// Database port (default: 5432).
    pub db_port: u16,
    /// Database user.
    pub db_user: String,
    /// Database password.
    pub db_password: String,
    /// Database name.
    pub db_name: String,
    /// Maximum number of pooled connections.
    pub db_pool_size: usize,
    /// Directory with `.sql` migrations applied on startup.
    pub migrations_dir: String,

    // --- HTTP server ---
    /// The port on which the HTTP server will listen.
    pub http_port: u16,
    /// Page size used when a listing passes `page` without `pageSize`.
    pub default_page_size: i64,

    // --- Shutdown timeout ---
    /// Graceful shutdown timeout (human-friendly format, e.g. "5s", "1m").
    #[serde(deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,

    // --- Tokens ---
    /// HMAC secret used to sign bearer tokens.
    pub jwt_key: String,
    /// `iss` claim written and required on every token.
    pub jwt_issuer: String,
    /// `aud` claim written and required on every token.
    pub jwt_audience: String,
    /// Token lifetime (e.g. "1d", "12h").
    #[serde(deserialize_with = "deserialize_duration")]
    pub token_lifetime: Duration,

    // --- Bootstrap administrator ---
    /// Login of an administrator account created on startup when missing.
    pub admin_login: Option<String>,
    /// Password of the bootstrap administrator.
    pub admin_password: Option<String>,
}

/// Custom deserializer for durations.
/// Accepts human-readable formats like "5s", "1m", "1d", etc.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from `.env` file).
    ///
    /// Fields not set via env will be filled with default values.
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid or missing required values.
    pub fn load() -> Result<Self> {
        // Load from .env file (for Docker environment)
        dotenvy::dotenv().ok();

        let settings = Self::defaults()?
            .add_source(config::Environment::default())
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }

    /// Builder pre-populated with every default value.
    ///
    /// Callers layer their own sources or overrides on top of it.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(config::Config::builder()
            // Storage
            .set_default("storage", "postgres")?
            // Database
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "store_user")?
            .set_default("db_password", "securepassword")?
            .set_default("db_name", "store_db")?
            .set_default("db_pool_size", 16)?
            .set_default("migrations_dir", "migrations")?
            // HTTP
            .set_default("http_port", 8081)?
            .set_default("default_page_size", 5)?
            // Shutdown
            .set_default("shutdown_timeout", "5s")?
            // Tokens
            .set_default("jwt_key", "dev-only-signing-key-change-me-0123456789")?
            .set_default("jwt_issuer", "online-store")?
            .set_default("jwt_audience", "online-store-clients")?
            .set_default("token_lifetime", "1d")?)
    }
}
