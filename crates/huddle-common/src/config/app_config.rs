//! Application configuration
//!
//! Everything is read from environment variables, with a `.env` file loaded
//! first when present.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: Option<DatabaseConfig>,
    pub gateway: GatewayConfig,
    pub embeds: EmbedConfig,
    pub snowflake: SnowflakeConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which storage implementation backs the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// Process-local, lost on restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub media_dir: PathBuf,
    pub max_upload_mb: usize,
}

impl StorageConfig {
    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout: Duration::from_secs(default_acquire_timeout_secs()),
            idle_timeout: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bounded broadcast queue per connection
    pub queue_capacity: usize,
    /// Deadline for the close handshake before the socket is dropped
    pub close_timeout: Duration,
    /// How long an issued upload slot stays claimable
    pub upload_slot_ttl: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            close_timeout: Duration::from_millis(default_close_timeout_ms()),
            upload_slot_ttl: Duration::from_secs(default_upload_slot_ttl_secs()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub enabled: bool,
    pub timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(default_embed_timeout_secs()),
            max_body_bytes: default_embed_max_body_kb() * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnowflakeConfig {
    pub worker_id: u16,
}

/// First-run seeding options
#[derive(Clone, Default)]
pub struct BootstrapConfig {
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("admin_username", &self.admin_username)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// Default value functions
fn default_app_name() -> String {
    "Huddle".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("./data/media")
}

fn default_max_upload_mb() -> usize {
    25
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_queue_capacity() -> usize {
    16
}

fn default_close_timeout_ms() -> u64 {
    5000
}

fn default_upload_slot_ttl_secs() -> u64 {
    300
}

fn default_embed_timeout_secs() -> u64 {
    10
}

fn default_embed_max_body_kb() -> usize {
    512
}

fn default_worker_id() -> u16 {
    1
}

/// Read and parse one variable, falling back to `default` when unset or blank.
fn parse_var<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name, e.to_string())),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend: StorageBackend = parse_var(&lookup, "STORAGE_BACKEND", StorageBackend::default())?;

        let database = match lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", default_max_connections())?,
                min_connections: parse_var(&lookup, "DATABASE_MIN_CONNECTIONS", default_min_connections())?,
                acquire_timeout: Duration::from_secs(parse_var(
                    &lookup,
                    "DATABASE_ACQUIRE_TIMEOUT",
                    default_acquire_timeout_secs(),
                )?),
                ..DatabaseConfig::new("")
            }),
            None if backend == StorageBackend::Postgres => {
                return Err(ConfigError::MissingVar("DATABASE_URL"));
            }
            None => None,
        };

        let worker_id: u16 = parse_var(&lookup, "SNOWFLAKE_WORKER_ID", default_worker_id())?;
        if worker_id > 1023 {
            return Err(ConfigError::InvalidValue(
                "SNOWFLAKE_WORKER_ID",
                format!("{worker_id} is not below 1024"),
            ));
        }

        let queue_capacity: usize = parse_var(&lookup, "GATEWAY_QUEUE_CAPACITY", default_queue_capacity())?;
        if queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_QUEUE_CAPACITY",
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            app: AppSettings {
                name: lookup("SITE_NAME").unwrap_or_else(default_app_name),
                env: parse_var(&lookup, "APP_ENV", Environment::default())?,
            },
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(default_host),
                port: parse_var(&lookup, "SERVER_PORT", default_port())?,
            },
            storage: StorageConfig {
                backend,
                media_dir: lookup("MEDIA_DIR").map_or_else(default_media_dir, PathBuf::from),
                max_upload_mb: parse_var(&lookup, "MAX_UPLOAD_MB", default_max_upload_mb())?,
            },
            database,
            gateway: GatewayConfig {
                queue_capacity,
                close_timeout: Duration::from_millis(parse_var(
                    &lookup,
                    "GATEWAY_CLOSE_TIMEOUT_MS",
                    default_close_timeout_ms(),
                )?),
                upload_slot_ttl: Duration::from_secs(parse_var(
                    &lookup,
                    "UPLOAD_SLOT_TTL_SECS",
                    default_upload_slot_ttl_secs(),
                )?),
            },
            embeds: EmbedConfig {
                enabled: parse_var(&lookup, "EMBEDS_ENABLED", true)?,
                timeout: Duration::from_secs(parse_var(
                    &lookup,
                    "EMBED_TIMEOUT_SECS",
                    default_embed_timeout_secs(),
                )?),
                max_body_bytes: parse_var(&lookup, "EMBED_MAX_BODY_KB", default_embed_max_body_kb())?
                    * 1024,
            },
            snowflake: SnowflakeConfig { worker_id },
            bootstrap: BootstrapConfig {
                admin_username: lookup("ADMIN_USERNAME").filter(|v| !v.is_empty()),
                admin_password: lookup("ADMIN_PASSWORD").filter(|v| !v.is_empty()),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_memory_backend_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "memory")])).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.database.is_none());
        assert_eq!(config.server.address(), "0.0.0.0:8000");
        assert_eq!(config.gateway.queue_capacity, 16);
        assert_eq!(config.gateway.close_timeout, Duration::from_secs(5));
        assert_eq!(config.gateway.upload_slot_ttl, Duration::from_secs(300));
        assert_eq!(config.storage.max_upload_bytes(), 25 * 1024 * 1024);
        assert!(config.app.env.is_development());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DATABASE_URL")));
    }

    #[test]
    fn test_database_settings() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/huddle"),
            ("DATABASE_MAX_CONNECTIONS", "7"),
        ]))
        .unwrap();
        let db = config.database.unwrap();
        assert_eq!(db.url, "postgres://localhost/huddle");
        assert_eq!(db.max_connections, 7);
        assert_eq!(db.min_connections, 2);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = AppConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "memory"),
            ("SERVER_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("SERVER_PORT", _)));

        let err = AppConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "memory"),
            ("SNOWFLAKE_WORKER_ID", "4096"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("SNOWFLAKE_WORKER_ID", _)));

        let err = AppConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "sqlite")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("STORAGE_BACKEND", _)));
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert!(Environment::Production.is_production());
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_bootstrap_password_redacted() {
        let config = AppConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "memory"),
            ("ADMIN_USERNAME", "root"),
            ("ADMIN_PASSWORD", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(config.bootstrap.admin_username.as_deref(), Some("root"));
        assert!(!format!("{:?}", config.bootstrap).contains("s3cret"));
    }
}
