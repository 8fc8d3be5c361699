//! # huddle-common
//!
//! Shared utilities including configuration, error handling, credential
//! helpers, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{generate_invite_code, generate_token, hash_password, verify_password, PasswordService};
pub use config::{
    AppConfig, AppSettings, BootstrapConfig, ConfigError, DatabaseConfig, EmbedConfig,
    Environment, GatewayConfig, ServerConfig, SnowflakeConfig, StorageBackend, StorageConfig,
};
pub use error::{AppError, AppResult, ErrorResponse};
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
