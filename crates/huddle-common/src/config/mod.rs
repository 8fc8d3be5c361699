//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, BootstrapConfig, ConfigError, DatabaseConfig, EmbedConfig,
    Environment, GatewayConfig, ServerConfig, SnowflakeConfig, StorageBackend, StorageConfig,
};
