//! Configuration loading and types for ShelfStore.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, credentials, catalog persistence, and logging.
//! A handful of `SHELFSTORE_*` environment variables can override the
//! file values for container deployments.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Password hashing and token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Catalog store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Credential and session-token settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign and verify session tokens. Override it in
    /// any real deployment.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    /// Session token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,

    /// Bcrypt cost factor for password hashing.
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
            token_ttl_seconds: default_token_ttl(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

/// Catalog store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Backend type: `sqlite` or `memory`.
    #[serde(default = "default_store_engine")]
    pub engine: String,

    /// SQLite-specific configuration.
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            engine: default_store_engine(),
            sqlite: SqliteConfig::default(),
        }
    }
}

/// SQLite-specific catalog configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_token_secret() -> String {
    "shelfstore-secret".to_string()
}

fn default_token_ttl() -> u64 {
    86_400 // one day
}

fn default_bcrypt_cost() -> u32 {
    12
}

fn default_store_engine() -> String {
    "sqlite".to_string()
}

fn default_catalog_path() -> String {
    "./data/catalog.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

/// Apply `SHELFSTORE_*` environment overrides on top of the file
/// values. Unparseable numeric overrides are ignored.
pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(port) = std::env::var("SHELFSTORE_PORT") {
        if let Ok(port) = port.parse() {
            config.server.port = port;
        }
    }
    if let Ok(secret) = std::env::var("SHELFSTORE_TOKEN_SECRET") {
        config.auth.token_secret = secret;
    }
    if let Ok(ttl) = std::env::var("SHELFSTORE_TOKEN_TTL_SECONDS") {
        if let Ok(ttl) = ttl.parse() {
            config.auth.token_ttl_seconds = ttl;
        }
    }
    if let Ok(path) = std::env::var("SHELFSTORE_DB_PATH") {
        config.store.sqlite.path = path;
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.token_ttl_seconds, 86_400);
        assert_eq!(config.auth.bcrypt_cost, 12);
        assert_eq!(config.store.engine, "sqlite");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "server:\n  port: 8080\nauth:\n  token_secret: abc\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.token_secret, "abc");
        assert_eq!(config.auth.bcrypt_cost, 12);
        assert_eq!(config.store.sqlite.path, "./data/catalog.db");
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("SHELFSTORE_PORT", "4100");
        std::env::set_var("SHELFSTORE_TOKEN_TTL_SECONDS", "not-a-number");
        let mut config = Config::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.auth.token_ttl_seconds, 86_400);
        std::env::remove_var("SHELFSTORE_PORT");
        std::env::remove_var("SHELFSTORE_TOKEN_TTL_SECONDS");
    }
}
