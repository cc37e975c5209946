//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: REPOKIT_, nested keys split on `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/repokit/{service_name}/config.toml
//! 4. System directory: /etc/repokit/{service_name}/config.toml
//! 5. Default values
//!
//! ```toml
//! [service]
//! name = "orders"
//!
//! [database]
//! host = "db.internal"
//! username = "orders"
//! password = "secret"
//! database = "orders"
//!
//! [redis]
//! url = "redis://cache.internal:6379/0"
//!
//! [registry.services]
//! billing = ["10.0.0.7:9000", "10.0.0.8:9000"]
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

const ENV_PREFIX: &str = "REPOKIT_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// MySQL configuration (optional)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Redis configuration (optional)
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    /// Distributed lock settings
    #[serde(default)]
    pub lock: LockConfig,

    /// Static service registry
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            environment: default_environment(),
        }
    }
}

/// MySQL configuration
///
/// Either set `url` or the individual connection components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the components
    #[serde(default)]
    pub url: Option<String>,

    /// Server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// User name
    #[serde(default)]
    pub username: String,

    /// Password
    #[serde(default)]
    pub password: String,

    /// Database (schema) name
    #[serde(default)]
    pub database: String,

    /// Connection character set
    #[serde(default = "default_charset")]
    pub charset: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum idle connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Maximum lifetime of a pooled connection in seconds
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum retry attempts for establishing database connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            port: default_mysql_port(),
            username: String::new(),
            password: String::new(),
            database: String::new(),
            charset: default_charset(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            max_lifetime_secs: default_max_lifetime(),
            connection_timeout_secs: default_connection_timeout(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl DatabaseConfig {
    /// Connection URL: the explicit `url`, or one built from the components
    pub fn connection_url(&self) -> Result<String> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(url.to_string());
        }
        if self.database.is_empty() {
            return Err(Error::Internal(
                "database config needs either `url` or `database`".to_string(),
            ));
        }
        let credentials = match (self.username.is_empty(), self.password.is_empty()) {
            (true, _) => String::new(),
            (false, true) => format!("{}@", self.username),
            (false, false) => format!("{}:{}@", self.username, self.password),
        };
        Ok(format!(
            "mysql://{}{}:{}/{}?charset={}",
            credentials, self.host, self.port, self.database, self.charset
        ))
    }

    /// Maximum connection lifetime
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    /// Connection timeout
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

/// Redis configuration
///
/// Either set `url` or the individual connection components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (redis://host:port/db)
    #[serde(default)]
    pub url: Option<String>,

    /// Server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_redis_port")]
    pub port: u16,

    /// Password
    #[serde(default)]
    pub password: String,

    /// Logical database index
    #[serde(default)]
    pub db: u32,

    /// Maximum number of connections in the pool
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: usize,

    /// Maximum retry attempts for establishing Redis connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            port: default_redis_port(),
            password: String::new(),
            db: 0,
            max_connections: default_redis_max_connections(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl RedisConfig {
    /// Connection URL: the explicit `url`, or one built from the components
    pub fn connection_url(&self) -> String {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        let credentials = if self.password.is_empty() {
            String::new()
        } else {
            format!(":{}@", self.password)
        };
        format!(
            "redis://{}{}:{}/{}",
            credentials, self.host, self.port, self.db
        )
    }
}

/// Distributed lock settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Prefix prepended to every lock name
    #[serde(default = "default_lock_prefix")]
    pub key_prefix: String,

    /// Lock expiry in milliseconds
    #[serde(default = "default_lock_ttl")]
    pub ttl_ms: u64,

    /// Attempts made by a blocking acquire
    #[serde(default = "default_lock_retry_count")]
    pub retry_count: u32,

    /// Pause between attempts in milliseconds
    #[serde(default = "default_lock_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_lock_prefix(),
            ttl_ms: default_lock_ttl(),
            retry_count: default_lock_retry_count(),
            retry_delay_ms: default_lock_retry_delay(),
        }
    }
}

impl LockConfig {
    /// Lock expiry
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Pause between attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Static service registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry namespace
    #[serde(default)]
    pub namespace: String,

    /// Service name to endpoint list
    #[serde(default)]
    pub services: BTreeMap<String, Vec<String>>,
}

fn default_service_name() -> String {
    "repokit".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_redis_port() -> u16 {
    6379
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_max_connections() -> u32 {
    150
}

fn default_min_connections() -> u32 {
    5
}

fn default_max_lifetime() -> u64 {
    25
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_redis_max_connections() -> usize {
    150
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2
}

fn default_lock_prefix() -> String {
    "lock:".to_string()
}

fn default_lock_ttl() -> u64 {
    8000
}

fn default_lock_retry_count() -> u32 {
    32
}

fn default_lock_retry_delay() -> u64 {
    100
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is taken from the binary name. Environment variables
    /// (REPOKIT_ prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(default_service_name);

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so later merges win
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses XDG directories and loads directly from the given path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Find all possible config file paths for a service, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix("repokit");
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc/repokit")
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }

    /// Get the MySQL connection URL, if a database is configured
    pub fn database_url(&self) -> Option<Result<String>> {
        self.database.as_ref().map(DatabaseConfig::connection_url)
    }

    /// Get the Redis connection URL, if Redis is configured
    pub fn redis_url(&self) -> Option<String> {
        self.redis.as_ref().map(RedisConfig::connection_url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            database: None,
            redis: None,
            lock: LockConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.name, "repokit");
        assert_eq!(config.service.log_level, "info");
        assert!(config.database.is_none());
        assert_eq!(config.lock.key_prefix, "lock:");
        assert_eq!(config.lock.ttl(), Duration::from_secs(8));
        assert_eq!(config.lock.retry_count, 32);
    }

    #[test]
    fn test_database_url_from_components() {
        let db = DatabaseConfig {
            username: "app".to_string(),
            password: "pw".to_string(),
            database: "orders".to_string(),
            ..DatabaseConfig::default()
        };
        assert_eq!(
            db.connection_url().unwrap(),
            "mysql://app:pw@127.0.0.1:3306/orders?charset=utf8mb4"
        );
    }

    #[test]
    fn test_explicit_database_url_wins() {
        let db = DatabaseConfig {
            url: Some("mysql://root@db/app".to_string()),
            database: "ignored".to_string(),
            ..DatabaseConfig::default()
        };
        assert_eq!(db.connection_url().unwrap(), "mysql://root@db/app");
    }

    #[test]
    fn test_database_url_requires_name() {
        assert!(DatabaseConfig::default().connection_url().is_err());
    }

    #[test]
    fn test_redis_url_from_components() {
        let redis = RedisConfig {
            password: "pw".to_string(),
            db: 2,
            ..RedisConfig::default()
        };
        assert_eq!(redis.connection_url(), "redis://:pw@127.0.0.1:6379/2");
        assert_eq!(
            RedisConfig::default().connection_url(),
            "redis://127.0.0.1:6379/0"
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "orders"

[database]
host = "db.internal"
username = "orders"
database = "orders"
max_connections = 20

[lock]
ttl_ms = 3000

[registry.services]
billing = ["10.0.0.7:9000"]
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.name, "orders");
        assert_eq!(config.service.environment, "dev");

        let db = config.database.as_ref().unwrap();
        assert_eq!(db.max_connections, 20);
        assert_eq!(db.min_connections, 5);
        assert_eq!(
            db.connection_url().unwrap(),
            "mysql://orders@db.internal:3306/orders?charset=utf8mb4"
        );

        assert_eq!(config.lock.ttl_ms, 3000);
        assert_eq!(config.lock.retry_delay_ms, 100);
        assert_eq!(config.registry.services["billing"], vec!["10.0.0.7:9000"]);
        assert!(config.redis.is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.service.name, "repokit");
    }
}
