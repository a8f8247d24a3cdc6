//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Handles server, database, security and backoffice settings from files and env

use bo_core::{Error, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

pub mod backoffice;

pub use backoffice::{
    BackofficeConfig, BackofficeSettings, DetailLinkRule, SidebarGroup, SidebarSection,
    SiteOverrides, DEFAULT_SITE,
};

/// Environment variable naming the optional TOML configuration file
pub const CONFIG_FILE_ENV: &str = "BACKOFFICE_CONFIG";

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub security: SecurityConfig,
    pub backoffice: BackofficeConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    #[validate(range(min = 1, max = 65535))]
    pub obs_port: u16,
    /// Maximum urlencoded form body in bytes
    #[validate(range(min = 1024, max = 10485760))] // 1KB to 10MB
    pub form_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            obs_port: 9000,
            form_limit: 262144, // 256KB
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub path: String,
    #[validate(range(min = 1, max = 100))]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "backoffice.db".to_string(),
            pool_size: 10,
        }
    }
}

/// Security configuration with secret redaction
#[derive(Clone, Deserialize, Serialize, Validate)]
pub struct SecurityConfig {
    #[validate(length(min = 32))]
    pub jwt_secret: String,
    /// Whether to use secure cookies (requires HTTPS)
    pub secure_cookies: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: insecure_default_secret(),
            secure_cookies: false,
        }
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

fn insecure_default_secret() -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("INSECURE-RANDOM-{}-CHANGE-IN-PRODUCTION", timestamp)
}

impl Config {
    /// Load configuration from defaults, the optional TOML file and environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| "backoffice.toml".to_string());
        Self::load_from(&path)
    }

    /// Load configuration using an explicit file path (missing files are ignored)
    pub fn load_from(path: &str) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        builder = builder
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.obs_port", 9000)?
            .set_default("server.form_limit", 262144)?
            .set_default("database.path", "backoffice.db")?
            .set_default("database.pool_size", 10)?
            .set_default("security.secure_cookies", false)?
            .set_default("backoffice.site", DEFAULT_SITE)?;

        // Keys containing underscores can't go through the "_" separator
        if let Ok(jwt_secret) = std::env::var("BACKOFFICE_SECURITY_JWT_SECRET") {
            builder = builder.set_override("security.jwt_secret", jwt_secret)?;
        } else {
            builder = builder.set_default("security.jwt_secret", insecure_default_secret())?;
        }
        if let Ok(secure) = std::env::var("BACKOFFICE_SECURITY_SECURE_COOKIES") {
            builder = builder.set_override("security.secure_cookies", secure)?;
        }
        if let Ok(pool_size) = std::env::var("BACKOFFICE_DATABASE_POOL_SIZE") {
            builder = builder.set_override("database.pool_size", pool_size)?;
        }
        if let Ok(obs_port) = std::env::var("BACKOFFICE_SERVER_OBS_PORT") {
            builder = builder.set_override("server.obs_port", obs_port)?;
        }
        if let Ok(site) = std::env::var("BACKOFFICE_SITE") {
            builder = builder.set_override("backoffice.site", site)?;
        }

        builder = builder.add_source(File::with_name(path).required(false));

        // Environment variables have the highest priority
        builder = builder.add_source(
            Environment::with_prefix("BACKOFFICE")
                .try_parsing(true)
                .separator("_"),
        );

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        parsed
            .validate()
            .map_err(|e| Error::Config(format!("Config validation failed: {}", e)))?;

        // Fail at startup rather than on the first request
        parsed.backoffice.resolve()?;

        Ok(parsed)
    }
}
