//! # Server Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MERCADO_PORT=9000                                                  │
//! │     MERCADO_JWT_SECRET=...                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or $MERCADO_CONFIG, or                            │
//! │     ~/.config/mercado/config.toml (Linux)                              │
//! │     ~/Library/Application Support/com.mercado.mercado/config.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 8080
//! cors_origins = ["https://shop.example.com"]
//!
//! [database]
//! path = "/var/lib/mercado/mercado.db"
//! max_connections = 5
//!
//! [auth]
//! jwt_secret = "at-least-sixteen-characters"
//! token_lifetime_secs = 43200
//! bootstrap_username = "owner"
//! bootstrap_password = "change-me-please"
//!
//! [inventory]
//! allow_negative_stock = false
//! low_stock_threshold = 5
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use mercado_core::validation::{validate_password, validate_username};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Development secret; `main` warns when it is still in use.
pub const DEFAULT_JWT_SECRET: &str = "mercado-dev-secret-change-in-production";

const MIN_SECRET_LEN: usize = 16;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Browser origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind: default_bind(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Admin token lifetime in seconds.
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: i64,

    /// Admin created on first start when none exists.
    #[serde(default)]
    pub bootstrap_username: Option<String>,

    #[serde(default)]
    pub bootstrap_password: Option<String>,
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_token_lifetime() -> i64 {
    12 * 60 * 60
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            jwt_secret: default_jwt_secret(),
            token_lifetime_secs: default_token_lifetime(),
            bootstrap_username: None,
            bootstrap_password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Let checkout and stock adjustments drive stock below zero.
    #[serde(default)]
    pub allow_negative_stock: bool,

    /// Default threshold for the low-stock report.
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
}

fn default_low_stock_threshold() -> i64 {
    5
}

impl Default for InventorySettings {
    fn default() -> Self {
        InventorySettings {
            allow_negative_stock: false,
            low_stock_threshold: default_low_stock_threshold(),
        }
    }
}

// =============================================================================
// ServerConfig
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub inventory: InventorySettings,
}

impl ServerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file: `config_path`, else `$MERCADO_CONFIG`, else the
    ///    platform config dir. Only the platform file may be absent.
    /// 3. `MERCADO_*` environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let explicit = config_path.or_else(|| std::env::var_os("MERCADO_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                Some(path) => {
                    debug!(?path, "Config file not found, using defaults");
                    Self::default()
                }
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        info!(?path, "Loading config from file");
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Applies `MERCADO_*` overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        }

        if let Some(bind) = lookup("MERCADO_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("MERCADO_PORT") {
            self.server.port = parse("MERCADO_PORT", &port)?;
            debug!(port = self.server.port, "Overriding port from environment");
        }
        if let Some(origins) = lookup("MERCADO_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(path) = lookup("MERCADO_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(max) = lookup("MERCADO_MAX_CONNECTIONS") {
            self.database.max_connections = parse("MERCADO_MAX_CONNECTIONS", &max)?;
        }
        if let Some(secret) = lookup("MERCADO_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(lifetime) = lookup("MERCADO_TOKEN_LIFETIME_SECS") {
            self.auth.token_lifetime_secs = parse("MERCADO_TOKEN_LIFETIME_SECS", &lifetime)?;
        }
        if let Some(username) = lookup("MERCADO_ADMIN_USERNAME") {
            self.auth.bootstrap_username = Some(username);
        }
        if let Some(password) = lookup("MERCADO_ADMIN_PASSWORD") {
            self.auth.bootstrap_password = Some(password);
        }
        if let Some(allow) = lookup("MERCADO_ALLOW_NEGATIVE_STOCK") {
            self.inventory.allow_negative_stock = parse("MERCADO_ALLOW_NEGATIVE_STOCK", &allow)?;
        }
        if let Some(threshold) = lookup("MERCADO_LOW_STOCK_THRESHOLD") {
            self.inventory.low_stock_threshold = parse("MERCADO_LOW_STOCK_THRESHOLD", &threshold)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be greater than 0".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }
        if self.auth.token_lifetime_secs <= 0 {
            return Err(ConfigError::Invalid(
                "auth.token_lifetime_secs must be greater than 0".into(),
            ));
        }
        if self.inventory.low_stock_threshold < 0 {
            return Err(ConfigError::Invalid(
                "inventory.low_stock_threshold cannot be negative".into(),
            ));
        }

        match (&self.auth.bootstrap_username, &self.auth.bootstrap_password) {
            (Some(username), Some(password)) => {
                validate_username(username)
                    .map_err(|e| ConfigError::Invalid(format!("auth.bootstrap_username: {}", e)))?;
                validate_password(password)
                    .map_err(|e| ConfigError::Invalid(format!("auth.bootstrap_password: {}", e)))?;
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "auth.bootstrap_username and auth.bootstrap_password must be set together"
                        .into(),
                ))
            }
        }

        Ok(())
    }

    /// Address to listen on.
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        format!("{}:{}", self.server.bind, self.server.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("server.bind".to_string()))
    }

    /// Configured database file, or `mercado.db` in the platform data dir.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }
        directories::ProjectDirs::from("com", "mercado", "mercado")
            .map(|dirs| dirs.data_dir().join("mercado.db"))
            .unwrap_or_else(|| PathBuf::from("mercado.db"))
    }

    pub fn uses_default_secret(&self) -> bool {
        self.auth.jwt_secret == DEFAULT_JWT_SECRET
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "mercado", "mercado")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
