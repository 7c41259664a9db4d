//! Server configuration loading from file and environment variables.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use palisade_oracle::{OracleConfig, DEFAULT_ORACLE_URL};
use palisade_store::QueryLimits;
use serde::Deserialize;
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

    /// Relay identity.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Query ceilings.
    #[serde(default)]
    pub query: QueryConfig,

    /// Admission policy.
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Reputation oracle.
    #[serde(default)]
    pub oracle: OracleSection,
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

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "palisade_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Relay identity and NIP-11 metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Free-text description.
    #[serde(default)]
    pub description: String,

    /// Public `wss://` URL of this relay.
    #[serde(default)]
    pub url: String,

    /// Operator pubkey (hex). Events from this key bypass admission, and
    /// direct messages must be addressed to it.
    #[serde(default)]
    pub pubkey: String,

    /// Secret key (hex) used to sign oracle requests.
    #[serde(default)]
    pub secret_key: String,

    /// Operator contact.
    #[serde(default)]
    pub contact: String,

    /// Icon URL.
    #[serde(default)]
    pub icon: String,

    /// Banner URL.
    #[serde(default)]
    pub banner: String,
}

/// Filter ceilings.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Limit applied when a filter omits one or asks for too many. Capped at `max_limit`.
    #[serde(default = "default_limit")]
    pub default_limit: i64,

    /// Largest limit a filter may request.
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,

    /// Maximum `ids` per filter.
    #[serde(default = "default_max_ids")]
    pub max_ids: usize,

    /// Maximum `authors` per filter.
    #[serde(default = "default_max_authors")]
    pub max_authors: usize,

    /// Maximum `kinds` per filter.
    #[serde(default = "default_max_kinds")]
    pub max_kinds: usize,

    /// Maximum tag values per filter, summed over all tag names.
    #[serde(default = "default_max_tag_values")]
    pub max_tag_values: usize,
}

/// Admission policy configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdmissionConfig {
    /// Ranks at or below this value are rejected.
    #[serde(default)]
    pub threshold: f64,

    /// Per-tier allowed kinds. When empty the built-in table is used.
    ///
    /// ```toml
    /// [[admission.tiers]]
    /// tier = 0
    /// kinds = [0, 4]
    /// ```
    #[serde(default)]
    pub tiers: Vec<TierEntry>,
}

/// One row of the configured tier table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TierEntry {
    /// Whitelist tier.
    pub tier: u8,
    /// Kinds authors at this tier may publish.
    pub kinds: Vec<u32>,
}

/// Reputation oracle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleSection {
    /// Relay the oracle listens on.
    #[serde(default = "default_oracle_url")]
    pub url: String,

    /// Deadline for one rank request, in milliseconds.
    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3334
}

fn default_db_path() -> String {
    "palisade.db".to_string()
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

fn default_limit() -> i64 {
    QueryLimits::default().default_limit
}

fn default_max_limit() -> i64 {
    QueryLimits::default().max_limit
}

fn default_max_ids() -> usize {
    QueryLimits::default().max_ids
}

fn default_max_authors() -> usize {
    QueryLimits::default().max_authors
}

fn default_max_kinds() -> usize {
    QueryLimits::default().max_kinds
}

fn default_max_tag_values() -> usize {
    QueryLimits::default().max_tag_values
}

fn default_oracle_url() -> String {
    DEFAULT_ORACLE_URL.to_string()
}

fn default_oracle_timeout_ms() -> u64 {
    10_000
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

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            max_ids: default_max_ids(),
            max_authors: default_max_authors(),
            max_kinds: default_max_kinds(),
            max_tag_values: default_max_tag_values(),
        }
    }
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            url: default_oracle_url(),
            timeout_ms: default_oracle_timeout_ms(),
        }
    }
}

impl QueryConfig {
    /// The store-level limits.
    pub fn limits(&self) -> QueryLimits {
        QueryLimits {
            default_limit: self.default_limit.min(self.max_limit),
            max_limit: self.max_limit,
            max_ids: self.max_ids,
            max_authors: self.max_authors,
            max_kinds: self.max_kinds,
            max_tag_values: self.max_tag_values,
        }
    }
}

impl OracleSection {
    /// The client-level settings.
    pub fn client_config(&self) -> OracleConfig {
        OracleConfig {
            url: self.url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
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
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `PALISADE_HOST` overrides `server.host`
/// - `PALISADE_PORT` overrides `server.port`
/// - `PALISADE_DB_PATH` overrides `database.path`
/// - `PALISADE_LOG_LEVEL` overrides `logging.level`
/// - `PALISADE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `PALISADE_RELAY_PUBKEY` overrides `relay.pubkey`
/// - `PALISADE_RELAY_SECRET_KEY` overrides `relay.secret_key`
/// - `PALISADE_DEFAULT_LIMIT` overrides `query.default_limit`
/// - `PALISADE_THRESHOLD` overrides `admission.threshold`
/// - `PALISADE_ORACLE_URL` overrides `oracle.url`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
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

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

fn apply_env_overrides(mut config: Config, var: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(parsed) = var("PALISADE_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = var("PALISADE_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(db_path) = var("PALISADE_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("PALISADE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("PALISADE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(pubkey) = var("PALISADE_RELAY_PUBKEY") {
        config.relay.pubkey = pubkey;
    }
    if let Some(secret) = var("PALISADE_RELAY_SECRET_KEY") {
        config.relay.secret_key = secret;
    }
    if let Some(parsed) = var("PALISADE_DEFAULT_LIMIT").and_then(|v| v.parse().ok()) {
        config.query.default_limit = parsed;
    }
    if let Some(parsed) = var("PALISADE_THRESHOLD").and_then(|v| v.parse().ok()) {
        config.admission.threshold = parsed;
    }
    if let Some(url) = var("PALISADE_ORACLE_URL") {
        config.oracle.url = url;
    }
    config
}
