//! Configuration management for MoltWatch services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Upstream feed configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Translation backend configuration
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Retention policy
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Ingestion scheduler
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Feed endpoint variants, tried in order. `{ts}` expands to the current unix time.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// User-Agent sent with feed requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Referer sent with feed requests
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Local snapshot used when every endpoint fails
    pub snapshot_path: Option<PathBuf>,

    /// Overwrite the snapshot with each successful live payload
    #[serde(default)]
    pub refresh_snapshot: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslationConfig {
    /// Disable to store posts without calling the translation backend
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Translation provider: google, passthrough
    #[serde(default = "default_translation_provider")]
    pub provider: String,

    /// Base URL of the translation backend
    #[serde(default = "default_translation_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_translation_timeout")]
    pub timeout_secs: u64,

    /// Input is truncated to this many characters before submission
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Run the pruner after each ingestion cycle
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Number of highest-score posts to keep
    #[serde(default = "default_keep_top_scored")]
    pub keep_top_scored: u64,

    /// Number of most recently created posts to keep
    #[serde(default = "default_keep_most_recent")]
    pub keep_most_recent: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Run ingestion cycles in the serving process
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Base interval between cycles in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Upper bound of the random delay added to each interval, in seconds
    #[serde(default = "default_jitter")]
    pub jitter_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (debug, info, moltwatch_ingestion=debug)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Expose Prometheus metrics on /metrics
    #[serde(default = "default_enabled")]
    pub metrics_enabled: bool,

    /// Service name for log records
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 30 }
fn default_database_url() -> String { "sqlite://moltwatch.db?mode=rwc".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_endpoints() -> Vec<String> {
    vec![
        "https://www.moltbook.com/api/v1/posts?sort=new".to_string(),
        "https://www.moltbook.com/api/v1/posts?limit=100&sort=new".to_string(),
        "https://www.moltbook.com/api/v1/posts".to_string(),
        "https://www.moltbook.com/api/v1/posts?_t={ts}".to_string(),
        "https://www.moltbook.com/api/v1/posts?filter=new".to_string(),
    ]
}
fn default_upstream_timeout() -> u64 { 15 }
fn default_user_agent() -> String {
    concat!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
    )
    .to_string()
}
fn default_referer() -> String { "https://www.moltbook.com/".to_string() }
fn default_translation_provider() -> String { "google".to_string() }
fn default_translation_base_url() -> String { "https://translate.googleapis.com".to_string() }
fn default_translation_timeout() -> u64 { 10 }
fn default_max_chars() -> usize { 4500 }
fn default_keep_top_scored() -> u64 { crate::DEFAULT_KEEP_TOP_SCORED }
fn default_keep_most_recent() -> u64 { crate::DEFAULT_KEEP_MOST_RECENT }
fn default_interval() -> u64 { 15 }
fn default_jitter() -> u64 { 5 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "moltwatch".to_string() }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081, APP__RETENTION__KEEP_TOP_SCORED=50
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("upstream.endpoints")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TranslationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            read_url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            timeout_secs: default_upstream_timeout(),
            user_agent: default_user_agent(),
            referer: default_referer(),
            snapshot_path: Some(PathBuf::from("api_response_posts.json")),
            refresh_snapshot: false,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_translation_provider(),
            base_url: default_translation_base_url(),
            timeout_secs: default_translation_timeout(),
            max_chars: default_max_chars(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            keep_top_scored: default_keep_top_scored(),
            keep_most_recent: default_keep_most_recent(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            jitter_secs: default_jitter(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_enabled: default_enabled(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            upstream: UpstreamConfig::default(),
            translation: TranslationConfig::default(),
            retention: RetentionConfig::default(),
            scheduler: SchedulerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.retention.keep_top_scored, 100);
        assert_eq!(config.retention.keep_most_recent, 200);
        assert_eq!(config.scheduler.interval(), Duration::from_secs(15));
        assert_eq!(config.scheduler.max_jitter(), Duration::from_secs(5));
        assert_eq!(config.translation.max_chars, 4500);
    }

    #[test]
    fn test_default_endpoints_are_ordered() {
        let config = UpstreamConfig::default();
        assert_eq!(config.endpoints.len(), 5);
        assert!(config.endpoints[0].ends_with("sort=new"));
        assert!(config.endpoints.iter().any(|e| e.contains("{ts}")));
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "sqlite://moltwatch.db?mode=rwc");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = Config::builder()
            .add_source(config::File::from_str(
                "[retention]\nkeep_top_scored = 10\n[scheduler]\njitter_secs = 0\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.retention.keep_top_scored, 10);
        assert_eq!(config.retention.keep_most_recent, 200);
        assert_eq!(config.scheduler.jitter_secs, 0);
        assert_eq!(config.scheduler.interval_secs, 15);
    }
}
