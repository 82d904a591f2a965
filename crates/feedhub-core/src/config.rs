use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::parse_interval;

/// Environment variable overriding `scheduler.interval`
pub const ENV_INTERVAL: &str = "CLI_APP_TIMER_INTERVAL";
/// Environment variable overriding `scheduler.workers`
pub const ENV_WORKERS: &str = "CLI_APP_WORKERS_COUNT";
/// Environment variable overriding `scheduler.sync_interval`
pub const ENV_SYNC_INTERVAL: &str = "DB_TIMER_INTERVAL";
/// Environment variable overriding `database.path`
pub const ENV_DATABASE: &str = "FEEDHUB_DATABASE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level, used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; defaults to `<data_dir>/feedhub.db`
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Connection pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Startup values for the scheduler. The live values are later converged
/// toward whatever is stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Dispatch interval, e.g. "3m"
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Number of concurrent fetch workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// How often the stored configuration is polled, e.g. "1m"
    #[serde(default = "default_sync_interval")]
    pub sync_interval: String,
    /// Feeds loaded per dispatch tick (oldest-updated first)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Capacity of the job queue between dispatcher and workers
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            workers: default_workers(),
            sync_interval: default_sync_interval(),
            batch_size: default_batch_size(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl SchedulerSettings {
    /// Parsed dispatch interval
    pub fn interval(&self) -> crate::Result<Duration> {
        parse_positive(&self.interval, "scheduler.interval")
    }

    /// Parsed config-sync poll interval
    pub fn sync_interval(&self) -> crate::Result<Duration> {
        parse_positive(&self.sync_interval, "scheduler.sync_interval")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Largest feed document accepted, in bytes
    #[serde(default = "default_max_feed_bytes")]
    pub max_feed_bytes: usize,
    /// HTTP proxy URL for feed fetching (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
            max_feed_bytes: default_max_feed_bytes(),
            proxy_url: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedhub")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_interval() -> String {
    "3m".to_string()
}

fn default_workers() -> usize {
    3
}

fn default_sync_interval() -> String {
    "1m".to_string()
}

fn default_batch_size() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    100
}

fn default_timeout() -> u64 {
    30
}

fn default_max_feed_bytes() -> usize {
    5 * 1024 * 1024
}

fn parse_positive(raw: &str, key: &str) -> crate::Result<Duration> {
    let duration =
        parse_interval(raw).map_err(|e| crate::Error::Config(format!("{}: {}", key, e)))?;
    if duration.is_zero() {
        return Err(crate::Error::Config(format!("{} must be greater than zero", key)));
    }
    Ok(duration)
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file (or defaults), then apply environment overrides
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> crate::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(interval) = lookup(ENV_INTERVAL) {
            self.scheduler.interval = interval.trim().to_string();
        }

        if let Some(workers) = lookup(ENV_WORKERS) {
            self.scheduler.workers = workers.trim().parse().map_err(|_| {
                crate::Error::Config(format!("{} must be an integer, got {:?}", ENV_WORKERS, workers))
            })?;
        }

        if let Some(sync_interval) = lookup(ENV_SYNC_INTERVAL) {
            self.scheduler.sync_interval = sync_interval.trim().to_string();
        }

        if let Some(path) = lookup(ENV_DATABASE) {
            self.database.path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Check the settings the fetch process cannot start without
    pub fn validate(&self) -> crate::Result<()> {
        self.scheduler.interval()?;
        self.scheduler.sync_interval()?;

        if self.scheduler.workers == 0 {
            return Err(crate::Error::Config(
                "scheduler.workers must be at least 1".to_string(),
            ));
        }
        if self.scheduler.batch_size == 0 {
            return Err(crate::Error::Config(
                "scheduler.batch_size must be at least 1".to_string(),
            ));
        }
        if self.scheduler.queue_capacity == 0 {
            return Err(crate::Error::Config(
                "scheduler.queue_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/feedhub/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("feedhub")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        match &self.database.path {
            Some(path) => expand_tilde(path),
            None => self.data_dir().join("feedhub.db"),
        }
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}
