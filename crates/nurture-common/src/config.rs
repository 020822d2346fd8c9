//! Configuration for Nurture

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Campaign scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Pattern analyzer configuration
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Outbound SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database backend: "postgres"
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Database URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_db_backend() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// How unrecognized step conditions are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionPolicy {
    /// Unknown conditions count as met; a new predicate type never freezes
    /// a running campaign
    FailOpen,
    /// Unknown conditions count as unmet
    FailClosed,
}

impl Default for ConditionPolicy {
    fn default() -> Self {
        ConditionPolicy::FailOpen
    }
}

/// Retry behavior after a failed dispatch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum RetryPolicy {
    /// Failed sends surface to operators; the enrollment stays active with
    /// its step unchanged
    None,
    /// Schedule a fresh attempt of the same step after a fixed delay
    FixedBackoff {
        #[serde(default = "default_backoff_hours")]
        delay_hours: i64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::None
    }
}

fn default_backoff_hours() -> i64 {
    24
}

/// Campaign scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum executions processed per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Interval between ticks (seconds)
    #[serde(default = "default_scheduler_interval")]
    pub poll_interval_secs: u64,

    /// Handling of unrecognized step conditions
    #[serde(default)]
    pub condition_policy: ConditionPolicy,

    /// Retry behavior for failed dispatches
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            poll_interval_secs: default_scheduler_interval(),
            condition_policy: ConditionPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_batch_size() -> i64 {
    50
}

fn default_scheduler_interval() -> u64 {
    60
}

/// Pattern analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Interval between analysis runs (seconds)
    #[serde(default = "default_analyzer_interval")]
    pub poll_interval_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_analyzer_interval(),
        }
    }
}

fn default_analyzer_interval() -> u64 {
    3600
}

/// Outbound SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// Relay port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Username for SMTP auth
    pub username: Option<String>,

    /// Password for SMTP auth
    pub password: Option<String>,

    /// Use implicit TLS
    #[serde(default)]
    pub use_tls: bool,

    /// Use STARTTLS
    #[serde(default = "default_use_starttls")]
    pub use_starttls: bool,

    /// From address for campaign mail
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Display name for the from address
    pub from_name: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            use_tls: false,
            use_starttls: default_use_starttls(),
            from_address: default_from_address(),
            from_name: None,
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_use_starttls() -> bool {
    true
}

fn default_from_address() -> String {
    "outreach@localhost".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
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

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/nurture/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}
