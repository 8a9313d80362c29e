use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use std::fmt;

use crate::constants::{
    DEFAULT_ALERT_AGE_HOURS, DEFAULT_ALERT_CLEAR_SAFETY_MARGIN_SECS,
    DEFAULT_ALERT_CLEAR_WINDOW_SECS, DEFAULT_ALERT_COOLDOWN_SECS, DEFAULT_AUTOMATED_FILTER_ACTORS,
    DEFAULT_DOMINANT_POST_PCT, DEFAULT_PLATFORM_FILTER_ACTORS, DEFAULT_QUEUE_SIZE_THRESHOLD,
    MAX_QUEUE_LISTING,
};
use crate::monitor::snapshot::FilterActors;

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    /// Bearer token required on the event endpoints when set.
    pub ingest_token: Option<String>,
    pub worker: WorkerConfig,
    pub queue_source: QueueSourceConfig,
    pub actors: FilterActors,
    pub alerting: AlertConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub report_on_startup: bool,
}

#[derive(Clone)]
pub struct QueueSourceConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub limit: usize,
    pub timeout_secs: u64,
}

#[derive(Clone)]
pub struct AlertConfig {
    pub enabled: bool,
    /// 0 disables the size check.
    pub queue_size_threshold: u64,
    /// 0 disables the age check.
    pub age_hours: u64,
    /// 0 disables the dominant-post list.
    pub dominant_post_pct: u64,
    pub webhook_url: Option<String>,
    pub role_id: Option<String>,
    pub queue_name: String,
    pub queue_link: Option<String>,
    pub cooldown_secs: u64,
    pub clear_window_secs: u64,
    pub clear_safety_margin_secs: u64,
    pub webhook_timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_size_threshold: DEFAULT_QUEUE_SIZE_THRESHOLD,
            age_hours: DEFAULT_ALERT_AGE_HOURS,
            dominant_post_pct: DEFAULT_DOMINANT_POST_PCT,
            webhook_url: None,
            role_id: None,
            queue_name: "modqueue".to_string(),
            queue_link: None,
            cooldown_secs: DEFAULT_ALERT_COOLDOWN_SECS,
            clear_window_secs: DEFAULT_ALERT_CLEAR_WINDOW_SECS,
            clear_safety_margin_secs: DEFAULT_ALERT_CLEAR_SAFETY_MARGIN_SECS,
            webhook_timeout_secs: 10,
        }
    }
}

impl Default for FilterActors {
    fn default() -> Self {
        Self {
            automated: DEFAULT_AUTOMATED_FILTER_ACTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            platform: DEFAULT_PLATFORM_FILTER_ACTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ALERT_ROLE_ID must contain digits only, got `{0}`")]
    InvalidRoleId(String),
    #[error("{key} must be an http(s) URL")]
    InvalidUrl { key: &'static str },
    #[error("ALERT_CLEAR_SAFETY_MARGIN_SECS ({margin}) must be smaller than ALERT_CLEAR_WINDOW_SECS ({window})")]
    InvalidClearWindow { window: u64, margin: u64 },
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("ingest_token", &redacted(&self.ingest_token))
            .field("worker", &self.worker)
            .field("queue_source", &self.queue_source)
            .field("actors", &self.actors)
            .field("alerting", &self.alerting)
            .finish()
    }
}

impl fmt::Debug for QueueSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSourceConfig")
            .field("url", &self.url)
            .field("token", &redacted(&self.token))
            .field("limit", &self.limit)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl fmt::Debug for AlertConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Webhook URLs embed their own credential.
        f.debug_struct("AlertConfig")
            .field("enabled", &self.enabled)
            .field("queue_size_threshold", &self.queue_size_threshold)
            .field("age_hours", &self.age_hours)
            .field("dominant_post_pct", &self.dominant_post_pct)
            .field("webhook_url", &redacted(&self.webhook_url))
            .field("role_id", &self.role_id)
            .field("queue_name", &self.queue_name)
            .field("queue_link", &self.queue_link)
            .field("cooldown_secs", &self.cooldown_secs)
            .field("clear_window_secs", &self.clear_window_secs)
            .field("clear_safety_margin_secs", &self.clear_safety_margin_secs)
            .field("webhook_timeout_secs", &self.webhook_timeout_secs)
            .finish()
    }
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "***REDACTED***")
}

impl Config {
    pub fn from_env() -> Self {
        let queue_name = env_or("QUEUE_NAME", "modqueue");
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/modqueue.sled"),
            ingest_token: env_opt("INGEST_TOKEN"),
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                report_on_startup: env_or_bool("REPORT_ON_STARTUP", true),
            },
            queue_source: QueueSourceConfig {
                url: env_opt("QUEUE_SOURCE_URL"),
                token: env_opt("QUEUE_SOURCE_TOKEN"),
                limit: env_or_parse("QUEUE_SOURCE_LIMIT", MAX_QUEUE_LISTING)
                    .clamp(1, MAX_QUEUE_LISTING),
                timeout_secs: env_or_parse("QUEUE_SOURCE_TIMEOUT_SECS", 30_u64),
            },
            actors: FilterActors {
                automated: env_list("AUTOMATED_FILTER_ACTORS", DEFAULT_AUTOMATED_FILTER_ACTORS),
                platform: env_list("PLATFORM_FILTER_ACTORS", DEFAULT_PLATFORM_FILTER_ACTORS),
            },
            alerting: AlertConfig {
                enabled: env_or_bool("ALERTS_ENABLED", true),
                queue_size_threshold: env_or_parse(
                    "ALERT_QUEUE_SIZE_THRESHOLD",
                    DEFAULT_QUEUE_SIZE_THRESHOLD,
                ),
                age_hours: env_or_parse("ALERT_AGE_HOURS", DEFAULT_ALERT_AGE_HOURS),
                dominant_post_pct: env_or_parse(
                    "ALERT_DOMINANT_POST_PCT",
                    DEFAULT_DOMINANT_POST_PCT,
                ),
                webhook_url: env_opt("ALERT_WEBHOOK_URL"),
                role_id: env_opt("ALERT_ROLE_ID"),
                queue_link: env_opt("QUEUE_LINK"),
                queue_name,
                cooldown_secs: env_or_parse("ALERT_COOLDOWN_SECS", DEFAULT_ALERT_COOLDOWN_SECS),
                clear_window_secs: env_or_parse(
                    "ALERT_CLEAR_WINDOW_SECS",
                    DEFAULT_ALERT_CLEAR_WINDOW_SECS,
                ),
                clear_safety_margin_secs: env_or_parse(
                    "ALERT_CLEAR_SAFETY_MARGIN_SECS",
                    DEFAULT_ALERT_CLEAR_SAFETY_MARGIN_SECS,
                ),
                webhook_timeout_secs: env_or_parse("ALERT_WEBHOOK_TIMEOUT_SECS", 10_u64),
            },
        }
    }

    /// Checked before startup; any failure refuses to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let alerting = &self.alerting;
        if let Some(role) = &alerting.role_id {
            if !role.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::InvalidRoleId(role.clone()));
            }
        }
        if alerting.webhook_url.as_deref().is_some_and(|u| !is_http_url(u)) {
            return Err(ConfigError::InvalidUrl {
                key: "ALERT_WEBHOOK_URL",
            });
        }
        if self.queue_source.url.as_deref().is_some_and(|u| !is_http_url(u)) {
            return Err(ConfigError::InvalidUrl {
                key: "QUEUE_SOURCE_URL",
            });
        }
        if alerting.clear_safety_margin_secs >= alerting.clear_window_secs {
            return Err(ConfigError::InvalidClearWindow {
                window: alerting.clear_window_secs,
                margin: alerting.clear_safety_margin_secs,
            });
        }
        Ok(())
    }
}

fn is_http_url(raw: &str) -> bool {
    match reqwest::Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Trimmed value, `None` when unset or blank.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Comma separated list; falls back to `default` when unset.
pub fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
