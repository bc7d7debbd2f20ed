use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::params::vocab::NOT_SET;

const DEFAULT_ENDPOINT: &str = "https://www.google-analytics.com/";

/// The collector accepts at most this many hits per batch request.
pub const MAX_BATCH_EVENTS: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GA_TRACKER_ENDPOINT is not a valid URL: {0}")]
    EndpointInvalidUrl(String),

    #[error("{0} has invalid value: {1}")]
    InvalidNumeric(String, String),

    #[error("{0} has invalid value: {1} (expected \"true\" or \"false\")")]
    InvalidBool(String, String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(String),

    #[error("GA_TRACKER_MAX_BATCH_EVENTS must be between 1 and {MAX_BATCH_EVENTS}, got {0}")]
    InvalidBatchSize(usize),
}

/// Identity of the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub identifier: String,
    pub version: String,
    pub build: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: NOT_SET.into(),
            identifier: NOT_SET.into(),
            version: NOT_SET.into(),
            build: NOT_SET.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub language: String,
    pub screen_resolution: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            language: NOT_SET.into(),
            screen_resolution: NOT_SET.into(),
        }
    }
}

/// Tracker-wide values that end up in every hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerProfile {
    pub tracker_id: Option<String>,
    pub anonymize_ip: bool,
    pub client_id: String,
    pub user_agent: String,
    pub app: AppInfo,
    pub device: DeviceInfo,
}

impl Default for TrackerProfile {
    fn default() -> Self {
        Self {
            tracker_id: None,
            anonymize_ip: true,
            client_id: Uuid::new_v4().to_string(),
            user_agent: "custom".into(),
            app: AppInfo::default(),
            device: DeviceInfo::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL; `collect` and `batch` are resolved against it.
    pub endpoint: Url,
    pub max_batch_events: usize,
    pub flush_interval: Duration,
    pub collect_timeout: Duration,
    pub batch_timeout: Duration,
    pub profile: TrackerProfile,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            max_batch_events: MAX_BATCH_EVENTS,
            flush_interval: Duration::from_secs(3),
            collect_timeout: Duration::from_secs(3),
            batch_timeout: Duration::from_secs(15),
            profile: TrackerProfile::default(),
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with("GA_TRACKER_"))
            .collect();
        Self::parse(&vars)
    }

    fn parse(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let endpoint = parse_endpoint(vars)?;
        let max_batch_events = parse_batch_size(vars)?;
        let flush_interval = parse_duration_ms(vars, "GA_TRACKER_FLUSH_INTERVAL_MS", 3000)?;
        let collect_timeout = parse_duration_ms(vars, "GA_TRACKER_COLLECT_TIMEOUT_MS", 3000)?;
        let batch_timeout = parse_duration_ms(vars, "GA_TRACKER_BATCH_TIMEOUT_MS", 15_000)?;

        let profile = TrackerProfile {
            tracker_id: non_empty(vars, "GA_TRACKER_ID").map(str::to_owned),
            anonymize_ip: parse_bool(vars, "GA_TRACKER_ANONYMIZE_IP", true)?,
            client_id: non_empty(vars, "GA_TRACKER_CLIENT_ID")
                .map(str::to_owned)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_agent: string_or(vars, "GA_TRACKER_USER_AGENT", "custom"),
            app: AppInfo {
                name: string_or(vars, "GA_TRACKER_APP_NAME", NOT_SET),
                identifier: string_or(vars, "GA_TRACKER_APP_ID", NOT_SET),
                version: string_or(vars, "GA_TRACKER_APP_VERSION", NOT_SET),
                build: string_or(vars, "GA_TRACKER_APP_BUILD", NOT_SET),
            },
            device: DeviceInfo {
                language: string_or(vars, "GA_TRACKER_LANGUAGE", NOT_SET),
                screen_resolution: string_or(vars, "GA_TRACKER_SCREEN_RESOLUTION", NOT_SET),
            },
        };

        Ok(Self {
            endpoint,
            max_batch_events,
            flush_interval,
            collect_timeout,
            batch_timeout,
            profile,
        })
    }
}

fn non_empty<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn string_or(vars: &HashMap<String, String>, name: &str, default: &str) -> String {
    non_empty(vars, name).unwrap_or(default).to_owned()
}

fn parse_endpoint(vars: &HashMap<String, String>) -> Result<Url, ConfigError> {
    let raw = non_empty(vars, "GA_TRACKER_ENDPOINT").unwrap_or(DEFAULT_ENDPOINT);

    // Url::join drops the last path segment unless the base ends in a slash.
    let normalized = if raw.ends_with('/') {
        raw.to_owned()
    } else {
        format!("{raw}/")
    };

    let url = Url::parse(&normalized).map_err(|_| ConfigError::EndpointInvalidUrl(raw.to_owned()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::EndpointInvalidUrl(raw.to_owned()));
    }
    Ok(url)
}

fn parse_batch_size(vars: &HashMap<String, String>) -> Result<usize, ConfigError> {
    let name = "GA_TRACKER_MAX_BATCH_EVENTS";
    let size = match vars.get(name) {
        Some(val) => val
            .parse()
            .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone()))?,
        None => MAX_BATCH_EVENTS,
    };
    if size == 0 || size > MAX_BATCH_EVENTS {
        return Err(ConfigError::InvalidBatchSize(size));
    }
    Ok(size)
}

fn parse_duration_ms(
    vars: &HashMap<String, String>,
    name: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    let ms = match vars.get(name) {
        Some(val) => val
            .parse()
            .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone()))?,
        None => default_ms,
    };
    if ms == 0 {
        return Err(ConfigError::ZeroDuration(name.to_owned()));
    }
    Ok(Duration::from_millis(ms))
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(name).map(|s| s.as_str()) {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(ConfigError::InvalidBool(name.to_owned(), other.to_owned())),
    }
}
