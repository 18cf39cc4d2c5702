use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Most threads Reddit returns from one listing page.
pub const MAX_LIMIT: usize = 100;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {source}", path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    #[error("failed to parse config file '{}': {source}", path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize)]
#[serde(default)]
struct ConfigFile {
    /// Subreddit to harvest when none is given on the command line.
    topic: String,
    /// Threads pulled per harvest run.
    limit: usize,
    min_sequence_length: usize,
    /// Replies at or above this many characters are dropped.
    max_reply_length: usize,
    rejected_markers: Vec<String>,
    /// Markup peeled off both ends of a reply before it is checked.
    strip_markers: Vec<String>,
    inter_request_delay_ms: u64,
    rate_limit_backoff_secs: u64,
    /// Directory for state files (logs, database). Defaults to current directory.
    data_dir: Option<String>,
    /// Statement database. Defaults to `<data_dir>/edward.db`.
    database: Option<String>,
    user_agent: String,
    request_timeout_secs: u64,
    /// Upper bound on "load more" requests spent expanding one thread.
    max_more_requests: usize,
    default_response: String,
    /// Minimum word overlap (0.0..=1.0) for a stored reply to be used.
    response_threshold: f64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            topic: "all".to_string(),
            limit: 9,
            min_sequence_length: 5,
            max_reply_length: 80,
            rejected_markers: vec!["[removed]".to_string(), "[deleted]".to_string()],
            strip_markers: vec!["/r/".to_string(), "^".to_string()],
            inter_request_delay_ms: 100,
            rate_limit_backoff_secs: 60,
            data_dir: None,
            database: None,
            user_agent: "edward:v0.1.1 (by /u/uselessbots)".to_string(),
            request_timeout_secs: 30,
            max_more_requests: 32,
            default_response: "I am sorry, but I do not understand.".to_string(),
            response_threshold: 0.2,
        }
    }
}

/// Harvester parameters.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub topic: String,
    pub limit: usize,
    pub min_sequence_length: usize,
    pub max_reply_length: usize,
    pub rejected_markers: Vec<String>,
    pub strip_markers: Vec<String>,
    /// Pause before each reply is processed.
    pub inter_request_delay: Duration,
    /// Pause after the source reports a rate limit.
    pub rate_limit_backoff: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        ConfigFile::default().harvest()
    }
}

/// Reddit client settings. Credentials come from the environment, not here.
#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub user_agent: String,
    pub request_timeout: Duration,
    pub max_more_requests: usize,
}

impl Default for RedditConfig {
    fn default() -> Self {
        ConfigFile::default().reddit()
    }
}

/// Responder settings used by interactive training.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub default_response: String,
    pub threshold: f64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        ConfigFile::default().responder()
    }
}

pub struct Config {
    /// Directory for state files (logs, database).
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub harvest: HarvestConfig,
    pub reddit: RedditConfig,
    pub responder: ResponderConfig,
}

impl ConfigFile {
    fn harvest(&self) -> HarvestConfig {
        HarvestConfig {
            topic: self.topic.clone(),
            limit: self.limit,
            min_sequence_length: self.min_sequence_length,
            max_reply_length: self.max_reply_length,
            rejected_markers: self.rejected_markers.clone(),
            strip_markers: self.strip_markers.clone(),
            inter_request_delay: Duration::from_millis(self.inter_request_delay_ms),
            rate_limit_backoff: Duration::from_secs(self.rate_limit_backoff_secs),
        }
    }

    fn reddit(&self) -> RedditConfig {
        RedditConfig {
            user_agent: self.user_agent.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_more_requests: self.max_more_requests,
        }
    }

    fn responder(&self) -> ResponderConfig {
        ResponderConfig {
            default_response: self.default_response.clone(),
            threshold: self.response_threshold,
        }
    }

    fn into_config(self) -> Config {
        let data_dir = self
            .data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let database_path = self
            .database
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("edward.db"));

        Config {
            harvest: self.harvest(),
            reddit: self.reddit(),
            responder: self.responder(),
            data_dir,
            database_path,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        ConfigFile::default().into_config()
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        let config = file.into_config();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Re-check invariants. Call again after applying command-line overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let h = &self.harvest;
        if h.topic.trim().is_empty() {
            return Err(ConfigError::Validation("topic must not be empty".into()));
        }
        // The topic becomes a URL path segment; `+` joins several subreddits.
        if !h.topic.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+') {
            return Err(ConfigError::Validation(format!(
                "topic '{}' may only contain letters, digits, '_' and '+'",
                h.topic
            )));
        }
        if h.limit == 0 || h.limit > MAX_LIMIT {
            return Err(ConfigError::Validation(format!("limit must be between 1 and {MAX_LIMIT}")));
        }
        if h.min_sequence_length == 0 {
            return Err(ConfigError::Validation("min_sequence_length must be at least 1".into()));
        }
        if h.max_reply_length == 0 {
            return Err(ConfigError::Validation("max_reply_length must be at least 1".into()));
        }
        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::Validation("user_agent is required".into()));
        }
        if !(0.0..=1.0).contains(&self.responder.threshold) {
            return Err(ConfigError::Validation(
                "response_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }
}
