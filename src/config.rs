use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_MAX_POSTS, DEFAULT_MAX_REPLY_DEPTH, DEFAULT_MAX_SEARCH_PAGES,
    DEFAULT_SEARCH_PAGE_SIZE, MAX_SEARCH_PAGE_SIZE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Upstream API
    pub api_url: String,
    pub access_token: Option<String>,
    pub http_timeout: Duration,

    // Aggregation
    pub search_page_size: u32,
    pub max_search_pages: usize,
    pub default_max_posts: usize,
    pub max_reply_depth: usize,
    pub presentation_concurrency: usize,

    // Tag feed polling
    pub watch_tags: Vec<String>,
    pub poll_interval: Duration,

    // Web Server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Upstream API
            api_url: env_or_default("BSKY_API_URL", DEFAULT_API_URL),
            access_token: optional_env("BSKY_ACCESS_TOKEN"),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),

            // Aggregation
            search_page_size: parse_env_u32("SEARCH_PAGE_SIZE", DEFAULT_SEARCH_PAGE_SIZE)?,
            max_search_pages: parse_env_usize("MAX_SEARCH_PAGES", DEFAULT_MAX_SEARCH_PAGES)?,
            default_max_posts: parse_env_usize("DEFAULT_MAX_POSTS", DEFAULT_MAX_POSTS)?,
            max_reply_depth: parse_env_usize("MAX_REPLY_DEPTH", DEFAULT_MAX_REPLY_DEPTH)?,
            presentation_concurrency: parse_env_usize("PRESENTATION_CONCURRENCY", 1)?,

            // Tag feed polling
            watch_tags: parse_tag_list(&env_or_default("WATCH_TAGS", "")),
            poll_interval: Duration::from_secs(parse_env_u64("POLL_INTERVAL_SECS", 60)?),

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
        })
    }

    /// Configuration with defaults suitable for tests. Nothing is read from the environment.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            access_token: None,
            http_timeout: Duration::from_secs(10),
            search_page_size: DEFAULT_SEARCH_PAGE_SIZE,
            max_search_pages: DEFAULT_MAX_SEARCH_PAGES,
            default_max_posts: DEFAULT_MAX_POSTS,
            max_reply_depth: DEFAULT_MAX_REPLY_DEPTH,
            presentation_concurrency: 1,
            watch_tags: Vec::new(),
            poll_interval: Duration::from_secs(60),
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "BSKY_API_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.search_page_size == 0 || self.search_page_size > MAX_SEARCH_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                name: "SEARCH_PAGE_SIZE".to_string(),
                message: format!("must be between 1 and {MAX_SEARCH_PAGE_SIZE}"),
            });
        }
        if self.max_search_pages == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_SEARCH_PAGES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.default_max_posts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "DEFAULT_MAX_POSTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_reply_depth == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_REPLY_DEPTH".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.presentation_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PRESENTATION_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "POLL_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

/// Split a comma-separated tag list, dropping blanks and leading `#`.
fn parse_tag_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|t| t.trim().trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
