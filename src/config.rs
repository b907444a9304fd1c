//! Service configuration, read from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Service-level settings. Mailbox and LLM settings live in
/// `EmailConfig` and `LlmConfig`.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// HTTP listen port.
    pub http_port: u16,
    /// Period of the background mailbox poll.
    pub poll_interval: Duration,
    /// Messages fetched per listing.
    pub mailbox_limit: usize,
    /// Run the auto-reply batch after every successful poll.
    pub auto_reply_on_poll: bool,
    /// Directory for daily-rolling log files; stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            poll_interval: Duration::from_secs(60),
            mailbox_limit: 20,
            auto_reply_on_poll: false,
            log_dir: None,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let poll_secs: u64 = env_parse("INBOX_POLL_INTERVAL_SECS", defaults.poll_interval.as_secs())?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "INBOX_POLL_INTERVAL_SECS".into(),
                message: "must be at least 1".into(),
            });
        }

        let mailbox_limit: usize = env_parse("INBOX_MAILBOX_LIMIT", defaults.mailbox_limit)?;
        if mailbox_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "INBOX_MAILBOX_LIMIT".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            http_port: env_parse("INBOX_HTTP_PORT", defaults.http_port)?,
            poll_interval: Duration::from_secs(poll_secs),
            mailbox_limit,
            auto_reply_on_poll: env_bool("INBOX_AUTO_REPLY", defaults.auto_reply_on_poll)?,
            log_dir: std::env::var("INBOX_LOG_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })
}

fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_bool(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}
