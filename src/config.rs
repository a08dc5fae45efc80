//! # Bot Configuration Module
//!
//! This module defines the runtime configuration of the property bot. Values are
//! read from the process environment; `main` loads a `.env` file beforehand so
//! local development works without exporting anything.

use std::env;
use std::time::Duration;

use chrono::TimeDelta;
use reqwest::Url;
use teloxide::types::UserId;

// Defaults for optional settings
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 24 * 60; // one day
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Errors raised while reading the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or blank
    Missing(&'static str),
    /// A variable is present but cannot be interpreted
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{key} is required"),
            ConfigError::Invalid { key, value } => write!(f, "{key} has an invalid value: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the bot process
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// Base URL of the web application, without a trailing slash
    pub app_url: String,
    /// The administrator identity; always approved, owns the wizard
    pub admin_id: UserId,
    /// Bearer key for the admin API of the web application
    pub admin_key: String,
    /// Optional PostgreSQL URL for persisting the approval state
    pub database_url: Option<String>,
    /// Idle time after which a wizard session is discarded
    pub session_ttl: TimeDelta,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,
}

impl BotConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &'static str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| value(key).ok_or(ConfigError::Missing(key));

        let bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let app_url = normalize_app_url(&required("WEBAPP_URL")?);
        if !is_web_url(&app_url) {
            return Err(ConfigError::Invalid {
                key: "WEBAPP_URL",
                value: app_url,
            });
        }
        let admin_raw = required("ADMIN_TELEGRAM_ID")?;
        let admin_id = admin_raw
            .parse::<u64>()
            .map(UserId)
            .map_err(|_| ConfigError::Invalid {
                key: "ADMIN_TELEGRAM_ID",
                value: admin_raw.clone(),
            })?;
        let admin_key = required("ADMIN_KEY")?;

        let session_ttl = match value("WIZARD_SESSION_TTL_MINUTES") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|minutes| *minutes > 0)
                .and_then(TimeDelta::try_minutes)
                .ok_or(ConfigError::Invalid {
                    key: "WIZARD_SESSION_TTL_MINUTES",
                    value: raw,
                })?,
            None => TimeDelta::minutes(DEFAULT_SESSION_TTL_MINUTES),
        };

        let http_timeout = match value("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::Invalid {
                    key: "HTTP_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            bot_token,
            app_url,
            admin_id,
            admin_key,
            database_url: value("DATABASE_URL"),
            session_ttl,
            http_timeout,
        })
    }

    /// Whether the given identity is the configured administrator
    pub fn is_admin(&self, user: UserId) -> bool {
        user == self.admin_id
    }

    /// Base URL of the admin area of the web application
    pub fn admin_url(&self) -> String {
        format!("{}/admin", self.app_url)
    }
}

/// Strip trailing slashes so paths can be appended with `format!`
pub fn normalize_app_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// Absolute http(s) URL that paths and query strings can be appended to
fn is_web_url(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.has_host())
        .unwrap_or(false)
}
