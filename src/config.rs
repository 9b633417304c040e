use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Backend caps `GET /chat-history/sessions` at 100.
const MAX_SESSION_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to. No trailing slash.
    pub api_url: String,
    /// Answer chat turns from canned pipelines instead of the backend.
    pub demo_mode: bool,
    /// How often the recent-sessions list is refreshed.
    pub session_poll_secs: u64,
    /// How many recent sessions to fetch per refresh.
    pub session_limit: usize,
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    /// Load configuration from `PAWBOND_*` environment variables and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            api_url: lookup("PAWBOND_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim()
                .trim_end_matches('/')
                .to_string(),
            demo_mode: lookup("PAWBOND_DEMO_MODE")
                .unwrap_or_else(|| "false".to_string())
                .trim()
                .parse()
                .context("PAWBOND_DEMO_MODE must be true or false")?,
            session_poll_secs: lookup("PAWBOND_SESSION_POLL_SECS")
                .unwrap_or_else(|| "10".to_string())
                .trim()
                .parse()
                .context("PAWBOND_SESSION_POLL_SECS must be a whole number of seconds")?,
            session_limit: lookup("PAWBOND_SESSION_LIMIT")
                .unwrap_or_else(|| "20".to_string())
                .trim()
                .parse()
                .context("PAWBOND_SESSION_LIMIT must be a number")?,
            request_timeout_secs: lookup("PAWBOND_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .trim()
                .parse()
                .context("PAWBOND_REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("PAWBOND_API_URL cannot be empty");
        }
        url::Url::parse(&self.api_url)
            .with_context(|| format!("PAWBOND_API_URL is not a valid URL: {}", self.api_url))?;
        if self.session_poll_secs == 0 {
            anyhow::bail!("Session poll interval must be greater than 0");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than 0");
        }
        if self.session_limit == 0 || self.session_limit > MAX_SESSION_LIMIT {
            anyhow::bail!("Session limit must be between 1 and {MAX_SESSION_LIMIT}");
        }
        Ok(())
    }

    pub fn session_poll_interval(&self) -> Duration {
        Duration::from_secs(self.session_poll_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            demo_mode: false,
            session_poll_secs: 10,
            session_limit: 20,
            request_timeout_secs: 30,
        }
    }
}
