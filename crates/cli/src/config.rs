use std::time::Duration;

use sitevisit_client::api::DEFAULT_UPLOAD_BASE_URL;
use sitevisit_client::poller::PollConfig;
use sitevisit_client::retry::RetryConfig;

/// Client configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Application server base URL (default: `http://127.0.0.1:5002`).
    pub server_base_url: String,
    /// Image-storage upload base URL.
    pub upload_base_url: String,
    /// Status-poll interval and absolute timeout.
    pub poll: PollConfig,
    /// Per-photo upload retry parameters.
    pub retry: RetryConfig,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                           |
    /// |-----------------------|-----------------------------------|
    /// | `SERVER_BASE_URL`     | `http://127.0.0.1:5002`           |
    /// | `UPLOAD_BASE_URL`     | `https://api.cloudinary.com/v1_1` |
    /// | `POLL_INTERVAL_SECS`  | `3`                               |
    /// | `POLL_TIMEOUT_SECS`   | `300`                             |
    /// | `UPLOAD_MAX_ATTEMPTS` | `3`                               |
    pub fn from_env() -> Self {
        let server_base_url =
            std::env::var("SERVER_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:5002".into());

        let upload_base_url =
            std::env::var("UPLOAD_BASE_URL").unwrap_or_else(|_| DEFAULT_UPLOAD_BASE_URL.into());

        let poll = PollConfig {
            interval: Duration::from_secs(env_u64("POLL_INTERVAL_SECS", 3)),
            timeout: Duration::from_secs(env_u64("POLL_TIMEOUT_SECS", 300)),
        };

        let retry = RetryConfig {
            max_attempts: env_u64("UPLOAD_MAX_ATTEMPTS", 3) as u32,
            ..RetryConfig::default()
        };

        Self {
            server_base_url,
            upload_base_url,
            poll,
            retry,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid integer, got '{raw}'")),
        Err(_) => default,
    }
}
