//! Client configuration.

use std::time::Duration;

use qbank_core::{ApiUrl, InvalidInputError};

/// API base URL used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api/v1";

/// Per-request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable overriding the API base URL.
pub const API_URL_ENV: &str = "QBANK_API_URL";

/// Environment variable overriding the request timeout, in seconds.
pub const TIMEOUT_ENV: &str = "QBANK_TIMEOUT_SECS";

/// Settings for the HTTP transport and refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: ApiUrl,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(api_url: ApiUrl) -> Self {
        Self {
            api_url,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("qbank/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a configuration from `QBANK_API_URL` and `QBANK_TIMEOUT_SECS`,
    /// falling back to the defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, InvalidInputError> {
        let api_url = match std::env::var(API_URL_ENV) {
            Ok(url) => ApiUrl::new(url)?,
            Err(_) => ApiUrl::new(DEFAULT_API_URL)?,
        };

        let mut config = Self::new(api_url);

        if let Ok(secs) = std::env::var(TIMEOUT_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|_| InvalidInputError::Other {
                message: format!("{} must be a whole number of seconds, got '{}'", TIMEOUT_ENV, secs),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
