use std::env;
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.machines.dev";
pub const DEFAULT_API_VERSION: u32 = 1;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Credentials and endpoint settings for a [`crate::FlyClient`].
///
/// Fixed for the lifetime of the client; nothing mutates it after construction.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_token: String,
    pub base_url: String,
    pub api_version: u32,
    /// Upper bound on a single HTTP exchange.
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_version: DEFAULT_API_VERSION,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create from env vars: `FLY_API_TOKEN` (required), `FLY_API_HOSTNAME`,
    /// `FLY_API_VERSION`, `FLY_API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let token =
            env::var("FLY_API_TOKEN").map_err(|_| Error::MissingEnv("FLY_API_TOKEN".into()))?;
        let mut config = Self::new(token);

        if let Ok(host) = env::var("FLY_API_HOSTNAME") {
            config.base_url = host;
        }
        if let Ok(raw) = env::var("FLY_API_VERSION") {
            config.api_version = raw.parse().map_err(|_| Error::InvalidEnv {
                name: "FLY_API_VERSION",
                value: raw,
            })?;
        }
        if let Ok(raw) = env::var("FLY_API_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| Error::InvalidEnv {
                name: "FLY_API_TIMEOUT_SECS",
                value: raw,
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
