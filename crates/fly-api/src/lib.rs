//! Typed Rust client for the Fly.io Machines API.
//!
//! Provides the authenticated HTTP transport ([`FlyClient`]) behind the
//! [`Transport`] trait, plus the serde wire types for machines, machine
//! events and apps. Status codes are returned to the caller untouched:
//! deciding which code means success for which endpoint is the caller's job.

mod config;
mod types;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub use config::ClientConfig;
pub use reqwest::{Method, StatusCode};
pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("fly api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("fly api returned an unexpected body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("invalid env var {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(Error::from)
    }
}

/// Authenticated access to the Machines REST surface.
///
/// `path` is relative to the versioned base (`/apps/{app}/machines`, ...).
/// Implementations only fail on transport problems; any HTTP status,
/// including 4xx/5xx, comes back as a [`RawResponse`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<RawResponse>;

    async fn post(&self, path: &str, body: Option<&serde_json::Value>) -> Result<RawResponse>;

    async fn delete(&self, path: &str) -> Result<RawResponse>;

    /// GET against an endpoint that may hold the connection open for up to `hold`.
    async fn long_poll(
        &self,
        path: &str,
        query: &[(&str, String)],
        _hold: Duration,
    ) -> Result<RawResponse> {
        self.get(path, query).await
    }
}

/// Client for the Fly.io Machines REST API.
#[derive(Clone)]
pub struct FlyClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl FlyClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v{}{path}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version
        )
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.config.api_token)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        tracing::debug!(%method, path, "fly api request");
        self.http
            .request(method, self.url(path))
            .header("Authorization", self.auth())
            .header("Content-Type", "application/json")
    }

    async fn finish(builder: reqwest::RequestBuilder) -> Result<RawResponse> {
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Ok(RawResponse { status, body })
    }
}

#[async_trait]
impl Transport for FlyClient {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<RawResponse> {
        Self::finish(self.request(Method::GET, path).query(query)).await
    }

    async fn post(&self, path: &str, body: Option<&serde_json::Value>) -> Result<RawResponse> {
        let mut builder = self.request(Method::POST, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Self::finish(builder).await
    }

    async fn delete(&self, path: &str) -> Result<RawResponse> {
        Self::finish(self.request(Method::DELETE, path)).await
    }

    async fn long_poll(
        &self,
        path: &str,
        query: &[(&str, String)],
        hold: Duration,
    ) -> Result<RawResponse> {
        // The server may keep the connection for `hold` before answering.
        let builder = self
            .request(Method::GET, path)
            .query(query)
            .timeout(self.config.request_timeout + hold);
        Self::finish(builder).await
    }
}
