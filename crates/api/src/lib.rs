//! Roll service client.
//!
//! Dice expressions synthesized by the engine are resolved by a remote roll
//! service. This crate wraps that service:
//!
//! - Constructing an HTTP client with a timeout and a consistent User-Agent
//! - Validating `TTML_ROLL_API_BASE` (or the configured base) for safety
//! - Encoding the dice expression as a single path segment
//! - Decoding the service payload into a [`RollResult`]
//!
//! # Example
//!
//! ```ignore
//! use ttml_api::RollApiClient;
//!
//! async fn roll() -> anyhow::Result<()> {
//!     let client = RollApiClient::new_from_env(None, std::time::Duration::from_secs(30))?;
//!     let result = client.roll("1d20+5").await?;
//!     println!("rolled {}", result.value.display());
//!     Ok(())
//! }
//! ```

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, header};
use tracing::debug;
use ttml_types::RollResult;
use url::Url;

/// Environment variable overriding the roll service base URL.
pub const ROLL_API_BASE_ENV: &str = "TTML_ROLL_API_BASE";
/// Public roll service.
pub const DEFAULT_ROLL_API_BASE: &str = "https://roll.poweredvtt.com";
/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

/// Thin wrapper around a configured `reqwest::Client` for the roll service.
#[derive(Debug, Clone)]
pub struct RollApiClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl RollApiClient {
    /// Build a client for `base_url`, which must pass [`validate_base_url`].
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;

        let http = Client::builder().timeout(timeout).build().context("build http client")?;
        Ok(Self {
            base_url,
            http,
            user_agent: format!("ttml/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    /// Build a client whose base URL comes from `TTML_ROLL_API_BASE`, then
    /// `configured`, then the public service.
    pub fn new_from_env(configured: Option<&str>, timeout: Duration) -> Result<Self> {
        let base_url = env::var(ROLL_API_BASE_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_ROLL_API_BASE.to_string());
        Self::new(base_url, timeout)
    }

    /// URL resolving `command`; the whole expression is one path segment.
    pub fn roll_url(&self, command: &str) -> String {
        let encoded = utf8_percent_encode(command, NON_ALPHANUMERIC);
        format!("{}/v1/{}", self.base_url, encoded)
    }

    /// Submit a dice expression and decode the service's answer.
    pub async fn roll(&self, command: &str) -> Result<RollResult> {
        let url = self.roll_url(command);
        debug!(%url, command, "submitting roll");

        let response = self
            .http
            .get(&url)
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("request roll '{command}'"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Unexpected response status {status} for roll '{command}': {body}"));
        }

        let payload: serde_json::Value = response.json().await.context("decode roll response")?;
        serde_json::from_value(payload).with_context(|| format!("roll response for '{command}' has no numeric value"))
    }
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: any scheme is allowed
/// - otherwise: scheme must be HTTPS
pub fn validate_base_url(base: &str) -> Result<()> {
    let parsed_base_url = Url::parse(base).map_err(|e| anyhow!("Invalid roll service URL '{}': {}", base, e))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| anyhow!("roll service URL must include a host"))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(anyhow!(
            "roll service URL must use https for non-localhost hosts; got '{}://'",
            parsed_base_url.scheme()
        ));
    }
    Ok(())
}
