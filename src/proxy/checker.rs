//! Proxy checker module for checking proxy validity

use crate::error::CheckError;
use crate::proxy::models::{ProbeResult, ProxyEndpoint, ProxyType};
use crate::proxy::transport::{build_client, Route, TransportOptions, DEFAULT_USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default timeout for proxy checks in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default geolocation API to test proxies against
pub const DEFAULT_API_URL: &str = "http://ip-api.com/json";

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each proxy check
    pub timeout: Duration,
    /// Geolocation API reached through the proxy
    pub api_url: String,
    /// User agent sent with the probe
    pub user_agent: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Fields the geolocation API must return for a probe to count
#[derive(Debug, Deserialize)]
struct GeoReply {
    query: Option<String>,
    country: Option<String>,
}

impl GeoReply {
    /// Exit IP and country, when both are present and non-empty
    fn from_body(body: &[u8]) -> Option<(String, String)> {
        let reply: GeoReply = serde_json::from_slice(body).ok()?;
        let ip = reply.query.filter(|s| !s.is_empty())?;
        let country = reply.country.filter(|s| !s.is_empty())?;
        Some((ip, country))
    }
}

/// Proxy checker for validating proxies
#[derive(Debug, Clone, Default)]
pub struct ProxyChecker {
    config: CheckerConfig,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Transport settings for requests sent through a proxy under test
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions::new(self.config.timeout).with_user_agent(&self.config.user_agent)
    }

    /// Check a single proxy with one protocol. Never retries; any error,
    /// timeout, bad status or malformed body yields a failed result.
    pub async fn check_proxy(&self, endpoint: &ProxyEndpoint, protocol: ProxyType) -> ProbeResult {
        let protocol = protocol.normalized();

        match self.probe(endpoint, protocol).await {
            Ok((exit_ip, country, latency_ms)) => {
                debug!(
                    "{} works: exit {} ({}) in {}ms",
                    endpoint.url_for(protocol),
                    exit_ip,
                    country,
                    latency_ms
                );
                ProbeResult::working(endpoint.clone(), protocol, exit_ip, country, latency_ms)
            }
            Err(e) => {
                debug!("{}", e);
                ProbeResult::failed(endpoint.clone(), protocol)
            }
        }
    }

    async fn probe(
        &self,
        endpoint: &ProxyEndpoint,
        protocol: ProxyType,
    ) -> Result<(String, String, u64), CheckError> {
        let target = endpoint.url_for(protocol);
        let client = build_client(Route::Via(endpoint, protocol), &self.transport_options())
            .map_err(|e| CheckError::probe(&target, e))?;

        let start = Instant::now();
        let exchange = async {
            let response = client.get(&self.config.api_url).send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.config.timeout, exchange).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(CheckError::probe(&target, e)),
            Err(_) => return Err(CheckError::probe(&target, "timed out")),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        if status != StatusCode::OK {
            return Err(CheckError::probe(&target, format!("HTTP status: {}", status)));
        }

        let (exit_ip, country) = GeoReply::from_body(&body)
            .ok_or_else(|| CheckError::probe(&target, "geolocation reply missing query/country"))?;

        Ok((exit_ip, country, latency_ms))
    }
}
