//! Reputation fetcher
//!
//! Looks up an IP on the reputation service, either directly or through a
//! verified proxy. Each route tries HTTPS first and then plain HTTP on the
//! same path. When every tunneled attempt fails the lookup is redone
//! directly, and the result is tagged as a fallback.

use crate::error::CheckError;
use crate::proxy::models::{ProxyEndpoint, ProxyType};
use crate::proxy::transport::{build_client, Route, TransportOptions, DEFAULT_USER_AGENT};
use crate::reputation::models::{LookupRoute, ReputationLookup, ReputationReport};
use crate::reputation::parser::{has_report_markers, parse_report};
use reqwest::{header, Client, StatusCode};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default reputation service host
pub const DEFAULT_SERVICE_HOST: &str = "scamalytics.com";

/// Default timeout for direct lookups in seconds
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

/// Tunneled lookups get this many times the direct timeout
const TUNNEL_TIMEOUT_FACTOR: u32 = 3;

/// Lowercase tokens whose presence marks a real report page
const DEFAULT_MARKERS: &[&str] = &["scamalytics", "fraud score"];

/// Statuses the service uses to turn clients away
const BLOCKING_STATUSES: &[StatusCode] = &[
    StatusCode::FORBIDDEN,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::BAD_REQUEST,
];

/// Configuration for reputation lookups
#[derive(Debug, Clone)]
pub struct ReputationConfig {
    /// Host (and optional port) of the reputation service
    pub service_host: String,
    pub direct_timeout: Duration,
    pub tunnel_timeout: Duration,
    /// Tokens that must appear in an accepted page, matched case-insensitively
    pub markers: Vec<String>,
    pub user_agent: String,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        let timeout = Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS);
        Self {
            service_host: DEFAULT_SERVICE_HOST.to_string(),
            direct_timeout: timeout,
            tunnel_timeout: timeout * TUNNEL_TIMEOUT_FACTOR,
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ReputationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service_host(mut self, host: impl Into<String>) -> Self {
        self.service_host = host.into();
        self
    }

    /// Set the direct timeout; tunneled lookups get three times as long
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.direct_timeout = timeout;
        self.tunnel_timeout = timeout * TUNNEL_TIMEOUT_FACTOR;
        self
    }

    pub fn with_markers(mut self, markers: Vec<String>) -> Self {
        self.markers = markers;
        self
    }
}

/// Why a single lookup attempt was rejected
#[derive(Error, Debug)]
enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("timed out")]
    Timeout,
    #[error("blocked with HTTP {0}")]
    Blocked(StatusCode),
    #[error("unexpected HTTP {0}")]
    Status(StatusCode),
    #[error("page has no report markers")]
    NoMarkers,
}

/// Strip a `:port` suffix from an IPv4 address or hostname
fn bare_ip(ip: &str) -> &str {
    let ip = ip.trim();
    if ip.parse::<IpAddr>().is_ok() {
        return ip;
    }
    ip.split(':').next().unwrap_or(ip)
}

/// Fetches and parses reputation reports
#[derive(Debug, Clone, Default)]
pub struct ReputationFetcher {
    config: ReputationConfig,
}

impl ReputationFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReputationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReputationConfig {
        &self.config
    }

    /// Report URLs for an IP, in the order they are tried
    pub fn lookup_urls(&self, ip: &str) -> [String; 2] {
        let ip = bare_ip(ip);
        let host = &self.config.service_host;
        [
            format!("https://{}/ip/{}", host, ip),
            format!("http://{}/ip/{}", host, ip),
        ]
    }

    /// Look up `ip`, through `via` when given.
    ///
    /// Fails only when every attempt over both schemes and both routes fails.
    pub async fn fetch_reputation(
        &self,
        ip: &str,
        via: Option<(&ProxyEndpoint, ProxyType)>,
    ) -> Result<ReputationLookup, CheckError> {
        let ip = bare_ip(ip);
        let mut attempts = 0;

        if let Some((endpoint, protocol)) = via {
            let route = Route::Via(endpoint, protocol);
            if let Some((report, url)) = self
                .try_route(ip, route, self.config.tunnel_timeout, &mut attempts)
                .await
            {
                return Ok(ReputationLookup {
                    report,
                    route: LookupRoute::Tunneled,
                    url,
                });
            }
            warn!(
                "reputation lookup for {} through {} failed, retrying directly",
                ip,
                endpoint.url_for(protocol)
            );
        }

        match self
            .try_route(ip, Route::Direct, self.config.direct_timeout, &mut attempts)
            .await
        {
            Some((report, url)) => Ok(ReputationLookup {
                report,
                route: if via.is_some() {
                    LookupRoute::DirectFallback
                } else {
                    LookupRoute::Direct
                },
                url,
            }),
            None => Err(CheckError::Fetch {
                ip: ip.to_string(),
                attempts,
            }),
        }
    }

    async fn try_route(
        &self,
        ip: &str,
        route: Route<'_>,
        timeout: Duration,
        attempts: &mut usize,
    ) -> Option<(ReputationReport, String)> {
        let options = TransportOptions::new(timeout)
            .with_user_agent(&self.config.user_agent)
            .with_invalid_certs(true);

        let client = match build_client(route, &options) {
            Ok(client) => client,
            Err(e) => {
                debug!("cannot build client for reputation lookup: {}", e);
                return None;
            }
        };

        for url in self.lookup_urls(ip) {
            *attempts += 1;
            match self.attempt(&client, &url, timeout).await {
                Ok(html) => return Some((parse_report(&html), url)),
                Err(e) => debug!("reputation attempt {} rejected: {}", url, e),
            }
        }
        None
    }

    async fn attempt(
        &self,
        client: &Client,
        url: &str,
        timeout: Duration,
    ) -> Result<String, AttemptError> {
        let request = client
            .get(url)
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header("DNT", "1")
            .header(header::UPGRADE_INSECURE_REQUESTS, "1");

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            if BLOCKING_STATUSES.contains(&status) {
                return Err(AttemptError::Blocked(status));
            }
            if status != StatusCode::OK {
                return Err(AttemptError::Status(status));
            }
            Ok::<String, AttemptError>(response.text().await?)
        };

        let html = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| AttemptError::Timeout)??;

        if !has_report_markers(&html, &self.config.markers) {
            return Err(AttemptError::NoMarkers);
        }
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_port, MockResponse, MockServer, SAMPLE_REPORT};

    fn fetcher(service_host: &str) -> ReputationFetcher {
        ReputationFetcher::with_config(
            ReputationConfig::new()
                .with_service_host(service_host)
                .with_timeout(Duration::from_secs(2)),
        )
    }

    async fn report_origin() -> MockServer {
        MockServer::start(|line| {
            if line.starts_with("GET /ip/") {
                MockResponse::html(SAMPLE_REPORT)
            } else {
                MockResponse::status(404)
            }
        })
        .await
    }

    #[test]
    fn test_config_defaults() {
        let config = ReputationConfig::default();
        assert_eq!(config.service_host, DEFAULT_SERVICE_HOST);
        assert_eq!(config.tunnel_timeout, config.direct_timeout * 3);
        assert_eq!(config.markers, vec!["scamalytics", "fraud score"]);

        let config = ReputationConfig::new().with_timeout(Duration::from_secs(4));
        assert_eq!(config.direct_timeout, Duration::from_secs(4));
        assert_eq!(config.tunnel_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_lookup_urls() {
        let fetcher = ReputationFetcher::new();
        assert_eq!(
            fetcher.lookup_urls("1.2.3.4:8080"),
            [
                "https://scamalytics.com/ip/1.2.3.4".to_string(),
                "http://scamalytics.com/ip/1.2.3.4".to_string(),
            ]
        );
        assert_eq!(bare_ip("2001:db8::1"), "2001:db8::1");
        assert_eq!(bare_ip(" 9.9.9.9 "), "9.9.9.9");
    }

    #[tokio::test]
    async fn test_direct_lookup_downgrades_to_http() {
        let origin = report_origin().await;

        let lookup = fetcher(&origin.authority())
            .fetch_reputation("1.2.3.4", None)
            .await
            .unwrap();

        assert_eq!(lookup.route, LookupRoute::Direct);
        assert_eq!(lookup.url, format!("http://{}/ip/1.2.3.4", origin.authority()));
        assert_eq!(lookup.report.fraud_score, Some(42));
        assert_eq!(lookup.report.active_blacklists, vec!["Firehol", "Spamhaus"]);
        assert_eq!(origin.requests(), vec!["GET /ip/1.2.3.4 HTTP/1.1"]);
    }

    #[tokio::test]
    async fn test_tunneled_lookup_through_proxy() {
        let proxy = MockServer::start(|line| {
            if line.starts_with("GET http://") {
                MockResponse::html(SAMPLE_REPORT)
            } else {
                MockResponse::status(403)
            }
        })
        .await;
        let endpoint = ProxyEndpoint::new("127.0.0.1", proxy.port());
        let service = format!("127.0.0.1:{}", closed_port());

        let lookup = fetcher(&service)
            .fetch_reputation("5.6.7.8", Some((&endpoint, ProxyType::Http)))
            .await
            .unwrap();

        assert_eq!(lookup.route, LookupRoute::Tunneled);
        assert_eq!(lookup.report.isp_name.as_deref(), Some("Cloudflare, Inc."));
        assert_eq!(
            proxy.requests(),
            vec![
                format!("CONNECT {} HTTP/1.1", service),
                format!("GET http://{}/ip/5.6.7.8 HTTP/1.1", service),
            ]
        );
    }

    #[tokio::test]
    async fn test_blocked_tunnel_tries_http_then_direct() {
        let proxy = MockServer::start(|_| MockResponse::status(403)).await;
        let origin = report_origin().await;
        let endpoint = ProxyEndpoint::new("127.0.0.1", proxy.port());

        let lookup = fetcher(&origin.authority())
            .fetch_reputation("5.6.7.8", Some((&endpoint, ProxyType::Http)))
            .await
            .unwrap();

        // both tunneled schemes were attempted before going direct
        assert_eq!(
            proxy.requests(),
            vec![
                format!("CONNECT {} HTTP/1.1", origin.authority()),
                format!("GET http://{}/ip/5.6.7.8 HTTP/1.1", origin.authority()),
            ]
        );
        assert_eq!(lookup.route, LookupRoute::DirectFallback);
        assert_eq!(lookup.report.asn.as_deref(), Some("13335"));
        assert_eq!(origin.requests(), vec!["GET /ip/5.6.7.8 HTTP/1.1"]);
    }

    #[tokio::test]
    async fn test_page_without_markers_is_rejected() {
        let proxy = MockServer::start(|line| {
            if line.starts_with("GET http://") {
                MockResponse::html("<html><h1>Please verify you are human</h1></html>")
            } else {
                MockResponse::status(503)
            }
        })
        .await;
        let origin = report_origin().await;
        let endpoint = ProxyEndpoint::new("127.0.0.1", proxy.port());

        let lookup = fetcher(&origin.authority())
            .fetch_reputation("5.6.7.8", Some((&endpoint, ProxyType::Http)))
            .await
            .unwrap();

        assert_eq!(lookup.route, LookupRoute::DirectFallback);
        assert_eq!(lookup.report.city.as_deref(), Some("San Francisco"));
    }

    #[tokio::test]
    async fn test_all_attempts_exhausted() {
        let service = format!("127.0.0.1:{}", closed_port());

        match fetcher(&service).fetch_reputation("1.2.3.4", None).await {
            Err(CheckError::Fetch { ip, attempts }) => {
                assert_eq!(ip, "1.2.3.4");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let endpoint = ProxyEndpoint::new("127.0.0.1", closed_port());
        match fetcher(&service)
            .fetch_reputation("1.2.3.4", Some((&endpoint, ProxyType::Socks5)))
            .await
        {
            Err(CheckError::Fetch { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
