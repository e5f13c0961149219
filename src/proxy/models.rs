//! Proxy data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyType {
    /// Every protocol a proxy is tested with when nothing narrows it down
    pub const TESTABLE: [ProxyType; 3] = [ProxyType::Http, ProxyType::Socks4, ProxyType::Socks5];

    /// HTTPS proxies are driven exactly like HTTP ones
    pub fn normalized(self) -> Self {
        match self {
            ProxyType::Https => ProxyType::Http,
            other => other,
        }
    }

    /// Parse a scheme name, case-insensitive
    pub fn from_scheme(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Some(ProxyType::Http),
            "https" => Some(ProxyType::Https),
            "socks4" => Some(ProxyType::Socks4),
            "socks5" => Some(ProxyType::Socks5),
            _ => None,
        }
    }

    /// Scheme handed to the HTTP client's proxy configuration.
    ///
    /// Both SOCKS flavours use their remote-DNS variant so hostnames are
    /// resolved by the proxy rather than locally.
    pub fn transport_scheme(self) -> &'static str {
        match self {
            ProxyType::Http | ProxyType::Https => "http",
            ProxyType::Socks4 => "socks4a",
            ProxyType::Socks5 => "socks5h",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Http => write!(f, "http"),
            ProxyType::Https => write!(f, "https"),
            ProxyType::Socks4 => write!(f, "socks4"),
            ProxyType::Socks5 => write!(f, "socks5"),
        }
    }
}

/// A proxy server as read from the input list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    /// Scheme given on the input line, if any
    pub protocol_hint: Option<ProxyType>,
}

impl ProxyEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            protocol_hint: None,
        }
    }

    pub fn with_hint(host: impl Into<String>, port: u16, hint: ProxyType) -> Self {
        Self {
            host: host.into(),
            port,
            protocol_hint: Some(hint),
        }
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `protocol://host:port`, as written to the results file
    pub fn url_for(&self, protocol: ProxyType) -> String {
        format!("{}://{}:{}", protocol, self.host, self.port)
    }

    /// Proxy URL understood by the HTTP client for the given protocol
    pub fn transport_url(&self, protocol: ProxyType) -> String {
        format!("{}://{}:{}", protocol.transport_scheme(), self.host, self.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol_hint {
            Some(hint) => write!(f, "{}", self.url_for(hint)),
            None => write!(f, "{}", self.address()),
        }
    }
}

/// Which protocols to test for each endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProtocolSelection {
    /// Use the endpoint's own scheme, or every protocol when it has none
    #[default]
    Auto,
    /// Every testable protocol regardless of the endpoint's scheme
    All,
    /// Exactly these protocols regardless of the endpoint's scheme
    Only(Vec<ProxyType>),
}

impl ProtocolSelection {
    /// Build a selection from command line flags. `all` wins.
    pub fn from_flags(all: bool, http: bool, socks4: bool, socks5: bool) -> Self {
        if all {
            return ProtocolSelection::All;
        }

        let picked: Vec<ProxyType> = [
            (http, ProxyType::Http),
            (socks4, ProxyType::Socks4),
            (socks5, ProxyType::Socks5),
        ]
        .into_iter()
        .filter_map(|(on, ptype)| on.then_some(ptype))
        .collect();

        if picked.is_empty() {
            ProtocolSelection::Auto
        } else {
            ProtocolSelection::Only(picked)
        }
    }

    /// Protocols to test for one endpoint, normalized and without duplicates
    pub fn resolve(&self, endpoint: &ProxyEndpoint) -> Vec<ProxyType> {
        let requested: Vec<ProxyType> = match self {
            ProtocolSelection::All => ProxyType::TESTABLE.to_vec(),
            ProtocolSelection::Only(list) if !list.is_empty() => list.clone(),
            _ => match endpoint.protocol_hint {
                Some(hint) => vec![hint],
                None => ProxyType::TESTABLE.to_vec(),
            },
        };

        let mut protocols = Vec::with_capacity(requested.len());
        for ptype in requested.into_iter().map(ProxyType::normalized) {
            if !protocols.contains(&ptype) {
                protocols.push(ptype);
            }
        }
        protocols
    }
}

impl fmt::Display for ProtocolSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolSelection::Auto => write!(f, "per proxy scheme (all when unspecified)"),
            ProtocolSelection::All => write!(f, "http, socks4, socks5"),
            ProtocolSelection::Only(list) => {
                let names: Vec<String> = list.iter().map(|p| p.normalized().to_string()).collect();
                write!(f, "{}", names.join(", "))
            }
        }
    }
}

/// Outcome of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    Working,
    Failed,
}

/// Result of probing one endpoint with one protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub endpoint: ProxyEndpoint,
    pub protocol: ProxyType,
    pub outcome: ProbeOutcome,
    /// Address the geolocation API saw the request coming from
    pub exit_ip: Option<String>,
    pub exit_country: Option<String>,
    pub latency_ms: Option<u64>,
}

impl ProbeResult {
    pub fn working(
        endpoint: ProxyEndpoint,
        protocol: ProxyType,
        exit_ip: String,
        exit_country: String,
        latency_ms: u64,
    ) -> Self {
        Self {
            endpoint,
            protocol,
            outcome: ProbeOutcome::Working,
            exit_ip: Some(exit_ip),
            exit_country: Some(exit_country),
            latency_ms: Some(latency_ms),
        }
    }

    pub fn failed(endpoint: ProxyEndpoint, protocol: ProxyType) -> Self {
        Self {
            endpoint,
            protocol,
            outcome: ProbeOutcome::Failed,
            exit_ip: None,
            exit_country: None,
            latency_ms: None,
        }
    }

    pub fn is_working(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Working)
    }

    /// `protocol://host:port` of the tested pair
    pub fn proxy_url(&self) -> String {
        self.endpoint.url_for(self.protocol)
    }

    /// IP to look up reputation for: the exit IP when known, else the proxy host
    pub fn lookup_ip(&self) -> &str {
        match self.exit_ip.as_deref() {
            Some(ip) if !ip.is_empty() => ip,
            _ => &self.endpoint.host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_creation() {
        let endpoint = ProxyEndpoint::new("127.0.0.1", 8080);
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 8080);
        assert!(endpoint.protocol_hint.is_none());
        assert_eq!(endpoint.address(), "127.0.0.1:8080");
        assert_eq!(endpoint.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoint = ProxyEndpoint::with_hint("192.168.1.1", 1080, ProxyType::Socks5);
        assert_eq!(endpoint.to_string(), "socks5://192.168.1.1:1080");
        assert_eq!(endpoint.url_for(ProxyType::Socks4), "socks4://192.168.1.1:1080");
        assert_eq!(
            endpoint.transport_url(ProxyType::Socks4),
            "socks4a://192.168.1.1:1080"
        );
        assert_eq!(
            endpoint.transport_url(ProxyType::Socks5),
            "socks5h://192.168.1.1:1080"
        );
        assert_eq!(
            endpoint.transport_url(ProxyType::Https),
            endpoint.transport_url(ProxyType::Http)
        );
    }

    #[test]
    fn test_https_normalizes_to_http() {
        assert_eq!(ProxyType::Https.normalized(), ProxyType::Http);
        assert_eq!(ProxyType::Socks4.normalized(), ProxyType::Socks4);
        assert_eq!(ProxyType::from_scheme("HTTPS"), Some(ProxyType::Https));
        assert_eq!(ProxyType::from_scheme("ftp"), None);
    }

    #[test]
    fn test_selection_from_flags() {
        assert_eq!(
            ProtocolSelection::from_flags(false, false, false, false),
            ProtocolSelection::Auto
        );
        assert_eq!(
            ProtocolSelection::from_flags(true, true, false, false),
            ProtocolSelection::All
        );
        assert_eq!(
            ProtocolSelection::from_flags(false, true, false, true),
            ProtocolSelection::Only(vec![ProxyType::Http, ProxyType::Socks5])
        );
    }

    #[test]
    fn test_selection_resolve() {
        let plain = ProxyEndpoint::new("1.2.3.4", 8080);
        let hinted = ProxyEndpoint::with_hint("5.6.7.8", 1080, ProxyType::Socks5);
        let https = ProxyEndpoint::with_hint("5.6.7.8", 443, ProxyType::Https);

        assert_eq!(
            ProtocolSelection::Auto.resolve(&plain),
            ProxyType::TESTABLE.to_vec()
        );
        assert_eq!(
            ProtocolSelection::Auto.resolve(&hinted),
            vec![ProxyType::Socks5]
        );
        assert_eq!(ProtocolSelection::Auto.resolve(&https), vec![ProxyType::Http]);
        assert_eq!(
            ProtocolSelection::All.resolve(&hinted),
            ProxyType::TESTABLE.to_vec()
        );

        // explicit selection overrides the endpoint's own scheme
        let only_http = ProtocolSelection::Only(vec![ProxyType::Http]);
        assert_eq!(only_http.resolve(&hinted), vec![ProxyType::Http]);

        let dup = ProtocolSelection::Only(vec![ProxyType::Https, ProxyType::Http]);
        assert_eq!(dup.resolve(&plain), vec![ProxyType::Http]);
    }

    #[test]
    fn test_probe_result() {
        let endpoint = ProxyEndpoint::new("127.0.0.1", 8080);

        let result = ProbeResult::working(
            endpoint.clone(),
            ProxyType::Http,
            "9.9.9.9".to_string(),
            "Germany".to_string(),
            120,
        );
        assert!(result.is_working());
        assert_eq!(result.latency_ms, Some(120));
        assert_eq!(result.proxy_url(), "http://127.0.0.1:8080");
        assert_eq!(result.lookup_ip(), "9.9.9.9");

        let result = ProbeResult::failed(endpoint, ProxyType::Socks4);
        assert!(!result.is_working());
        assert!(result.exit_ip.is_none());
        assert!(result.exit_country.is_none());
        assert!(result.latency_ms.is_none());
        assert_eq!(result.lookup_ip(), "127.0.0.1");
    }
}
