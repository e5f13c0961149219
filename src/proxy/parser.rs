//! Proxy parser module for reading proxy endpoints from text

use crate::error::CheckError;
use crate::proxy::models::{ProxyEndpoint, ProxyType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::warn;

/// `[scheme://]host:port`
static PROXY_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:((?i:https?|socks[45]))://)?([^:\s]+):(\d+)$")
        .expect("Invalid proxy line regex")
});

/// Proxy parser for parsing proxies from strings and files
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single proxy line
    ///
    /// Supports formats:
    /// - HOST:PORT
    /// - scheme://HOST:PORT (http, https, socks4, socks5)
    pub fn parse_line(line: &str) -> Result<ProxyEndpoint, CheckError> {
        let trimmed = line.trim();

        let caps = PROXY_LINE_REGEX
            .captures(trimmed)
            .ok_or_else(|| CheckError::parse(trimmed, "expected [scheme://]host:port"))?;

        let hint = match caps.get(1) {
            Some(scheme) => Some(
                ProxyType::from_scheme(scheme.as_str())
                    .ok_or_else(|| CheckError::parse(trimmed, "unknown scheme"))?,
            ),
            None => None,
        };

        let host = caps[2].to_string();
        let port: u16 = caps[3]
            .parse()
            .map_err(|_| CheckError::parse(trimmed, "port out of range"))?;
        if port == 0 {
            return Err(CheckError::parse(trimmed, "port out of range"));
        }

        Ok(ProxyEndpoint {
            host,
            port,
            protocol_hint: hint,
        })
    }

    /// Parse every line of `content`, skipping blanks and `#` comments.
    /// Malformed lines are logged and dropped.
    pub fn parse_string(content: &str) -> Vec<ProxyEndpoint> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| match Self::parse_line(line) {
                Ok(endpoint) => Some(endpoint),
                Err(e) => {
                    warn!("dropping input line: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Parse proxies from a file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<ProxyEndpoint>, CheckError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CheckError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse_string(&content))
    }
}
