//! Reputation report models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Blacklist labels worth reporting, and how they are written out
pub const BLACKLIST_LABELS: &[(&str, &str)] = &[
    ("Firehol", "Firehol"),
    ("IP2ProxyLite", "IP2ProxyLite"),
    ("IPsum", "IPsum"),
    ("Spamhaus", "Spamhaus"),
    ("X4Bnet Spambot", "X4Bnet"),
];

/// Proxy-detection labels worth reporting, and how they are written out
pub const PROXY_FLAG_LABELS: &[(&str, &str)] = &[
    ("Anonymizing VPN", "vpn"),
    ("Tor Exit Node", "tor"),
    ("Server", "server"),
    ("Public Proxy", "p.proxy"),
    ("Web Proxy", "w.proxy"),
    ("Search Engine Robot", "se.bot"),
];

/// A risk status collapsed to yes/no. Tokens that are neither pass through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    Yes,
    No,
    Other(String),
}

impl RiskStatus {
    pub fn normalize(raw: &str) -> Self {
        let token = raw.trim();
        match token.to_ascii_lowercase().as_str() {
            "yes" | "high" | "detected" => RiskStatus::Yes,
            "no" | "low" | "clean" | "unknown" => RiskStatus::No,
            _ => RiskStatus::Other(token.to_string()),
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, RiskStatus::Yes)
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskStatus::Yes => write!(f, "YES"),
            RiskStatus::No => write!(f, "NO"),
            RiskStatus::Other(raw) => write!(f, "{}", raw),
        }
    }
}

fn lookup_label(table: &[(&str, &'static str)], label: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(source, _)| *source == label)
        .map(|(_, short)| *short)
}

/// Fraud and reputation data for one IP
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationReport {
    pub asn: Option<String>,
    pub isp_name: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    /// Upper-cased datacenter marker as published
    pub datacenter: Option<String>,
    pub fraud_score: Option<u32>,
    pub active_blacklists: Vec<String>,
    pub active_proxy_flags: Vec<String>,
}

impl ReputationReport {
    /// Record a blacklist status. Only affirmative, known labels are kept.
    pub fn record_blacklist(&mut self, label: &str, status: &RiskStatus) {
        if !status.is_yes() {
            return;
        }
        if let Some(short) = lookup_label(BLACKLIST_LABELS, label) {
            push_unique(&mut self.active_blacklists, short);
        }
    }

    /// Record a proxy-detection status. Only affirmative, known labels are kept.
    pub fn record_proxy_flag(&mut self, label: &str, status: &RiskStatus) {
        if !status.is_yes() {
            return;
        }
        if let Some(short) = lookup_label(PROXY_FLAG_LABELS, label) {
            push_unique(&mut self.active_proxy_flags, short);
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Which network identity performed a reputation lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupRoute {
    /// Requested directly, as configured
    Direct,
    /// Requested through the verified proxy
    Tunneled,
    /// Tunneled attempts failed and the lookup was redone directly
    DirectFallback,
}

impl fmt::Display for LookupRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupRoute::Direct => write!(f, "direct"),
            LookupRoute::Tunneled => write!(f, "tunneled"),
            LookupRoute::DirectFallback => write!(f, "direct-fallback"),
        }
    }
}

/// A parsed report together with how it was obtained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationLookup {
    pub report: ReputationReport,
    pub route: LookupRoute,
    /// URL that produced the accepted page
    pub url: String,
}
