//! Proxy module for parsing and checking proxies
//!
//! This module provides functionality for:
//! - Parsing proxy endpoints from `[scheme://]host:port` lines
//! - Building HTTP clients that tunnel through HTTP or SOCKS proxies
//! - Probing a proxy against a geolocation API

pub mod checker;
pub mod models;
pub mod parser;
pub mod transport;

pub use checker::{CheckerConfig, ProxyChecker};
pub use models::{ProbeOutcome, ProbeResult, ProtocolSelection, ProxyEndpoint, ProxyType};
pub use parser::ProxyParser;
pub use transport::{Route, TransportOptions};
