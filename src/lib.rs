//! Proxy Scout - Proxy Checker with IP Reputation
//!
//! Validates proxies against an IP geolocation API and enriches every
//! working proxy with fraud and reputation data for its exit IP. Results
//! are streamed to a file as soon as each proxy is verified.

pub mod batch;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod reputation;
pub mod sink;

#[cfg(test)]
mod test_support;

pub use batch::{BatchConfig, BatchRunner, ShutdownSignal, Summary};
pub use error::CheckError;
pub use proxy::*;
pub use reputation::{LookupRoute, ReputationConfig, ReputationFetcher, ReputationReport};
pub use sink::{OutputRecord, ResultSink};

/// Application result type
pub type Result<T> = anyhow::Result<T>;
