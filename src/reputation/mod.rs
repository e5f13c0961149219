//! IP reputation lookups
//!
//! Fetches a fraud/reputation page for an IP address and turns it into a
//! `ReputationReport`.

pub mod fetcher;
pub mod models;
pub mod parser;

pub use fetcher::{ReputationConfig, ReputationFetcher};
pub use models::{LookupRoute, ReputationLookup, ReputationReport, RiskStatus};
pub use parser::parse_report;
