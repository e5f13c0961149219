//! Error kinds for the proxy checking pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the checking pipeline.
///
/// `Parse`, `Probe` and `Fetch` are local to a single line or proxy and
/// never stop a run. `Input` and `Sink` are fatal.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("malformed proxy line '{line}': {reason}")]
    Parse { line: String, reason: String },

    #[error("probe through {target} failed: {reason}")]
    Probe { target: String, reason: String },

    #[error("reputation lookup for {ip} failed after {attempts} attempts")]
    Fetch { ip: String, attempts: usize },

    #[error("output file '{path}': {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read input file '{path}': {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CheckError {
    pub fn parse(line: &str, reason: impl Into<String>) -> Self {
        CheckError::Parse {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub fn probe(target: impl Into<String>, reason: impl ToString) -> Self {
        CheckError::Probe {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error should abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, CheckError::Sink { .. } | CheckError::Input { .. })
    }
}
