//! Result sink: formats verified proxies and appends them to the output file

use crate::error::CheckError;
use crate::proxy::models::ProbeResult;
use crate::reputation::models::{LookupRoute, ReputationLookup};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Placeholder for values the probe or the report did not provide
const MISSING: &str = "N/A";

/// One line of output: a working proxy and whatever reputation data was found
#[derive(Debug, Clone)]
pub struct OutputRecord {
    pub probe: ProbeResult,
    /// `None` when every reputation lookup failed
    pub reputation: Option<ReputationLookup>,
}

impl OutputRecord {
    pub fn new(probe: ProbeResult, reputation: Option<ReputationLookup>) -> Self {
        Self { probe, reputation }
    }

    /// The record as a single line, without the trailing newline
    pub fn to_line(&self) -> String {
        let line = self.to_string();
        line.replace(['\r', '\n'], " ")
    }
}

fn or_missing(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(MISSING)
}

fn quoted_set(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("\"{}\"", item)).collect();
    format!("{{{}}}", quoted.join(", "))
}

impl fmt::Display for OutputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let probe = &self.probe;
        let ping = probe
            .latency_ms
            .map_or_else(|| MISSING.to_string(), |ms| ms.to_string());

        write!(
            f,
            "{} - Country: {}, Ping: {}ms - ",
            probe.proxy_url(),
            or_missing(probe.exit_country.as_deref()),
            ping
        )?;

        let Some(lookup) = &self.reputation else {
            return write!(f, "{0}, {0}, {0}, {0}, {0}, {0}", MISSING);
        };

        let report = &lookup.report;
        let score = report
            .fraud_score
            .map_or_else(|| MISSING.to_string(), |s| s.to_string());
        write!(
            f,
            "{}, {}, {}, {}, {}, {}",
            or_missing(report.asn.as_deref()),
            or_missing(report.isp_name.as_deref()),
            or_missing(report.city.as_deref()),
            or_missing(report.postal_code.as_deref()),
            or_missing(report.datacenter.as_deref()),
            score
        )?;

        if !report.active_blacklists.is_empty() {
            write!(f, " {}", quoted_set(&report.active_blacklists))?;
        }
        if !report.active_proxy_flags.is_empty() {
            write!(f, " {}", quoted_set(&report.active_proxy_flags))?;
        }
        if lookup.route == LookupRoute::DirectFallback {
            write!(f, " [{}]", LookupRoute::DirectFallback)?;
        }
        Ok(())
    }
}

/// Append-only output file shared by all tasks of a run.
///
/// Every append is a single write of a whole line followed by a flush, made
/// while holding the file lock, so lines never interleave and a killed
/// process leaves only complete lines behind.
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
    written: AtomicUsize,
}

impl ResultSink {
    /// Create (or truncate) the output file
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, CheckError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|source| CheckError::Sink {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
            written: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines appended so far
    pub fn lines_written(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }

    fn error(&self, source: std::io::Error) -> CheckError {
        CheckError::Sink {
            path: self.path.clone(),
            source,
        }
    }

    /// Write one record as one line and flush it
    pub async fn append(&self, record: &OutputRecord) -> Result<(), CheckError> {
        let mut line = record.to_line();
        line.push('\n');

        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or_else(|| {
            self.error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "sink already closed",
            ))
        })?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.error(e))?;
        file.flush().await.map_err(|e| self.error(e))?;

        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Flush and close the file. Only the first call does anything.
    pub async fn close(&self) -> Result<(), CheckError> {
        let Some(mut file) = self.file.lock().await.take() else {
            return Ok(());
        };
        file.flush().await.map_err(|e| self.error(e))?;
        file.sync_all().await.map_err(|e| self.error(e))?;
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.file.lock().await.is_none()
    }
}
