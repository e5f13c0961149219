//! Batch orchestration
//!
//! The endpoint list is cut into contiguous batches. Batches run one after
//! another; every (endpoint, protocol) pair inside a batch runs concurrently.
//! A working pair immediately gets its reputation lookup and is appended to
//! the sink from inside its own task, so output order is completion order.

use crate::error::CheckError;
use crate::proxy::checker::ProxyChecker;
use crate::proxy::models::{ProtocolSelection, ProxyEndpoint, ProxyType};
use crate::reputation::fetcher::ReputationFetcher;
use crate::sink::{OutputRecord, ResultSink};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Default number of batches to aim for
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Configuration for a batch run
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Concurrency level; the list is split into roughly this many batches
    pub concurrency: usize,
    pub protocols: ProtocolSelection,
    /// Route reputation lookups through the proxy being reported on
    pub tunnel_reputation: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            protocols: ProtocolSelection::Auto,
            tunnel_reputation: false,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_protocols(mut self, protocols: ProtocolSelection) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_tunnel_reputation(mut self, tunnel: bool) -> Self {
        self.tunnel_reputation = tunnel;
        self
    }
}

/// Number of endpoints per batch: `max(1, total / concurrency)`
pub fn batch_size(total: usize, concurrency: usize) -> usize {
    (total / concurrency.max(1)).max(1)
}

/// Cooperative stop request, checked between batches
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Endpoints in the input
    pub total: usize,
    /// Endpoints whose batch completed
    pub processed: usize,
    /// Working (endpoint, protocol) pairs written to the sink
    pub working: usize,
    pub batches_run: usize,
    /// Stopped early on request
    pub interrupted: bool,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total proxies processed: {}/{}", self.processed, self.total)?;
        writeln!(f, "Working proxies found: {}", self.working)?;
        write!(
            f,
            "Batches run: {} in {:.1}s",
            self.batches_run,
            self.elapsed_ms as f64 / 1000.0
        )?;
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}

/// Runs probes and reputation lookups batch by batch
pub struct BatchRunner {
    config: BatchConfig,
    checker: ProxyChecker,
    fetcher: ReputationFetcher,
    shutdown: ShutdownSignal,
}

impl BatchRunner {
    pub fn new(config: BatchConfig, checker: ProxyChecker, fetcher: ReputationFetcher) -> Self {
        Self {
            config,
            checker,
            fetcher,
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Handle that stops the run after the current batch
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Process every endpoint and close the sink, whatever happens.
    ///
    /// Only a sink failure makes this return an error.
    pub async fn run(
        &self,
        endpoints: Vec<ProxyEndpoint>,
        sink: Arc<ResultSink>,
    ) -> Result<Summary, CheckError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", id = %run_id);

        let outcome = self
            .run_batches(run_id, &endpoints, &sink)
            .instrument(span)
            .await;
        let closed = sink.close().await;

        let summary = outcome?;
        closed?;
        Ok(summary)
    }

    async fn run_batches(
        &self,
        run_id: Uuid,
        endpoints: &[ProxyEndpoint],
        sink: &ResultSink,
    ) -> Result<Summary, CheckError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let total = endpoints.len();
        let size = batch_size(total, self.config.concurrency);

        let mut summary = Summary {
            run_id,
            started_at,
            elapsed_ms: 0,
            total,
            processed: 0,
            working: 0,
            batches_run: 0,
            interrupted: false,
        };

        for batch in endpoints.chunks(size) {
            if self.shutdown.is_triggered() {
                warn!("stop requested, not starting further batches");
                summary.interrupted = true;
                break;
            }

            let found = self.run_batch(batch, sink).await?;

            summary.batches_run += 1;
            summary.processed += batch.len();
            summary.working += found;
            info!(
                "Progress: {}/{} - Total Working: {}",
                summary.processed, total, summary.working
            );
        }

        summary.elapsed_ms = clock.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Run every pair of one batch concurrently; returns the working count
    async fn run_batch(&self, batch: &[ProxyEndpoint], sink: &ResultSink) -> Result<usize, CheckError> {
        let pairs: Vec<(&ProxyEndpoint, ProxyType)> = batch
            .iter()
            .flat_map(|endpoint| {
                self.config
                    .protocols
                    .resolve(endpoint)
                    .into_iter()
                    .map(move |protocol| (endpoint, protocol))
            })
            .collect();
        let limit = pairs.len().max(1);

        let outcomes: Vec<Result<bool, CheckError>> = stream::iter(pairs)
            .map(|(endpoint, protocol)| self.check_pair(endpoint, protocol, sink))
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut working = 0;
        let mut sink_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(true) => working += 1,
                Ok(false) => {}
                Err(e) => sink_error = Some(e),
            }
        }

        match sink_error {
            Some(e) => Err(e),
            None => Ok(working),
        }
    }

    /// Probe one pair and, when it works, look up its reputation and write it.
    /// Returns whether the pair worked.
    async fn check_pair(
        &self,
        endpoint: &ProxyEndpoint,
        protocol: ProxyType,
        sink: &ResultSink,
    ) -> Result<bool, CheckError> {
        let probe = self.checker.check_proxy(endpoint, protocol).await;
        if !probe.is_working() {
            return Ok(false);
        }

        let via = self
            .config
            .tunnel_reputation
            .then_some((endpoint, probe.protocol));
        let reputation = match self.fetcher.fetch_reputation(probe.lookup_ip(), via).await {
            Ok(lookup) => Some(lookup),
            Err(e) => {
                warn!("{}; recording {} without reputation data", e, probe.proxy_url());
                None
            }
        };

        let record = OutputRecord::new(probe, reputation);
        sink.append(&record).await?;
        info!("✅ {}", record.to_line());
        Ok(true)
    }
}
