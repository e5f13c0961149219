use anyhow::Context;
use clap::Parser;
use proxy_scout::{
    batch::{BatchConfig, BatchRunner, DEFAULT_CONCURRENCY},
    logging,
    proxy::{checker::DEFAULT_API_URL, CheckerConfig, ProtocolSelection, ProxyChecker, ProxyParser},
    reputation::{fetcher::DEFAULT_SERVICE_HOST, ReputationConfig, ReputationFetcher},
    ResultSink, Result,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Proxy checker with IP reputation lookups
#[derive(Parser)]
#[command(name = "proxy-scout")]
#[command(about = "Check proxies and enrich working ones with IP reputation data")]
struct Cli {
    /// File containing proxies to check, one `[scheme://]host:port` per line
    input: PathBuf,

    /// Output file for working proxies
    #[arg(short, long, default_value = "results.txt")]
    output: PathBuf,

    /// Concurrency level (the list is split into about this many batches)
    #[arg(short = 't', long = "threads", default_value_t = DEFAULT_CONCURRENCY)]
    threads: usize,

    /// Test every protocol for every proxy
    #[arg(long)]
    all: bool,

    /// Test HTTP
    #[arg(long)]
    http: bool,

    /// Test SOCKS4
    #[arg(long)]
    socks4: bool,

    /// Test SOCKS5
    #[arg(long)]
    socks5: bool,

    /// Route reputation lookups through the proxy being checked
    #[arg(long)]
    use_proxy_for_reputation: bool,

    /// Timeout in seconds for each probe and direct lookup
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Geolocation API to test proxies against
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Reputation service host
    #[arg(long, default_value = DEFAULT_SERVICE_HOST)]
    reputation_host: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let endpoints = ProxyParser::parse_file(&cli.input)?;
    let protocols = ProtocolSelection::from_flags(cli.all, cli.http, cli.socks4, cli.socks5);
    let timeout = Duration::from_secs(cli.timeout);

    println!("Loaded {} proxies from {:?}", endpoints.len(), cli.input);
    println!("Testing protocols: {}", protocols);
    println!("Concurrency level: {}", cli.threads);
    println!("Results will be written to: {:?}", cli.output);
    if cli.use_proxy_for_reputation {
        println!("Using proxies for reputation lookups");
    } else {
        println!("Using direct connection for reputation lookups");
    }
    println!("Starting proxy checks... (Press Ctrl+C to stop and keep current results)");
    println!();

    let checker = ProxyChecker::with_config(
        CheckerConfig::new()
            .with_timeout(timeout)
            .with_api_url(cli.api_url),
    );
    let fetcher = ReputationFetcher::with_config(
        ReputationConfig::new()
            .with_service_host(cli.reputation_host)
            .with_timeout(timeout),
    );
    let config = BatchConfig::new()
        .with_concurrency(cli.threads)
        .with_protocols(protocols)
        .with_tunnel_reputation(cli.use_proxy_for_reputation);

    let sink = Arc::new(ResultSink::open(&cli.output).await?);
    let runner = BatchRunner::new(config, checker, fetcher);

    let shutdown = runner.shutdown_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing the current batch");
            shutdown.trigger();
        }
    });

    let summary = runner
        .run(endpoints, sink)
        .await
        .with_context(|| format!("writing results to {:?}", cli.output))?;

    if summary.interrupted {
        println!();
        println!("Proxy checking interrupted by user");
    }
    println!();
    println!("Final Summary:");
    println!("{}", summary);
    println!("Results saved to: {:?}", cli.output);

    Ok(())
}
