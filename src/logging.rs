//! Logging setup

use tracing_subscriber::EnvFilter;

/// Map a `-v` count to a default filter directive
pub fn default_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // HTTP internals are only interesting when explicitly asked for
    format!("{level},hyper=warn,hyper_util=warn,reqwest=warn")
}

/// Sets up the tracing subscriber. `RUST_LOG` wins over the verbosity flag.
pub fn init(verbosity: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
