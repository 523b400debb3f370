//! Subscriber initialisation for the `eluent` binary.
//!
//! The core crate only emits `tracing` events; installing a subscriber is
//! this binary's job. `RUST_LOG` controls verbosity (default `info`);
//! `--log-format json` switches from human-readable stderr output to
//! structured JSON for machine consumption. There is no OTLP/metrics
//! export pipeline here — that's out of scope for this tool.

use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable, to stderr.
    #[default]
    Text,
    /// One JSON object per line, to stderr.
    Json,
}

/// Install the global subscriber. Returns an error if one is already set
/// (should only happen if this is called twice).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("warning: failed to install log subscriber: {e}");
    }
}
