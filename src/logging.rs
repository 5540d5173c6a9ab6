//! Logging initialization (§12 ambient stack): an `EnvFilter`-driven
//! `tracing-subscriber` layer, defaulting to `info` and reading
//! `RUST_LOG` overrides, matching the conventional wiring used throughout
//! the corpus rather than a bespoke logger.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Install the global `tracing` subscriber. Call once, from `main`.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
