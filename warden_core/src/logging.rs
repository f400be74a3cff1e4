//! Logging utilities for warden-wide output to stdout.
//!

// Re-exports for convenience
pub use tracing::metadata::LevelFilter;
pub use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{util::SubscriberInitExt, Layer};

/// Crates whose events are shown by default
const WARDEN_TARGETS: [&str; 2] = ["warden_core", "warden_lib"];

/// Set up basic logging
pub fn setup(level: Option<LevelFilter>) {
    let directive = filter_directive(level, std::env::var("RUST_LOG").ok());
    let mut logging_layers = vec![tracing_subscriber::EnvFilter::new(directive).boxed()];

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(level.unwrap_or(LevelFilter::INFO))
        .boxed();
    logging_layers.push(layer);

    // Actually initialize all logging layers. A second call is a no-op.
    if tracing_subscriber::registry()
        .with(logging_layers)
        .try_init()
        .is_ok()
    {
        debug!("logging set up");
    }
}

/// The EnvFilter directive to install. An explicit level wins over
/// `RUST_LOG`, which wins over info for the warden crates.
fn filter_directive(level: Option<LevelFilter>, env: Option<String>) -> String {
    match (level, env) {
        (Some(level), _) => targets_at(&level.to_string().to_lowercase()),
        (None, Some(env)) => env,
        (None, None) => targets_at("info"),
    }
}

fn targets_at(level: &str) -> String {
    WARDEN_TARGETS
        .iter()
        .map(|t| format!("{t}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}
