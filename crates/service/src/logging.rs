//! `tracing` subscriber setup.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter from `RUST_LOG` if set, otherwise from `fallback`.
///
/// # Errors
///
/// Fails if `fallback` is not a valid filter directive.
pub fn filter(fallback: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(fallback)
            .with_context(|| format!("Invalid log filter: {fallback}")),
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails on an invalid filter or if a subscriber is already installed.
pub fn init(fallback: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(fallback)?)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init()
        .context("Failed to install tracing subscriber")
}
