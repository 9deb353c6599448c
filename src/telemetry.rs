//! Log subscriber setup. Everything goes to stderr so stdout stays clean for
//! board output.

use anyhow::{Context, Result};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{CardboardConfig, LOG_FILTER_ENV, LogFormat};

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &CardboardConfig) -> Result<()> {
    let filter = build_filter(&config.log_level());
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(build_stderr_layer(config.log_format()));
    layers.push(Box::new(filter));

    Registry::default()
        .with(layers)
        .try_init()
        .context("Failed to install log subscriber")
}

/// `CARDBOARD_LOG` if set and valid, else `default_directive`, else `warn`.
pub fn build_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn build_stderr_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Text => Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true),
        ),
    }
}
