use crate::core::settings::{LogFormat, Settings};
use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(settings: &Settings) -> Result<()> {
    let filter = mk_filter(settings.log_level())?;

    match settings.logging.format {
        LogFormat::Text => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true);
            init_with(tracing_subscriber::registry().with(filter).with(layer))
        }
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_current_span(false);
            init_with(tracing_subscriber::registry().with(filter).with(layer))
        }
        LogFormat::Journald => {
            let layer = tracing_journald::layer().context("Failed to connect to journald")?;
            init_with(tracing_subscriber::registry().with(filter).with(layer))
        }
    }
}

/// Fallback used before settings are known, e.g. when loading them fails.
pub fn init_default() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init();
}

fn mk_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {}", level)),
    }
}

fn init_with<S>(subscriber: S) -> Result<()>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber
        .try_init()
        .context("Failed to install tracing subscriber")
}
