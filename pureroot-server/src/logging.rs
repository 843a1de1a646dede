//! Global tracing subscriber setup.

use thiserror::Error;
use tracing::debug;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter {directives:?}: {source}")]
    InvalidFilter {
        directives: String,
        #[source]
        source: ParseError,
    },
}

/// Installs the global subscriber described by `config`.
///
/// A subscriber that is already installed is left in place, so tests may
/// call this repeatedly.
///
/// # Errors
///
/// Returns [`LoggingError::InvalidFilter`] if `config.level` is not a
/// valid `EnvFilter` directive list.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = filter(&config.level)?
        .add_directive(quiet("hyper=warn"))
        .add_directive(quiet("tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
    };

    match installed {
        Ok(()) => debug!(format = %config.format, level = %config.level, "Logging initialised"),
        Err(err) => debug!(error = %err, "Subscriber already installed"),
    }
    Ok(())
}

fn filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|source| LoggingError::InvalidFilter {
        directives: directives.to_string(),
        source,
    })
}

fn quiet(directive: &str) -> tracing_subscriber::filter::Directive {
    directive
        .parse()
        .unwrap_or_else(|_| tracing::Level::WARN.into())
}
