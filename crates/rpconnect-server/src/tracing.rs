//! Log output for processes embedding an rpconnect server.
//!
//! Each accepted connection runs inside a `connection` span carrying the peer
//! address, so enabling span events shows one open/close pair per call.
//!
//! ```ignore
//! use rpconnect_server::tracing::{LogFormat, TracingConfig, init_tracing};
//!
//! init_tracing(TracingConfig::default().with_format(LogFormat::Json))?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Crates whose events the built-in filter enables.
const CRATE_TARGETS: [&str; 3] = ["rpconnect_protocol", "rpconnect_server", "rpconnect_client"];

/// Failures while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
}

/// How each event is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, for reading at a terminal.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Settings for [`init_tracing`].
#[derive(Debug, Clone)]
pub struct TracingConfig {
    level: Level,
    format: LogFormat,
    source_location: bool,
    connection_spans: bool,
    directive: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            source_location: false,
            connection_spans: false,
            directive: None,
        }
    }
}

impl TracingConfig {
    /// Maps a `-v` count to a level: 0 is INFO, 1 is DEBUG, 2 or more TRACE.
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self::default().with_level(level)
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Include file and line of each event.
    #[must_use]
    pub fn with_source_location(mut self, enabled: bool) -> Self {
        self.source_location = enabled;
        self
    }

    /// Log when each connection span opens and closes.
    #[must_use]
    pub fn with_connection_spans(mut self, enabled: bool) -> Self {
        self.connection_spans = enabled;
        self
    }

    /// Use `directive` verbatim instead of `RUST_LOG` or the level.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Directive enabling the rpconnect crates at the configured level.
    pub fn default_directive(&self) -> String {
        CRATE_TARGETS
            .iter()
            .map(|target| format!("{target}={}", self.level))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Builds the filter: explicit directive, then `RUST_LOG`, then the level.
    pub fn filter(&self) -> Result<EnvFilter, TracingError> {
        match &self.directive {
            Some(directive) => EnvFilter::try_new(directive).map_err(|source| {
                TracingError::Filter {
                    directive: directive.clone(),
                    source,
                }
            }),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.default_directive()))),
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already set or the directive is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.filter()?;

    let span_events = if config.connection_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(span_events);

    let layer = match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(TracingConfig::from_verbosity(0).level(), Level::INFO);
        assert_eq!(TracingConfig::from_verbosity(1).level(), Level::DEBUG);
        assert_eq!(TracingConfig::from_verbosity(7).level(), Level::TRACE);
    }

    #[test]
    fn default_directive_covers_all_crates() {
        let directive = TracingConfig::default()
            .with_level(Level::DEBUG)
            .default_directive();
        assert_eq!(
            directive,
            "rpconnect_protocol=DEBUG,rpconnect_server=DEBUG,rpconnect_client=DEBUG"
        );
        assert!(EnvFilter::try_new(&directive).is_ok());
    }

    #[test]
    fn explicit_directive_is_used() {
        let config = TracingConfig::default()
            .with_format(LogFormat::Json)
            .with_directive("rpconnect_server=trace");
        assert_eq!(config.format(), LogFormat::Json);
        assert!(config.filter().is_ok());
    }

    #[test]
    fn invalid_directive_is_rejected() {
        let config = TracingConfig::default().with_directive("rpconnect_server=[");
        match init_tracing(config) {
            Err(TracingError::Filter { directive, .. }) => {
                assert_eq!(directive, "rpconnect_server=[");
            }
            other => panic!("expected filter error, got {other:?}"),
        }
    }
}
