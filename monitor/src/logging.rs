//! # Structured Logging
//!
//! Sets up the `tracing` subscriber for the monitor. Output goes to stderr
//! so stdout stays clean for piped data (the `status` subcommand prints the
//! response body there).
//!
//! Filtering defaults to [`DEFAULT_DIRECTIVES`] and is overridden wholesale
//! by `RUST_LOG` when set, e.g.:
//!
//! ```text
//! RUST_LOG=headlight_client=debug,headlight_monitor=debug
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when `RUST_LOG` is not set: both workspace crates at
/// info, plus request traces from the API middleware.
pub const DEFAULT_DIRECTIVES: &str =
    "headlight_monitor=info,headlight_client=info,tower_http=info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for local development.
    Pretty,
    /// JSON lines for log aggregation.
    Json,
}

impl LogFormat {
    /// Parses a format string, defaulting to `Pretty` for anything that is
    /// not (case-insensitively) "json".
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Installs the global tracing subscriber.
///
/// Call this exactly once, early in `main()`; a second call panics.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    tracing::debug!(?format, "logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_is_lossy() {
        assert_eq!(LogFormat::from_str_lossy("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str_lossy("whatever"), LogFormat::Pretty);
    }

    #[test]
    fn default_directives_parse_and_cover_both_workspace_crates() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVES).is_ok());
        assert!(DEFAULT_DIRECTIVES.contains("headlight_monitor="));
        assert!(DEFAULT_DIRECTIVES.contains("headlight_client="));
    }
}
