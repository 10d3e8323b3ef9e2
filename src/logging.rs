//! Log subscriber for the CLI and embedding binaries.
//!
//! Filter comes from `RUST_LOG` (default `info`); `ROLECONNECT_LOG_JSON=1`
//! switches to one JSON object per line. Output always goes to stderr so
//! CLI results on stdout stay machine-readable.

use tracing_subscriber::{fmt, EnvFilter};

use crate::core::keys::env;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(env::LOG_JSON).ok().as_deref())
    }

    fn from_flag(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1") | Some("true") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

pub fn init_logging() {
    init_logging_with(LogFormat::from_env());
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = fmt::Subscriber::builder().with_env_filter(filter).with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Pretty => builder.with_target(false).pretty().try_init(),
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_only_when_flag_set() {
        assert_eq!(LogFormat::from_flag(Some("1")), LogFormat::Json);
        assert_eq!(LogFormat::from_flag(Some(" true ")), LogFormat::Json);
        assert_eq!(LogFormat::from_flag(Some("0")), LogFormat::Pretty);
        assert_eq!(LogFormat::from_flag(None), LogFormat::Pretty);
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging_with(LogFormat::Pretty);
        init_logging_with(LogFormat::Json);
    }
}
