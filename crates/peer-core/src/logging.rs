//! Logging for the negotiation engine
//!
//! The engine only emits `tracing` events. Each connection owns a
//! `peer_connection` span carrying its session id, and operations and
//! endpoint callbacks run inside it, so output from several connections in one
//! process stays apart. Embedders without a subscriber of their own can call
//! [`init_logging`].

use std::str::FromStr;

use tracing::Span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::{self, TestWriter};
use tracing_subscriber::EnvFilter;

use crate::error::{PeerConnectionError, Result};

/// Environment variable holding filter directives
pub const LOG_ENV: &str = "RTCPEER_LOG";

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "RTCPEER_LOG_FORMAT";

const DEFAULT_DIRECTIVES: &str = "rtcpeer_peer_core=info,rtcpeer_sdp_core=warn";

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = PeerConnectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(PeerConnectionError::invalid_configuration(format!(
                "unknown log format '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `rtcpeer_peer_core=debug`
    pub directives: String,
    pub format: LogFormat,
    /// Report when connection spans open and close
    pub span_lifecycle: bool,
    /// Write through the test harness so output is captured per test
    pub test_writer: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directives: DEFAULT_DIRECTIVES.to_string(),
            format: LogFormat::Full,
            span_lifecycle: false,
            test_writer: false,
        }
    }
}

impl LoggingConfig {
    /// Defaults overridden by [`LOG_ENV`] and [`LOG_FORMAT_ENV`]
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(directives) = std::env::var(LOG_ENV) {
            config.directives = directives;
        }
        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    /// Verbose compact output captured by the test harness
    pub fn for_tests() -> Self {
        Self {
            directives: "rtcpeer_peer_core=debug,rtcpeer_sdp_core=debug".to_string(),
            format: LogFormat::Compact,
            span_lifecycle: false,
            test_writer: true,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_lifecycle(mut self) -> Self {
        self.span_lifecycle = true;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.directives).map_err(|e| {
            PeerConnectionError::invalid_configuration(format!("log directives '{}': {}", self.directives, e))
        })
    }
}

/// Install a global subscriber
///
/// Fails if one is already installed, so tests may call it repeatedly.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;
    let span_events = if config.span_lifecycle {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let writer = if config.test_writer {
        BoxMakeWriter::new(TestWriter::new())
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_writer(writer);
    let installed = match config.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| PeerConnectionError::invalid_configuration(format!("logging: {}", e)))
}

/// Span wrapping everything one connection logs
pub(crate) fn connection_span(session_id: u64) -> Span {
    tracing::info_span!("peer_connection", session_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!(matches!(
            "loud".parse::<LogFormat>(),
            Err(PeerConnectionError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_bad_directives_are_rejected() {
        let config = LoggingConfig {
            directives: "rtcpeer_peer_core=loud".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(PeerConnectionError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_logging(&LoggingConfig::for_tests());
        assert!(init_logging(&LoggingConfig::for_tests().with_span_lifecycle()).is_err());
    }
}
