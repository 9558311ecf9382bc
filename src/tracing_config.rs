//! Log subscriber setup for the issuer process.
//!
//! Settings come from [`Config::tracing`](crate::Config::tracing). `RUST_LOG`
//! still overrides the configured level when it is set.

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level used when the configured one does not parse.
const FALLBACK_LEVEL: &str = "info";

/// Encoding of emitted log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`, expected `text` or `json`")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

/// Subscriber settings for one issuer process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Reported on the startup event
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Line encoding
    pub format: LogFormat,
}

impl TracingConfig {
    /// Settings for `service_name`.
    pub fn new(service_name: impl Into<String>, log_level: impl Into<String>, format: LogFormat) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: log_level.into(),
            format,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
    }
}

/// Install the global subscriber. Call once at startup.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(config.filter());
    match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
    }

    tracing::info!(
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        format = %config.format,
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("xml".parse::<LogFormat>().unwrap_err().contains("xml"));
        assert_eq!(LogFormat::default().to_string(), "text");
    }

    #[test]
    fn test_new() {
        let config = TracingConfig::new("issuer-test", "debug", LogFormat::Json);
        assert_eq!(config.service_name, "issuer-test");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.format, LogFormat::Json);
    }
}
