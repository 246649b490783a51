//! Tracing initialization for lima-hv
//!
//! Output goes to stderr so stdout stays free for the YAML/JSON that commands print.

use lima_core::error::{LimaError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format selected through `RUST_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
    Pretty,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("RUST_LOG_FORMAT").unwrap_or_default())
    }

    /// Unknown values fall back to `Pretty`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize the tracing subscriber with environment-based configuration
///
/// Uses standard RUST_LOG environment variable for filtering:
/// - `RUST_LOG=debug` - Set global level
/// - `RUST_LOG=lima_provider=debug` - Set per-crate levels
///
/// Uses RUST_LOG_FORMAT for output format (optional):
/// - `json` - JSON formatted output
/// - `pretty` - Pretty formatted output (default)
/// - `compact` - Compact single-line output
pub fn init() -> Result<()> {
    init_with_defaults("info")
}

/// Initialize with a default filter if RUST_LOG is not set
pub fn init_with_defaults(default_filter: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(fmt::layer().with_ansi(false).with_writer(std::io::stderr).json())
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().with_writer(std::io::stderr).compact())
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).pretty())
            .try_init(),
    };

    result.map_err(|e| LimaError::Command(format!("Failed to initialize tracing: {}", e)))
}

/// Initialize for testing; repeated calls are harmless.
pub fn init_for_testing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}
