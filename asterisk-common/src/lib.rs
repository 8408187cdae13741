//! Asterisk Exporter Common Library
//!
//! Shared types and utilities for the Asterisk exporter:
//!
//! - [`sip`] - SIP domain snapshot (`SipSnapshot`, `PeersInfo`, `RegistriesInfo`, ...)
//! - [`config`] - Logging configuration
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod sip;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use sip::{
    Peer, PeersInfo, RegistriesInfo, Registration, SipChannelsInfo, SipSnapshot, UsersInfo,
};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
