//! Prometheus metrics exporter for Asterisk.
//!
//! On every scrape the registered collectors query Asterisk through its CLI
//! (`asterisk -rx "sip show ..."`) and the resulting gauges are exposed via an
//! HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Asterisk CLI   │<────│   Collectors    │<────│   HTTP Server   │
//! │ (sip show ...)  │     │   (registry)    │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! asterisk-exporter --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod exposition;
pub mod http;
pub mod mapping;
pub mod metric;
pub mod registry;
pub mod sip;
pub mod source;

use std::sync::Arc;

use tokio::runtime::Handle;

pub use collector::{CollectError, Collector};
pub use config::ExporterConfig;
pub use http::HttpServer;
pub use metric::{CollectorHealth, Descriptor, MetricError, MetricSample, MetricSink};
pub use registry::{ExporterRegistry, RegistryError, SharedRegistry};
pub use sip::SipCollector;
pub use source::{AsteriskCli, SipDataSource, SourceError};

/// Build the registry with every collector enabled in `config`.
///
/// `runtime` is the handle the Asterisk CLI commands are spawned on.
pub fn build_registry(
    config: &ExporterConfig,
    runtime: Handle,
) -> Result<ExporterRegistry, RegistryError> {
    let mut registry = ExporterRegistry::new(&config.prometheus.prefix);

    if config.collectors.sip {
        let source = Arc::new(AsteriskCli::new(&config.asterisk, runtime));
        let collector = SipCollector::new(
            &config.prometheus.prefix,
            source,
            registry.health().clone(),
        );
        registry.register(Arc::new(collector))?;
    }

    Ok(registry)
}
