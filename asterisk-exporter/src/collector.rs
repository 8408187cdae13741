//! The collector abstraction driven by the [`ExporterRegistry`](crate::registry::ExporterRegistry).

use std::sync::Arc;

use thiserror::Error;

use crate::metric::{Descriptor, MetricSink};
use crate::source::SourceError;

/// Why a collection produced no domain metrics.
///
/// Never surfaces as a failed scrape: collectors turn it into a health
/// sample with value 1.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(#[from] SourceError),
}

/// A source of gauges for one telemetry domain.
///
/// Collectors are immutable once built. The registry may call `collect` on
/// several collectors at the same time, but never concurrently on the same
/// collector within a scrape.
pub trait Collector: Send + Sync {
    /// Stable, unique collector name. Used as the health metric label.
    fn name(&self) -> &str;

    /// Every descriptor this collector emits, in a stable order.
    ///
    /// Never touches the data source and never fails.
    fn describe(&self) -> Vec<Arc<Descriptor>>;

    /// Emit the samples of one scrape into `sink`.
    ///
    /// The health sample is always emitted first. On a data-source failure it
    /// is the only sample.
    fn collect(&self, sink: &mut dyn MetricSink);
}
