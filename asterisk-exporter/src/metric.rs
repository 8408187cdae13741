//! Metric descriptors, samples and the sink they are emitted through.

use std::sync::Arc;

use thiserror::Error;

use crate::mapping::{build_fq_name, sanitize_label_name};

/// Errors raised while building metric samples.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricError {
    #[error("Metric {name} expects {expected} label values, got {actual}")]
    LabelArity {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Immutable schema of a gauge: name, help text and label names.
///
/// Descriptors are created once when a collector is built and shared through
/// `Arc` with every sample emitted for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    name: String,
    help: String,
    label_names: Vec<String>,
}

impl Descriptor {
    /// Create a descriptor named `{namespace}_{subsystem}_{name}`.
    pub fn new(
        namespace: &str,
        subsystem: &str,
        name: &str,
        help: impl Into<String>,
        label_names: &[&str],
    ) -> Arc<Self> {
        Arc::new(Self {
            name: build_fq_name(namespace, subsystem, name),
            help: help.into(),
            label_names: label_names.iter().map(|l| sanitize_label_name(l)).collect(),
        })
    }

    /// Fully-qualified metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }
}

/// One gauge value emitted during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    descriptor: Arc<Descriptor>,
    value: f64,
    label_values: Vec<String>,
}

impl MetricSample {
    /// Build a sample for `descriptor`.
    ///
    /// Fails when the number of label values differs from the number of
    /// label names.
    pub fn new(
        descriptor: Arc<Descriptor>,
        value: f64,
        label_values: Vec<String>,
    ) -> Result<Self, MetricError> {
        if label_values.len() != descriptor.label_names.len() {
            return Err(MetricError::LabelArity {
                name: descriptor.name.clone(),
                expected: descriptor.label_names.len(),
                actual: label_values.len(),
            });
        }

        Ok(Self {
            descriptor,
            value,
            label_values,
        })
    }

    /// Build a sample whose label values are known to match the descriptor.
    ///
    /// Only for descriptors owned by the caller, where the arity is fixed when
    /// the descriptor is created.
    pub(crate) fn from_parts(
        descriptor: Arc<Descriptor>,
        value: f64,
        label_values: Vec<String>,
    ) -> Self {
        debug_assert_eq!(label_values.len(), descriptor.label_names.len());
        Self {
            descriptor,
            value,
            label_values,
        }
    }

    pub fn descriptor(&self) -> &Arc<Descriptor> {
        &self.descriptor
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Label name/value pairs in descriptor order.
    pub fn labels(&self) -> Vec<(String, String)> {
        self.descriptor
            .label_names
            .iter()
            .cloned()
            .zip(self.label_values.iter().cloned())
            .collect()
    }

    /// Value of the label with the given name, if the descriptor declares it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.descriptor
            .label_names
            .iter()
            .position(|l| l == name)
            .map(|i| self.label_values[i].as_str())
    }
}

/// Destination for the samples a collector emits during a scrape.
pub trait MetricSink {
    fn emit(&mut self, sample: MetricSample);
}

impl MetricSink for Vec<MetricSample> {
    fn emit(&mut self, sample: MetricSample) {
        self.push(sample);
    }
}

/// The health gauge shared by every collector of a registry.
///
/// Value 0 means the last collection succeeded, 1 means the data source
/// failed. The collector name is the only label.
#[derive(Debug, Clone)]
pub struct CollectorHealth {
    descriptor: Arc<Descriptor>,
}

impl CollectorHealth {
    pub const LABEL: &'static str = "collector";

    /// Create the `{prefix}_exporter_collector_error` descriptor.
    pub fn new(prefix: &str) -> Self {
        Self {
            descriptor: Descriptor::new(
                prefix,
                "exporter",
                "collector_error",
                "Whether the collector failed to retrieve its data on this scrape (1 = failure)",
                &[Self::LABEL],
            ),
        }
    }

    pub fn descriptor(&self) -> &Arc<Descriptor> {
        &self.descriptor
    }

    pub fn success(&self, collector: &str) -> MetricSample {
        self.sample(collector, 0.0)
    }

    pub fn failure(&self, collector: &str) -> MetricSample {
        self.sample(collector, 1.0)
    }

    /// Whether `sample` reports a failed collection.
    pub fn is_failure(&self, sample: &MetricSample) -> bool {
        Arc::ptr_eq(&sample.descriptor, &self.descriptor) && sample.value != 0.0
    }

    fn sample(&self, collector: &str, value: f64) -> MetricSample {
        MetricSample::from_parts(
            Arc::clone(&self.descriptor),
            value,
            vec![collector.to_string()],
        )
    }
}
