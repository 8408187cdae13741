//! Text exposition of scraped samples through `prometheus-client`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use prometheus_client::collector::Collector as PromCollector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;

use crate::metric::{Descriptor, MetricSample};

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// All samples of one descriptor within a scrape.
#[derive(Debug)]
struct Family {
    descriptor: Arc<Descriptor>,
    samples: Vec<MetricSample>,
}

/// One scrape worth of families, registered on a throwaway registry so
/// `prometheus-client` can encode it.
#[derive(Debug)]
struct ScrapedFamilies(Vec<Family>);

impl ScrapedFamilies {
    /// Group samples by descriptor name, keeping first-appearance order.
    fn group(samples: impl IntoIterator<Item = MetricSample>) -> Self {
        let mut families: Vec<Family> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for sample in samples {
            let name = sample.descriptor().name();
            match index.get(name) {
                Some(&i) => families[i].samples.push(sample),
                None => {
                    index.insert(name.to_string(), families.len());
                    families.push(Family {
                        descriptor: Arc::clone(sample.descriptor()),
                        samples: vec![sample],
                    });
                }
            }
        }

        Self(families)
    }
}

impl PromCollector for ScrapedFamilies {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        for family in &self.0 {
            let mut metric_encoder = encoder.encode_descriptor(
                family.descriptor.name(),
                family.descriptor.help(),
                None,
                MetricType::Gauge,
            )?;

            // An unlabeled family is a single series.
            if family.descriptor.label_names().is_empty() {
                if let Some(sample) = family.samples.first() {
                    ConstGauge::new(sample.value()).encode(metric_encoder)?;
                }
                continue;
            }

            for sample in &family.samples {
                let labels = sample.labels();
                ConstGauge::new(sample.value()).encode(metric_encoder.encode_family(&labels)?)?;
            }
        }

        Ok(())
    }
}

/// Encode samples in the OpenMetrics text format.
///
/// Samples sharing a descriptor end up in a single family, so a descriptor
/// emitted by several collectors is only described once.
pub fn encode(samples: impl IntoIterator<Item = MetricSample>) -> Result<String, fmt::Error> {
    let mut registry = Registry::default();
    registry.register_collector(Box::new(ScrapedFamilies::group(samples)));

    let mut output = String::new();
    prometheus_client::encoding::text::encode(&mut output, &registry)?;
    Ok(output)
}
