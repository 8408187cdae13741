//! Registry that owns the collectors and drives each scrape.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::collector::Collector;
use crate::exposition;
use crate::metric::{CollectorHealth, Descriptor, MetricSample};

/// Errors raised while registering collectors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Collector '{0}' is already registered")]
    DuplicateCollector(String),

    #[error("Collector '{collector}' describes metric '{name}' which is already registered")]
    DuplicateDescriptor { collector: String, name: String },
}

/// Errors raised while rendering a scrape.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] std::fmt::Error),
}

/// Samples produced by one collector during one scrape.
#[derive(Debug, Clone)]
pub struct CollectorOutput {
    pub collector: String,
    pub samples: Vec<MetricSample>,
    pub duration: Duration,
}

/// Exporter-level scrape bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    /// Scrapes run since startup.
    pub scrapes_total: u64,
    /// Collections that reported a failure since startup.
    pub failed_collections_total: u64,
    /// Collectors whose health was 1 on the most recent scrape.
    pub last_failed: Vec<String>,
}

/// Holds the collectors and the descriptors shared between them.
pub struct ExporterRegistry {
    health: CollectorHealth,
    duration: Arc<Descriptor>,
    collectors: Vec<Arc<dyn Collector>>,
    descriptor_names: HashSet<String>,
    stats: RwLock<ScrapeStats>,
}

impl ExporterRegistry {
    /// Create an empty registry whose own metrics are named `{prefix}_exporter_*`.
    pub fn new(prefix: &str) -> Self {
        let health = CollectorHealth::new(prefix);
        let duration = Descriptor::new(
            prefix,
            "exporter",
            "collector_duration_seconds",
            "Time spent collecting metrics, per collector",
            &[CollectorHealth::LABEL],
        );

        let descriptor_names = [health.descriptor().name(), duration.name()]
            .into_iter()
            .map(str::to_string)
            .collect();

        Self {
            health,
            duration,
            collectors: Vec::new(),
            descriptor_names,
            stats: RwLock::new(ScrapeStats::default()),
        }
    }

    /// The health descriptor every collector of this registry must report with.
    pub fn health(&self) -> &CollectorHealth {
        &self.health
    }

    /// Register a collector after validating its schema.
    ///
    /// `describe` is called exactly once. Collector names and descriptor
    /// names must be unique across the registry.
    pub fn register(&mut self, collector: Arc<dyn Collector>) -> Result<(), RegistryError> {
        let name = collector.name().to_string();
        if self.collectors.iter().any(|c| c.name() == name) {
            return Err(RegistryError::DuplicateCollector(name));
        }

        let descriptors = collector.describe();
        let mut seen = HashSet::new();
        for desc in &descriptors {
            if self.descriptor_names.contains(desc.name()) || !seen.insert(desc.name()) {
                return Err(RegistryError::DuplicateDescriptor {
                    collector: name,
                    name: desc.name().to_string(),
                });
            }
        }

        self.descriptor_names
            .extend(descriptors.iter().map(|d| d.name().to_string()));
        debug!(
            collector = %name,
            descriptors = descriptors.len(),
            "Registered collector"
        );
        self.collectors.push(collector);

        Ok(())
    }

    pub fn collector_names(&self) -> Vec<&str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Every descriptor the registry can emit: its own first, then each
    /// collector's in registration order.
    pub fn describe(&self) -> Vec<Arc<Descriptor>> {
        let mut descriptors = vec![
            Arc::clone(self.health.descriptor()),
            Arc::clone(&self.duration),
        ];
        for collector in &self.collectors {
            descriptors.extend(collector.describe());
        }
        descriptors
    }

    /// Run every collector once, each on its own thread.
    ///
    /// Outputs are returned in registration order. A collector that panics
    /// is reported as failed.
    pub fn scrape(&self) -> Vec<CollectorOutput> {
        let outputs: Vec<CollectorOutput> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .collectors
                .iter()
                .map(|collector| {
                    scope.spawn(move || {
                        let start = Instant::now();
                        let mut samples = Vec::new();
                        collector.collect(&mut samples);
                        (samples, start.elapsed())
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(&self.collectors)
                .map(|(handle, collector)| {
                    let (samples, duration) = handle.join().unwrap_or_else(|_| {
                        error!(collector = collector.name(), "Collector panicked");
                        (vec![self.health.failure(collector.name())], Duration::ZERO)
                    });

                    CollectorOutput {
                        collector: collector.name().to_string(),
                        samples,
                        duration,
                    }
                })
                .collect()
        });

        let failed: Vec<String> = outputs
            .iter()
            .filter(|o| o.samples.iter().any(|s| self.health.is_failure(s)))
            .map(|o| o.collector.clone())
            .collect();

        if !failed.is_empty() {
            warn!(collectors = ?failed, "Scrape finished with failed collectors");
        }

        let mut stats = self.stats.write();
        stats.scrapes_total += 1;
        stats.failed_collections_total += failed.len() as u64;
        stats.last_failed = failed;

        outputs
    }

    /// Scrape every collector and render the result in the text exposition format.
    pub fn render(&self) -> Result<String, RenderError> {
        let mut samples = Vec::new();

        for output in self.scrape() {
            samples.extend(output.samples);
            samples.push(MetricSample::from_parts(
                Arc::clone(&self.duration),
                output.duration.as_secs_f64(),
                vec![output.collector],
            ));
        }

        Ok(exposition::encode(samples)?)
    }

    /// Get scrape statistics.
    pub fn stats(&self) -> ScrapeStats {
        self.stats.read().clone()
    }
}

/// Create a shareable registry handle.
pub type SharedRegistry = Arc<ExporterRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricSink;

    /// Minimal collector emitting one gauge, or failing.
    struct TestCollector {
        name: String,
        health: CollectorHealth,
        gauge: Arc<Descriptor>,
        fail: bool,
    }

    impl TestCollector {
        fn new(registry: &ExporterRegistry, name: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                health: registry.health().clone(),
                gauge: Descriptor::new("asterisk", name, "up", "Test gauge", &[]),
                fail,
            })
        }
    }

    impl Collector for TestCollector {
        fn name(&self) -> &str {
            &self.name
        }

        fn describe(&self) -> Vec<Arc<Descriptor>> {
            vec![Arc::clone(&self.gauge)]
        }

        fn collect(&self, sink: &mut dyn MetricSink) {
            if self.fail {
                sink.emit(self.health.failure(&self.name));
                return;
            }
            sink.emit(self.health.success(&self.name));
            sink.emit(MetricSample::new(Arc::clone(&self.gauge), 1.0, Vec::new()).unwrap());
        }
    }

    struct PanickingCollector;

    impl Collector for PanickingCollector {
        fn name(&self) -> &str {
            "broken"
        }

        fn describe(&self) -> Vec<Arc<Descriptor>> {
            Vec::new()
        }

        fn collect(&self, _sink: &mut dyn MetricSink) {
            panic!("collector bug");
        }
    }

    /// Collector that blocks for a fixed time, like a slow CLI command.
    struct SlowCollector {
        name: String,
        health: CollectorHealth,
        delay: Duration,
    }

    impl Collector for SlowCollector {
        fn name(&self) -> &str {
            &self.name
        }

        fn describe(&self) -> Vec<Arc<Descriptor>> {
            Vec::new()
        }

        fn collect(&self, sink: &mut dyn MetricSink) {
            std::thread::sleep(self.delay);
            sink.emit(self.health.success(&self.name));
        }
    }

    #[test]
    fn test_register_rejects_duplicate_collector() {
        let mut registry = ExporterRegistry::new("asterisk");
        let first = TestCollector::new(&registry, "sip", false);
        let second = TestCollector::new(&registry, "sip", false);

        registry.register(first).unwrap();
        let err = registry.register(second).unwrap_err();

        assert_eq!(err, RegistryError::DuplicateCollector("sip".to_string()));
        assert_eq!(registry.collector_names(), vec!["sip"]);
    }

    #[test]
    fn test_register_rejects_duplicate_descriptor() {
        struct Clash(Arc<Descriptor>);

        impl Collector for Clash {
            fn name(&self) -> &str {
                "clash"
            }

            fn describe(&self) -> Vec<Arc<Descriptor>> {
                vec![Arc::clone(&self.0)]
            }

            fn collect(&self, _sink: &mut dyn MetricSink) {}
        }

        let mut registry = ExporterRegistry::new("asterisk");
        let clash = Clash(Arc::clone(registry.health().descriptor()));

        let err = registry.register(Arc::new(clash)).unwrap_err();

        assert_eq!(
            err,
            RegistryError::DuplicateDescriptor {
                collector: "clash".to_string(),
                name: "asterisk_exporter_collector_error".to_string(),
            }
        );
    }

    #[test]
    fn test_describe_includes_registry_descriptors() {
        let mut registry = ExporterRegistry::new("asterisk");
        registry
            .register(TestCollector::new(&registry, "sip", false))
            .unwrap();

        let names: Vec<String> = registry
            .describe()
            .iter()
            .map(|d| d.name().to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "asterisk_exporter_collector_error",
                "asterisk_exporter_collector_duration_seconds",
                "asterisk_sip_up",
            ]
        );
    }

    #[test]
    fn test_failing_collector_does_not_hide_others() {
        let mut registry = ExporterRegistry::new("asterisk");
        registry
            .register(TestCollector::new(&registry, "sip", true))
            .unwrap();
        registry
            .register(TestCollector::new(&registry, "iax", false))
            .unwrap();

        let outputs = registry.scrape();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].collector, "sip");
        assert_eq!(outputs[0].samples.len(), 1);
        assert_eq!(outputs[0].samples[0].value(), 1.0);
        assert_eq!(outputs[1].collector, "iax");
        assert_eq!(outputs[1].samples.len(), 2);
        assert_eq!(outputs[1].samples[0].value(), 0.0);

        let stats = registry.stats();
        assert_eq!(stats.scrapes_total, 1);
        assert_eq!(stats.failed_collections_total, 1);
        assert_eq!(stats.last_failed, vec!["sip"]);
    }

    #[test]
    fn test_panicking_collector_reported_as_failed() {
        let mut registry = ExporterRegistry::new("asterisk");
        registry.register(Arc::new(PanickingCollector)).unwrap();

        let outputs = registry.scrape();

        assert_eq!(outputs[0].samples.len(), 1);
        assert!(registry.health().is_failure(&outputs[0].samples[0]));
        assert_eq!(registry.stats().last_failed, vec!["broken"]);
    }

    #[test]
    fn test_scrape_runs_collectors_concurrently() {
        let delay = Duration::from_millis(300);
        let mut registry = ExporterRegistry::new("asterisk");
        for name in ["sip", "iax"] {
            let collector = SlowCollector {
                name: name.to_string(),
                health: registry.health().clone(),
                delay,
            };
            registry.register(Arc::new(collector)).unwrap();
        }

        let start = Instant::now();
        let outputs = registry.scrape();
        let elapsed = start.elapsed();

        assert_eq!(outputs.len(), 2);
        assert!(outputs.iter().all(|o| o.duration >= delay));
        assert!(elapsed >= delay);
        assert!(
            elapsed < delay * 2,
            "collectors ran sequentially: {:?}",
            elapsed
        );
    }

    #[test]
    fn test_render() {
        let mut registry = ExporterRegistry::new("asterisk");
        registry
            .register(TestCollector::new(&registry, "sip", false))
            .unwrap();
        registry
            .register(TestCollector::new(&registry, "iax", true))
            .unwrap();

        let output = registry.render().unwrap();

        assert_eq!(
            output
                .matches("# TYPE asterisk_exporter_collector_error gauge")
                .count(),
            1
        );
        assert!(output.contains("asterisk_exporter_collector_error{collector=\"sip\"}"));
        assert!(output.contains("asterisk_exporter_collector_error{collector=\"iax\"}"));
        assert!(output.contains("asterisk_sip_up"));
        assert!(!output.contains("asterisk_iax_up"));
        assert!(
            output.contains("asterisk_exporter_collector_duration_seconds{collector=\"sip\"}")
        );
    }

    #[test]
    fn test_stats_track_recovery() {
        let mut registry = ExporterRegistry::new("asterisk");
        registry
            .register(TestCollector::new(&registry, "sip", false))
            .unwrap();

        registry.scrape();
        registry.scrape();

        let stats = registry.stats();
        assert_eq!(stats.scrapes_total, 2);
        assert_eq!(stats.failed_collections_total, 0);
        assert!(stats.last_failed.is_empty());
    }
}
