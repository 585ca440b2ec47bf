// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The default registry: one catalog per metric kind.

use crate::cleaner::CleanerHandle;
use crate::metrics::catalog::{CatalogEntry, MetricCatalog};
use std::convert::Infallible;
use std::sync::Arc;
use vigil_core::telemetry::{
    Counter, CounterValue, Event, EventValue, Gauge, Histogram, HistogramValue, Meter,
    MeterValue, MetricFactory, MetricKind, MetricTags, MetricValueProvider, MetricValueSource,
    MetricsRegistry, MetricsResult, RegistryDataProvider, Timer, TimerValue, Unit,
};

/// Exposes only the read side of a live metric to value sources.
struct ReadOnly<M: ?Sized>(Arc<M>);

impl<V, M> MetricValueProvider<V> for ReadOnly<M>
where
    M: ?Sized + MetricValueProvider<V>,
{
    fn get_value(&self, reset: bool) -> V {
        self.0.get_value(reset)
    }
}

fn entry<M, V>(name: &str, unit: &Unit, tags: &MetricTags, metric: Arc<M>) -> CatalogEntry<M, V>
where
    M: ?Sized + MetricValueProvider<V> + 'static,
    V: 'static,
{
    let provider: Arc<dyn MetricValueProvider<V>> = Arc::new(ReadOnly(metric.clone()));
    CatalogEntry {
        metric,
        source: MetricValueSource::new(name, unit.clone(), tags.clone(), provider),
    }
}

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

#[derive(Debug, Default)]
struct Catalogs {
    gauges: MetricCatalog<dyn Gauge, f64>,
    counters: MetricCatalog<dyn Counter, CounterValue>,
    meters: MetricCatalog<dyn Meter, MeterValue>,
    histograms: MetricCatalog<dyn Histogram, HistogramValue>,
    timers: MetricCatalog<dyn Timer, TimerValue>,
    events: MetricCatalog<dyn Event, EventValue>,
}

/// Lazily composes the six catalog enumerations of a [`DefaultMetricsRegistry`].
///
/// Every call re-enumerates, so a provider obtained once stays current.
#[derive(Debug, Clone)]
pub struct DefaultRegistryDataProvider {
    catalogs: Arc<Catalogs>,
}

impl RegistryDataProvider for DefaultRegistryDataProvider {
    fn gauges(&self) -> Vec<MetricValueSource<f64>> {
        self.catalogs.gauges.all()
    }

    fn counters(&self) -> Vec<MetricValueSource<CounterValue>> {
        self.catalogs.counters.all()
    }

    fn meters(&self) -> Vec<MetricValueSource<MeterValue>> {
        self.catalogs.meters.all()
    }

    fn histograms(&self) -> Vec<MetricValueSource<HistogramValue>> {
        self.catalogs.histograms.all()
    }

    fn timers(&self) -> Vec<MetricValueSource<TimerValue>> {
        self.catalogs.timers.all()
    }

    fn events(&self) -> Vec<MetricValueSource<EventValue>> {
        self.catalogs.events.all()
    }
}

/// Central registry for the metrics of one context.
///
/// Every accessor qualifies the name with its kind suffix (`requests` becomes
/// `requests.counter`) before computing the identifier, so metrics of different
/// kinds never collide and deregistration always finds what registration stored.
#[derive(Debug, Default)]
pub struct DefaultMetricsRegistry {
    catalogs: Arc<Catalogs>,
    cleaner: Option<CleanerHandle>,
}

impl DefaultMetricsRegistry {
    /// Creates an empty registry not attached to any cleaner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry that tells `cleaner` when event metrics are removed.
    pub fn with_cleaner(cleaner: CleanerHandle) -> Self {
        Self {
            catalogs: Arc::default(),
            cleaner: Some(cleaner),
        }
    }

    /// Total number of registered metrics across all kinds.
    pub fn metric_count(&self) -> usize {
        let c = &self.catalogs;
        c.gauges.len()
            + c.counters.len()
            + c.meters.len()
            + c.histograms.len()
            + c.timers.len()
            + c.events.len()
    }
}

impl MetricsRegistry for DefaultMetricsRegistry {
    fn data_provider(&self) -> Arc<dyn RegistryDataProvider> {
        Arc::new(DefaultRegistryDataProvider {
            catalogs: self.catalogs.clone(),
        })
    }

    fn gauge(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: MetricFactory<'_, MetricsResult<Arc<dyn Gauge>>>,
    ) -> MetricsResult<()> {
        let name = MetricKind::Gauge.qualify(name);
        self.catalogs
            .gauges
            .get_or_add(&name, tags, || {
                factory().map(|gauge| entry(&name, unit, tags, gauge))
            })
            .map(|_| ())
    }

    fn counter(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: MetricFactory<'_, Arc<dyn Counter>>,
    ) -> Arc<dyn Counter> {
        let name = MetricKind::Counter.qualify(name);
        infallible(self.catalogs.counters.get_or_add(&name, tags, || {
            Ok(entry(&name, unit, tags, factory()))
        }))
    }

    fn meter(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: MetricFactory<'_, Arc<dyn Meter>>,
    ) -> Arc<dyn Meter> {
        let name = MetricKind::Meter.qualify(name);
        infallible(self.catalogs.meters.get_or_add(&name, tags, || {
            Ok(entry(&name, unit, tags, factory()))
        }))
    }

    fn histogram(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: MetricFactory<'_, Arc<dyn Histogram>>,
    ) -> Arc<dyn Histogram> {
        let name = MetricKind::Histogram.qualify(name);
        infallible(self.catalogs.histograms.get_or_add(&name, tags, || {
            Ok(entry(&name, unit, tags, factory()))
        }))
    }

    fn timer(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: MetricFactory<'_, Arc<dyn Timer>>,
    ) -> Arc<dyn Timer> {
        let name = MetricKind::Timer.qualify(name);
        infallible(self.catalogs.timers.get_or_add(&name, tags, || {
            Ok(entry(&name, unit, tags, factory()))
        }))
    }

    fn event(
        &self,
        name: &str,
        tags: &MetricTags,
        factory: MetricFactory<'_, Arc<dyn Event>>,
    ) -> Arc<dyn Event> {
        let name = MetricKind::Event.qualify(name);
        infallible(self.catalogs.events.get_or_add(&name, tags, || {
            Ok(entry(&name, &Unit::events(), tags, factory()))
        }))
    }

    fn clear_all_metrics(&self) {
        let c = &self.catalogs;
        c.gauges.clear();
        c.counters.clear();
        c.meters.clear();
        c.histograms.clear();
        c.timers.clear();
        c.events.clear();
    }

    fn reset_metrics_values(&self) {
        let c = &self.catalogs;
        c.gauges.reset();
        c.counters.reset();
        c.meters.reset();
        c.histograms.reset();
        c.timers.reset();
        c.events.reset();
    }

    fn clear_event_values(&self) {
        self.catalogs.events.reset();
    }

    fn event_values_remove_range_from_start_index(&self, identifier: &str, count: usize) {
        self.catalogs
            .events
            .with_metric(identifier, |event| event.remove_range_from_start_index(count));
    }

    fn deregister_gauge(&self, name: &str, tags: &MetricTags) {
        self.catalogs
            .gauges
            .remove(&MetricKind::Gauge.qualify(name), tags);
    }

    fn deregister_counter(&self, name: &str, tags: &MetricTags) {
        self.catalogs
            .counters
            .remove(&MetricKind::Counter.qualify(name), tags);
    }

    fn deregister_meter(&self, name: &str, tags: &MetricTags) {
        self.catalogs
            .meters
            .remove(&MetricKind::Meter.qualify(name), tags);
    }

    fn deregister_histogram(&self, name: &str, tags: &MetricTags) {
        self.catalogs
            .histograms
            .remove(&MetricKind::Histogram.qualify(name), tags);
    }

    fn deregister_timer(&self, name: &str, tags: &MetricTags) {
        self.catalogs
            .timers
            .remove(&MetricKind::Timer.qualify(name), tags);
    }

    fn deregister_event(&self, name: &str, tags: &MetricTags) {
        let removed = self
            .catalogs
            .events
            .remove(&MetricKind::Event.qualify(name), tags);
        if let (Some(identifier), Some(cleaner)) = (removed, &self.cleaner) {
            cleaner.remove_event(&identifier);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::event::EventMetric;
    use crate::metrics::simple::{AtomicCounter, FunctionGauge};
    use vigil_core::telemetry::{identifier, MetricsError};

    fn counter_factory() -> MetricFactory<'static, Arc<dyn Counter>> {
        Box::new(|| -> Arc<dyn Counter> { Arc::new(AtomicCounter::new()) })
    }

    fn event_factory() -> MetricFactory<'static, Arc<dyn Event>> {
        Box::new(|| -> Arc<dyn Event> { Arc::new(EventMetric::new()) })
    }

    fn gauge_factory(value: f64) -> MetricFactory<'static, MetricsResult<Arc<dyn Gauge>>> {
        Box::new(move || {
            let gauge: Arc<dyn Gauge> =
                Arc::new(FunctionGauge::new("gauge", Arc::new(move || value)));
            Ok(gauge)
        })
    }

    #[test]
    fn test_registry_creation() {
        let registry = DefaultMetricsRegistry::new();
        assert_eq!(registry.metric_count(), 0);
    }

    #[test]
    fn test_same_name_different_kinds_do_not_collide() {
        let registry = DefaultMetricsRegistry::new();
        let tags = MetricTags::NONE;

        registry.counter("requests", &Unit::requests(), &tags, counter_factory());
        registry
            .gauge("requests", &Unit::requests(), &tags, gauge_factory(1.0))
            .unwrap();

        let provider = registry.data_provider();
        assert_eq!(provider.counters()[0].name(), "requests.counter");
        assert_eq!(provider.gauges()[0].name(), "requests.gauge");
        assert_eq!(registry.metric_count(), 2);
    }

    #[test]
    fn test_failing_gauge_factory_registers_nothing() {
        let registry = DefaultMetricsRegistry::new();
        let result = registry.gauge(
            "cpu",
            &Unit::percent(),
            &MetricTags::NONE,
            Box::new(|| -> MetricsResult<Arc<dyn Gauge>> {
                Err(MetricsError::collaborator("cpu", "counter unavailable"))
            }),
        );

        assert!(result.is_err());
        assert!(registry.data_provider().gauges().is_empty());
    }

    #[test]
    fn test_counter_is_shared_per_identifier() {
        let registry = DefaultMetricsRegistry::new();
        let tags = MetricTags::pair("host", "a");
        let first = registry.counter("hits", &Unit::calls(), &tags, counter_factory());
        let second = registry.counter("hits", &Unit::calls(), &tags, counter_factory());
        first.increment();
        second.increment();

        let counters = registry.data_provider().counters();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].value().count, 2);
    }

    #[test]
    fn test_event_trim_by_identifier_is_clamped() {
        let registry = DefaultMetricsRegistry::new();
        let event = registry.event("test", &MetricTags::NONE, event_factory());
        for _ in 0..3 {
            event.record();
        }

        let id = identifier::calculate("test.event", &MetricTags::NONE);
        registry.event_values_remove_range_from_start_index(&id, 2);
        assert_eq!(event.len(), 1);

        registry.event_values_remove_range_from_start_index(&id, 10);
        assert_eq!(event.len(), 0);

        // Unknown identifiers are ignored.
        registry.event_values_remove_range_from_start_index("missing17", 1);
    }

    #[test]
    fn test_clear_all_metrics_disposes_events() {
        let registry = DefaultMetricsRegistry::new();
        let event = registry.event("audit", &MetricTags::NONE, event_factory());
        event.record();

        registry.clear_all_metrics();

        assert_eq!(registry.metric_count(), 0);
        assert!(event.is_empty());
    }

    #[test]
    fn test_deregister_removes_from_data_provider() {
        let registry = DefaultMetricsRegistry::new();
        registry.event("test", &MetricTags::NONE, event_factory());
        assert_eq!(registry.data_provider().events().len(), 1);

        registry.deregister_event("test", &MetricTags::NONE);
        assert!(registry.data_provider().events().is_empty());
    }
}
