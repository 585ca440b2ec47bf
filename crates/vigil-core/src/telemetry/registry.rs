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

//! The registry contract: one namespace's worth of metrics, one catalog per kind.

use crate::telemetry::error::MetricsResult;
use crate::telemetry::metrics::{Counter, Event, Gauge, Histogram, Meter, Timer};
use crate::telemetry::source::MetricValueSource;
use crate::telemetry::tags::MetricTags;
use crate::telemetry::units::Unit;
use crate::telemetry::values::{CounterValue, EventValue, HistogramValue, MeterValue, TimerValue};
use std::fmt::Debug;
use std::sync::Arc;

/// A deferred constructor handed to the registry; invoked at most once per identifier.
pub type MetricFactory<'a, M> = Box<dyn FnOnce() -> M + 'a>;

/// Read-only enumeration of a registry's value sources, each list sorted by name.
pub trait RegistryDataProvider: Send + Sync + Debug {
    /// Gauge sources.
    fn gauges(&self) -> Vec<MetricValueSource<f64>>;
    /// Counter sources.
    fn counters(&self) -> Vec<MetricValueSource<CounterValue>>;
    /// Meter sources.
    fn meters(&self) -> Vec<MetricValueSource<MeterValue>>;
    /// Histogram sources.
    fn histograms(&self) -> Vec<MetricValueSource<HistogramValue>>;
    /// Timer sources.
    fn timers(&self) -> Vec<MetricValueSource<TimerValue>>;
    /// Event sources.
    fn events(&self) -> Vec<MetricValueSource<EventValue>>;
}

/// Trait defining the interface for a metrics registry.
///
/// Every typed accessor appends the kind suffix to `name` before computing the
/// identifier, then gets or creates the metric. Removal uses the same
/// computation so a registered metric is always reachable for removal.
pub trait MetricsRegistry: Send + Sync + Debug + 'static {
    /// The lazily composed enumeration of every catalog.
    fn data_provider(&self) -> Arc<dyn RegistryDataProvider>;

    /// Registers a gauge. A failing factory leaves the registry unchanged.
    fn gauge(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: MetricFactory<'_, MetricsResult<Arc<dyn Gauge>>>,
    ) -> MetricsResult<()>;

    /// Gets or creates a counter.
    fn counter(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: MetricFactory<'_, Arc<dyn Counter>>,
    ) -> Arc<dyn Counter>;

    /// Gets or creates a meter.
    fn meter(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: MetricFactory<'_, Arc<dyn Meter>>,
    ) -> Arc<dyn Meter>;

    /// Gets or creates a histogram.
    fn histogram(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: MetricFactory<'_, Arc<dyn Histogram>>,
    ) -> Arc<dyn Histogram>;

    /// Gets or creates a timer.
    fn timer(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: MetricFactory<'_, Arc<dyn Timer>>,
    ) -> Arc<dyn Timer>;

    /// Gets or creates an event metric.
    fn event(
        &self,
        name: &str,
        tags: &MetricTags,
        factory: MetricFactory<'_, Arc<dyn Event>>,
    ) -> Arc<dyn Event>;

    /// Removes and disposes every metric of every kind.
    fn clear_all_metrics(&self);

    /// Resets every metric to its empty value without removing it.
    fn reset_metrics_values(&self);

    /// Resets every event metric to an empty record list.
    fn clear_event_values(&self);

    /// Drops up to `count` of the oldest records of the event metric with `identifier`.
    fn event_values_remove_range_from_start_index(&self, identifier: &str, count: usize);

    /// Removes a gauge.
    fn deregister_gauge(&self, name: &str, tags: &MetricTags);
    /// Removes a counter.
    fn deregister_counter(&self, name: &str, tags: &MetricTags);
    /// Removes a meter.
    fn deregister_meter(&self, name: &str, tags: &MetricTags);
    /// Removes a histogram.
    fn deregister_histogram(&self, name: &str, tags: &MetricTags);
    /// Removes a timer.
    fn deregister_timer(&self, name: &str, tags: &MetricTags);
    /// Removes an event metric and forgets every reporter's watermark for it.
    fn deregister_event(&self, name: &str, tags: &MetricTags);
}
