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

//! Read-only value sources and the point-in-time snapshots built from them.

use crate::telemetry::identifier;
use crate::telemetry::metrics::{MetricKind, MetricValueProvider};
use crate::telemetry::tags::MetricTags;
use crate::telemetry::units::Unit;
use crate::telemetry::values::{CounterValue, EventValue, HistogramValue, MeterValue, TimerValue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// An immutable view of one registered metric: its name, unit, tags and a
/// handle that reads the live value.
pub struct MetricValueSource<V> {
    name: String,
    unit: Unit,
    tags: MetricTags,
    provider: Arc<dyn MetricValueProvider<V>>,
}

impl<V> MetricValueSource<V> {
    /// Wraps `provider` with its descriptive metadata.
    pub fn new(
        name: impl Into<String>,
        unit: Unit,
        tags: MetricTags,
        provider: Arc<dyn MetricValueProvider<V>>,
    ) -> Self {
        Self {
            name: name.into(),
            unit,
            tags,
            provider,
        }
    }

    /// The kind-qualified metric name (e.g. `requests.counter`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unit of the value.
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// The tags the metric was registered with.
    pub fn tags(&self) -> &MetricTags {
        &self.tags
    }

    /// The catalog identifier of the metric.
    pub fn identifier(&self) -> String {
        identifier::calculate(&self.name, &self.tags)
    }

    /// Reads a copy of the current value.
    pub fn value(&self) -> V {
        self.provider.value()
    }

    /// Captures name, unit, tags and the current value.
    pub fn snapshot(&self) -> MetricSnapshot<V> {
        MetricSnapshot {
            name: self.name.clone(),
            unit: self.unit.clone(),
            tags: self.tags.clone(),
            value: self.value(),
        }
    }
}

impl<V> Clone for MetricValueSource<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            unit: self.unit.clone(),
            tags: self.tags.clone(),
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<V> Debug for MetricValueSource<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricValueSource")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// A materialized value together with the metadata of its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot<V> {
    /// The kind-qualified metric name.
    pub name: String,
    /// The unit of the value.
    pub unit: Unit,
    /// The metric's tags.
    pub tags: MetricTags,
    /// The value at capture time.
    pub value: V,
}

impl<V> MetricSnapshot<V> {
    /// The catalog identifier of the captured metric.
    pub fn identifier(&self) -> String {
        identifier::calculate(&self.name, &self.tags)
    }
}

/// Selects which metrics a reporter receives.
#[derive(Debug, Clone, Default)]
pub struct MetricsFilter {
    kinds: Option<Vec<MetricKind>>,
    name_contains: Option<String>,
    tag: Option<(String, String)>,
}

impl MetricsFilter {
    /// A filter that lets everything through.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the filter to the given kinds.
    pub fn only(mut self, kinds: &[MetricKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    /// Keeps metrics whose name contains `fragment`.
    pub fn where_name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    /// Keeps metrics carrying the given tag.
    pub fn with_tag(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.tag = Some((key.as_ref().to_lowercase(), value.as_ref().to_lowercase()));
        self
    }

    /// Returns `true` if a metric of `kind` named `name` with `tags` passes.
    pub fn matches(&self, kind: MetricKind, name: &str, tags: &MetricTags) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&kind) {
                return false;
            }
        }
        if let Some(fragment) = &self.name_contains {
            if !name.contains(fragment.as_str()) {
                return false;
            }
        }
        if let Some((key, value)) = &self.tag {
            if tags.get(key) != Some(value.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Point-in-time values of one context and, recursively, of its children.
///
/// Each list is sorted by metric name.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsData {
    /// The context name.
    pub context: String,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Gauge readings.
    pub gauges: Vec<MetricSnapshot<f64>>,
    /// Counter values.
    pub counters: Vec<MetricSnapshot<CounterValue>>,
    /// Meter values.
    pub meters: Vec<MetricSnapshot<MeterValue>>,
    /// Histogram values.
    pub histograms: Vec<MetricSnapshot<HistogramValue>>,
    /// Timer values.
    pub timers: Vec<MetricSnapshot<TimerValue>>,
    /// Copies of the event records.
    pub events: Vec<MetricSnapshot<EventValue>>,
    /// Snapshots of the child contexts.
    pub child_metrics: Vec<MetricsData>,
}

impl MetricsData {
    /// An empty snapshot for `context`.
    pub fn empty(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            timestamp: Utc::now(),
            gauges: Vec::new(),
            counters: Vec::new(),
            meters: Vec::new(),
            histograms: Vec::new(),
            timers: Vec::new(),
            events: Vec::new(),
            child_metrics: Vec::new(),
        }
    }

    /// Captures every source exposed by `provider`.
    pub fn capture(
        context: impl Into<String>,
        provider: &dyn crate::telemetry::registry::RegistryDataProvider,
        child_metrics: Vec<MetricsData>,
    ) -> Self {
        fn snap<V>(sources: Vec<MetricValueSource<V>>) -> Vec<MetricSnapshot<V>> {
            sources.iter().map(MetricValueSource::snapshot).collect()
        }

        Self {
            context: context.into(),
            timestamp: Utc::now(),
            gauges: snap(provider.gauges()),
            counters: snap(provider.counters()),
            meters: snap(provider.meters()),
            histograms: snap(provider.histograms()),
            timers: snap(provider.timers()),
            events: snap(provider.events()),
            child_metrics,
        }
    }

    /// Every event snapshot in this context and its descendants, depth-first.
    pub fn flatten_events(&self) -> Vec<&MetricSnapshot<EventValue>> {
        let mut all: Vec<&MetricSnapshot<EventValue>> = self.events.iter().collect();
        for child in &self.child_metrics {
            all.extend(child.flatten_events());
        }
        all
    }

    /// Total number of snapshots in this context and its descendants.
    pub fn metric_count(&self) -> usize {
        self.gauges.len()
            + self.counters.len()
            + self.meters.len()
            + self.histograms.len()
            + self.timers.len()
            + self.events.len()
            + self
                .child_metrics
                .iter()
                .map(MetricsData::metric_count)
                .sum::<usize>()
    }

    /// Returns a copy holding only the snapshots accepted by `filter`.
    pub fn filter(&self, filter: &MetricsFilter) -> MetricsData {
        fn keep<V: Clone>(
            kind: MetricKind,
            items: &[MetricSnapshot<V>],
            filter: &MetricsFilter,
        ) -> Vec<MetricSnapshot<V>> {
            items
                .iter()
                .filter(|s| filter.matches(kind, &s.name, &s.tags))
                .cloned()
                .collect()
        }

        MetricsData {
            context: self.context.clone(),
            timestamp: self.timestamp,
            gauges: keep(MetricKind::Gauge, &self.gauges, filter),
            counters: keep(MetricKind::Counter, &self.counters, filter),
            meters: keep(MetricKind::Meter, &self.meters, filter),
            histograms: keep(MetricKind::Histogram, &self.histograms, filter),
            timers: keep(MetricKind::Timer, &self.timers, filter),
            events: keep(MetricKind::Event, &self.events, filter),
            child_metrics: self
                .child_metrics
                .iter()
                .map(|child| child.filter(filter))
                .collect(),
        }
    }
}

/// Anything that can produce a [`MetricsData`] snapshot on demand.
pub trait MetricsDataProvider: Send + Sync {
    /// Captures the current values.
    fn current_metrics_data(&self) -> MetricsData;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::values::{EventDetails, EventValue};

    fn event_snapshot(name: &str, records: usize) -> MetricSnapshot<EventValue> {
        let events = (0..records)
            .map(|_| EventDetails::new(Vec::new(), Utc::now()))
            .collect();
        MetricSnapshot {
            name: name.to_string(),
            unit: Unit::events(),
            tags: MetricTags::NONE,
            value: EventValue::new(events),
        }
    }

    #[test]
    fn test_flatten_events_walks_children() {
        let mut root = MetricsData::empty("root");
        root.events.push(event_snapshot("a.event", 1));
        let mut child = MetricsData::empty("child");
        child.events.push(event_snapshot("b.event", 2));
        root.child_metrics.push(child);

        let names: Vec<_> = root.flatten_events().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["a.event", "b.event"]);
        assert_eq!(root.metric_count(), 2);
    }

    #[test]
    fn test_filter_by_kind_drops_other_kinds() {
        let mut data = MetricsData::empty("root");
        data.events.push(event_snapshot("a.event", 1));
        data.gauges.push(MetricSnapshot {
            name: "g.gauge".into(),
            unit: Unit::none(),
            tags: MetricTags::NONE,
            value: 1.0,
        });

        let filtered = data.filter(&MetricsFilter::all().only(&[MetricKind::Gauge]));
        assert!(filtered.events.is_empty());
        assert_eq!(filtered.gauges.len(), 1);
    }

    #[test]
    fn test_filter_by_tag() {
        let filter = MetricsFilter::all().with_tag("Env", "Prod");
        assert!(filter.matches(
            MetricKind::Counter,
            "x",
            &MetricTags::pair("env", "prod")
        ));
        assert!(!filter.matches(MetricKind::Counter, "x", &MetricTags::NONE));
    }

    #[test]
    fn test_snapshot_identifier_matches_catalog_identifier() {
        let snapshot = event_snapshot("test.event", 0);
        assert_eq!(snapshot.identifier(), "test.event17");
    }
}
