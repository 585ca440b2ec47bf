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

//! A registry that accepts every call and keeps nothing.
//!
//! Installed into a context when it is completely disabled, so instrumented code
//! keeps working without any disablement-aware branching.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::telemetry::{
    Counter, CounterValue, Event, EventValue, FieldValue, Gauge, Histogram, HistogramValue, Meter,
    MeterValue, MetricFactory, MetricLifecycle, MetricTags, MetricValueProvider, MetricValueSource,
    MetricsRegistry, MetricsResult, RegistryDataProvider, TimeUnit, Timer, TimerValue, Unit,
};

/// A metric that discards every write and reads as empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetric;

impl MetricLifecycle for NullMetric {}

impl MetricValueProvider<CounterValue> for NullMetric {
    fn get_value(&self, _reset: bool) -> CounterValue {
        CounterValue::default()
    }
}

impl Counter for NullMetric {
    fn increment_by(&self, _amount: i64) {}
    fn increment_item(&self, _item: &str, _amount: i64) {}
}

impl MetricValueProvider<MeterValue> for NullMetric {
    fn get_value(&self, _reset: bool) -> MeterValue {
        MeterValue::empty(TimeUnit::Seconds)
    }
}

impl Meter for NullMetric {
    fn mark_by(&self, _count: i64) {}
}

impl MetricValueProvider<HistogramValue> for NullMetric {
    fn get_value(&self, _reset: bool) -> HistogramValue {
        HistogramValue::default()
    }
}

impl Histogram for NullMetric {
    fn update(&self, _value: i64, _user_value: Option<&str>) {}
}

impl MetricValueProvider<TimerValue> for NullMetric {
    fn get_value(&self, _reset: bool) -> TimerValue {
        TimerValue {
            rate: MeterValue::empty(TimeUnit::Seconds),
            histogram: HistogramValue::default(),
            active_sessions: 0,
            total_time: 0.0,
            duration_unit: TimeUnit::Milliseconds,
        }
    }
}

impl Timer for NullMetric {
    fn record(&self, _duration: Duration, _user_value: Option<&str>) {}
    fn begin_session(&self) {}
    fn end_session(&self, _elapsed: Duration, _user_value: Option<&str>) {}
}

impl MetricValueProvider<EventValue> for NullMetric {
    fn get_value(&self, _reset: bool) -> EventValue {
        EventValue::default()
    }
}

impl Event for NullMetric {
    fn record_details(&self, _fields: Vec<(String, FieldValue)>, _timestamp: DateTime<Utc>) {}
    fn remove_range_from_start_index(&self, _count: usize) {}
    fn len(&self) -> usize {
        0
    }
}

impl MetricValueProvider<f64> for NullMetric {
    fn get_value(&self, _reset: bool) -> f64 {
        0.0
    }
}

impl Gauge for NullMetric {}

#[derive(Debug)]
struct EmptyDataProvider;

impl RegistryDataProvider for EmptyDataProvider {
    fn gauges(&self) -> Vec<MetricValueSource<f64>> {
        Vec::new()
    }
    fn counters(&self) -> Vec<MetricValueSource<CounterValue>> {
        Vec::new()
    }
    fn meters(&self) -> Vec<MetricValueSource<MeterValue>> {
        Vec::new()
    }
    fn histograms(&self) -> Vec<MetricValueSource<HistogramValue>> {
        Vec::new()
    }
    fn timers(&self) -> Vec<MetricValueSource<TimerValue>> {
        Vec::new()
    }
    fn events(&self) -> Vec<MetricValueSource<EventValue>> {
        Vec::new()
    }
}

/// The no-op registry. Factories handed to it are never invoked.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetricsRegistry;

impl NullMetricsRegistry {
    /// Creates the no-op registry.
    pub fn new() -> Self {
        Self
    }
}

impl MetricsRegistry for NullMetricsRegistry {
    fn data_provider(&self) -> Arc<dyn RegistryDataProvider> {
        Arc::new(EmptyDataProvider)
    }

    fn gauge(
        &self,
        _name: &str,
        _unit: &Unit,
        _tags: &MetricTags,
        _factory: MetricFactory<'_, MetricsResult<Arc<dyn Gauge>>>,
    ) -> MetricsResult<()> {
        Ok(())
    }

    fn counter(
        &self,
        _name: &str,
        _unit: &Unit,
        _tags: &MetricTags,
        _factory: MetricFactory<'_, Arc<dyn Counter>>,
    ) -> Arc<dyn Counter> {
        Arc::new(NullMetric)
    }

    fn meter(
        &self,
        _name: &str,
        _unit: &Unit,
        _tags: &MetricTags,
        _factory: MetricFactory<'_, Arc<dyn Meter>>,
    ) -> Arc<dyn Meter> {
        Arc::new(NullMetric)
    }

    fn histogram(
        &self,
        _name: &str,
        _unit: &Unit,
        _tags: &MetricTags,
        _factory: MetricFactory<'_, Arc<dyn Histogram>>,
    ) -> Arc<dyn Histogram> {
        Arc::new(NullMetric)
    }

    fn timer(
        &self,
        _name: &str,
        _unit: &Unit,
        _tags: &MetricTags,
        _factory: MetricFactory<'_, Arc<dyn Timer>>,
    ) -> Arc<dyn Timer> {
        Arc::new(NullMetric)
    }

    fn event(
        &self,
        _name: &str,
        _tags: &MetricTags,
        _factory: MetricFactory<'_, Arc<dyn Event>>,
    ) -> Arc<dyn Event> {
        Arc::new(NullMetric)
    }

    fn clear_all_metrics(&self) {}
    fn reset_metrics_values(&self) {}
    fn clear_event_values(&self) {}
    fn event_values_remove_range_from_start_index(&self, _identifier: &str, _count: usize) {}
    fn deregister_gauge(&self, _name: &str, _tags: &MetricTags) {}
    fn deregister_counter(&self, _name: &str, _tags: &MetricTags) {}
    fn deregister_meter(&self, _name: &str, _tags: &MetricTags) {}
    fn deregister_histogram(&self, _name: &str, _tags: &MetricTags) {}
    fn deregister_timer(&self, _name: &str, _tags: &MetricTags) {}
    fn deregister_event(&self, _name: &str, _tags: &MetricTags) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_registry_never_runs_factories() {
        let registry = NullMetricsRegistry::new();
        let counter = registry.counter(
            "requests",
            &Unit::requests(),
            &MetricTags::NONE,
            Box::new(|| -> Arc<dyn Counter> { panic!("factory must not run") }),
        );
        counter.increment_by(10);

        assert_eq!(counter.value().count, 0);
        assert!(registry.data_provider().counters().is_empty());
    }
}
