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

//! Exact-statistics implementations of every metric kind.
//!
//! These keep plain running totals. Reservoir sampling and exponentially
//! weighted rates are not implemented here; the requested [`SamplingType`] is
//! recorded so a richer builder can be swapped in per context.

use crate::error_handler::MetricsErrorHandler;
use crate::utils::sync::lock;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use vigil_core::telemetry::{
    Counter, CounterItem, CounterValue, Gauge, GaugeFn, Histogram, HistogramValue, Meter,
    MeterValue, MetricLifecycle, MetricValueProvider, MetricsError, SamplingType, TimeUnit, Timer,
    TimerValue,
};

// --- Counter ---

/// A lock-free total with optional per-item sub-counts.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    count: AtomicI64,
    items: Mutex<BTreeMap<String, i64>>,
}

impl AtomicCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for AtomicCounter {
    fn increment_by(&self, amount: i64) {
        self.count.fetch_add(amount, Ordering::Relaxed);
    }

    fn increment_item(&self, item: &str, amount: i64) {
        self.count.fetch_add(amount, Ordering::Relaxed);
        *lock(&self.items).entry(item.to_string()).or_insert(0) += amount;
    }
}

impl MetricValueProvider<CounterValue> for AtomicCounter {
    fn get_value(&self, reset: bool) -> CounterValue {
        let (count, items) = {
            let mut items = lock(&self.items);
            if reset {
                (self.count.swap(0, Ordering::Relaxed), std::mem::take(&mut *items))
            } else {
                (self.count.load(Ordering::Relaxed), items.clone())
            }
        };

        let items = items
            .into_iter()
            .map(|(item, item_count)| CounterItem {
                percent: if count == 0 {
                    0.0
                } else {
                    item_count as f64 / count as f64 * 100.0
                },
                item,
                count: item_count,
            })
            .collect();
        CounterValue { count, items }
    }
}

impl MetricLifecycle for AtomicCounter {
    fn reset(&self) {
        let mut items = lock(&self.items);
        self.count.store(0, Ordering::Relaxed);
        items.clear();
    }
}

// --- Gauges ---

/// A gauge that reads its value from a closure.
///
/// A panicking closure is reported to the [`MetricsErrorHandler`] and the
/// reading is `NaN`.
pub struct FunctionGauge {
    name: String,
    provider: GaugeFn,
}

impl FunctionGauge {
    /// Wraps `provider`. `name` is used when reporting failures.
    pub fn new(name: impl Into<String>, provider: GaugeFn) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }
}

impl Debug for FunctionGauge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionGauge")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl MetricValueProvider<f64> for FunctionGauge {
    fn get_value(&self, _reset: bool) -> f64 {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.provider)())) {
            Ok(value) => value,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "gauge provider panicked".to_string());
                MetricsErrorHandler::handle(
                    &MetricsError::collaborator(&self.name, message),
                    "Error reading gauge value",
                );
                f64::NAN
            }
        }
    }
}

impl MetricLifecycle for FunctionGauge {}
impl Gauge for FunctionGauge {}

/// A gauge whose value is a transform of another gauge's value.
pub struct DerivedGauge {
    source: Arc<dyn Gauge>,
    transform: Arc<dyn Fn(f64) -> f64 + Send + Sync>,
}

impl DerivedGauge {
    /// Derives a new gauge from `source`.
    pub fn new(
        source: Arc<dyn Gauge>,
        transform: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            source,
            transform: Arc::new(transform),
        }
    }
}

impl Debug for DerivedGauge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedGauge")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl MetricValueProvider<f64> for DerivedGauge {
    fn get_value(&self, reset: bool) -> f64 {
        (self.transform)(self.source.get_value(reset))
    }
}

impl MetricLifecycle for DerivedGauge {}
impl Gauge for DerivedGauge {}

// --- Meter ---

/// Total marks and the mean rate since creation or the last reset.
#[derive(Debug)]
pub struct SimpleMeter {
    count: AtomicI64,
    started: Mutex<Instant>,
    rate_unit: TimeUnit,
}

impl SimpleMeter {
    /// Creates a meter reporting its rate per `rate_unit`.
    pub fn new(rate_unit: TimeUnit) -> Self {
        Self {
            count: AtomicI64::new(0),
            started: Mutex::new(Instant::now()),
            rate_unit,
        }
    }
}

impl Meter for SimpleMeter {
    fn mark_by(&self, count: i64) {
        self.count.fetch_add(count, Ordering::Relaxed);
    }
}

impl MetricValueProvider<MeterValue> for SimpleMeter {
    fn get_value(&self, reset: bool) -> MeterValue {
        let mut started = lock(&self.started);
        let elapsed = self.rate_unit.convert(started.elapsed());
        let count = if reset {
            *started = Instant::now();
            self.count.swap(0, Ordering::Relaxed)
        } else {
            self.count.load(Ordering::Relaxed)
        };
        MeterValue {
            count,
            mean_rate: if elapsed > 0.0 {
                count as f64 / elapsed
            } else {
                0.0
            },
            rate_unit: self.rate_unit,
        }
    }
}

impl MetricLifecycle for SimpleMeter {
    fn reset(&self) {
        let mut started = lock(&self.started);
        self.count.store(0, Ordering::Relaxed);
        *started = Instant::now();
    }
}

// --- Histogram ---

#[derive(Debug, Default, Clone)]
struct HistogramState {
    count: i64,
    sum: i64,
    last_value: i64,
    last_user_value: Option<String>,
    min: i64,
    max: i64,
}

impl HistogramState {
    fn update(&mut self, value: i64, user_value: Option<&str>) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
        self.last_value = value;
        self.last_user_value = user_value.map(str::to_string);
    }

    fn to_value(&self) -> HistogramValue {
        HistogramValue {
            count: self.count,
            sum: self.sum,
            last_value: self.last_value,
            last_user_value: self.last_user_value.clone(),
            min: self.min,
            max: self.max,
            mean: if self.count == 0 {
                0.0
            } else {
                self.sum as f64 / self.count as f64
            },
        }
    }
}

/// Count, sum, extremes and mean over every recorded sample.
#[derive(Debug)]
pub struct SimpleHistogram {
    state: Mutex<HistogramState>,
    sampling: SamplingType,
}

impl SimpleHistogram {
    /// Creates an empty histogram.
    pub fn new(sampling: SamplingType) -> Self {
        Self {
            state: Mutex::new(HistogramState::default()),
            sampling,
        }
    }

    /// The sampling strategy this histogram was requested with.
    pub fn sampling(&self) -> SamplingType {
        self.sampling
    }
}

impl Histogram for SimpleHistogram {
    fn update(&self, value: i64, user_value: Option<&str>) {
        lock(&self.state).update(value, user_value);
    }
}

impl MetricValueProvider<HistogramValue> for SimpleHistogram {
    fn get_value(&self, reset: bool) -> HistogramValue {
        let mut state = lock(&self.state);
        let value = state.to_value();
        if reset {
            *state = HistogramState::default();
        }
        value
    }
}

impl MetricLifecycle for SimpleHistogram {
    fn reset(&self) {
        *lock(&self.state) = HistogramState::default();
    }
}

// --- Timer ---

/// A meter of timed operations plus a histogram of their durations.
///
/// Durations are stored in nanoseconds and converted to `duration_unit` when read.
#[derive(Debug)]
pub struct SimpleTimer {
    rate: SimpleMeter,
    durations: SimpleHistogram,
    active_sessions: AtomicI64,
    duration_unit: TimeUnit,
}

impl SimpleTimer {
    /// Creates a timer.
    pub fn new(rate_unit: TimeUnit, duration_unit: TimeUnit, sampling: SamplingType) -> Self {
        Self {
            rate: SimpleMeter::new(rate_unit),
            durations: SimpleHistogram::new(sampling),
            active_sessions: AtomicI64::new(0),
            duration_unit,
        }
    }

    fn in_unit(&self, nanos: i64) -> f64 {
        self.duration_unit
            .convert(Duration::from_nanos(nanos.max(0) as u64))
    }
}

impl Timer for SimpleTimer {
    fn record(&self, duration: Duration, user_value: Option<&str>) {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.durations.update(nanos, user_value);
        self.rate.mark();
    }

    fn begin_session(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    fn end_session(&self, elapsed: Duration, user_value: Option<&str>) {
        // Never below zero, even for an unmatched end.
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |active| {
                Some((active - 1).max(0))
            });
        self.record(elapsed, user_value);
    }
}

impl MetricValueProvider<TimerValue> for SimpleTimer {
    fn get_value(&self, reset: bool) -> TimerValue {
        let rate = self.rate.get_value(reset);
        let raw = self.durations.get_value(reset);
        let histogram = HistogramValue {
            count: raw.count,
            sum: self.in_unit(raw.sum).round() as i64,
            last_value: self.in_unit(raw.last_value).round() as i64,
            last_user_value: raw.last_user_value,
            min: self.in_unit(raw.min).round() as i64,
            max: self.in_unit(raw.max).round() as i64,
            mean: self.in_unit(raw.mean.round() as i64),
        };
        TimerValue {
            rate,
            total_time: self.in_unit(raw.sum),
            histogram,
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            duration_unit: self.duration_unit,
        }
    }
}

impl MetricLifecycle for SimpleTimer {
    fn reset(&self) {
        self.rate.reset();
        self.durations.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_items_and_percentages() {
        let counter = AtomicCounter::new();
        counter.increment_item("hit", 3);
        counter.increment_item("miss", 1);
        counter.decrement();

        let value = counter.value();
        assert_eq!(value.count, 3);
        assert_eq!(value.items.len(), 2);
        assert_eq!(value.items[0].item, "hit");
        assert_eq!(value.items[0].count, 3);
        assert!((value.items[0].percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_counter_get_value_with_reset() {
        let counter = AtomicCounter::new();
        counter.increment_by(7);

        assert_eq!(counter.get_value(true).count, 7);
        assert_eq!(counter.value().count, 0);
    }

    #[test]
    fn test_function_gauge_panicking_provider_reads_nan() {
        let gauge = FunctionGauge::new(
            "broken.gauge",
            Arc::new(|| -> f64 { panic!("probe offline") }),
        );
        assert!(gauge.value().is_nan());

        let ok = FunctionGauge::new("ok.gauge", Arc::new(|| 42.0));
        assert_eq!(ok.value(), 42.0);
    }

    #[test]
    fn test_derived_gauge_transforms_source() {
        let source: Arc<dyn Gauge> = Arc::new(FunctionGauge::new("bytes", Arc::new(|| 2048.0)));
        let derived = DerivedGauge::new(source, |bytes| bytes / 1024.0);
        assert_eq!(derived.value(), 2.0);
    }

    #[test]
    fn test_histogram_tracks_extremes_and_user_value() {
        let histogram = SimpleHistogram::new(SamplingType::Uniform);
        histogram.update(10, None);
        histogram.update(2, Some("fast"));
        histogram.update(30, Some("slow"));

        let value = histogram.value();
        assert_eq!(value.count, 3);
        assert_eq!(value.min, 2);
        assert_eq!(value.max, 30);
        assert_eq!(value.sum, 42);
        assert_eq!(value.last_value, 30);
        assert_eq!(value.last_user_value.as_deref(), Some("slow"));
        assert!((value.mean - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_timer_sessions_and_units() {
        let timer = SimpleTimer::new(
            TimeUnit::Seconds,
            TimeUnit::Milliseconds,
            SamplingType::default(),
        );
        timer.begin_session();
        assert_eq!(timer.value().active_sessions, 1);

        timer.end_session(Duration::from_millis(250), Some("job-1"));
        timer.record(Duration::from_millis(750), None);

        let value = timer.value();
        assert_eq!(value.active_sessions, 0);
        assert_eq!(value.rate.count, 2);
        assert_eq!(value.histogram.count, 2);
        assert_eq!(value.histogram.min, 250);
        assert_eq!(value.histogram.max, 750);
        assert!((value.total_time - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_meter_reset_zeroes_count() {
        let meter = SimpleMeter::new(TimeUnit::Seconds);
        meter.mark_by(5);
        assert_eq!(meter.value().count, 5);

        meter.reset();
        assert_eq!(meter.value().count, 0);
    }
}
