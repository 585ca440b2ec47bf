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

//! The builder used by contexts unless a custom one is installed.

use crate::metrics::event::EventMetric;
use crate::metrics::simple::{
    AtomicCounter, FunctionGauge, SimpleHistogram, SimpleMeter, SimpleTimer,
};
use std::sync::Arc;
use vigil_core::telemetry::{
    Counter, Event, Gauge, GaugeFn, Histogram, Meter, MetricsBuilder, SamplingType, TimeUnit,
    Timer, Unit,
};

/// Builds the exact-statistics implementations from [`crate::metrics::simple`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMetricsBuilder;

impl MetricsBuilder for DefaultMetricsBuilder {
    fn build_gauge(&self, name: &str, _unit: &Unit, value_provider: GaugeFn) -> Arc<dyn Gauge> {
        Arc::new(FunctionGauge::new(name, value_provider))
    }

    fn build_counter(&self, _name: &str, _unit: &Unit) -> Arc<dyn Counter> {
        Arc::new(AtomicCounter::new())
    }

    fn build_meter(&self, _name: &str, _unit: &Unit, rate_unit: TimeUnit) -> Arc<dyn Meter> {
        Arc::new(SimpleMeter::new(rate_unit))
    }

    fn build_histogram(
        &self,
        _name: &str,
        _unit: &Unit,
        sampling: SamplingType,
    ) -> Arc<dyn Histogram> {
        Arc::new(SimpleHistogram::new(sampling))
    }

    fn build_timer(
        &self,
        _name: &str,
        _unit: &Unit,
        rate_unit: TimeUnit,
        duration_unit: TimeUnit,
        sampling: SamplingType,
    ) -> Arc<dyn Timer> {
        Arc::new(SimpleTimer::new(rate_unit, duration_unit, sampling))
    }

    fn build_event(&self, _name: &str) -> Arc<dyn Event> {
        Arc::new(EventMetric::new())
    }
}
