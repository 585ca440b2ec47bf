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

//! Summarizes snapshots through the `log` facade.

use vigil_core::telemetry::{CancellationToken, MetricsData, MetricsReport, MetricsResult};

/// Logs one `info` line per context with the number of metrics of each kind.
#[derive(Debug, Clone)]
pub struct LogReport {
    name: String,
}

impl LogReport {
    /// Creates a log report named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The line logged for `data`, excluding its children.
    pub fn summary(data: &MetricsData) -> String {
        let event_records: usize = data.events.iter().map(|e| e.value.len()).sum();
        format!(
            "{}: {} gauges, {} counters, {} meters, {} histograms, {} timers, {} events ({} records)",
            data.context,
            data.gauges.len(),
            data.counters.len(),
            data.meters.len(),
            data.histograms.len(),
            data.timers.len(),
            data.events.len(),
            event_records
        )
    }

    fn log_tree(&self, data: &MetricsData, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }
        log::info!("[{}] {}", self.name, Self::summary(data));
        for child in &data.child_metrics {
            self.log_tree(child, token);
        }
    }
}

impl MetricsReport for LogReport {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_report(&self, data: &MetricsData, token: &CancellationToken) -> MetricsResult<()> {
        self.log_tree(data, token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_event_records() {
        let data = MetricsData::empty("root");
        assert_eq!(
            LogReport::summary(&data),
            "root: 0 gauges, 0 counters, 0 meters, 0 histograms, 0 timers, 0 events (0 records)"
        );
    }
}
