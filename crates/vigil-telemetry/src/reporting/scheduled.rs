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

//! Runs a report on a scheduler and posts its watermarks to the cleaner.

use crate::cleaner::{CleanerHandle, EventMetricsCleaner, ReportId};
use crate::error_handler::MetricsErrorHandler;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use vigil_core::telemetry::{
    CancellationToken, MetricsDataProvider, MetricsFilter, MetricsReport, MetricsResult,
    Scheduler,
};

/// A [`MetricsReport`] bound to a [`Scheduler`], an interval and a filter.
///
/// Each run captures a snapshot from the source, applies the filter, hands it
/// to the report and, if the report succeeded, tells the cleaner how many
/// records of each event metric it delivered.
#[derive(Debug)]
pub struct ScheduledReporter {
    report: Arc<dyn MetricsReport>,
    interval: Duration,
    scheduler: Box<dyn Scheduler>,
    filter: MetricsFilter,
    report_id: Option<ReportId>,
}

impl ScheduledReporter {
    /// Binds `report` to `scheduler`, running every `interval` once started.
    pub fn new(
        report: Arc<dyn MetricsReport>,
        interval: Duration,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        Self {
            report,
            interval,
            scheduler,
            filter: MetricsFilter::all(),
            report_id: None,
        }
    }

    /// Restricts what the report receives.
    pub fn with_filter(mut self, filter: MetricsFilter) -> Self {
        self.filter = filter;
        self
    }

    /// The reporting interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The cleaner id assigned by [`ScheduledReporter::start`].
    pub fn report_id(&self) -> Option<ReportId> {
        self.report_id
    }

    /// Starts the scheduler, then registers with `cleaner`.
    ///
    /// A scheduler that fails to start leaves the cleaner untouched. Runs
    /// fired before registration completes are skipped.
    pub fn start(
        &mut self,
        source: Arc<dyn MetricsDataProvider>,
        cleaner: &EventMetricsCleaner,
    ) -> MetricsResult<ReportId> {
        let slot = Arc::new(OnceLock::new());
        let run = ReportRun {
            report: self.report.clone(),
            source,
            filter: self.filter.clone(),
            cleaner: cleaner.handle(),
            report_id: slot.clone(),
        };
        self.scheduler.start(
            self.interval,
            Arc::new(move |token: &CancellationToken| run.execute(token)),
        )?;

        let report_id = cleaner.register_report(self.interval);
        let _ = slot.set(report_id);

        log::info!(
            "[ScheduledReporter] '{}' scheduled every {:?} as {report_id:?}.",
            self.report.name(),
            self.interval
        );
        self.report_id = Some(report_id);
        Ok(report_id)
    }

    /// Stops the scheduler.
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }
}

struct ReportRun {
    report: Arc<dyn MetricsReport>,
    source: Arc<dyn MetricsDataProvider>,
    filter: MetricsFilter,
    cleaner: CleanerHandle,
    report_id: Arc<OnceLock<ReportId>>,
}

impl ReportRun {
    fn execute(&self, token: &CancellationToken) {
        let Some(report_id) = self.report_id.get().copied() else {
            return;
        };
        if token.is_cancelled() {
            return;
        }
        let data = self.source.current_metrics_data().filter(&self.filter);

        match self.report.run_report(&data, token) {
            Ok(()) => {
                if let Some(cleaner) = self.cleaner.upgrade() {
                    cleaner.update_total_reported_events(report_id, data.flatten_events());
                }
            }
            Err(error) => MetricsErrorHandler::handle(
                &error,
                &format!("Error generating report '{}'", self.report.name()),
            ),
        }
    }
}
