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

//! Service bundling the cleaner, the root context and the reporters.

use crate::cleaner::{EventMetricsCleaner, ReportId};
use crate::context::MetricsContext;
use crate::monitoring::register_system_gauges;
use crate::reporting::ScheduledReporter;
use std::sync::Arc;
use std::time::Duration;
use vigil_core::settings::MetricsSettings;
use vigil_core::telemetry::{MetricsFilter, MetricsReport, MetricsResult, Scheduler};

/// Owned entry point of the metrics stack.
///
/// Created once at process start and handed to whatever needs to instrument
/// or report. [`MetricsService::shutdown`] (also run on drop) stops every
/// reporter, shuts the cleaner down and disposes the root context.
#[derive(Debug)]
pub struct MetricsService {
    settings: MetricsSettings,
    cleaner: EventMetricsCleaner,
    root: Arc<MetricsContext>,
    reporters: Vec<ScheduledReporter>,
    shut_down: bool,
}

impl MetricsService {
    /// Creates the service with a background cleaner.
    pub fn new(settings: MetricsSettings) -> MetricsResult<Self> {
        let cleaner = EventMetricsCleaner::new(settings.cleaner_interval_buffer())?;
        Ok(Self::with_cleaner(settings, cleaner))
    }

    /// Creates the service from `VIGIL_*` environment variables.
    pub fn from_env() -> MetricsResult<Self> {
        Self::new(MetricsSettings::from_env()?)
    }

    /// Creates the service around an existing cleaner.
    pub fn with_cleaner(settings: MetricsSettings, cleaner: EventMetricsCleaner) -> Self {
        let root = MetricsContext::from_settings(&settings, &cleaner);
        if settings.register_system_gauges && !root.is_disabled() {
            register_system_gauges(&root);
        }
        log::info!(
            "[MetricsService] Started with root context '{}'.",
            root.name()
        );
        Self {
            settings,
            cleaner,
            root,
            reporters: Vec::new(),
            shut_down: false,
        }
    }

    /// The root context.
    pub fn context(&self) -> &Arc<MetricsContext> {
        &self.root
    }

    /// The retention cleaner.
    pub fn cleaner(&self) -> &EventMetricsCleaner {
        &self.cleaner
    }

    /// The settings the service was created with.
    pub fn settings(&self) -> &MetricsSettings {
        &self.settings
    }

    /// Number of started reporters.
    pub fn reporter_count(&self) -> usize {
        self.reporters.len()
    }

    /// Starts `report` on `scheduler`, receiving every metric of the tree.
    pub fn add_reporter(
        &mut self,
        report: Arc<dyn MetricsReport>,
        interval: Duration,
        scheduler: Box<dyn Scheduler>,
    ) -> MetricsResult<ReportId> {
        self.add_filtered_reporter(report, interval, scheduler, MetricsFilter::all())
    }

    /// Starts `report` on `scheduler`, receiving only what `filter` accepts.
    pub fn add_filtered_reporter(
        &mut self,
        report: Arc<dyn MetricsReport>,
        interval: Duration,
        scheduler: Box<dyn Scheduler>,
        filter: MetricsFilter,
    ) -> MetricsResult<ReportId> {
        let mut reporter = ScheduledReporter::new(report, interval, scheduler).with_filter(filter);
        let id = reporter.start(self.root.clone(), &self.cleaner)?;
        self.reporters.push(reporter);
        Ok(id)
    }

    /// Stops reporters, shuts the cleaner down and disposes the root context.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        for reporter in &mut self.reporters {
            reporter.stop();
        }
        self.cleaner.shutdown();
        self.root.dispose();
        log::info!("[MetricsService] Shut down.");
    }
}

impl Drop for MetricsService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextEvent;
    use crate::reporting::LogReport;
    use crate::scheduling::{ManualScheduler, ManualTimer};

    fn service(settings: MetricsSettings) -> MetricsService {
        let cleaner = EventMetricsCleaner::with_timer(
            settings.cleaner_interval_buffer(),
            Arc::new(ManualTimer::new()),
        );
        MetricsService::with_cleaner(settings, cleaner)
    }

    #[test]
    fn test_service_uses_settings_name() {
        let settings = MetricsSettings {
            global_context_name: "checkout".to_string(),
            ..MetricsSettings::default()
        };
        let service = service(settings);
        assert_eq!(service.context().name(), "checkout");
        assert_eq!(service.cleaner().registry_count(), 1);
    }

    #[test]
    fn test_disabled_settings_disable_root() {
        let settings = MetricsSettings {
            completely_disabled: true,
            ..MetricsSettings::default()
        };
        let service = service(settings);
        assert!(service.context().is_disabled());
        assert_eq!(service.cleaner().registry_count(), 0);
    }

    #[test]
    fn test_add_reporter_registers_with_cleaner() {
        let mut service = service(MetricsSettings::default());
        let scheduler = ManualScheduler::new();

        service
            .add_reporter(
                Arc::new(LogReport::new("log")),
                Duration::from_secs(30),
                Box::new(scheduler.clone()),
            )
            .unwrap();

        assert_eq!(service.cleaner().total_reports(), 1);
        assert_eq!(service.cleaner().current_interval(), Duration::from_secs(35));
        assert!(scheduler.run_now());
    }

    #[test]
    fn test_shutdown_stops_everything_once() {
        let mut service = service(MetricsSettings::default());
        let events = service.context().subscribe();
        let scheduler = ManualScheduler::new();
        service
            .add_reporter(
                Arc::new(LogReport::new("log")),
                Duration::from_secs(1),
                Box::new(scheduler.clone()),
            )
            .unwrap();

        service.shutdown();
        service.shutdown();

        assert!(!scheduler.is_running());
        assert!(service.cleaner().is_shut_down());
        assert_eq!(events.try_recv(), Ok(ContextEvent::ShuttingDown));
        assert!(events.try_recv().is_err());
    }
}
