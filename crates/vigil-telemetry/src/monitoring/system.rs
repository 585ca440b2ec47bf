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

//! sysinfo-backed gauges for memory, CPU and the current process.

use crate::context::MetricsContext;
use crate::error_handler::MetricsErrorHandler;
use crate::utils::sync::lock;
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, ProcessesToUpdate, System};
use vigil_core::telemetry::{GaugeFn, MetricTags, MetricsError, MetricsResult, Unit};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Tag attached to every system gauge.
pub fn system_tags() -> MetricTags {
    MetricTags::pair("metrictype", "system")
}

/// Registers the host and process gauges on `context`.
///
/// Each gauge refreshes only the data it reads. A probe that cannot be set up
/// (for example when the current process id is unavailable) is reported to
/// the error handler and skipped; the others are still registered.
pub fn register_system_gauges(context: &MetricsContext) {
    let system = Arc::new(Mutex::new(System::new()));
    let tags = system_tags();

    register(context, "System Total Memory", Unit::mega_bytes(), &tags, {
        let system = system.clone();
        move || {
            let mut system = lock(&system);
            system.refresh_memory();
            Ok(system.total_memory() as f64 / BYTES_PER_MB)
        }
    });

    register(context, "System Available Memory", Unit::mega_bytes(), &tags, {
        let system = system.clone();
        move || {
            let mut system = lock(&system);
            system.refresh_memory();
            Ok(system.available_memory() as f64 / BYTES_PER_MB)
        }
    });

    register(context, "System CPU Usage", Unit::percent(), &tags, {
        let system = system.clone();
        move || {
            let mut system = lock(&system);
            system.refresh_cpu_usage();
            Ok(f64::from(system.global_cpu_usage()))
        }
    });

    let pid = sysinfo::get_current_pid();

    register(context, "Process Memory", Unit::mega_bytes(), &tags, {
        let system = system.clone();
        let pid = pid.map_err(str::to_string);
        move || {
            let pid = pid
                .clone()
                .map_err(|e| MetricsError::collaborator("Process Memory", e))?;
            Ok(process_reading(&system, pid, |p| p.memory() as f64 / BYTES_PER_MB))
        }
    });

    register(context, "Process CPU Usage", Unit::percent(), &tags, {
        let system = system.clone();
        let pid = pid.map_err(str::to_string);
        move || {
            let pid = pid
                .clone()
                .map_err(|e| MetricsError::collaborator("Process CPU Usage", e))?;
            Ok(process_reading(&system, pid, |p| f64::from(p.cpu_usage())))
        }
    });

    register(context, "Process Uptime", Unit::custom("s"), &tags, {
        let pid = pid.map_err(str::to_string);
        move || {
            let pid = pid
                .clone()
                .map_err(|e| MetricsError::collaborator("Process Uptime", e))?;
            Ok(process_reading(&system, pid, |p| p.run_time() as f64))
        }
    });

    log::info!("[SystemGauges] Registered on '{}'.", context.path());
}

/// Registers one gauge. `probe` is a fallible reading; a failed first reading
/// means the probe cannot work on this host and the gauge is skipped.
fn register(
    context: &MetricsContext,
    name: &str,
    unit: Unit,
    tags: &MetricTags,
    probe: impl Fn() -> MetricsResult<f64> + Send + Sync + 'static,
) {
    let builder = context.builder();
    context.gauge_with(name, &unit, tags, || {
        probe()?;
        let gauge_name = name.to_string();
        let provider: GaugeFn = Arc::new(move || match probe() {
            Ok(value) => value,
            Err(error) => {
                MetricsErrorHandler::handle(&error, &format!("Error reading '{gauge_name}'"));
                f64::NAN
            }
        });
        Ok(builder.build_gauge(name, &unit, provider))
    });
}

fn process_reading(
    system: &Mutex<System>,
    pid: Pid,
    read: impl FnOnce(&sysinfo::Process) -> f64,
) -> f64 {
    let mut system = lock(system);
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map_or(f64::NAN, read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::telemetry::MetricsDataProvider;

    #[test]
    fn test_system_gauges_are_tagged() {
        let context = MetricsContext::new("host");
        register_system_gauges(&context);

        let data = context.current_metrics_data();
        assert!(!data.gauges.is_empty());
        assert!(data
            .gauges
            .iter()
            .all(|g| g.tags.get("metrictype") == Some("system")));
        assert!(data
            .gauges
            .iter()
            .any(|g| g.name == "System Total Memory.gauge"));
    }
}
