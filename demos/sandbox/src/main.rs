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

// Vigil Sandbox
// Runs a simulated order pipeline with a log reporter and a JSON reporter.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use vigil_core::telemetry::{FieldValue, MetricTags, TimeUnit, Unit};
use vigil_core::{Counter, Event, Histogram, Meter, MetricsSettings};
use vigil_telemetry::{ActionScheduler, JsonReport, LogReport, MetricsService, TimerContext};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

fn simulate(service: &MetricsService) {
    let orders = service.context().context("orders");
    let tags = MetricTags::pair("region", "eu-west");

    let placed = orders.counter("placed", &Unit::items(), &tags);
    let throughput = orders.meter("throughput", &Unit::requests(), TimeUnit::Seconds, &tags);
    let basket = orders.histogram("basket_size", &Unit::items(), &tags);
    let latency = orders.timer("checkout", &Unit::calls(), &tags);
    let audit = orders.event("audit", &tags);

    for order in 0..25_i64 {
        let mut session = TimerContext::new(latency.clone());
        session.track_user_value(format!("order-{order}"));

        placed.increment_item(if order % 3 == 0 { "express" } else { "standard" }, 1);
        throughput.mark();
        basket.update(1 + order % 7, None);
        audit.record_fields(vec![
            ("order".to_string(), FieldValue::from(order)),
            ("express".to_string(), FieldValue::from(order % 3 == 0)),
        ]);

        thread::sleep(Duration::from_millis(60));
        drop(session);
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = MetricsSettings::from_env()?;
    let mut service = MetricsService::new(settings)?;

    service.add_reporter(
        Arc::new(LogReport::new("log")),
        REPORT_INTERVAL,
        Box::new(ActionScheduler::new("log-reporter")),
    )?;
    service.add_reporter(
        Arc::new(JsonReport::new("json", io::stdout())),
        REPORT_INTERVAL * 2,
        Box::new(ActionScheduler::new("json-reporter")),
    )?;

    simulate(&service);
    thread::sleep(REPORT_INTERVAL * 2);

    log::info!(
        "Cleaner runs every {:?}.",
        service.cleaner().current_interval()
    );
    service.shutdown();
    Ok(())
}
