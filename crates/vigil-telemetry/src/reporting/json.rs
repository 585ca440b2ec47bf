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

//! Renders snapshots as JSON documents.

use crate::utils::sync::lock;
use std::fmt::{self, Debug, Formatter};
use std::io::Write;
use std::sync::Mutex;
use vigil_core::telemetry::{
    CancellationToken, MetricsData, MetricsError, MetricsReport, MetricsResult,
};

/// Writes one JSON document per run, followed by a newline.
pub struct JsonReport {
    name: String,
    pretty: bool,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl JsonReport {
    /// Writes compact JSON lines to `sink`.
    pub fn new(name: impl Into<String>, sink: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            pretty: false,
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Switches to indented output.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Renders `data` the way this report writes it.
    pub fn render(&self, data: &MetricsData) -> MetricsResult<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }
}

impl MetricsReport for JsonReport {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_report(&self, data: &MetricsData, token: &CancellationToken) -> MetricsResult<()> {
        if token.is_cancelled() {
            return Ok(());
        }
        let json = self.render(data)?;

        let mut sink = lock(&self.sink);
        writeln!(sink, "{json}")
            .and_then(|()| sink.flush())
            .map_err(|e| MetricsError::Report {
                report: self.name.clone(),
                message: e.to_string(),
            })
    }
}

impl Debug for JsonReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonReport")
            .field("name", &self.name)
            .field("pretty", &self.pretty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MetricsContext;
    use std::sync::Arc;
    use vigil_core::telemetry::{MetricTags, MetricsDataProvider, Unit};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_writes_one_json_line() {
        let context = MetricsContext::new("orders");
        context
            .counter("placed", &Unit::items(), &MetricTags::NONE)
            .increment_by(3);
        let buffer = SharedBuffer::default();
        let report = JsonReport::new("json", buffer.clone());

        report
            .run_report(&context.current_metrics_data(), &CancellationToken::new())
            .unwrap();

        let written = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(written.trim_end()).unwrap();
        assert_eq!(parsed["context"], "orders");
        assert_eq!(parsed["counters"][0]["name"], "placed.counter");
        assert_eq!(parsed["counters"][0]["value"]["count"], 3);
    }
}
