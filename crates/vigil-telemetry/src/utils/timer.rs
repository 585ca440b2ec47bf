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

//! Provides RAII-based timing sessions. (RAII = Resource Acquisition Is Initialization)

use std::sync::Arc;
use std::time::{Duration, Instant};
use vigil_core::telemetry::Timer;

/// A timing session that ends, and records its duration, when dropped.
///
/// Opening the session counts as an active session on the timer until the
/// guard goes out of scope, including on early returns and unwinding.
pub struct TimerContext {
    timer: Arc<dyn Timer>,
    started: Instant,
    user_value: Option<String>,
}

impl TimerContext {
    /// Begins a session on `timer`.
    pub fn new(timer: Arc<dyn Timer>) -> Self {
        timer.begin_session();
        Self {
            timer,
            started: Instant::now(),
            user_value: None,
        }
    }

    /// Attaches a user value recorded with this session's duration.
    pub fn track_user_value(&mut self, value: impl Into<String>) {
        self.user_value = Some(value.into());
    }

    /// Time elapsed since the session began.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimerContext {
    fn drop(&mut self) {
        self.timer
            .end_session(self.started.elapsed(), self.user_value.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SimpleTimer;
    use vigil_core::telemetry::{MetricValueProvider, SamplingType, TimeUnit};

    #[test]
    fn test_session_counts_as_active_until_dropped() {
        let timer: Arc<dyn Timer> = Arc::new(SimpleTimer::new(
            TimeUnit::Seconds,
            TimeUnit::Milliseconds,
            SamplingType::default(),
        ));

        {
            let mut session = TimerContext::new(timer.clone());
            session.track_user_value("order-42");
            assert_eq!(timer.value().active_sessions, 1);
        }

        let value = timer.value();
        assert_eq!(value.active_sessions, 0);
        assert_eq!(value.histogram.count, 1);
        assert_eq!(value.histogram.last_user_value.as_deref(), Some("order-42"));
    }
}
