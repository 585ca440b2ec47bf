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

//! Contracts for the collaborators that drive periodic work: timers,
//! schedulers and the reports they run.

use crate::telemetry::error::MetricsResult;
use crate::telemetry::source::MetricsData;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A cooperative cancellation flag shared between a scheduler and its action.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`CancellationToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Callback invoked on each timer tick.
pub type TickHandler = Arc<dyn Fn() + Send + Sync>;

/// A substitutable periodic timer.
///
/// Production code uses a background-thread timer; tests use a manually fired
/// double. A disposed timer never ticks again.
pub trait IntervalTimer: Send + Sync + Debug {
    /// Sets the delay before the next tick and the period between later ticks.
    fn change(&self, due_time: Duration, period: Duration);

    /// Installs the callback run on every tick, replacing any previous one.
    fn set_tick_handler(&self, handler: TickHandler);

    /// Stops the timer for good.
    fn dispose(&self);
}

/// The action a scheduler runs on every interval.
pub type ScheduledAction = Arc<dyn Fn(&CancellationToken) + Send + Sync>;

/// Drives a [`ScheduledAction`] on a fixed interval.
pub trait Scheduler: Send + Debug {
    /// Starts running `action` every `interval`.
    fn start(&mut self, interval: Duration, action: ScheduledAction) -> MetricsResult<()>;

    /// Cancels the running action and stops scheduling it.
    fn stop(&mut self);
}

/// A sink that receives metric snapshots.
pub trait MetricsReport: Send + Sync + Debug {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Delivers one snapshot.
    fn run_report(&self, data: &MetricsData, token: &CancellationToken) -> MetricsResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
