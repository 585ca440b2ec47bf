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

//! [`Scheduler`] implementations.

use crate::scheduling::timer::ThreadingTimer;
use crate::utils::sync::lock;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vigil_core::telemetry::{
    CancellationToken, IntervalTimer, MetricsError, MetricsResult, ScheduledAction, Scheduler,
};

/// Runs an action on a background [`ThreadingTimer`].
///
/// The first run happens one interval after [`Scheduler::start`].
#[derive(Debug)]
pub struct ActionScheduler {
    name: String,
    timer: Option<ThreadingTimer>,
    token: CancellationToken,
}

impl ActionScheduler {
    /// Creates a stopped scheduler. `name` labels its thread and log lines.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timer: None,
            token: CancellationToken::new(),
        }
    }
}

impl Scheduler for ActionScheduler {
    fn start(&mut self, interval: Duration, action: ScheduledAction) -> MetricsResult<()> {
        if interval.is_zero() {
            return Err(MetricsError::Scheduler(format!(
                "'{}' needs a non-zero interval",
                self.name
            )));
        }
        self.stop();

        let token = CancellationToken::new();
        let timer = ThreadingTimer::new(self.name.clone())?;
        let tick_token = token.clone();
        timer.set_tick_handler(Arc::new(move || {
            if !tick_token.is_cancelled() {
                action(&tick_token);
            }
        }));
        timer.change(interval, interval);

        log::info!(
            "[ActionScheduler] '{}' running every {:?}.",
            self.name,
            interval
        );
        self.token = token;
        self.timer = Some(timer);
        Ok(())
    }

    fn stop(&mut self) {
        self.token.cancel();
        if let Some(timer) = self.timer.take() {
            timer.dispose();
            log::info!("[ActionScheduler] '{}' stopped.", self.name);
        }
    }
}

impl Drop for ActionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Default)]
struct ManualState {
    interval: Option<Duration>,
    action: Option<ScheduledAction>,
    token: CancellationToken,
    runs: usize,
}

/// A scheduler whose action only runs when [`ManualScheduler::run_now`] is called.
///
/// Clones share state, so a test can keep one clone while a reporter owns another.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    /// Creates a stopped manual scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the action once on the calling thread. Returns `false` if the
    /// scheduler is not started.
    pub fn run_now(&self) -> bool {
        let (action, token) = {
            let mut state = lock(&self.state);
            let Some(action) = state.action.clone() else {
                return false;
            };
            state.runs += 1;
            (action, state.token.clone())
        };
        action(&token);
        true
    }

    /// The interval passed to the last [`Scheduler::start`].
    pub fn interval(&self) -> Option<Duration> {
        lock(&self.state).interval
    }

    /// Returns `true` between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        lock(&self.state).action.is_some()
    }

    /// How many times the action has run.
    pub fn runs(&self) -> usize {
        lock(&self.state).runs
    }
}

impl Scheduler for ManualScheduler {
    fn start(&mut self, interval: Duration, action: ScheduledAction) -> MetricsResult<()> {
        let mut state = lock(&self.state);
        state.interval = Some(interval);
        state.action = Some(action);
        state.token = CancellationToken::new();
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = lock(&self.state);
        state.token.cancel();
        state.action = None;
    }
}

impl Debug for ManualScheduler {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("interval", &self.interval())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_manual_scheduler_runs_only_while_started() {
        let mut scheduler = ManualScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        assert!(!scheduler.run_now());
        scheduler
            .start(
                Duration::from_secs(60),
                Arc::new(move |_token: &CancellationToken| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert!(scheduler.run_now());
        assert_eq!(scheduler.interval(), Some(Duration::from_secs(60)));

        scheduler.stop();
        assert!(!scheduler.run_now());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_action_scheduler_rejects_zero_interval() {
        let mut scheduler = ActionScheduler::new("zero");
        let result = scheduler.start(Duration::ZERO, Arc::new(|_: &CancellationToken| {}));
        assert!(matches!(result, Err(MetricsError::Scheduler(_))));
    }

    #[test]
    fn test_action_scheduler_runs_in_background() {
        let mut scheduler = ActionScheduler::new("background");
        let (tx, rx) = crossbeam_channel::unbounded();
        scheduler
            .start(
                Duration::from_millis(5),
                Arc::new(move |_: &CancellationToken| {
                    let _ = tx.send(());
                }),
            )
            .unwrap();

        rx.recv_timeout(Duration::from_secs(2))
            .expect("action should run");
        scheduler.stop();
    }
}
