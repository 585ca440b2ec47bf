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

//! [`IntervalTimer`] implementations.

use crate::error_handler::MetricsErrorHandler;
use crate::utils::sync::{lock, read, write};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::fmt::{self, Debug, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use vigil_core::telemetry::{IntervalTimer, MetricsError, MetricsResult, TickHandler};

enum Command {
    Change { due_time: Duration, period: Duration },
    Dispose,
}

/// A periodic timer backed by a dedicated thread.
///
/// The timer starts idle; [`IntervalTimer::change`] arms it. A zero period
/// fires once after the due time. Ticks run on the timer thread, one at a
/// time, so a slow handler delays later ticks instead of overlapping them.
pub struct ThreadingTimer {
    name: String,
    commands: Sender<Command>,
    handler: Arc<RwLock<Option<TickHandler>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    disposed: AtomicBool,
}

impl ThreadingTimer {
    /// Spawns the timer thread.
    pub fn new(name: impl Into<String>) -> MetricsResult<Self> {
        let name = name.into();
        let (commands, receiver) = crossbeam_channel::unbounded();
        let handler: Arc<RwLock<Option<TickHandler>>> = Arc::new(RwLock::new(None));

        let worker_handler = handler.clone();
        let worker_name = name.clone();
        let worker = thread::Builder::new()
            .name(format!("vigil-timer-{name}"))
            .spawn(move || run(&worker_name, &receiver, &worker_handler))
            .map_err(|e| MetricsError::Timer(format!("failed to spawn '{name}': {e}")))?;
        let worker_id = worker.thread().id();

        log::debug!("[ThreadingTimer] '{name}' started.");
        Ok(Self {
            name,
            commands,
            handler,
            worker: Mutex::new(Some(worker)),
            worker_id,
            disposed: AtomicBool::new(false),
        })
    }
}

fn run(name: &str, receiver: &Receiver<Command>, handler: &RwLock<Option<TickHandler>>) {
    let mut next_tick: Option<Instant> = None;
    let mut period = Duration::ZERO;

    loop {
        let command = match next_tick {
            Some(deadline) => receiver.recv_deadline(deadline),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match command {
            Ok(Command::Change {
                due_time,
                period: new_period,
            }) => {
                period = new_period;
                next_tick = Some(Instant::now() + due_time);
            }
            Ok(Command::Dispose) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let current = read(handler).clone();
                if let Some(tick) = current {
                    if panic::catch_unwind(AssertUnwindSafe(|| tick())).is_err() {
                        MetricsErrorHandler::handle(
                            &MetricsError::Timer(format!("tick handler of '{name}' panicked")),
                            "Error running timer tick",
                        );
                    }
                }
                next_tick = (!period.is_zero()).then(|| Instant::now() + period);
            }
        }
    }
    log::debug!("[ThreadingTimer] '{name}' stopped.");
}

impl IntervalTimer for ThreadingTimer {
    fn change(&self, due_time: Duration, period: Duration) {
        if self
            .commands
            .send(Command::Change { due_time, period })
            .is_err()
        {
            log::warn!("[ThreadingTimer] '{}' is disposed; change ignored.", self.name);
        }
    }

    fn set_tick_handler(&self, handler: TickHandler) {
        *write(&self.handler) = Some(handler);
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.commands.send(Command::Dispose);
        *write(&self.handler) = None;

        // A tick handler disposing its own timer must not join itself.
        if thread::current().id() == self.worker_id {
            return;
        }
        if let Some(worker) = lock(&self.worker).take() {
            if worker.join().is_err() {
                log::warn!("[ThreadingTimer] '{}' worker panicked.", self.name);
            }
        }
    }
}

impl Drop for ThreadingTimer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Debug for ThreadingTimer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadingTimer")
            .field("name", &self.name)
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

/// A timer that only ticks when [`ManualTimer::fire`] is called.
///
/// Ticks run synchronously on the calling thread.
#[derive(Default)]
pub struct ManualTimer {
    handler: Mutex<Option<TickHandler>>,
    schedule: Mutex<Option<(Duration, Duration)>>,
    disposed: AtomicBool,
}

impl ManualTimer {
    /// Creates an idle manual timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the tick handler once. Does nothing after disposal.
    pub fn fire(&self) {
        if self.is_disposed() {
            return;
        }
        let current = lock(&self.handler).clone();
        if let Some(tick) = current {
            tick();
        }
    }

    /// The `(due_time, period)` of the last [`IntervalTimer::change`] call.
    pub fn schedule(&self) -> Option<(Duration, Duration)> {
        *lock(&self.schedule)
    }

    /// Returns `true` once disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl IntervalTimer for ManualTimer {
    fn change(&self, due_time: Duration, period: Duration) {
        *lock(&self.schedule) = Some((due_time, period));
    }

    fn set_tick_handler(&self, handler: TickHandler) {
        *lock(&self.handler) = Some(handler);
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        *lock(&self.handler) = None;
    }
}

impl Debug for ManualTimer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTimer")
            .field("schedule", &self.schedule())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_manual_timer_fires_synchronously() {
        let timer = ManualTimer::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        timer.set_tick_handler(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        timer.fire();
        timer.fire();
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        timer.dispose();
        timer.fire();
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_manual_timer_records_schedule() {
        let timer = ManualTimer::new();
        assert_eq!(timer.schedule(), None);

        timer.change(Duration::from_secs(5), Duration::from_secs(10));
        assert_eq!(
            timer.schedule(),
            Some((Duration::from_secs(5), Duration::from_secs(10)))
        );
    }

    #[test]
    fn test_threading_timer_ticks_until_disposed() {
        let timer = ThreadingTimer::new("smoke").unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        timer.set_tick_handler(Arc::new(move || {
            let _ = tx.send(());
        }));
        timer.change(Duration::from_millis(5), Duration::from_millis(5));

        for _ in 0..3 {
            rx.recv_timeout(Duration::from_secs(2))
                .expect("timer should tick");
        }

        timer.dispose();
        // Drain anything already in flight, then expect silence.
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
