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

//! Process-wide sink for errors raised by collaborators.
//!
//! Gauge sources, system probes and reports run on behalf of the service, often
//! on background threads with nobody to return an error to. They hand their
//! failures to [`MetricsErrorHandler::handle`], which always logs and then
//! forwards the error to every registered custom handler.

use crate::utils::sync::{read, write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use vigil_core::telemetry::MetricsError;

/// A custom error callback. Receives the error and a short description of
/// what was being attempted.
pub type ErrorHandlerFn = Arc<dyn Fn(&MetricsError, &str) + Send + Sync>;

/// Identifies a handler registered with [`MetricsErrorHandler::add_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct HandlerChain {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(HandlerId, ErrorHandlerFn)>>,
}

fn chain() -> &'static HandlerChain {
    static CHAIN: OnceLock<HandlerChain> = OnceLock::new();
    CHAIN.get_or_init(|| HandlerChain {
        next_id: AtomicU64::new(1),
        handlers: RwLock::new(Vec::new()),
    })
}

/// Entry point to the process-wide handler chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsErrorHandler;

impl MetricsErrorHandler {
    /// Registers an additional handler and returns its id.
    pub fn add_handler(handler: ErrorHandlerFn) -> HandlerId {
        let chain = chain();
        let id = HandlerId(chain.next_id.fetch_add(1, Ordering::Relaxed));
        write(&chain.handlers).push((id, handler));
        id
    }

    /// Removes the handler registered under `id`. Unknown ids are ignored.
    pub fn remove_handler(id: HandlerId) {
        write(&chain().handlers).retain(|(existing, _)| *existing != id);
    }

    /// Removes every custom handler; logging stays on.
    pub fn clear_handlers() {
        write(&chain().handlers).clear();
    }

    /// Number of custom handlers currently registered.
    pub fn handler_count() -> usize {
        read(&chain().handlers).len()
    }

    /// Logs `error` and forwards it to every custom handler.
    pub fn handle(error: &MetricsError, message: &str) {
        log::error!("[MetricsErrorHandler] {message}: {error}");

        // Copy out so a handler may register or remove handlers itself.
        let handlers: Vec<ErrorHandlerFn> = read(&chain().handlers)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(error, message);
        }
    }
}
