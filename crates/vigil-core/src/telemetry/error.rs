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

//! Errors raised by the instrumentation stack.

/// A specialized `Result` type for metric-related operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// An error that can occur within the metrics system.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A context operation that requires an explicit name received an empty one.
    #[error("Context name must not be empty for {operation}")]
    InvalidContextName {
        /// The rejected operation.
        operation: &'static str,
    },

    /// An external collaborator (gauge source, system probe) failed.
    #[error("Collaborator failure in '{source_name}': {message}")]
    CollaboratorFailure {
        /// The metric or probe that failed.
        source_name: String,
        /// What went wrong.
        message: String,
    },

    /// A scheduler could not be started.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// A background timer could not be started or changed.
    #[error("Timer error: {0}")]
    Timer(String),

    /// Serializing a snapshot failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A setting was malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A reporter failed to deliver its report.
    #[error("Report '{report}' failed: {message}")]
    Report {
        /// The reporter name.
        report: String,
        /// What went wrong.
        message: String,
    },
}

impl MetricsError {
    /// Shorthand for a [`MetricsError::CollaboratorFailure`].
    pub fn collaborator(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        MetricsError::CollaboratorFailure {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MetricsError::InvalidContextName {
            operation: "attach_context",
        };
        assert_eq!(
            err.to_string(),
            "Context name must not be empty for attach_context"
        );

        let err = MetricsError::collaborator("cpu.gauge", "probe unavailable");
        assert_eq!(
            err.to_string(),
            "Collaborator failure in 'cpu.gauge': probe unavailable"
        );
    }
}
