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

//! Units of measurement carried alongside metric values.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// A free-form unit name (e.g. "requests", "MB").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unit(String);

impl Unit {
    /// A custom unit with the given name.
    pub fn custom(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Unit-less values.
    pub fn none() -> Self {
        Self::custom("")
    }

    /// Calls.
    pub fn calls() -> Self {
        Self::custom("Calls")
    }

    /// Requests.
    pub fn requests() -> Self {
        Self::custom("Requests")
    }

    /// Errors.
    pub fn errors() -> Self {
        Self::custom("Errors")
    }

    /// Items.
    pub fn items() -> Self {
        Self::custom("Items")
    }

    /// Threads.
    pub fn threads() -> Self {
        Self::custom("Threads")
    }

    /// Percentages.
    pub fn percent() -> Self {
        Self::custom("%")
    }

    /// Bytes.
    pub fn bytes() -> Self {
        Self::custom("B")
    }

    /// Kilobytes.
    pub fn kilo_bytes() -> Self {
        Self::custom("KB")
    }

    /// Megabytes.
    pub fn mega_bytes() -> Self {
        Self::custom("MB")
    }

    /// Events.
    pub fn events() -> Self {
        Self::custom("Events")
    }

    /// The unit's display name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::none()
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A time unit used for rates and durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Number of nanoseconds in one of this unit.
    pub fn nanos(self) -> u128 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// Expresses `duration` as a (fractional) count of this unit.
    pub fn convert(self, duration: Duration) -> f64 {
        duration.as_nanos() as f64 / self.nanos() as f64
    }

    /// Short suffix used when rendering values.
    pub fn unit_name(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

/// The sampling strategy requested for a histogram or timer.
///
/// The reservoir engines themselves live outside this crate; the strategy is
/// passed through to the [`MetricsBuilder`](crate::telemetry::MetricsBuilder).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingType {
    /// Biased towards recent values.
    #[default]
    ExponentiallyDecaying,
    /// Keeps every value since the last reset.
    LongTerm,
    /// Keeps a fixed window of the most recent values.
    SlidingWindow,
    /// Uniform random sample.
    Uniform,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_unit_conversion() {
        let duration = Duration::from_millis(1500);
        assert_eq!(TimeUnit::Seconds.convert(duration), 1.5);
        assert_eq!(TimeUnit::Milliseconds.convert(duration), 1500.0);
        assert_eq!(TimeUnit::Minutes.convert(Duration::from_secs(90)), 1.5);
    }

    #[test]
    fn test_unit_display() {
        assert_eq!(Unit::mega_bytes().to_string(), "MB");
        assert_eq!(Unit::default().name(), "");
    }
}
