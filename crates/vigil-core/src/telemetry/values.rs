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

//! Point-in-time values exposed by each metric kind.

use crate::telemetry::units::TimeUnit;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// The value of a counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CounterValue {
    /// Total count.
    pub count: i64,
    /// Per-item sub-counts, sorted by item name.
    pub items: Vec<CounterItem>,
}

/// One named sub-count of a counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterItem {
    /// The item name.
    pub item: String,
    /// The count recorded for this item.
    pub count: i64,
    /// Share of the total count, in percent.
    pub percent: f64,
}

/// The value of a meter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterValue {
    /// Total number of marks.
    pub count: i64,
    /// Average rate since creation (or last reset), per `rate_unit`.
    pub mean_rate: f64,
    /// The unit the rate is expressed in.
    pub rate_unit: TimeUnit,
}

impl MeterValue {
    /// An empty meter value.
    pub fn empty(rate_unit: TimeUnit) -> Self {
        Self {
            count: 0,
            mean_rate: 0.0,
            rate_unit,
        }
    }
}

/// The value of a histogram.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistogramValue {
    /// Number of recorded samples.
    pub count: i64,
    /// Sum of all samples.
    pub sum: i64,
    /// The most recently recorded sample.
    pub last_value: i64,
    /// The user value attached to the most recent sample, if any.
    pub last_user_value: Option<String>,
    /// The smallest recorded sample.
    pub min: i64,
    /// The largest recorded sample.
    pub max: i64,
    /// Arithmetic mean of all samples.
    pub mean: f64,
}

/// The value of a timer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerValue {
    /// How often the timed operation happened.
    pub rate: MeterValue,
    /// Distribution of the recorded durations, in `duration_unit`.
    pub histogram: HistogramValue,
    /// Timing sessions started but not yet finished.
    pub active_sessions: i64,
    /// Total recorded time, in `duration_unit`.
    pub total_time: f64,
    /// The unit durations are expressed in.
    pub duration_unit: TimeUnit,
}

/// A single value attached to an event record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean flag.
    Bool(bool),
    /// A point in time.
    Timestamp(DateTime<Utc>),
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(v) => write!(f, "{v}"),
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// One recorded occurrence of an event.
///
/// Always carries at least one field: when recorded without fields, a
/// `timestamp` field holding the stringified timestamp is inserted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDetails {
    /// When the occurrence happened.
    pub timestamp: DateTime<Utc>,
    /// Named values describing the occurrence.
    pub fields: Vec<(String, FieldValue)>,
}

impl EventDetails {
    /// Name of the field inserted when an event is recorded without fields.
    pub const DEFAULT_FIELD: &'static str = "timestamp";

    /// Builds a record, inserting the default timestamp field when `fields` is empty.
    pub fn new(fields: Vec<(String, FieldValue)>, timestamp: DateTime<Utc>) -> Self {
        let fields = if fields.is_empty() {
            vec![(
                Self::DEFAULT_FIELD.to_string(),
                FieldValue::Text(timestamp.to_rfc3339()),
            )]
        } else {
            fields
        };
        Self { timestamp, fields }
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

/// A copy of every record currently held by an event metric, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventValue {
    /// The records, in insertion order.
    pub events: Vec<EventDetails>,
}

impl EventValue {
    /// Wraps a copied record list.
    pub fn new(events: Vec<EventDetails>) -> Self {
        Self { events }
    }

    /// Number of records in this copy.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when no records were copied.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
