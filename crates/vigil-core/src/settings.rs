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

//! Global settings for the instrumentation stack.

use crate::telemetry::error::{MetricsError, MetricsResult};
use crate::telemetry::units::SamplingType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding [`MetricsSettings::global_context_name`].
pub const ENV_GLOBAL_CONTEXT_NAME: &str = "VIGIL_GLOBAL_CONTEXT_NAME";
/// Environment variable overriding [`MetricsSettings::completely_disabled`].
pub const ENV_COMPLETELY_DISABLED: &str = "VIGIL_COMPLETELY_DISABLED";
/// Environment variable overriding [`MetricsSettings::cleaner_interval_buffer_ms`].
pub const ENV_CLEANER_BUFFER_MS: &str = "VIGIL_CLEANER_BUFFER_MS";
/// Environment variable overriding [`MetricsSettings::register_system_gauges`].
pub const ENV_REGISTER_SYSTEM_GAUGES: &str = "VIGIL_REGISTER_SYSTEM_GAUGES";

/// A collection of settings read once at service start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Name of the root context.
    pub global_context_name: String,
    /// If `true`, the root context starts completely disabled.
    pub completely_disabled: bool,
    /// Slack added to the slowest reporter interval to get the cleaner interval.
    pub cleaner_interval_buffer_ms: u64,
    /// If `true`, memory/CPU/process gauges are registered on the root context.
    pub register_system_gauges: bool,
    /// Sampling strategy used when a histogram or timer does not specify one.
    pub default_sampling: SamplingType,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            global_context_name: "vigil".to_string(),
            completely_disabled: false,
            cleaner_interval_buffer_ms: 5_000,
            register_system_gauges: false,
            default_sampling: SamplingType::default(),
        }
    }
}

impl MetricsSettings {
    /// The cleaner interval buffer as a [`Duration`].
    pub fn cleaner_interval_buffer(&self) -> Duration {
        Duration::from_millis(self.cleaner_interval_buffer_ms)
    }

    /// Parses settings from a JSON document; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> MetricsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults overlaid with the `VIGIL_*` environment variables.
    pub fn from_env() -> MetricsResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values produced by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> MetricsResult<Self> {
        let mut settings = Self::default();

        if let Some(name) = lookup(ENV_GLOBAL_CONTEXT_NAME) {
            if !name.trim().is_empty() {
                settings.global_context_name = name.trim().to_string();
                log::debug!(
                    "[MetricsSettings] {ENV_GLOBAL_CONTEXT_NAME} overrides the root name: '{}'.",
                    settings.global_context_name
                );
            }
        }
        if let Some(raw) = lookup(ENV_COMPLETELY_DISABLED) {
            settings.completely_disabled = parse_bool(ENV_COMPLETELY_DISABLED, &raw)?;
            log::debug!(
                "[MetricsSettings] {ENV_COMPLETELY_DISABLED} = {}.",
                settings.completely_disabled
            );
        }
        if let Some(raw) = lookup(ENV_CLEANER_BUFFER_MS) {
            settings.cleaner_interval_buffer_ms = raw.trim().parse().map_err(|_| {
                log::warn!("[MetricsSettings] Rejected {ENV_CLEANER_BUFFER_MS}='{raw}'.");
                MetricsError::Configuration(format!(
                    "{ENV_CLEANER_BUFFER_MS} must be a whole number of milliseconds, got '{raw}'"
                ))
            })?;
            log::debug!(
                "[MetricsSettings] {ENV_CLEANER_BUFFER_MS} = {}.",
                settings.cleaner_interval_buffer_ms
            );
        }
        if let Some(raw) = lookup(ENV_REGISTER_SYSTEM_GAUGES) {
            settings.register_system_gauges = parse_bool(ENV_REGISTER_SYSTEM_GAUGES, &raw)?;
            log::debug!(
                "[MetricsSettings] {ENV_REGISTER_SYSTEM_GAUGES} = {}.",
                settings.register_system_gauges
            );
        }

        Ok(settings)
    }
}

fn parse_bool(key: &str, raw: &str) -> MetricsResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => {
            log::warn!("[MetricsSettings] Rejected {key}='{raw}'.");
            Err(MetricsError::Configuration(format!(
                "{key} must be a boolean, got '{raw}'"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = MetricsSettings::default();
        assert_eq!(settings.global_context_name, "vigil");
        assert_eq!(settings.cleaner_interval_buffer(), Duration::from_secs(5));
        assert!(!settings.completely_disabled);
    }

    #[test]
    fn test_lookup_overrides() {
        let settings = MetricsSettings::from_lookup(lookup(&[
            (ENV_GLOBAL_CONTEXT_NAME, "orders"),
            (ENV_COMPLETELY_DISABLED, "yes"),
            (ENV_CLEANER_BUFFER_MS, "250"),
        ]))
        .unwrap();
        assert_eq!(settings.global_context_name, "orders");
        assert!(settings.completely_disabled);
        assert_eq!(settings.cleaner_interval_buffer_ms, 250);
    }

    #[test]
    fn test_malformed_value_is_rejected() {
        let result = MetricsSettings::from_lookup(lookup(&[(ENV_CLEANER_BUFFER_MS, "soon")]));
        assert!(matches!(result, Err(MetricsError::Configuration(_))));
    }

    #[test]
    fn test_malformed_boolean_is_rejected() {
        let result =
            MetricsSettings::from_lookup(lookup(&[(ENV_REGISTER_SYSTEM_GAUGES, "sometimes")]));
        assert!(matches!(result, Err(MetricsError::Configuration(_))));
    }

    #[test]
    fn test_json_keeps_defaults_for_missing_fields() {
        let settings =
            MetricsSettings::from_json_str(r#"{ "register_system_gauges": true }"#).unwrap();
        assert!(settings.register_system_gauges);
        assert_eq!(settings.global_context_name, "vigil");
    }
}
