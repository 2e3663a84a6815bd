use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::models::StatusLabels;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Placeholders written into a record when the page never showed the field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Sentinels {
    pub phone: String,
    pub region: String,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            phone: "unknown".into(),
            region: "not specified".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorSettings {
    /// Match pattern used to find the agent-desk surface.
    pub surface_url_pattern: String,
    pub status_poll_ms: u64,
    pub in_call_poll_ms: u64,
    pub post_call_attempts: u32,
    pub post_call_delay_ms: u64,
    pub inspect_timeout_ms: u64,
    pub reload_check_delay_ms: u64,
    pub max_history: usize,
    pub labels: StatusLabels,
    pub sentinels: Sentinels,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            surface_url_pattern: "https://ssial000ap008.si.rt.ru:8445/desktop/container/*".into(),
            status_poll_ms: 3_000,
            in_call_poll_ms: 1_000,
            post_call_attempts: 3,
            post_call_delay_ms: 100,
            inspect_timeout_ms: 5_000,
            reload_check_delay_ms: 3_000,
            max_history: 10,
            labels: StatusLabels::default(),
            sentinels: Sentinels::default(),
        }
    }
}

impl MonitorSettings {
    /// Reads settings from `path`, falling back to defaults when the file is
    /// missing or does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        match serde_json::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                warn!(
                    "Ignoring malformed settings at {}: {err}; using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }

    pub fn in_call_poll_interval(&self) -> Duration {
        Duration::from_millis(self.in_call_poll_ms)
    }

    pub fn post_call_delay(&self) -> Duration {
        Duration::from_millis(self.post_call_delay_ms)
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_millis(self.inspect_timeout_ms)
    }

    pub fn reload_check_delay(&self) -> Duration {
        Duration::from_millis(self.reload_check_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = MonitorSettings::load(&dir.path().join(SETTINGS_FILE_NAME)).unwrap();
        assert_eq!(settings, MonitorSettings::default());
        assert_eq!(settings.max_history, 10);
        assert_eq!(settings.post_call_attempts, 3);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(
            &path,
            r#"{ "statusPollMs": 2500, "labels": { "talking": "Talking" } }"#,
        )
        .unwrap();

        let settings = MonitorSettings::load(&path).unwrap();
        assert_eq!(settings.status_poll_ms, 2_500);
        assert_eq!(settings.in_call_poll_ms, 1_000);
        assert_eq!(settings.labels.talking, "Talking");
        assert_eq!(settings.labels.wrap_up, StatusLabels::default().wrap_up);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let settings = MonitorSettings::load(&path).unwrap();
        assert_eq!(settings, MonitorSettings::default());
    }
}
