use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const MIN_POLL_INTERVAL_MS: u64 = 2_000;
pub const MAX_POLL_INTERVAL_MS: u64 = 3_000;

/// User preferences persisted with the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_constitution_questions")]
    pub constitution_questions: Vec<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bytes of output retained per terminal session.
    #[serde(default = "default_terminal_scrollback")]
    pub terminal_scrollback: usize,
    #[serde(default = "default_max_notifications")]
    pub max_notifications: usize,
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_constitution_questions() -> Vec<String> {
    vec![
        "What is this project for, and who uses it?".to_string(),
        "Which languages, frameworks and tools does it rely on?".to_string(),
        "What coding conventions and quality standards must every change follow?".to_string(),
        "What must never happen (security, data, compatibility constraints)?".to_string(),
    ]
}

fn default_poll_interval_ms() -> u64 {
    2_500
}

fn default_terminal_scrollback() -> usize {
    256 * 1024
}

fn default_max_notifications() -> usize {
    50
}

fn default_auto_save() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            constitution_questions: default_constitution_questions(),
            poll_interval_ms: default_poll_interval_ms(),
            terminal_scrollback: default_terminal_scrollback(),
            max_notifications: default_max_notifications(),
            auto_save: default_auto_save(),
        }
    }
}

impl Settings {
    pub fn question_count(&self) -> usize {
        self.constitution_questions.len()
    }

    /// Container polling interval, clamped to the supported 2-3 second window.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_four_questions() {
        let settings = Settings::default();
        assert_eq!(settings.question_count(), 4);
        assert_eq!(settings.poll_interval(), Duration::from_millis(2_500));
    }

    #[test]
    fn poll_interval_is_clamped() {
        let mut settings = Settings {
            poll_interval_ms: 100,
            ..Settings::default()
        };
        assert_eq!(settings.poll_interval(), Duration::from_millis(2_000));
        settings.poll_interval_ms = 60_000;
        assert_eq!(settings.poll_interval(), Duration::from_millis(3_000));
    }

    #[test]
    fn empty_object_deserializes_to_defaults() {
        let settings: Settings = serde_yaml::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }
}
