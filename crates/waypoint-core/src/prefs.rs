use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::output::ReadingRate;

/// Selectable auto-off durations. Preferences store an index into this
/// table rather than a raw duration.
pub const AUTO_OFF_DURATIONS: [Duration; 4] = [
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(120),
    Duration::from_secs(300),
];

/// How the user supplies a search query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMethod {
    #[default]
    Voice,
    Keyboard,
}

/// Persisted user preferences, read-only from the engine's perspective.
/// The hosting app owns writes; the engine only consults the values at
/// session boundaries.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Index into [`AUTO_OFF_DURATIONS`] for the auto-off warning.
    pub auto_off_warn_index: usize,
    /// Index into [`AUTO_OFF_DURATIONS`] for the auto-off pause.
    pub auto_off_pause_index: usize,
    /// Turn the torch on while a search session is active.
    pub torch_on_search: bool,
    pub input_method: InputMethod,
    /// BCP-47 tag for speech recognition.
    pub language: String,
    pub reading_rate: ReadingRate,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_off_warn_index: 1,
            auto_off_pause_index: 2,
            torch_on_search: false,
            input_method: InputMethod::Voice,
            language: "en-US".to_string(),
            reading_rate: ReadingRate::Normal,
        }
    }
}

impl Preferences {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Duration before the auto-off warning is announced. Out-of-range
    /// indices fall back to the longest option.
    pub fn auto_off_warn(&self) -> Duration {
        duration_at(self.auto_off_warn_index)
    }

    /// Duration before the session auto-pauses.
    pub fn auto_off_pause(&self) -> Duration {
        duration_at(self.auto_off_pause_index)
    }
}

fn duration_at(index: usize) -> Duration {
    AUTO_OFF_DURATIONS
        .get(index)
        .copied()
        .unwrap_or(AUTO_OFF_DURATIONS[AUTO_OFF_DURATIONS.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let prefs = Preferences::default();
        assert_eq!(prefs.auto_off_warn(), Duration::from_secs(60));
        assert_eq!(prefs.auto_off_pause(), Duration::from_secs(120));
        assert_eq!(prefs.input_method, InputMethod::Voice);
    }

    #[test]
    fn out_of_range_index_falls_back_to_longest() {
        let prefs = Preferences {
            auto_off_warn_index: 99,
            ..Default::default()
        };
        assert_eq!(prefs.auto_off_warn(), Duration::from_secs(300));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let prefs = Preferences::from_json(r#"{"torch_on_search": true}"#).unwrap();
        assert!(prefs.torch_on_search);
        assert_eq!(prefs.language, "en-US");
    }
}
