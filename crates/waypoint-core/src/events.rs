use serde::{Deserialize, Serialize};

use crate::ids::{FeatureId, SessionId};

/// Which long-running feature an event concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    ItemSearch,
    TextSearch,
    ReadText,
}

impl FeatureKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ItemSearch => "item_search",
            Self::TextSearch => "text_search",
            Self::ReadText => "read_text",
        }
    }
}

/// Why a global stop was issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The user asked for everything to stop.
    User,
    /// Another feature is being activated, or shutdown is in progress.
    Programmatic,
}

/// Domain events published on the shared broadcast channel. Fire-and-forget:
/// consumers that lag are allowed to drop events, none of these carry state
/// that cannot be re-derived from the watch channels.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GuideEvent {
    #[serde(rename = "feature_started")]
    FeatureStarted {
        feature_id: FeatureId,
        session_id: SessionId,
        kind: FeatureKind,
    },

    #[serde(rename = "feature_stopped")]
    FeatureStopped {
        feature_id: FeatureId,
        session_id: SessionId,
        kind: FeatureKind,
    },

    #[serde(rename = "all_stopped")]
    AllStopped { reason: StopReason },

    #[serde(rename = "error")]
    Error {
        feature_id: Option<FeatureId>,
        message: String,
    },

    #[serde(rename = "log")]
    Log { level: LogLevel, message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = GuideEvent::AllStopped {
            reason: StopReason::User,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"all_stopped\""));
        assert!(json.contains("\"reason\":\"user\""));
    }

    #[test]
    fn error_event_roundtrip() {
        let event = GuideEvent::Error {
            feature_id: Some(FeatureId::from_raw("feat_x")),
            message: "speech recognition timed out".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: GuideEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            GuideEvent::Error { feature_id, message } => {
                assert_eq!(feature_id.unwrap().as_str(), "feat_x");
                assert!(message.contains("timed out"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn feature_kind_labels() {
        assert_eq!(FeatureKind::ItemSearch.label(), "item_search");
        assert_eq!(FeatureKind::ReadText.label(), "read_text");
    }
}
