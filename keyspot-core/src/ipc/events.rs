//! Event types broadcast by the engine.
//!
//! | Event | Subscription |
//! |-------|--------------|
//! | `SpotterEvent` | `KeyspotEngine::subscribe_events()` |
//! | `EngineStatusEvent` | `KeyspotEngine::subscribe_status()` |

use serde::{Deserialize, Serialize};

use crate::error::KeyspotError;

// ---------------------------------------------------------------------------
// Spotter events
// ---------------------------------------------------------------------------

/// Emitted by `KeywordSpotter` as frames are processed. `frame` is the
/// zero-based index of the audio frame that produced the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SpotterEvent {
    /// The pipeline entered the active state.
    Activate { frame: u64 },
    /// The pipeline returned to idle.
    Deactivate { frame: u64 },
    /// An activation ended without anything being recognized.
    Timeout { frame: u64 },
    /// A keyword or phrase was recognized.
    #[serde(rename_all = "camelCase")]
    Recognized {
        frame: u64,
        class_id: usize,
        transcript: String,
        confidence: f32,
    },
    /// A stage failed; the pipeline was reset and keeps listening.
    Error {
        frame: u64,
        kind: String,
        message: String,
    },
}

impl SpotterEvent {
    pub fn error(frame: u64, err: &KeyspotError) -> Self {
        SpotterEvent::Error {
            frame,
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn frame(&self) -> u64 {
        match self {
            SpotterEvent::Activate { frame }
            | SpotterEvent::Deactivate { frame }
            | SpotterEvent::Timeout { frame }
            | SpotterEvent::Recognized { frame, .. }
            | SpotterEvent::Error { frame, .. } => *frame,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Broadcast when the engine state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Worker running and consuming frames.
    Listening,
    /// Worker stopped; engine may be restarted.
    Stopped,
    /// A stage failed on the last frame; listening continues.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spotter_events_are_tagged_by_type() {
        let json = serde_json::to_value(SpotterEvent::Activate { frame: 3 })
            .expect("serialize activate");
        assert_eq!(json["type"], "activate");
        assert_eq!(json["frame"], 3);

        let json = serde_json::to_value(SpotterEvent::Recognized {
            frame: 40,
            class_id: 2,
            transcript: "lights on".into(),
            confidence: 0.75,
        })
        .expect("serialize recognized");
        assert_eq!(json["type"], "recognized");
        assert_eq!(json["classId"], 2);
        assert_eq!(json["transcript"], "lights on");
        assert_eq!(json["confidence"], 0.75);

        let round_trip: SpotterEvent =
            serde_json::from_value(json).expect("deserialize recognized");
        assert_eq!(round_trip.frame(), 40);
    }

    #[test]
    fn error_event_carries_kind_tag() {
        let err = KeyspotError::invocation("detect", "shape");
        let event = SpotterEvent::error(9, &err);
        let json = serde_json::to_value(&event).expect("serialize error");
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "model_invocation");
        assert_eq!(json["message"], "detect model invocation failed: shape");
    }

    #[test]
    fn engine_status_event_serializes_with_lowercase_status() {
        let event = EngineStatusEvent {
            status: EngineStatus::Listening,
            detail: None,
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "listening");
        assert!(json["detail"].is_null());

        let round_trip: EngineStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, EngineStatus::Listening);
    }

    #[test]
    fn engine_status_rejects_non_lowercase_values() {
        assert!(serde_json::from_str::<EngineStatus>(r#""Listening""#).is_err());
    }
}
