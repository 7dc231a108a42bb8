//! Public WebSocket protocol (serde ready): the VOP host messages plus the
//! widget/media event stream inbound, and VOP notifications plus presentation
//! directives outbound. Keep this small and stable so the presentation layer
//! and the core can evolve independently.
//!
//! VOP message types and their fields keep the convention's camelCase names;
//! everything player-internal uses snake_case tags like the rest of the API.

use serde::{Deserialize, Serialize};

use crate::config::PlayerMetadata;
use crate::responses::ResponseEvent;

/// `unitState.unitStateDataType` of every state-changed notification.
pub const UNIT_STATE_DATA_TYPE: &str = "iqb-standard@1.0";

/// Messages the client (host page + presentation layer) sends over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  /// Host starts (or restarts) a session with a JSON-encoded unit definition.
  #[serde(rename = "vopStartCommand")]
  VopStartCommand {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "unitDefinition")]
    unit_definition: String,
  },
  /// Widget output: the full event batch for one user-visible change.
  Response { responses: Vec<ResponseEvent> },
  /// Media element callbacks for the currently loaded audio id.
  AudioReady { id: String },
  AudioEnded { id: String },
  AudioPaused {
    id: String,
    #[serde(default)]
    percent: u32,
  },
  /// User pressed the audio play button.
  PlayRequest { id: String },
  ContinueClick,
  /// First user gesture (click-layer click or any widget interaction).
  FirstInteraction,
  /// The video widget reports its own ended event.
  VideoEnded,
  WindowFocus { focused: bool },
}

/// Messages the player core sends back over WebSocket.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  /// Sent exactly once at connect, before any start command.
  #[serde(rename = "vopReadyNotification")]
  VopReadyNotification { metadata: PlayerMetadata },
  /// Sent on every response-store append, carrying the entire log.
  #[serde(rename = "vopStateChangedNotification")]
  VopStateChangedNotification {
    #[serde(rename = "unitState")]
    unit_state: UnitState,
  },
  #[serde(rename = "vopWindowFocusChangedNotification")]
  VopWindowFocusChangedNotification {
    #[serde(rename = "hasFocus")]
    has_focus: bool,
  },

  // Presentation directives.
  ContinueVisibility { visible: bool },
  LoadAudio { id: String, source: String },
  PlayAudio {
    id: String,
    #[serde(rename = "seekToStart")]
    seek_to_start: bool,
  },
  PauseAudio { id: String },
  ClickLayer { visible: bool },
  InteractionLock { locked: bool },
  ShowOpeningImage { source: String },
  HideOpeningImage,
  /// "Start moving" idle cue for the audio button.
  AnimateAudioButton,
  /// 200ms clicked flash on the continue button.
  ContinueFlash,
  /// The only way the core triggers advancement to the next item.
  Navigate,
  Error { message: String },
}

/// Accumulated unit state as published to the host.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct UnitState {
  #[serde(rename = "unitStateDataType")]
  pub unit_state_data_type: String,
  #[serde(rename = "dataParts")]
  pub data_parts: DataParts,
  #[serde(rename = "responseProgress")]
  pub response_progress: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DataParts {
  /// JSON-stringified `ResponseEvent[]` (the full log, not a delta).
  pub responses: String,
}

impl UnitState {
  pub fn from_log(log: &[ResponseEvent]) -> Self {
    Self {
      unit_state_data_type: UNIT_STATE_DATA_TYPE.to_string(),
      data_parts: DataParts {
        responses: serde_json::to_string(log).unwrap_or_else(|_| "[]".to_string()),
      },
      response_progress: "complete".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn start_command_parses_with_vop_names() {
    let raw = r#"{
      "type": "vopStartCommand",
      "sessionId": "s-1",
      "unitDefinition": "{\"interactionType\":\"BUTTONS\"}"
    }"#;
    match serde_json::from_str::<ClientWsMessage>(raw).expect("parse") {
      ClientWsMessage::VopStartCommand { session_id, unit_definition } => {
        assert_eq!(session_id, "s-1");
        assert!(unit_definition.contains("BUTTONS"));
      }
      other => panic!("unexpected message: {other:?}"),
    }
  }

  #[test]
  fn widget_events_use_snake_case_tags() {
    let raw = r#"{"type": "audio_paused", "id": "MainAudio", "percent": 30}"#;
    match serde_json::from_str::<ClientWsMessage>(raw).expect("parse") {
      ClientWsMessage::AudioPaused { id, percent } => {
        assert_eq!(id, "MainAudio");
        assert_eq!(percent, 30);
      }
      other => panic!("unexpected message: {other:?}"),
    }
  }

  #[test]
  fn state_changed_notification_carries_the_stringified_log() {
    let log = vec![ResponseEvent::value_changed("v1", json!("a"))];
    let msg = ServerWsMessage::VopStateChangedNotification { unit_state: UnitState::from_log(&log) };
    let out = serde_json::to_string(&msg).expect("json");
    assert!(out.contains("vopStateChangedNotification"));
    assert!(out.contains("unitStateDataType"));
    assert!(out.contains("responseProgress"));
    // dataParts.responses is itself a JSON string.
    let v: serde_json::Value = serde_json::from_str(&out).expect("json");
    let inner = v["unitState"]["dataParts"]["responses"].as_str().expect("string");
    let parsed: Vec<ResponseEvent> = serde_json::from_str(inner).expect("inner json");
    assert_eq!(parsed[0].id, "v1");
  }
}
