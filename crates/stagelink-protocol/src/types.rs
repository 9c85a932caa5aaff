//! Core protocol types for Stagelink's wire format.
//!
//! Every exchange with the backoffice is one JSON frame of the shape
//! `{"event": <name>, "data": <payload>}`. The two enums below capture the
//! full event vocabulary, one variant per named event: [`ClientEvent`] for
//! everything the installation emits, [`ServerEvent`] for everything the
//! backoffice can send. The `#[serde(tag = "event", content = "data")]`
//! attributes produce exactly that frame shape.
//!
//! Field names on the wire are camelCase (`displayName`, `presetIdx`);
//! the serde renames keep the Rust side idiomatic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// One operator-invokable action advertised during registration.
///
/// The backoffice renders these as buttons on the operator console;
/// `params` names the free-form arguments the operator can attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<String>>,
}

/// The registration descriptor for an installation.
///
/// Immutable once set for a session; the session layer holds on to it and
/// replays it verbatim after every reconnect, so the backoffice always
/// knows who came back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Stable identity of this installation (e.g. `"aria"`).
    pub identity: String,
    /// Human-readable name shown on the operator console.
    pub display_name: String,
    /// Actions the operator can trigger, in display order.
    pub capabilities: Vec<Capability>,
    /// Optional role tag for grouping sibling installations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

// ---------------------------------------------------------------------------
// Commands and peer messages
// ---------------------------------------------------------------------------

/// An operator command routed to the installation's command handler.
///
/// The payload shape is not validated here — the protocol only guarantees
/// "a named action with a key/value payload". Whatever handler the UI
/// installed owns the interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: String,
    #[serde(default)]
    pub payload: HashMap<String, Value>,
}

/// A broadcast message exchanged between sibling installations.
///
/// Delivery is a plain fan-out: every subscriber on the channel receives
/// every message, including the sender. Receivers compare `from` against
/// their own identity to skip their own broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerMessage {
    /// Identity of the sending installation.
    pub from: String,
    /// Application-defined message type (e.g. `"dilemma-shown"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Application-defined payload.
    #[serde(default)]
    pub data: Value,
}

// ---------------------------------------------------------------------------
// Audio telemetry
// ---------------------------------------------------------------------------

/// Playback progress for one preset slot, reported to the backoffice on a
/// regular cadence while the preset plays.
///
/// The final report of a playback carries `ended: true` together with the
/// clip duration in both time fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetProgress {
    pub preset_idx: u32,
    /// Current playback position, seconds.
    pub current_time: f64,
    /// Total clip duration, seconds (0 while still unknown).
    pub duration: f64,
    /// Present (and true) only on the terminal report.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ended: bool,
}

// ---------------------------------------------------------------------------
// ClientEvent — installation → backoffice
// ---------------------------------------------------------------------------

/// Every event the installation can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Announce identity and capabilities. Sent on first registration and
    /// re-sent on every reconnect.
    #[serde(rename = "register")]
    Register(Registration),

    /// The full accumulated application-state snapshot — never a delta,
    /// so the backoffice can recover from any number of missed updates.
    #[serde(rename = "state_update")]
    StateUpdate { state: HashMap<String, Value> },

    /// Arbitrary domain telemetry (a dilemma response, an intro-lifecycle
    /// marker).
    #[serde(rename = "event")]
    Telemetry { name: String, data: Value },

    /// Broadcast to sibling installations.
    #[serde(rename = "game-message")]
    PeerBroadcast(PeerMessage),

    /// Announce that this installation can play audio. Re-sent after every
    /// reconnect so the backoffice re-enables its audio console.
    #[serde(rename = "register-audio-player")]
    RegisterAudioPlayer {},

    /// Preset playback telemetry.
    #[serde(rename = "audio:preset-progress")]
    PresetProgress(PresetProgress),
}

// ---------------------------------------------------------------------------
// ServerEvent — backoffice → installation
// ---------------------------------------------------------------------------

/// Every event the backoffice can send.
///
/// The `Unknown` variant absorbs event names this client doesn't know, so
/// a newer backoffice can never kill the read loop; the payload is
/// discarded and the frame is logged and dropped by the session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// An operator command for the installation's command handler.
    #[serde(rename = "command")]
    Command(Command),

    /// A broadcast from a sibling installation (or our own echo).
    #[serde(rename = "game-message")]
    PeerBroadcast(PeerMessage),

    // -- Ambient playback --
    /// Start (or replace) a looping ambient sound.
    #[serde(rename = "audio:play-ambient", rename_all = "camelCase")]
    PlayAmbient {
        sound_id: String,
        file: String,
        #[serde(default)]
        volume: Option<f32>,
    },

    /// Stop one ambient sound, or all of them when `sound_id` is omitted.
    #[serde(rename = "audio:stop-ambient", rename_all = "camelCase")]
    StopAmbient {
        #[serde(default)]
        sound_id: Option<String>,
    },

    /// Set the ambient bus volume.
    #[serde(rename = "audio:volume-ambient")]
    AmbientVolume { volume: f32 },

    /// Set the volume of one live ambient sound.
    #[serde(rename = "audio:set-ambient-volume", rename_all = "camelCase")]
    SetAmbientVolume { sound_id: String, volume: f32 },

    // -- Preset playback --
    /// Start (or replace) playback in a preset slot.
    #[serde(rename = "audio:play-preset", rename_all = "camelCase")]
    PlayPreset { preset_idx: u32, file: String },

    /// Pause a preset slot.
    #[serde(rename = "audio:pause-preset", rename_all = "camelCase")]
    PausePreset { preset_idx: u32 },

    /// Resume a paused preset slot.
    #[serde(rename = "audio:resume-preset", rename_all = "camelCase")]
    ResumePreset { preset_idx: u32 },

    /// Seek a preset slot to a position (seconds).
    #[serde(rename = "audio:seek-preset", rename_all = "camelCase")]
    SeekPreset { preset_idx: u32, current_time: f64 },

    /// Stop a preset slot and release its resource.
    #[serde(rename = "audio:stop-preset", rename_all = "camelCase")]
    StopPreset { preset_idx: u32 },

    // -- Speech clips --
    /// Play an inline speech clip, replacing any clip still playing.
    #[serde(rename = "audio:play-tts", rename_all = "camelCase")]
    PlaySpeechClip {
        audio_base64: String,
        #[serde(default)]
        mime_type: Option<String>,
    },

    // -- Volume buses --
    /// Set the master bus volume.
    #[serde(rename = "audio:master-volume")]
    MasterVolume { volume: f32 },

    /// Set the speech bus volume (presets + speech clips).
    #[serde(rename = "audio:volume-ia")]
    SpeechVolume { volume: f32 },

    /// Stop and release every live audio resource.
    #[serde(rename = "audio:stop-all")]
    StopAll {},

    /// Any event name this client doesn't recognize.
    #[serde(other)]
    Unknown,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Tests for protocol types and their JSON frame shapes.
    //!
    //! The backoffice protocol fixes exact event names and camelCase
    //! payload keys. These tests verify that the serde attributes produce
    //! the correct frames, because a mismatch means the operator console
    //! can't talk to the installation.

    use super::*;
    use serde_json::json;

    // =====================================================================
    // Registration
    // =====================================================================

    #[test]
    fn test_register_frame_uses_camel_case_keys() {
        let event = ClientEvent::Register(Registration {
            identity: "aria".into(),
            display_name: "ARIA".into(),
            capabilities: vec![Capability {
                id: "wave".into(),
                label: "Wave".into(),
                params: None,
            }],
            role: Some("character".into()),
        });
        let frame: Value = serde_json::to_value(&event).unwrap();

        assert_eq!(frame["event"], "register");
        assert_eq!(frame["data"]["identity"], "aria");
        assert_eq!(frame["data"]["displayName"], "ARIA");
        assert_eq!(frame["data"]["capabilities"][0]["id"], "wave");
        assert_eq!(frame["data"]["role"], "character");
    }

    #[test]
    fn test_register_omits_absent_role_and_params() {
        // Optional fields must be absent, not null — the backoffice
        // treats `"role": null` differently from no role at all.
        let event = ClientEvent::Register(Registration {
            identity: "aria".into(),
            display_name: "ARIA".into(),
            capabilities: vec![Capability {
                id: "wave".into(),
                label: "Wave".into(),
                params: None,
            }],
            role: None,
        });
        let frame: Value = serde_json::to_value(&event).unwrap();

        assert!(frame["data"].get("role").is_none());
        assert!(frame["data"]["capabilities"][0].get("params").is_none());
    }

    // =====================================================================
    // State updates and telemetry
    // =====================================================================

    #[test]
    fn test_state_update_frame_wraps_snapshot_in_state_key() {
        let mut state = HashMap::new();
        state.insert("scene".to_string(), json!("intro"));
        let event = ClientEvent::StateUpdate { state };
        let frame: Value = serde_json::to_value(&event).unwrap();

        assert_eq!(frame["event"], "state_update");
        assert_eq!(frame["data"]["state"]["scene"], "intro");
    }

    #[test]
    fn test_telemetry_frame_shape() {
        let event = ClientEvent::Telemetry {
            name: "dilemma-response".into(),
            data: json!({"choice": "b"}),
        };
        let frame: Value = serde_json::to_value(&event).unwrap();

        assert_eq!(frame["event"], "event");
        assert_eq!(frame["data"]["name"], "dilemma-response");
        assert_eq!(frame["data"]["data"]["choice"], "b");
    }

    #[test]
    fn test_register_audio_player_frame_has_empty_data() {
        let event = ClientEvent::RegisterAudioPlayer {};
        let frame: Value = serde_json::to_value(&event).unwrap();

        assert_eq!(frame["event"], "register-audio-player");
        assert_eq!(frame["data"], json!({}));
    }

    // =====================================================================
    // Preset progress
    // =====================================================================

    #[test]
    fn test_preset_progress_frame_uses_camel_case() {
        let event = ClientEvent::PresetProgress(PresetProgress {
            preset_idx: 2,
            current_time: 1.5,
            duration: 30.0,
            ended: false,
        });
        let frame: Value = serde_json::to_value(&event).unwrap();

        assert_eq!(frame["event"], "audio:preset-progress");
        assert_eq!(frame["data"]["presetIdx"], 2);
        assert_eq!(frame["data"]["currentTime"], 1.5);
        assert_eq!(frame["data"]["duration"], 30.0);
    }

    #[test]
    fn test_preset_progress_omits_ended_unless_true() {
        let running = PresetProgress {
            preset_idx: 0,
            current_time: 1.0,
            duration: 2.0,
            ended: false,
        };
        let frame: Value = serde_json::to_value(&running).unwrap();
        assert!(frame.get("ended").is_none());

        let terminal = PresetProgress { ended: true, ..running };
        let frame: Value = serde_json::to_value(&terminal).unwrap();
        assert_eq!(frame["ended"], true);
    }

    // =====================================================================
    // Inbound events
    // =====================================================================

    #[test]
    fn test_command_decodes_action_and_payload() {
        let frame = json!({
            "event": "command",
            "data": {"action": "show-dilemma", "payload": {"id": 3}}
        });
        let event: ServerEvent = serde_json::from_value(frame).unwrap();

        let ServerEvent::Command(cmd) = event else {
            panic!("expected Command, got {event:?}");
        };
        assert_eq!(cmd.action, "show-dilemma");
        assert_eq!(cmd.payload["id"], 3);
    }

    #[test]
    fn test_command_payload_defaults_to_empty() {
        // Commands without arguments arrive with no payload key at all.
        let frame = json!({
            "event": "command",
            "data": {"action": "wave"}
        });
        let event: ServerEvent = serde_json::from_value(frame).unwrap();

        let ServerEvent::Command(cmd) = event else {
            panic!("expected Command");
        };
        assert!(cmd.payload.is_empty());
    }

    #[test]
    fn test_peer_message_round_trips_type_key() {
        // The wire key is `type`, which is reserved in Rust — check the
        // rename holds in both directions.
        let msg = PeerMessage {
            from: "aria".into(),
            kind: "dilemma-shown".into(),
            data: json!({"id": 7}),
        };
        let frame: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(frame["type"], "dilemma-shown");

        let back: PeerMessage = serde_json::from_value(frame).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_play_ambient_decodes_optional_volume() {
        let frame = json!({
            "event": "audio:play-ambient",
            "data": {"soundId": "rain", "file": "rain.ogg", "volume": 0.6}
        });
        let event: ServerEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(
            event,
            ServerEvent::PlayAmbient {
                sound_id: "rain".into(),
                file: "rain.ogg".into(),
                volume: Some(0.6),
            }
        );

        let frame = json!({
            "event": "audio:play-ambient",
            "data": {"soundId": "rain", "file": "rain.ogg"}
        });
        let event: ServerEvent = serde_json::from_value(frame).unwrap();
        let ServerEvent::PlayAmbient { volume, .. } = event else {
            panic!("expected PlayAmbient");
        };
        assert_eq!(volume, None);
    }

    #[test]
    fn test_stop_ambient_sound_id_is_optional() {
        // Omitted soundId means "stop every ambient".
        let frame = json!({"event": "audio:stop-ambient", "data": {}});
        let event: ServerEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(event, ServerEvent::StopAmbient { sound_id: None });
    }

    #[test]
    fn test_seek_preset_decodes_camel_case_fields() {
        let frame = json!({
            "event": "audio:seek-preset",
            "data": {"presetIdx": 1, "currentTime": 12.5}
        });
        let event: ServerEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(
            event,
            ServerEvent::SeekPreset { preset_idx: 1, current_time: 12.5 }
        );
    }

    #[test]
    fn test_play_speech_clip_defaults_mime_type() {
        let frame = json!({
            "event": "audio:play-tts",
            "data": {"audioBase64": "aGVsbG8="}
        });
        let event: ServerEvent = serde_json::from_value(frame).unwrap();
        let ServerEvent::PlaySpeechClip { audio_base64, mime_type } =
            event
        else {
            panic!("expected PlaySpeechClip");
        };
        assert_eq!(audio_base64, "aGVsbG8=");
        assert_eq!(mime_type, None);
    }

    #[test]
    fn test_stop_all_decodes_empty_data() {
        let frame = json!({"event": "audio:stop-all", "data": {}});
        let event: ServerEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(event, ServerEvent::StopAll {});
    }

    // =====================================================================
    // Error cases — unknown and malformed input
    // =====================================================================

    #[test]
    fn test_unknown_event_name_decodes_to_unknown() {
        // A newer backoffice may send events this client has never heard
        // of; they must decode (to Unknown) instead of erroring, so the
        // read loop survives.
        let frame = json!({
            "event": "audio:spatialize",
            "data": {"x": 1.0, "y": 2.0}
        });
        let event: ServerEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(event, ServerEvent::Unknown);
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"not json at all";
        let result: Result<ServerEvent, _> =
            serde_json::from_slice(garbage);
        assert!(result.is_err());
    }

    #[test]
    fn test_known_event_with_malformed_payload_returns_error() {
        // Known event name, wrong payload shape — this is a decode error
        // (logged and dropped upstream), not a panic.
        let frame = json!({
            "event": "audio:play-preset",
            "data": {"presetIdx": "not-a-number"}
        });
        let result: Result<ServerEvent, _> =
            serde_json::from_value(frame);
        assert!(result.is_err());
    }
}
