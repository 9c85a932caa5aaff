//! The audio engine: keyed voice ownership, bus arithmetic, telemetry.
//!
//! One engine per installation, owned by the client's supervisor task.
//! All methods are synchronous — media delivery happens inside the
//! output backend — and none of them can fail from the caller's point
//! of view: playback faults are logged and swallowed.
//!
//! # Replace, don't stack
//!
//! Each ambient id and each preset slot holds at most one live voice.
//! Starting a new playback under an occupied key first tears the old
//! voice down, then installs the new one. This is the engine's only
//! cancellation primitive.

use std::collections::HashMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use stagelink_protocol::PresetProgress;

use crate::{
    AudioConfig, AudioOutput, ConfigUpdate, MediaSource, PlaybackSpec,
    Voice,
};

/// Path fragment under the content base URL for ambient files.
const AMBIENT_PATH: &str = "audio/ambient";
/// Path fragment under the content base URL for preset files.
const PRESET_PATH: &str = "audio/presets";
/// MIME type assumed for speech clips that don't declare one.
const DEFAULT_SPEECH_MIME: &str = "audio/mpeg";

/// Effective gain for one voice: category bus × master, capped at 1.
fn effective(category: f32, master: f32) -> f32 {
    (category * master).min(1.0)
}

/// A point-in-time snapshot of the engine, for diagnostics and the
/// operator console.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStatus {
    pub enabled: bool,
    pub master_volume: f32,
    pub speech_volume: f32,
    pub ambient_volume: f32,
    /// Ids of live ambient voices.
    pub active_ambients: Vec<String>,
    /// Slots of live preset voices.
    pub active_presets: Vec<u32>,
}

/// The audio engine. See the [crate docs](crate) for the model.
pub struct AudioEngine {
    output: Box<dyn AudioOutput>,
    /// Content base URL that ambient/preset filenames resolve against.
    base_url: String,
    config: AudioConfig,

    master_volume: f32,
    speech_volume: f32,
    ambient_volume: f32,

    ambients: HashMap<String, Box<dyn Voice>>,
    presets: HashMap<u32, Box<dyn Voice>>,
    speech: Option<Box<dyn Voice>>,
}

impl AudioEngine {
    /// Creates an engine over the given output backend.
    ///
    /// `base_url` is the backoffice content root; ambient and preset
    /// filenames resolve against it.
    pub fn new(output: Box<dyn AudioOutput>, base_url: &str) -> Self {
        Self {
            output,
            base_url: base_url.trim_end_matches('/').to_string(),
            config: AudioConfig::default(),
            master_volume: 1.0,
            speech_volume: 1.0,
            ambient_volume: 1.0,
            ambients: HashMap::new(),
            presets: HashMap::new(),
            speech: None,
        }
    }

    /// Whether playback is currently enabled.
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Applies a partial configuration change.
    ///
    /// Disabling implies [`stop_all`](Self::stop_all).
    pub fn configure(&mut self, update: ConfigUpdate) {
        if let Some(enabled) = update.enabled {
            self.config.enabled = enabled;
        }
        if let Some(debug) = update.debug {
            self.config.debug = debug;
        }
        if update.enabled == Some(false) {
            self.stop_all();
        }
    }

    /// Enables playback. The facade re-announces audio availability to
    /// the backoffice when this flips.
    pub fn enable(&mut self) {
        self.config.enabled = true;
    }

    /// Disables playback and stops every live voice.
    pub fn disable(&mut self) {
        self.config.enabled = false;
        self.stop_all();
    }

    /// Current engine snapshot.
    pub fn status(&self) -> AudioStatus {
        AudioStatus {
            enabled: self.config.enabled,
            master_volume: self.master_volume,
            speech_volume: self.speech_volume,
            ambient_volume: self.ambient_volume,
            active_ambients: self.ambients.keys().cloned().collect(),
            active_presets: self.presets.keys().copied().collect(),
        }
    }

    // =====================================================================
    // Ambients
    // =====================================================================

    /// Starts (or replaces) a looping ambient sound.
    ///
    /// An explicit `volume` overrides the ambient bus for the initial
    /// gain; any later bus change re-applies bus × master to every
    /// ambient.
    pub fn play_ambient(
        &mut self,
        sound_id: &str,
        file: &str,
        volume: Option<f32>,
    ) {
        if !self.config.enabled {
            return;
        }
        if let Some(previous) = self.ambients.remove(sound_id) {
            previous.stop();
        }

        let gain = effective(
            volume.unwrap_or(self.ambient_volume),
            self.master_volume,
        );
        let url =
            format!("{}/{}/{}", self.base_url, AMBIENT_PATH, file);
        if self.config.debug {
            tracing::debug!(sound_id, file, gain, "play ambient");
        }

        match self.output.start(PlaybackSpec {
            source: MediaSource::Url(url),
            looped: true,
            gain,
        }) {
            Ok(voice) => {
                self.ambients.insert(sound_id.to_string(), voice);
            }
            Err(e) => {
                tracing::warn!(sound_id, error = %e, "ambient start failed");
            }
        }
    }

    /// Stops one ambient sound, or all of them when `sound_id` is
    /// `None`.
    pub fn stop_ambient(&mut self, sound_id: Option<&str>) {
        match sound_id {
            Some(id) => {
                if let Some(voice) = self.ambients.remove(id) {
                    voice.stop();
                    if self.config.debug {
                        tracing::debug!(sound_id = id, "stop ambient");
                    }
                }
            }
            None => {
                for (_, voice) in self.ambients.drain() {
                    voice.stop();
                }
                if self.config.debug {
                    tracing::debug!("stop all ambients");
                }
            }
        }
    }

    /// Sets the ambient bus volume and re-applies it to every live
    /// ambient voice.
    pub fn set_ambient_volume(&mut self, volume: f32) {
        self.ambient_volume = volume;
        self.apply_ambient_gain();
    }

    /// Sets the gain of one live ambient voice. Transient: the next
    /// bus-wide change re-applies bus × master to it.
    pub fn set_ambient_voice_volume(&mut self, sound_id: &str, volume: f32) {
        if let Some(voice) = self.ambients.get(sound_id) {
            voice.set_gain(effective(volume, self.master_volume));
        }
    }

    // =====================================================================
    // Presets
    // =====================================================================

    /// Starts (or replaces) playback in a preset slot at speech-bus
    /// gain. Progress telemetry for the slot begins with the next
    /// [`poll_progress`](Self::poll_progress).
    pub fn play_preset(&mut self, slot: u32, file: &str) {
        if !self.config.enabled {
            return;
        }
        if let Some(previous) = self.presets.remove(&slot) {
            previous.stop();
        }

        let gain = effective(self.speech_volume, self.master_volume);
        let url = format!("{}/{}/{}", self.base_url, PRESET_PATH, file);
        if self.config.debug {
            tracing::debug!(slot, file, gain, "play preset");
        }

        match self.output.start(PlaybackSpec {
            source: MediaSource::Url(url),
            looped: false,
            gain,
        }) {
            Ok(voice) => {
                self.presets.insert(slot, voice);
            }
            Err(e) => {
                tracing::warn!(slot, error = %e, "preset start failed");
            }
        }
    }

    /// Pauses a preset slot. No-op if the slot has no live voice.
    pub fn pause_preset(&mut self, slot: u32) {
        if let Some(voice) = self.presets.get(&slot) {
            voice.pause();
        }
    }

    /// Resumes a paused preset slot. No-op if the slot has no live
    /// voice.
    pub fn resume_preset(&mut self, slot: u32) {
        if let Some(voice) = self.presets.get(&slot) {
            voice.resume();
        }
    }

    /// Seeks a preset slot to `seconds` from the start. No-op if the
    /// slot has no live voice or the position is not a finite,
    /// non-negative number.
    pub fn seek_preset(&mut self, slot: u32, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            return;
        }
        if let Some(voice) = self.presets.get(&slot) {
            voice.seek(Duration::from_secs_f64(seconds));
        }
    }

    /// Stops a preset slot: position back to zero, voice released.
    /// No-op if the slot has no live voice.
    pub fn stop_preset(&mut self, slot: u32) {
        if let Some(voice) = self.presets.remove(&slot) {
            voice.seek(Duration::ZERO);
            voice.stop();
            if self.config.debug {
                tracing::debug!(slot, "stop preset");
            }
        }
    }

    // =====================================================================
    // Speech clips
    // =====================================================================

    /// Plays an inline speech clip at speech-bus gain, replacing any
    /// clip still playing. The voice is released automatically when it
    /// completes.
    pub fn play_speech_clip(
        &mut self,
        audio_base64: &str,
        mime_type: Option<&str>,
    ) {
        if !self.config.enabled {
            return;
        }

        let bytes = match BASE64.decode(audio_base64) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "speech clip payload undecodable");
                return;
            }
        };

        if let Some(previous) = self.speech.take() {
            previous.stop();
        }

        let gain = effective(self.speech_volume, self.master_volume);
        let mime = mime_type.unwrap_or(DEFAULT_SPEECH_MIME);
        if self.config.debug {
            tracing::debug!(bytes = bytes.len(), mime, "play speech clip");
        }

        match self.output.start(PlaybackSpec {
            source: MediaSource::Inline {
                bytes,
                mime: Some(mime.to_string()),
            },
            looped: false,
            gain,
        }) {
            Ok(voice) => self.speech = Some(voice),
            Err(e) => {
                tracing::warn!(error = %e, "speech clip start failed");
            }
        }
    }

    // =====================================================================
    // Buses
    // =====================================================================

    /// Sets the master bus and re-applies effective gain to every live
    /// voice in every category.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume;
        self.apply_ambient_gain();
        self.apply_speech_gain();
    }

    /// Sets the speech bus and re-applies effective gain to presets and
    /// the speech clip.
    pub fn set_speech_volume(&mut self, volume: f32) {
        self.speech_volume = volume;
        self.apply_speech_gain();
    }

    fn apply_ambient_gain(&self) {
        let gain = effective(self.ambient_volume, self.master_volume);
        for voice in self.ambients.values() {
            voice.set_gain(gain);
        }
    }

    fn apply_speech_gain(&self) {
        let gain = effective(self.speech_volume, self.master_volume);
        for voice in self.presets.values() {
            voice.set_gain(gain);
        }
        if let Some(voice) = &self.speech {
            voice.set_gain(gain);
        }
    }

    // =====================================================================
    // Lifecycle
    // =====================================================================

    /// Stops and releases every live voice across all categories.
    pub fn stop_all(&mut self) {
        for (_, voice) in self.ambients.drain() {
            voice.stop();
        }
        for (_, voice) in self.presets.drain() {
            voice.stop();
        }
        if let Some(voice) = self.speech.take() {
            voice.stop();
        }
        tracing::debug!("all audio stopped");
    }

    /// Resumes ambients that the platform auto-paused while the hosting
    /// surface was hidden. Presets stay paused — pausing them may have
    /// been an operator decision.
    pub fn on_visible(&mut self) {
        for voice in self.ambients.values() {
            if voice.is_paused() {
                voice.resume();
            }
        }
    }

    /// Collects progress telemetry and reaps completed voices.
    ///
    /// Call on a regular cadence (the supervisor uses its progress
    /// interval). Returns one report per playing preset, plus one
    /// terminal `ended` report per preset that completed since the last
    /// poll; completed presets and speech clips are released here.
    pub fn poll_progress(&mut self) -> Vec<PresetProgress> {
        let mut reports = Vec::new();
        let mut completed = Vec::new();

        for (&slot, voice) in &self.presets {
            let duration = voice
                .duration()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            if voice.is_finished() {
                reports.push(PresetProgress {
                    preset_idx: slot,
                    current_time: duration,
                    duration,
                    ended: true,
                });
                completed.push(slot);
            } else if !voice.is_paused() {
                reports.push(PresetProgress {
                    preset_idx: slot,
                    current_time: voice.position().as_secs_f64(),
                    duration,
                    ended: false,
                });
            }
        }

        for slot in completed {
            if let Some(voice) = self.presets.remove(&slot) {
                voice.stop();
            }
        }

        // Speech clips release silently on completion.
        if self
            .speech
            .as_ref()
            .is_some_and(|voice| voice.is_finished())
        {
            if let Some(voice) = self.speech.take() {
                voice.stop();
            }
        }

        reports
    }
}

// =========================================================================
// Tests
// =========================================================================
