//! The output seam: what the engine needs from an audio backend.
//!
//! The engine's logic (keyed ownership, bus arithmetic, telemetry) is
//! independent of how sound actually reaches a device. [`AudioOutput`]
//! starts playbacks; each running playback is a [`Voice`] the engine
//! controls and eventually tears down. [`RodioOutput`](crate::RodioOutput)
//! is the production implementation; tests substitute a scripted one.

use std::time::Duration;

use crate::AudioError;

/// Where the sound data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Fetch from a URL (ambient and preset files served by the
    /// backoffice's content server).
    Url(String),
    /// Inline bytes, already decoded from the wire (speech clips).
    Inline {
        bytes: Vec<u8>,
        /// Advisory MIME type; the decoder sniffs the container anyway.
        mime: Option<String>,
    },
}

/// Everything needed to start one playback.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSpec {
    pub source: MediaSource,
    /// Loop forever (ambients) or play once (presets, speech).
    pub looped: bool,
    /// Initial effective gain in `[0, 1]`.
    pub gain: f32,
}

/// An audio backend that can start playbacks.
pub trait AudioOutput: Send + 'static {
    /// Starts a playback and returns its control handle.
    ///
    /// Must not block on media delivery: implementations fetch and
    /// decode in the background and the voice reports
    /// [`finished`](Voice::is_finished) if that fails.
    ///
    /// # Errors
    /// Returns an error only for synchronous start failures (no device,
    /// output refused). The engine logs these and registers no resource.
    fn start(&self, spec: PlaybackSpec) -> Result<Box<dyn Voice>, AudioError>;
}

/// An [`AudioOutput`] that refuses every playback.
///
/// For headless installations and session-layer tests that run without
/// a sound device: every play is the same logged no-op as a missing
/// device would produce.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn start(
        &self,
        _spec: PlaybackSpec,
    ) -> Result<Box<dyn Voice>, AudioError> {
        Err(AudioError::DeviceUnavailable(
            "no audio output configured".into(),
        ))
    }
}

/// A live playback under exclusive engine ownership.
///
/// All methods are infallible from the engine's point of view:
/// implementations log internal failures and carry on.
pub trait Voice: Send {
    /// Re-applies the effective gain without interrupting playback.
    fn set_gain(&self, gain: f32);

    /// Pauses playback, keeping the position.
    fn pause(&self);

    /// Resumes a paused playback.
    fn resume(&self);

    /// Seeks to a position from the start of the clip.
    fn seek(&self, position: Duration);

    /// Current playback position.
    fn position(&self) -> Duration;

    /// Total clip duration, once known (streams report `None` until the
    /// media is decoded).
    fn duration(&self) -> Option<Duration>;

    /// Whether the voice is currently paused.
    fn is_paused(&self) -> bool;

    /// Whether playback has run to completion (or failed to deliver any
    /// media, which the engine treats the same way).
    fn is_finished(&self) -> bool;

    /// Stops playback and releases the underlying output resources.
    fn stop(&self);
}
