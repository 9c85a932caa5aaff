//! Error types for the audio layer.
//!
//! Playback faults never escalate past the engine: every variant here is
//! caught at the call site, logged, and turned into a silent no-op. The
//! worst a fault can do is leave the installation quiet until the next
//! play command.

/// Errors that can occur when starting playback.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No usable audio device (missing hardware, exclusive-mode lock).
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A voice could not be started on the output.
    #[error("playback start failed: {0}")]
    StartFailed(String),
}
