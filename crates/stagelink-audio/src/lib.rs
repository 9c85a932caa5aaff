//! Remote-driven audio engine for Stagelink installations.
//!
//! The backoffice mixes three categories of sound on the installation:
//!
//! - **Ambients** — looping background beds, keyed by an arbitrary id.
//! - **Presets** — seekable one-shot clips in numbered slots, with
//!   playback-progress telemetry back to the operator console.
//! - **Speech clips** — synthesized voice delivered inline as base64,
//!   one at a time.
//!
//! [`AudioEngine`] owns every live resource and the three volume buses
//! (master, speech, ambient). Actual playback goes through the
//! [`AudioOutput`] seam; [`RodioOutput`] is the real implementation and
//! tests script their own.
//!
//! # Ownership
//!
//! The engine exclusively owns the lifetime of every voice it starts:
//! a voice is torn down when explicitly stopped, when replaced by a new
//! playback under the same key, when it completes naturally, or when the
//! whole engine is stopped. Nothing outside the engine ever holds a
//! voice handle.

mod config;
mod engine;
mod error;
mod output;
mod playback;

pub use config::{AudioConfig, ConfigUpdate};
pub use engine::{AudioEngine, AudioStatus};
pub use error::AudioError;
pub use output::{AudioOutput, MediaSource, NullOutput, PlaybackSpec, Voice};
pub use playback::RodioOutput;
