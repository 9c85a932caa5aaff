//! Session state and reconnect policy for Stagelink.
//!
//! This crate owns the two things that must survive a dropped
//! connection:
//!
//! 1. **Replayable state** ([`SessionState`]) — the registration
//!    descriptor and the accumulated application-state snapshot, both of
//!    which the client retransmits after every successful reconnect.
//! 2. **Reconnect policy** ([`Backoff`], [`ReconnectConfig`]) — how long
//!    to wait between dial attempts. Retries are unbounded; only the
//!    delay between them is shaped.
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)  ← drives the dial loop, replays state on connect
//!     ↕
//! Session Layer (this crate)  ← remembers what to replay, paces retries
//!     ↕
//! Protocol Layer (below)  ← provides Registration and the event types
//! ```

mod backoff;
mod state;

pub use backoff::{Backoff, ReconnectConfig};
pub use state::SessionState;
