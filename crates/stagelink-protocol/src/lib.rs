//! Wire protocol for Stagelink.
//!
//! This crate defines the "language" that the installation and the
//! backoffice speak:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`Command`], etc.) —
//!   the named events that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those events are
//!   converted to/from frames.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and session
//! (registration, state replay). It doesn't know about connections or
//! retries — it only knows how to serialize and deserialize events.
//!
//! ```text
//! Transport (frames) → Protocol (events) → Session (replay, dispatch)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    Capability, ClientEvent, Command, PeerMessage, PresetProgress,
    Registration, ServerEvent,
};
