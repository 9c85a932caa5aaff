//! # Stagelink
//!
//! Backoffice-driven session client for interactive installations.
//!
//! An installation (an animated character, a kiosk, a light wall) runs
//! unattended and is driven remotely by an operator console — the
//! "backoffice" — over one persistent socket. Stagelink owns that
//! socket: it dials, re-dials forever when the network drops, replays
//! the installation's registration and accumulated state after every
//! reconnect, routes operator commands to the UI, exchanges broadcasts
//! with sibling installations, and runs the remote-controlled audio
//! engine off the same connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stagelink::{Capability, ClientBuilder};
//!
//! # async fn run() {
//! let client = ClientBuilder::new("ws://192.168.10.1:3000").spawn();
//!
//! client.register(
//!     "aria",
//!     "ARIA",
//!     vec![Capability {
//!         id: "wave".into(),
//!         label: "Wave".into(),
//!         params: None,
//!     }],
//!     None,
//! );
//! client.on_command(|cmd| {
//!     println!("operator says: {}", cmd.action);
//! });
//! # }
//! ```
//!
//! All handle methods are fire-and-forget: faults in this layer are
//! logged, never thrown — the worst case is "control/audio temporarily
//! unresponsive until reconnect", never a crash.

mod client;
mod dispatch;

pub use client::{ClientBuilder, StagelinkClient};
pub use stagelink_audio::{
    AudioStatus, ConfigUpdate, NullOutput, RodioOutput,
};
pub use stagelink_protocol::{
    Capability, Command, PeerMessage, Registration,
};
pub use stagelink_session::ReconnectConfig;
