//! Minimal installation wiring: register with the backoffice, log
//! operator commands, mirror a bit of state, let the audio engine run.
//!
//! Run against a backoffice on the local network:
//!
//! ```text
//! STAGELINK_URL=ws://192.168.10.1:3000 cargo run -p installation
//! ```

use std::collections::HashMap;

use serde_json::json;
use stagelink::{Capability, ClientBuilder, RodioOutput};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let url = std::env::var("STAGELINK_URL")
        .unwrap_or_else(|_| "ws://192.168.10.1:3000".to_string());

    let mut builder = ClientBuilder::new(&url);

    // The output stream must outlive every sound; keep it in main.
    let _stream = match RodioOutput::try_default() {
        Ok((output, stream)) => {
            builder = builder.audio_output(Box::new(output));
            Some(stream)
        }
        Err(e) => {
            tracing::warn!(error = %e, "running without audio");
            None
        }
    };

    let client = builder.spawn();

    client.register(
        "aria",
        "ARIA",
        vec![
            Capability {
                id: "wave".into(),
                label: "Wave".into(),
                params: None,
            },
            Capability {
                id: "say".into(),
                label: "Say a line".into(),
                params: Some(vec!["text".into()]),
            },
        ],
        Some("character".into()),
    );

    {
        let state = client.clone();
        client.on_command(move |cmd| {
            tracing::info!(action = %cmd.action, payload = ?cmd.payload, "command");
            state.update_state(HashMap::from([(
                "lastCommand".to_string(),
                json!(cmd.action),
            )]));
        });
    }

    client.on_message(|msg| {
        if msg.from != "aria" {
            tracing::info!(from = %msg.from, kind = %msg.kind, "peer message");
        }
    });

    client.on_connect(|| tracing::info!("backoffice link up"));
    client.on_disconnect(|| tracing::warn!("backoffice link down"));

    client.send_event("boot", json!({ "version": env!("CARGO_PKG_VERSION") }));

    tokio::signal::ctrl_c().await.expect("ctrl-c handler");
    client.shutdown();
}
