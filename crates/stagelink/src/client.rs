//! `StagelinkClient` handle, builder, and the supervisor task.
//!
//! One supervisor task per client owns everything that must stay
//! consistent: the connection, the session state, the handler registry,
//! and the audio engine. The public [`StagelinkClient`] is a cheap
//! cloneable handle that sends operations to the task over a channel —
//! so all mutation happens on a single control flow, operations are
//! processed in the order they were issued, and no caller ever blocks.
//!
//! The task's life is a loop over three phases:
//!
//! ```text
//!        ┌──────── idle (disconnect requested) ◄──────┐
//!        ▼                                            │
//!   dial ──ok──► replay ──► serve (select loop) ──drop┤
//!        │                                            │
//!        └──err──► backoff sleep ─────────────────────┘
//! ```
//!
//! Dialing retries forever with jittered backoff; the replay sequence
//! after every successful dial is: registration, a short grace delay,
//! the full state snapshot, the audio-player announcement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use stagelink_audio::{
    AudioEngine, AudioOutput, AudioStatus, ConfigUpdate, NullOutput,
};
use stagelink_protocol::{
    Capability, ClientEvent, Codec, JsonCodec, PeerMessage, Registration,
    ServerEvent,
};
use stagelink_session::{Backoff, ReconnectConfig, SessionState};
use stagelink_transport::{Connection, WebSocketConnection};

use crate::dispatch::{
    CommandHandler, Handlers, LifecycleHook, MessageHandler,
};

/// Default cadence for preset-progress telemetry.
const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and spawning a [`StagelinkClient`].
///
/// # Example
///
/// ```rust,no_run
/// use stagelink::ClientBuilder;
///
/// # async fn run() {
/// let client = ClientBuilder::new("ws://192.168.10.1:3000")
///     .content_base_url("http://192.168.10.1:3000")
///     .spawn();
/// # }
/// ```
pub struct ClientBuilder {
    url: String,
    content_base_url: Option<String>,
    reconnect: ReconnectConfig,
    auto_connect: bool,
    progress_interval: Duration,
    audio_output: Option<Box<dyn AudioOutput>>,
}

impl ClientBuilder {
    /// Creates a builder for the given backoffice `ws://` URL.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            content_base_url: None,
            reconnect: ReconnectConfig::default(),
            auto_connect: true,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            audio_output: None,
        }
    }

    /// Sets the content base URL that ambient/preset filenames resolve
    /// against. Defaults to the backoffice URL with an `http` scheme.
    pub fn content_base_url(mut self, url: &str) -> Self {
        self.content_base_url = Some(url.to_string());
        self
    }

    /// Sets the reconnect pacing.
    pub fn reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Whether to start dialing immediately on spawn (default) or wait
    /// for an explicit [`StagelinkClient::connect`].
    pub fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Sets the cadence of preset-progress telemetry.
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Sets the audio backend. Defaults to [`NullOutput`] (headless).
    pub fn audio_output(mut self, output: Box<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    /// Spawns the supervisor task and returns the client handle.
    ///
    /// Must be called from within a Tokio runtime. The task runs until
    /// [`shutdown`](StagelinkClient::shutdown) or until the last handle
    /// is dropped; either way it stops all audio on the way out.
    pub fn spawn(self) -> StagelinkClient {
        let content_base = self.content_base_url.unwrap_or_else(|| {
            // ws://host:port → http://host:port (wss → https)
            self.url
                .replacen("wss://", "https://", 1)
                .replacen("ws://", "http://", 1)
        });
        let output = self
            .audio_output
            .unwrap_or_else(|| Box::new(NullOutput));

        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let supervisor = Supervisor {
            url: self.url,
            codec: JsonCodec,
            session: SessionState::new(),
            backoff: Backoff::new(self.reconnect),
            handlers: Handlers::default(),
            audio: AudioEngine::new(output, &content_base),
            progress_interval: self.progress_interval,
            connected: Arc::clone(&connected),
            want_connected: self.auto_connect,
            shutdown: false,
        };
        tokio::spawn(supervisor.run(ops_rx));

        StagelinkClient {
            ops: ops_tx,
            connected,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running Stagelink client.
///
/// Cheap to clone; every method is fire-and-forget. See the
/// [crate docs](crate) for the overall model.
#[derive(Clone)]
pub struct StagelinkClient {
    ops: mpsc::UnboundedSender<Op>,
    connected: Arc<AtomicBool>,
}

impl StagelinkClient {
    /// Begins dialing if not already connected or dialing. Idempotent.
    pub fn connect(&self) {
        self.send_op(Op::Connect);
    }

    /// Disconnects and suppresses further auto-retry until the next
    /// [`connect`](Self::connect).
    pub fn disconnect(&self) {
        self.send_op(Op::Disconnect);
    }

    /// Whether the client currently holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Registers this installation with the backoffice.
    ///
    /// The descriptor is transmitted immediately if connected and
    /// replayed verbatim after every reconnect.
    pub fn register(
        &self,
        identity: &str,
        display_name: &str,
        capabilities: Vec<Capability>,
        role: Option<String>,
    ) {
        self.send_op(Op::Register(Registration {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            capabilities,
            role,
        }));
    }

    /// Merges `partial` into the accumulated state snapshot and
    /// transmits the full merged snapshot (never the partial).
    pub fn update_state(&self, partial: HashMap<String, Value>) {
        self.send_op(Op::UpdateState(partial));
    }

    /// Clears the state snapshot without transmitting. The next
    /// [`update_state`](Self::update_state) starts the merge fresh.
    pub fn reset_state(&self) {
        self.send_op(Op::ResetState);
    }

    /// Sends a named domain telemetry event. Best-effort: dropped with
    /// a debug log while disconnected.
    pub fn send_event(&self, name: &str, data: Value) {
        self.send_op(Op::SendEvent {
            name: name.to_string(),
            data,
        });
    }

    /// Broadcasts a message to sibling installations, tagged with this
    /// installation's identity. Receivers — including this one — get it
    /// via [`on_message`](Self::on_message) and self-filter on `from`.
    pub fn send_message(&self, kind: &str, data: Value) {
        self.send_op(Op::SendMessage {
            kind: kind.to_string(),
            data,
        });
    }

    /// Installs the command handler, replacing any previous one. Only
    /// one handler is ever active, so repeated setup/teardown cycles
    /// can't cause duplicate delivery.
    pub fn on_command(
        &self,
        handler: impl FnMut(stagelink_protocol::Command) + Send + 'static,
    ) {
        self.send_op(Op::OnCommand(Box::new(handler)));
    }

    /// Subscribes to peer broadcasts. Every subscriber receives every
    /// message on the channel, own broadcasts included.
    pub fn on_message(
        &self,
        handler: impl FnMut(PeerMessage) + Send + 'static,
    ) {
        self.send_op(Op::OnMessage(Box::new(handler)));
    }

    /// Adds a hook fired on every successful (re)connect, in
    /// subscription order.
    pub fn on_connect(&self, hook: impl FnMut() + Send + 'static) {
        self.send_op(Op::OnConnect(Box::new(hook)));
    }

    /// Adds a hook fired on every disconnect, in subscription order.
    pub fn on_disconnect(&self, hook: impl FnMut() + Send + 'static) {
        self.send_op(Op::OnDisconnect(Box::new(hook)));
    }

    /// Applies a partial audio configuration change. Disabling stops
    /// every live voice.
    pub fn configure_audio(&self, update: ConfigUpdate) {
        self.send_op(Op::ConfigureAudio(update));
    }

    /// Enables audio and re-announces the audio player to the
    /// backoffice.
    pub fn enable_audio(&self) {
        self.send_op(Op::EnableAudio);
    }

    /// Disables audio and stops every live voice.
    pub fn disable_audio(&self) {
        self.send_op(Op::DisableAudio);
    }

    /// Notifies the engine that the hosting surface became visible
    /// again; platform-paused ambients resume.
    pub fn surface_visible(&self) {
        self.send_op(Op::SurfaceVisible);
    }

    /// Snapshot of the audio engine. Returns `None` if the client has
    /// shut down.
    pub async fn audio_status(&self) -> Option<AudioStatus> {
        let (tx, rx) = oneshot::channel();
        self.ops.send(Op::AudioStatus(tx)).ok()?;
        rx.await.ok()
    }

    /// Stops the supervisor task: closes the connection and releases
    /// every audio resource.
    pub fn shutdown(&self) {
        self.send_op(Op::Shutdown);
    }

    fn send_op(&self, op: Op) {
        // The only way this fails is after shutdown — by design a
        // fire-and-forget no-op, like every other post-shutdown call.
        if self.ops.send(op).is_err() {
            tracing::debug!("operation ignored: client is shut down");
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Operations sent from the handle to the supervisor task.
enum Op {
    Connect,
    Disconnect,
    Shutdown,
    Register(Registration),
    UpdateState(HashMap<String, Value>),
    ResetState,
    SendEvent { name: String, data: Value },
    SendMessage { kind: String, data: Value },
    OnCommand(CommandHandler),
    OnMessage(MessageHandler),
    OnConnect(LifecycleHook),
    OnDisconnect(LifecycleHook),
    ConfigureAudio(ConfigUpdate),
    EnableAudio,
    DisableAudio,
    SurfaceVisible,
    AudioStatus(oneshot::Sender<AudioStatus>),
}

/// The state owned by the supervisor task.
struct Supervisor {
    url: String,
    codec: JsonCodec,
    session: SessionState,
    backoff: Backoff,
    handlers: Handlers,
    audio: AudioEngine,
    progress_interval: Duration,
    connected: Arc<AtomicBool>,
    /// True while the client should hold (or be dialing) a connection.
    want_connected: bool,
    shutdown: bool,
}

impl Supervisor {
    async fn run(mut self, mut ops: mpsc::UnboundedReceiver<Op>) {
        while !self.shutdown {
            if !self.want_connected {
                // Idle: nothing to dial, just process operations.
                let Some(op) = ops.recv().await else { break };
                self.handle_op(None, op).await;
                continue;
            }

            match WebSocketConnection::connect(&self.url).await {
                Ok(conn) => {
                    self.backoff.reset();
                    tracing::info!(
                        id = %conn.id(),
                        url = %self.url,
                        "connected to backoffice"
                    );
                    self.connected.store(true, Ordering::Release);
                    self.handlers.fire_connect();
                    self.replay(&conn).await;

                    self.serve(&conn, &mut ops).await;

                    self.connected.store(false, Ordering::Release);
                    self.handlers.fire_disconnect();
                    tracing::info!("disconnected from backoffice");

                    // Pace the redial after an unexpected drop, the
                    // same as after a failed dial.
                    if self.want_connected && !self.shutdown {
                        let delay = self.backoff.next_delay();
                        self.wait(delay, &mut ops).await;
                    }
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        attempt = self.backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "connect failed; retrying"
                    );
                    self.wait(delay, &mut ops).await;
                }
            }
        }

        // Teardown releases every audio resource.
        self.audio.stop_all();
        tracing::debug!("supervisor stopped");
    }

    /// Replays session state after a successful (re)connect:
    /// registration first, then — after a grace delay that lets the
    /// registration land server-side — the full snapshot, then the
    /// audio announcement.
    async fn replay(&mut self, conn: &WebSocketConnection) {
        if let Some(registration) = self.session.registration() {
            let event = ClientEvent::Register(registration.clone());
            self.transmit(conn, &event).await;

            if !self.session.snapshot().is_empty() {
                tokio::time::sleep(self.backoff.replay_grace()).await;
                let event = ClientEvent::StateUpdate {
                    state: self.session.snapshot().clone(),
                };
                self.transmit(conn, &event).await;
            }
        }

        if self.audio.enabled() {
            self.transmit(conn, &ClientEvent::RegisterAudioPlayer {})
                .await;
        }
    }

    /// The connected phase: one select loop over handle operations,
    /// inbound frames, and the progress interval. Returns when the
    /// connection drops or the client is asked to disconnect/shut down.
    async fn serve(
        &mut self,
        conn: &WebSocketConnection,
        ops: &mut mpsc::UnboundedReceiver<Op>,
    ) {
        let mut progress = tokio::time::interval(self.progress_interval);
        progress
            .set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_op = ops.recv() => {
                    match maybe_op {
                        Some(op) => self.handle_op(Some(conn), op).await,
                        None => {
                            self.shutdown = true;
                            return;
                        }
                    }
                    if self.shutdown || !self.want_connected {
                        return;
                    }
                }

                frame = conn.recv() => {
                    match frame {
                        Ok(Some(data)) => self.handle_frame(&data),
                        Ok(None) => {
                            tracing::info!(
                                "backoffice closed the connection"
                            );
                            return;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "receive failed");
                            return;
                        }
                    }
                }

                _ = progress.tick() => {
                    for report in self.audio.poll_progress() {
                        let event = ClientEvent::PresetProgress(report);
                        self.transmit(conn, &event).await;
                    }
                }
            }
        }
    }

    /// Sleeps out a backoff delay while still processing operations, so
    /// an explicit disconnect or shutdown cancels the retry.
    async fn wait(
        &mut self,
        delay: Duration,
        ops: &mut mpsc::UnboundedReceiver<Op>,
    ) {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return,
                maybe_op = ops.recv() => {
                    match maybe_op {
                        Some(op) => self.handle_op(None, op).await,
                        None => {
                            self.shutdown = true;
                            return;
                        }
                    }
                    if self.shutdown || !self.want_connected {
                        return;
                    }
                }
            }
        }
    }

    /// Applies one handle operation. `conn` is present only in the
    /// connected phase; operations that transmit fall back to local
    /// bookkeeping when it's absent.
    async fn handle_op(
        &mut self,
        conn: Option<&WebSocketConnection>,
        op: Op,
    ) {
        match op {
            Op::Connect => self.want_connected = true,

            Op::Disconnect => {
                self.want_connected = false;
                if let Some(conn) = conn {
                    let _ = conn.close().await;
                }
            }

            Op::Shutdown => {
                self.shutdown = true;
                if let Some(conn) = conn {
                    let _ = conn.close().await;
                }
            }

            Op::Register(registration) => {
                self.session.set_registration(registration.clone());
                if let Some(conn) = conn {
                    let event = ClientEvent::Register(registration);
                    self.transmit(conn, &event).await;
                }
            }

            Op::UpdateState(partial) => {
                let snapshot =
                    self.session.merge_state(partial).clone();
                if let Some(conn) = conn {
                    let event =
                        ClientEvent::StateUpdate { state: snapshot };
                    self.transmit(conn, &event).await;
                }
            }

            Op::ResetState => self.session.reset(),

            Op::SendEvent { name, data } => match conn {
                Some(conn) => {
                    let event = ClientEvent::Telemetry { name, data };
                    self.transmit(conn, &event).await;
                }
                None => {
                    tracing::debug!(
                        name = %name,
                        "telemetry dropped while disconnected"
                    );
                }
            },

            Op::SendMessage { kind, data } => match conn {
                Some(conn) => {
                    let event =
                        ClientEvent::PeerBroadcast(PeerMessage {
                            from: self.session.identity().to_string(),
                            kind,
                            data,
                        });
                    self.transmit(conn, &event).await;
                }
                None => {
                    tracing::debug!(
                        kind = %kind,
                        "peer message dropped while disconnected"
                    );
                }
            },

            Op::OnCommand(handler) => {
                self.handlers.set_command(handler);
            }
            Op::OnMessage(handler) => self.handlers.add_message(handler),
            Op::OnConnect(hook) => self.handlers.add_connect(hook),
            Op::OnDisconnect(hook) => {
                self.handlers.add_disconnect(hook);
            }

            Op::ConfigureAudio(update) => self.audio.configure(update),

            Op::EnableAudio => {
                self.audio.enable();
                if let Some(conn) = conn {
                    self.transmit(
                        conn,
                        &ClientEvent::RegisterAudioPlayer {},
                    )
                    .await;
                }
            }

            Op::DisableAudio => self.audio.disable(),

            Op::SurfaceVisible => self.audio.on_visible(),

            Op::AudioStatus(reply) => {
                let _ = reply.send(self.audio.status());
            }
        }
    }

    /// Routes one inbound frame: decode, then hand to the dispatcher,
    /// the message fan-out, or the audio engine. Undecodable and
    /// unknown frames are logged and dropped — they never take the
    /// read loop down.
    fn handle_frame(&mut self, data: &[u8]) {
        let event: ServerEvent = match self.codec.decode(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "undecodable frame dropped");
                return;
            }
        };

        match event {
            ServerEvent::Command(command) => {
                self.handlers.dispatch_command(command);
            }
            ServerEvent::PeerBroadcast(message) => {
                self.handlers.dispatch_message(message);
            }

            ServerEvent::PlayAmbient {
                sound_id,
                file,
                volume,
            } => self.audio.play_ambient(&sound_id, &file, volume),
            ServerEvent::StopAmbient { sound_id } => {
                self.audio.stop_ambient(sound_id.as_deref());
            }
            ServerEvent::AmbientVolume { volume } => {
                self.audio.set_ambient_volume(volume);
            }
            ServerEvent::SetAmbientVolume { sound_id, volume } => {
                self.audio.set_ambient_voice_volume(&sound_id, volume);
            }

            ServerEvent::PlayPreset { preset_idx, file } => {
                self.audio.play_preset(preset_idx, &file);
            }
            ServerEvent::PausePreset { preset_idx } => {
                self.audio.pause_preset(preset_idx);
            }
            ServerEvent::ResumePreset { preset_idx } => {
                self.audio.resume_preset(preset_idx);
            }
            ServerEvent::SeekPreset {
                preset_idx,
                current_time,
            } => self.audio.seek_preset(preset_idx, current_time),
            ServerEvent::StopPreset { preset_idx } => {
                self.audio.stop_preset(preset_idx);
            }

            ServerEvent::PlaySpeechClip {
                audio_base64,
                mime_type,
            } => self
                .audio
                .play_speech_clip(&audio_base64, mime_type.as_deref()),

            ServerEvent::MasterVolume { volume } => {
                self.audio.set_master_volume(volume);
            }
            ServerEvent::SpeechVolume { volume } => {
                self.audio.set_speech_volume(volume);
            }
            ServerEvent::StopAll {} => self.audio.stop_all(),

            ServerEvent::Unknown => {
                tracing::debug!("unknown event dropped");
            }
        }
    }

    /// Encodes and sends one event. Failures are logged, not raised —
    /// a failed send means the connection is going down, and the
    /// pending receive will notice.
    async fn transmit(
        &mut self,
        conn: &WebSocketConnection,
        event: &ClientEvent,
    ) {
        let frame = match self.codec.encode(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "event encode failed");
                return;
            }
        };
        if let Err(e) = conn.send(&frame).await {
            tracing::warn!(error = %e, "event send failed");
        }
    }
}
