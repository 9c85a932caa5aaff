//! Rodio-backed [`AudioOutput`] implementation.
//!
//! One `rodio` sink per voice. Media delivery never blocks the caller:
//! `start` creates the sink synchronously, then a spawned task fetches
//! (or takes the inline bytes), decodes, and appends the source. Until
//! the append lands the voice reports "not finished", so the engine's
//! progress poll doesn't reap a voice that is still loading. A failed
//! fetch or decode is logged and flips the voice to finished, which the
//! engine reaps like any completed playback.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::{AudioError, AudioOutput, MediaSource, PlaybackSpec, Voice};

/// The production audio backend.
///
/// Holds the `rodio` output handle and an HTTP client for URL media.
/// The `OutputStream` returned by [`try_default`](Self::try_default) is
/// not `Send` and must be kept alive by the caller for as long as any
/// sound should play — dropping it silences every sink.
pub struct RodioOutput {
    handle: OutputStreamHandle,
    http: reqwest::Client,
}

impl RodioOutput {
    /// Opens the default audio device.
    ///
    /// Returns the backend plus the `OutputStream` the caller must keep
    /// alive.
    ///
    /// # Errors
    /// Returns [`AudioError::DeviceUnavailable`] if no output device can
    /// be opened.
    pub fn try_default() -> Result<(Self, OutputStream), AudioError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;
        Ok((
            Self {
                handle,
                http: reqwest::Client::new(),
            },
            stream,
        ))
    }
}

impl AudioOutput for RodioOutput {
    fn start(
        &self,
        spec: PlaybackSpec,
    ) -> Result<Box<dyn Voice>, AudioError> {
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| AudioError::StartFailed(e.to_string()))?;
        sink.set_volume(spec.gain);

        let sink = Arc::new(sink);
        let duration = Arc::new(Mutex::new(None));
        let loaded = Arc::new(AtomicBool::new(false));

        tokio::spawn(deliver_media(
            self.http.clone(),
            spec.source,
            spec.looped,
            Arc::clone(&sink),
            Arc::clone(&duration),
            Arc::clone(&loaded),
        ));

        Ok(Box::new(RodioVoice {
            sink,
            duration,
            loaded,
        }))
    }
}

/// Fetches/decodes the media and appends it to the sink.
///
/// Sets `loaded` last in every path, including failures, so the voice
/// only ever transitions loading → playing or loading → finished.
async fn deliver_media(
    http: reqwest::Client,
    source: MediaSource,
    looped: bool,
    sink: Arc<Sink>,
    duration: Arc<Mutex<Option<Duration>>>,
    loaded: Arc<AtomicBool>,
) {
    let bytes = match source {
        MediaSource::Inline { bytes, .. } => bytes,
        MediaSource::Url(url) => match fetch(&http, &url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "media fetch failed");
                loaded.store(true, Ordering::Release);
                return;
            }
        },
    };

    let decoder = match Decoder::new(Cursor::new(bytes)) {
        Ok(decoder) => decoder,
        Err(e) => {
            tracing::warn!(error = %e, "media decode failed");
            loaded.store(true, Ordering::Release);
            return;
        }
    };

    if let Ok(mut slot) = duration.lock() {
        *slot = decoder.total_duration();
    }

    if looped {
        sink.append(decoder.repeat_infinite());
    } else {
        sink.append(decoder);
    }
    loaded.store(true, Ordering::Release);
}

async fn fetch(
    http: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, reqwest::Error> {
    let response = http.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// One live `rodio` sink.
struct RodioVoice {
    sink: Arc<Sink>,
    duration: Arc<Mutex<Option<Duration>>>,
    /// False while the delivery task is still fetching/decoding.
    loaded: Arc<AtomicBool>,
}

impl Voice for RodioVoice {
    fn set_gain(&self, gain: f32) {
        self.sink.set_volume(gain);
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn resume(&self) {
        self.sink.play();
    }

    fn seek(&self, position: Duration) {
        if let Err(e) = self.sink.try_seek(position) {
            tracing::debug!(error = %e, "seek not supported for source");
        }
    }

    fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    fn duration(&self) -> Option<Duration> {
        self.duration.lock().ok().and_then(|slot| *slot)
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn is_finished(&self) -> bool {
        // An empty sink means either natural completion or failed
        // delivery — but only once loading is over; a still-loading
        // voice is never finished.
        self.loaded.load(Ordering::Acquire) && self.sink.empty()
    }

    fn stop(&self) {
        self.sink.stop();
    }
}
