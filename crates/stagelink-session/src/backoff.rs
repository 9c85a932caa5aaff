//! Reconnect backoff: how long to wait between dial attempts.
//!
//! The installation runs unattended for days; the only acceptable
//! response to a dropped connection is to keep dialing forever. What the
//! policy shapes is the *pacing*: delays grow from an initial value up to
//! a cap, with random jitter so a room full of installations doesn't
//! hammer the backoffice in lockstep after a power cut.

use std::time::Duration;

use rand::Rng;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for reconnect pacing.
///
/// The defaults match the production installation: first retry after
/// 1 s, capped at 5 s, each delay jittered by ±50%. None of the values
/// are load-bearing for correctness — retry just has to stay unbounded
/// and randomized.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the un-jittered delay.
    pub max_delay: Duration,
    /// Jitter factor in `[0, 1]`: each delay is scaled by a random
    /// factor in `[1 - f, 1 + f]`.
    pub randomization_factor: f64,
    /// Pause between replaying the registration and replaying the state
    /// snapshot after a reconnect, so registration lands server-side
    /// first.
    pub replay_grace: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            randomization_factor: 0.5,
            replay_grace: Duration::from_millis(100),
        }
    }
}

impl ReconnectConfig {
    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`Backoff::new`]. Rules:
    /// - `randomization_factor` clamped to `0.0..=1.0`.
    /// - `max_delay` forced ≥ `initial_delay`.
    pub fn validated(mut self) -> Self {
        self.randomization_factor =
            self.randomization_factor.clamp(0.0, 1.0);
        if self.max_delay < self.initial_delay {
            self.max_delay = self.initial_delay;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Produces the delay before each successive dial attempt.
///
/// Delays double from `initial_delay` to `max_delay` and each one is
/// jittered. There is no attempt limit — callers ask for the next delay
/// for as long as they keep failing, and call [`reset`](Self::reset)
/// once a dial succeeds.
#[derive(Debug)]
pub struct Backoff {
    config: ReconnectConfig,
    /// Un-jittered delay for the next attempt.
    current: Duration,
    /// Attempts since the last reset, for logging.
    attempts: u32,
}

impl Backoff {
    /// Creates a backoff sequence from config.
    pub fn new(config: ReconnectConfig) -> Self {
        let config = config.validated();
        let current = config.initial_delay;
        Self {
            config,
            current,
            attempts: 0,
        }
    }

    /// Returns the delay to sleep before the next dial attempt.
    ///
    /// Each call advances the sequence: the un-jittered delay doubles
    /// until it reaches the cap. The returned value is the current delay
    /// scaled by a random factor in `[1 - f, 1 + f]`.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.config.max_delay);
        self.attempts += 1;

        let f = self.config.randomization_factor;
        let scale = if f > 0.0 {
            rand::rng().random_range((1.0 - f)..=(1.0 + f))
        } else {
            1.0
        };
        let delay = base.mul_f64(scale);

        tracing::debug!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnect backoff"
        );
        delay
    }

    /// Attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Resets the sequence after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.config.initial_delay;
        self.attempts = 0;
    }

    /// The grace delay between registration replay and state replay.
    pub fn replay_grace(&self) -> Duration {
        self.config.replay_grace
    }
}

// =========================================================================
// Tests
// =========================================================================
