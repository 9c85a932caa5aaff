//! Replayable session state: registration and the state snapshot.
//!
//! The backoffice may miss any number of updates while the connection is
//! down. The client compensates by never sending deltas: every
//! `state_update` carries the complete snapshot, so one transmission
//! after reconnect brings the server fully current. This module holds
//! that snapshot and the registration descriptor it is replayed after.

use std::collections::HashMap;

use serde_json::Value;
use stagelink_protocol::Registration;

/// Everything the client must retransmit after a reconnect.
///
/// Owned by the supervisor task; there is exactly one per client. The
/// state is deliberately not shared — all mutation funnels through the
/// one task that also owns the connection, which is what makes the
/// replay ordering guarantees trivial to uphold.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Registration descriptor, set once per session by `register`.
    registration: Option<Registration>,

    /// The accumulated application-state snapshot.
    ///
    /// Only ever grows by key-wise merge; cleared only by
    /// [`reset`](Self::reset).
    snapshot: HashMap<String, Value>,
}

impl SessionState {
    /// Creates empty session state: no registration, no snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the registration descriptor for replay.
    pub fn set_registration(&mut self, registration: Registration) {
        tracing::debug!(
            identity = %registration.identity,
            capabilities = registration.capabilities.len(),
            "registration stored for replay"
        );
        self.registration = Some(registration);
    }

    /// The stored registration descriptor, if `register` was called.
    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    /// The identity from the registration, or `""` before registration.
    ///
    /// Peer messages are tagged with this so receivers can self-filter.
    pub fn identity(&self) -> &str {
        self.registration
            .as_ref()
            .map(|r| r.identity.as_str())
            .unwrap_or("")
    }

    /// Merges `partial` into the snapshot, key by key.
    ///
    /// Later keys override earlier ones; untouched keys are preserved.
    /// Returns the full merged snapshot, which is what goes on the wire —
    /// never the partial.
    pub fn merge_state(
        &mut self,
        partial: HashMap<String, Value>,
    ) -> &HashMap<String, Value> {
        self.snapshot.extend(partial);
        &self.snapshot
    }

    /// The current full snapshot.
    pub fn snapshot(&self) -> &HashMap<String, Value> {
        &self.snapshot
    }

    /// Clears the snapshot without transmitting anything.
    ///
    /// The next `merge_state` starts the cumulative merge fresh. Used
    /// when the installation's game restarts.
    pub fn reset(&mut self) {
        tracing::debug!(
            keys = self.snapshot.len(),
            "state snapshot reset"
        );
        self.snapshot.clear();
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stagelink_protocol::Registration;

    fn partial(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn registration(identity: &str) -> Registration {
        Registration {
            identity: identity.into(),
            display_name: identity.to_uppercase(),
            capabilities: vec![],
            role: None,
        }
    }

    #[test]
    fn test_merge_state_accumulates_keys() {
        let mut state = SessionState::new();

        state.merge_state(partial(&[("scene", json!("intro"))]));
        let merged =
            state.merge_state(partial(&[("mood", json!("curious"))]));

        // Both keys present — the earlier one was preserved.
        assert_eq!(merged["scene"], json!("intro"));
        assert_eq!(merged["mood"], json!("curious"));
    }

    #[test]
    fn test_merge_state_later_key_wins() {
        let mut state = SessionState::new();

        state.merge_state(partial(&[("scene", json!("intro"))]));
        let merged =
            state.merge_state(partial(&[("scene", json!("dilemma"))]));

        assert_eq!(merged["scene"], json!("dilemma"));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_merge_state_returns_full_snapshot_not_partial() {
        // The wire invariant: every transmission is the complete
        // snapshot, so a reconnected server misses nothing.
        let mut state = SessionState::new();
        state.merge_state(partial(&[
            ("a", json!(1)),
            ("b", json!(2)),
        ]));

        let merged = state.merge_state(partial(&[("c", json!(3))]));

        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_snapshot_equals_union_of_all_updates() {
        // After N merges the snapshot is the key-wise union of every
        // update, later wins — regardless of order.
        let mut state = SessionState::new();
        state.merge_state(partial(&[("a", json!(1)), ("b", json!(1))]));
        state.merge_state(partial(&[("b", json!(2)), ("c", json!(2))]));
        state.merge_state(partial(&[("a", json!(3))]));

        let snap = state.snapshot();
        assert_eq!(snap["a"], json!(3));
        assert_eq!(snap["b"], json!(2));
        assert_eq!(snap["c"], json!(2));
        assert_eq!(snap.len(), 3);
    }

    #[test]
    fn test_reset_clears_snapshot_and_merge_starts_fresh() {
        let mut state = SessionState::new();
        state.merge_state(partial(&[("scene", json!("intro"))]));

        state.reset();
        assert!(state.snapshot().is_empty());

        let merged = state.merge_state(partial(&[("mood", json!("calm"))]));
        assert_eq!(merged.len(), 1);
        assert!(merged.get("scene").is_none());
    }

    #[test]
    fn test_reset_preserves_registration() {
        // Resetting game state must not forget who we are — the
        // registration still replays on the next reconnect.
        let mut state = SessionState::new();
        state.set_registration(registration("aria"));

        state.reset();

        assert!(state.registration().is_some());
    }

    #[test]
    fn test_identity_is_empty_before_registration() {
        let state = SessionState::new();
        assert_eq!(state.identity(), "");
    }

    #[test]
    fn test_identity_comes_from_registration() {
        let mut state = SessionState::new();
        state.set_registration(registration("aria"));
        assert_eq!(state.identity(), "aria");
    }
}
