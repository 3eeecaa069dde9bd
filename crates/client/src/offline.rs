//! Connectivity state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// Online and connected to the backend.
    Online,
    /// Offline (network unreachable or backend unavailable); writes queue up.
    Offline,
}

/// Tracks whether the client can reach the backend and when it last synced.
#[derive(Debug, Clone)]
pub struct OfflineMode {
    state: ConnectivityState,
    changed_at: DateTime<Utc>,
    last_synced_at: Option<DateTime<Utc>>,
}

impl OfflineMode {
    pub fn new() -> Self {
        Self {
            state: ConnectivityState::Online,
            changed_at: Utc::now(),
            last_synced_at: None,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// When the state last flipped.
    pub fn changed_at(&self) -> DateTime<Utc> {
        self.changed_at
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    /// Mark the client as offline.
    pub fn set_offline(&mut self) {
        self.transition(ConnectivityState::Offline);
    }

    /// Mark the client as online.
    pub fn set_online(&mut self) {
        self.transition(ConnectivityState::Online);
    }

    pub fn mark_synced(&mut self) {
        self.last_synced_at = Some(Utc::now());
    }

    pub fn is_offline(&self) -> bool {
        self.state == ConnectivityState::Offline
    }

    fn transition(&mut self, next: ConnectivityState) {
        if self.state != next {
            tracing::info!(from = ?self.state, to = ?next, "connectivity changed");
            self.state = next;
            self.changed_at = Utc::now();
        }
    }
}

impl Default for OfflineMode {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_track_change_time() {
        let mut mode = OfflineMode::new();
        assert!(!mode.is_offline());

        let before = mode.changed_at();
        mode.set_online();
        assert_eq!(mode.changed_at(), before);

        mode.set_offline();
        assert!(mode.is_offline());
        assert!(mode.changed_at() >= before);

        assert_eq!(mode.last_synced_at(), None);
        mode.mark_synced();
        assert!(mode.last_synced_at().is_some());
    }
}
