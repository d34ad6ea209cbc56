//! Patient presence tracking.
//!
//! Presence is debounced upstream: the poll loop only hands a snapshot over
//! when it differs from the previous one, so the tracker itself has no notion
//! of time and simply reacts to each sample.

use super::MonitorEvent;

/// Debounced presence as last accepted by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PresenceState {
    pub is_present: bool,
}

/// A change of presence worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTransition {
    Entered,
    Exited,
}

impl PresenceTransition {
    pub fn into_event(self, sensor_id: &str) -> MonitorEvent {
        let sensor_id = sensor_id.to_string();
        match self {
            Self::Entered => MonitorEvent::BedEntry { sensor_id },
            Self::Exited => MonitorEvent::BedExit { sensor_id },
        }
    }
}

/// Two-state machine (Absent, Present), starting Absent.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    state: PresenceState,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    /// Adopt `present` as the current state without reporting a transition.
    pub fn seed(&mut self, present: bool) {
        self.state.is_present = present;
    }

    /// Feed one presence sample and return the transition it caused, if any.
    pub fn observe(&mut self, present: bool) -> Option<PresenceTransition> {
        let transition = match (self.state.is_present, present) {
            (true, false) => Some(PresenceTransition::Exited),
            (false, true) => Some(PresenceTransition::Entered),
            _ => None,
        };
        self.state.is_present = present;
        transition
    }
}
