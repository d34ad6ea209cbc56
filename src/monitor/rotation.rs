//! Turn-timer ("rotation") handling.
//!
//! The sensor runs its own caregiver-response countdown. Once it goes
//! negative the interval has to be reset; if the patient is in bed at that
//! moment the expiry is also reported as a missed repositioning check.

use super::PresenceState;

/// Whether the turn-timer interval is armed. Cleared while an expiry is
/// being handled and set again as soon as the interval reset has been
/// requested, whatever the sensor answered. A disarmed monitor never
/// reports an expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationState {
    pub enabled: bool,
}

impl Default for RotationState {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// What the caller must do for one countdown sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAction {
    /// Countdown still running.
    None,
    /// Timer expired while the bed is empty: reset without an event.
    ResetSilently,
    /// Timer expired while the patient is present: emit TurnTimerExpire,
    /// then reset.
    ExpireAndReset,
}

#[derive(Debug, Default)]
pub struct RotationMonitor {
    state: RotationState,
}

impl RotationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    /// Evaluate one countdown sample against the current presence.
    pub fn evaluate(&mut self, countdown_seconds: i64, presence: PresenceState) -> RotationAction {
        if countdown_seconds >= 0 {
            return RotationAction::None;
        }
        // The previous expiry has not been followed by a reset request yet.
        if !self.state.enabled {
            return RotationAction::ResetSilently;
        }

        self.state.enabled = false;
        if presence.is_present {
            RotationAction::ExpireAndReset
        } else {
            RotationAction::ResetSilently
        }
    }

    /// Record that the interval reset was requested. A rejected reset leaves
    /// the countdown negative, so the next snapshot handles the expiry again.
    pub fn reset_issued(&mut self) {
        self.state.enabled = true;
    }

    /// Re-arm after the poll loop (re)initialised the sensor interval.
    pub fn rearm(&mut self) {
        self.state.enabled = true;
    }
}
