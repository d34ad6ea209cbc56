//! Sensor link recovery.
//!
//! When the poll loop stops seeing new data it hands the sensor link over to
//! the [`RecoveryController`], which power-cycles the sensor through the relay
//! and probes it until it answers again.
//!
//! ```text
//!  Idle ──▶ PowerCycling ──▶ Probing ──▶ Recovered
//!                               │
//!                               └──▶ Exhausted ──▶ (next episode)
//! ```
//!
//! One episode makes at most `max_attempts` probes. Episodes themselves are
//! repeated without limit by [`RecoveryController::recover`] until the sensor
//! is back or the process is shutting down.

use crate::backend::EventSink;
use crate::config::RecoveryConfig;
use crate::hardware::RelayControl;
use crate::sensor::SensorGateway;
use crate::status::{ConnectionBoard, ConnectionStatus, ConnectionType};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    Idle,
    PowerCycling,
    Probing,
    Recovered,
    Exhausted,
}

/// Result of a single recovery episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The sensor answered; `attempts` probes were made.
    Recovered { attempts: u32 },
    /// Every probe of the episode failed.
    Exhausted,
    /// Shutdown was requested mid-episode.
    Cancelled,
}

/// Probe budget of one episode.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryAttempt {
    pub attempt_index: u32,
    pub max_attempts: u32,
}

impl RecoveryAttempt {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt_index: 0,
            max_attempts,
        }
    }

    /// Advance to the next attempt; false once the budget is spent.
    fn advance(&mut self) -> bool {
        if self.attempt_index >= self.max_attempts {
            return false;
        }
        self.attempt_index += 1;
        true
    }

    fn is_last(&self) -> bool {
        self.attempt_index >= self.max_attempts
    }
}

/// Sleep for `duration` unless `cancel` fires first.
/// Returns `false` when cancelled.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Drive `fut` to completion unless `cancel` fires first.
/// Returns `None` when cancelled; `fut` is dropped mid-flight.
pub(crate) async fn run_or_cancel<F: Future>(
    fut: F,
    cancel: &CancellationToken,
) -> Option<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

pub struct RecoveryController {
    gateway: Arc<dyn SensorGateway>,
    relay: Arc<dyn RelayControl>,
    board: Arc<ConnectionBoard>,
    sink: Arc<dyn EventSink>,
    relay_pin: u8,
    settings: RecoveryConfig,
    sensor_id: String,
    phase: Mutex<RecoveryPhase>,
}

impl RecoveryController {
    pub fn new(
        gateway: Arc<dyn SensorGateway>,
        relay: Arc<dyn RelayControl>,
        board: Arc<ConnectionBoard>,
        sink: Arc<dyn EventSink>,
        relay_pin: u8,
        mut settings: RecoveryConfig,
        sensor_id: impl Into<String>,
    ) -> Self {
        // An episode always probes at least once.
        settings.max_attempts = settings.max_attempts.max(1);
        Self {
            gateway,
            relay,
            board,
            sink,
            relay_pin,
            settings,
            sensor_id: sensor_id.into(),
            phase: Mutex::new(RecoveryPhase::Idle),
        }
    }

    /// Phase of the current (or last) episode.
    pub fn phase(&self) -> RecoveryPhase {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: RecoveryPhase) {
        *self.phase.lock() = phase;
    }

    /// Run episodes until the sensor answers (`true`) or `cancel` fires
    /// (`false`).
    pub async fn recover(&self, cancel: &CancellationToken) -> bool {
        let mut episode: u64 = 0;
        loop {
            episode += 1;
            info!("[Recovery] Episode {} starting", episode);
            let message = format!(
                "Sensor {}: connection lost, recovery episode {}",
                self.sensor_id, episode
            );
            if run_or_cancel(self.sink.write_log(&message), cancel)
                .await
                .is_none()
            {
                info!("[Recovery] Cancelled before episode {}", episode);
                return false;
            }

            match self.run_episode(cancel).await {
                RecoveryOutcome::Recovered { attempts } => {
                    info!(
                        "[Recovery] Sensor back after episode {} ({} probe(s))",
                        episode, attempts
                    );
                    let message = format!("Sensor {}: connection restored", self.sensor_id);
                    // Recovered either way; a cancelled log write is dropped.
                    run_or_cancel(self.sink.write_log(&message), cancel).await;
                    return true;
                }
                RecoveryOutcome::Exhausted => {
                    warn!(
                        "[Recovery] Episode {} exhausted {} probes; power-cycling again",
                        episode, self.settings.max_attempts
                    );
                }
                RecoveryOutcome::Cancelled => {
                    info!("[Recovery] Cancelled during episode {}", episode);
                    return false;
                }
            }
        }
    }

    /// One power-cycle followed by a bounded probe sequence.
    pub async fn run_episode(&self, cancel: &CancellationToken) -> RecoveryOutcome {
        if cancel.is_cancelled() {
            return RecoveryOutcome::Cancelled;
        }

        // PowerCycling
        self.set_phase(RecoveryPhase::PowerCycling);
        self.board
            .set(ConnectionType::Sensor, ConnectionStatus::Initializing);
        self.relay.energize(self.relay_pin);
        let held = sleep_or_cancel(self.settings.power_cycle_hold(), cancel).await;
        // The sensor must never be left unpowered, even on shutdown.
        self.relay.deenergize(self.relay_pin);
        if !held {
            self.set_phase(RecoveryPhase::Idle);
            return RecoveryOutcome::Cancelled;
        }

        // Probing
        self.set_phase(RecoveryPhase::Probing);
        let mut attempt = RecoveryAttempt::new(self.settings.max_attempts);
        while attempt.advance() {
            let answered = tokio::select! {
                _ = cancel.cancelled() => {
                    self.set_phase(RecoveryPhase::Idle);
                    return RecoveryOutcome::Cancelled;
                }
                answered = self.gateway.probe_connectivity() => answered,
            };

            if answered {
                self.set_phase(RecoveryPhase::Recovered);
                self.board
                    .set(ConnectionType::Sensor, ConnectionStatus::Connected);
                return RecoveryOutcome::Recovered {
                    attempts: attempt.attempt_index,
                };
            }

            debug!(
                "[Recovery] Probe {}/{} failed",
                attempt.attempt_index, attempt.max_attempts
            );
            if attempt.is_last() {
                break;
            }
            if !sleep_or_cancel(self.settings.probe_interval(), cancel).await {
                self.set_phase(RecoveryPhase::Idle);
                return RecoveryOutcome::Cancelled;
            }
        }

        self.set_phase(RecoveryPhase::Exhausted);
        self.board
            .set(ConnectionType::Sensor, ConnectionStatus::NotConnected);
        RecoveryOutcome::Exhausted
    }
}
