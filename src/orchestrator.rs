//! Monitor orchestration.
//!
//! The [`Orchestrator`] owns the two long-lived loops and the command
//! dispatcher:
//!
//! - the heartbeat loop writes a liveness line to the remote log at a fixed
//!   period, whatever the sensor is doing;
//! - the link watch pings the uplink and keeps the Wi-Fi row honest;
//! - the poll loop reads the sensor, turns snapshot changes into storage,
//!   rotation and presence actions, and hands the link to recovery when the
//!   sensor goes quiet;
//! - the dispatcher applies control commands (Wi-Fi, bed assignment, start,
//!   stop).
//!
//! Presence and rotation state are owned by the poll task and never shared.
//! Only one poll loop runs at a time; (re)starts are serialised through an
//! async mutex around its handle. Every sensor and backend call of the poll
//! loop is raced against its cancellation token, so `stop` returns promptly
//! even when the sensor hangs.

use crate::backend::{BedRegistry, EventSink};
use crate::config::Config;
use crate::control::ControlCommand;
use crate::hardware::{RelayControl, StatusChannel};
use crate::monitor::{MonitorEvent, MonitorSnapshot, PresenceTracker, RotationAction, RotationMonitor};
use crate::network::WifiControl;
use crate::recovery::{RecoveryController, run_or_cancel, sleep_or_cancel};
use crate::sensor::SensorGateway;
use crate::status::{ConnectionBoard, ConnectionStatus, ConnectionType};
use futures_util::future::join3;
use log::{debug, info, trace, warn};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Capability ports the orchestrator drives.
#[derive(Clone)]
pub struct Ports {
    pub gateway: Arc<dyn SensorGateway>,
    pub relay: Arc<dyn RelayControl>,
    pub display: Arc<dyn StatusChannel>,
    pub sink: Arc<dyn EventSink>,
    pub registry: Arc<dyn BedRegistry>,
    pub wifi: Arc<dyn WifiControl>,
}

struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct Orchestrator {
    config: Config,
    ports: Ports,
    board: Arc<ConnectionBoard>,
    recovery: Arc<RecoveryController>,
    shutdown: CancellationToken,
    poll: tokio::sync::Mutex<Option<PollHandle>>,
    /// Mirrors whether a poll task is alive; readable without the poll lock.
    monitoring: Arc<AtomicBool>,
    /// Set while a Wi-Fi command owns the Wi-Fi row.
    associating: Arc<AtomicBool>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    link_watch: Mutex<Option<JoinHandle<()>>>,
    latest: Arc<RwLock<Option<MonitorSnapshot>>>,
}

impl Orchestrator {
    pub fn new(config: Config, ports: Ports) -> Self {
        let board = Arc::new(ConnectionBoard::new(ports.display.clone()));
        let recovery = Arc::new(RecoveryController::new(
            ports.gateway.clone(),
            ports.relay.clone(),
            board.clone(),
            ports.sink.clone(),
            config.relay.pin,
            config.recovery.clone(),
            config.sensor.sensor_id.clone(),
        ));

        Self {
            config,
            ports,
            board,
            recovery,
            shutdown: CancellationToken::new(),
            poll: tokio::sync::Mutex::new(None),
            monitoring: Arc::new(AtomicBool::new(false)),
            associating: Arc::new(AtomicBool::new(false)),
            heartbeat: Mutex::new(None),
            link_watch: Mutex::new(None),
            latest: Arc::new(RwLock::new(None)),
        }
    }

    pub fn board(&self) -> &ConnectionBoard {
        &self.board
    }

    pub fn sensor_id(&self) -> &str {
        &self.config.sensor.sensor_id
    }

    /// Process-wide cancellation token; cancelled by [`Self::shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Last snapshot the poll loop accepted, if any.
    pub fn latest_snapshot(&self) -> Option<MonitorSnapshot> {
        *self.latest.read()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// Spawn the heartbeat loop. Calling it again replaces nothing; the
    /// first loop keeps running.
    pub fn start_heartbeat(&self) {
        let mut slot = self.heartbeat.lock();
        if slot.is_some() {
            return;
        }

        let sink = self.ports.sink.clone();
        let message = format!("Sensor {}: heartbeat", self.config.sensor.sensor_id);
        let period = self
            .config
            .monitor
            .heartbeat_interval()
            .max(Duration::from_secs(1));
        let cancel = self.shutdown.child_token();

        *slot = Some(tokio::spawn(async move {
            info!("[Heartbeat] Every {:?}", period);
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                debug!("[Heartbeat] {}", message);
                if run_or_cancel(sink.write_log(&message), &cancel).await.is_none() {
                    break;
                }
            }
        }));
    }

    /// Spawn the uplink check that drives the Wi-Fi row. Like the
    /// heartbeat, a second call keeps the first loop.
    pub fn start_link_watch(&self) {
        let mut slot = self.link_watch.lock();
        if slot.is_some() {
            return;
        }

        let wifi = self.ports.wifi.clone();
        let board = self.board.clone();
        let associating = self.associating.clone();
        let period = self
            .config
            .network
            .connectivity_check_interval()
            .max(Duration::from_secs(1));
        let cancel = self.shutdown.child_token();

        *slot = Some(tokio::spawn(async move {
            info!("[Link] Checking uplink every {:?}", period);
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(online) = run_or_cancel(wifi.check_connectivity(), &cancel).await else {
                    break;
                };
                if associating.load(Ordering::SeqCst) {
                    debug!("[Link] Wi-Fi command in progress; result dropped");
                    continue;
                }
                let status = if online {
                    ConnectionStatus::Connected
                } else {
                    ConnectionStatus::NotConnected
                };
                board.set(ConnectionType::WiFi, status);
            }
        }));
    }

    /// (Re)start the poll loop, stopping any running instance first.
    pub async fn start_monitoring(&self) {
        let mut slot = self.poll.lock().await;
        if let Some(previous) = slot.take() {
            info!("[Poll] Restarting status monitor");
            previous.cancel.cancel();
            let _ = previous.task.await;
        }
        if self.shutdown.is_cancelled() {
            return;
        }

        let cancel = self.shutdown.child_token();
        let monitoring = self.monitoring.clone();
        let poll_loop = PollLoop::new(
            &self.config,
            &self.ports,
            self.board.clone(),
            self.recovery.clone(),
            self.latest.clone(),
        );
        self.monitoring.store(true, Ordering::SeqCst);
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poll_loop.run(cancel).await;
                monitoring.store(false, Ordering::SeqCst);
            })
        };
        *slot = Some(PollHandle { cancel, task });
    }

    /// Stop the poll loop and wait for it to exit.
    pub async fn stop_monitoring(&self) {
        let mut slot = self.poll.lock().await;
        let Some(handle) = slot.take() else {
            debug!("[Poll] Stop requested but no monitor is running");
            return;
        };

        self.board
            .set(ConnectionType::Sensor, ConnectionStatus::Disconnecting);
        handle.cancel.cancel();
        let _ = handle.task.await;
        self.monitoring.store(false, Ordering::SeqCst);
        self.board
            .set(ConnectionType::Sensor, ConnectionStatus::NotConnected);
    }

    /// Apply one raw control command. Malformed input is ignored.
    pub async fn handle_command(&self, raw: &str) {
        let Some(command) = ControlCommand::parse(raw) else {
            debug!("[Command] Ignoring malformed command");
            return;
        };
        info!("[Command] Received {}", command.verb());

        match command {
            ControlCommand::ConnectWifi {
                ssid,
                password,
                bed_id,
            } => {
                self.associating.store(true, Ordering::SeqCst);
                let joined = self.join_network(&ssid, &password).await;
                self.associating.store(false, Ordering::SeqCst);
                if joined {
                    self.ports
                        .registry
                        .assign_bed(self.sensor_id(), &bed_id)
                        .await;
                    self.start_monitoring().await;
                }
            }
            ControlCommand::AssignBed { bed_id } => {
                self.ports
                    .registry
                    .assign_bed(self.sensor_id(), &bed_id)
                    .await;
            }
            ControlCommand::Start => self.start_monitoring().await,
            ControlCommand::Stop => self.stop_monitoring().await,
        }
    }

    /// Leave the current network if one is up, then join `ssid`.
    async fn join_network(&self, ssid: &str, password: &str) -> bool {
        if self.board.get(ConnectionType::WiFi) == ConnectionStatus::Connected {
            self.board
                .set(ConnectionType::WiFi, ConnectionStatus::Disconnecting);
            if let Err(e) = self.ports.wifi.disconnect().await {
                warn!("[Command] Leaving the current network failed: {}", e);
            }
        }

        self.board
            .set(ConnectionType::WiFi, ConnectionStatus::Initializing);
        match self.ports.wifi.associate(ssid, password).await {
            Ok(()) => {
                self.board
                    .set(ConnectionType::WiFi, ConnectionStatus::Connected);
                true
            }
            Err(e) => {
                warn!("[Command] WiFi association failed: {}", e);
                self.board
                    .set(ConnectionType::WiFi, ConnectionStatus::NotConnected);
                false
            }
        }
    }

    /// Cancel every loop and wait for them.
    pub async fn shutdown(&self) {
        info!("Shutting down monitor");
        self.shutdown.cancel();

        let poll = self.poll.lock().await.take();
        let heartbeat = self.heartbeat.lock().take();
        let link_watch = self.link_watch.lock().take();
        join3(
            async {
                if let Some(handle) = poll {
                    let _ = handle.task.await;
                }
            },
            async {
                if let Some(task) = heartbeat {
                    let _ = task.await;
                }
            },
            async {
                if let Some(task) = link_watch {
                    let _ = task.await;
                }
            },
        )
        .await;
        self.monitoring.store(false, Ordering::SeqCst);
    }
}

/// State owned by one poll-loop task.
struct PollLoop {
    gateway: Arc<dyn SensorGateway>,
    sink: Arc<dyn EventSink>,
    board: Arc<ConnectionBoard>,
    recovery: Arc<RecoveryController>,
    latest: Arc<RwLock<Option<MonitorSnapshot>>>,
    sensor_id: String,
    frequency_hz: u32,
    rotation_interval_secs: u32,
    poll_interval: Duration,
    stale_threshold: Duration,
    storage_threshold: f64,
    presence: PresenceTracker,
    rotation: RotationMonitor,
    previous: Option<MonitorSnapshot>,
    last_received_at: Instant,
}

impl PollLoop {
    fn new(
        config: &Config,
        ports: &Ports,
        board: Arc<ConnectionBoard>,
        recovery: Arc<RecoveryController>,
        latest: Arc<RwLock<Option<MonitorSnapshot>>>,
    ) -> Self {
        Self {
            gateway: ports.gateway.clone(),
            sink: ports.sink.clone(),
            board,
            recovery,
            latest,
            sensor_id: config.sensor.sensor_id.clone(),
            frequency_hz: config.sensor.frequency_hz,
            rotation_interval_secs: config.sensor.rotation_interval_secs,
            poll_interval: config.monitor.poll_interval(),
            stale_threshold: config.monitor.stale_threshold(),
            storage_threshold: config.monitor.storage_threshold_percent,
            presence: PresenceTracker::new(),
            rotation: RotationMonitor::new(),
            previous: None,
            last_received_at: Instant::now(),
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        info!("[Poll] Status monitor started for sensor {}", self.sensor_id);
        if self.initialize_sensor(&cancel).await.is_some() {
            while !cancel.is_cancelled() {
                self.tick(&cancel).await;
                if !sleep_or_cancel(self.poll_interval, &cancel).await {
                    break;
                }
            }
        }
        info!("[Poll] Status monitor stopped");
    }

    /// Push the monitoring configuration to the sensor. Also used after a
    /// power-cycle, which wipes it. `None` when cancelled part-way.
    async fn initialize_sensor(&mut self, cancel: &CancellationToken) -> Option<()> {
        sensor_write(
            self.gateway.set_frequency(self.frequency_hz),
            &format!("Setting frequency to {} Hz failed", self.frequency_hz),
            cancel,
        )
        .await?;
        sensor_write(
            self.gateway.set_rotation_interval(self.rotation_interval_secs),
            "Setting rotation interval failed",
            cancel,
        )
        .await?;
        sensor_write(
            self.gateway.reset_rotation_interval(),
            "Resetting rotation interval failed",
            cancel,
        )
        .await?;
        self.rotation.rearm();
        sensor_write(
            self.gateway.delete_all_frames(),
            "Clearing stored frames failed",
            cancel,
        )
        .await?;
        sensor_write(
            self.gateway.set_default_filters(),
            "Resetting filters failed",
            cancel,
        )
        .await?;

        self.board
            .set(ConnectionType::Sensor, ConnectionStatus::Connected);
        self.last_received_at = Instant::now();
        Some(())
    }

    async fn tick(&mut self, cancel: &CancellationToken) {
        let Some(polled) = run_or_cancel(self.gateway.poll(), cancel).await else {
            return;
        };

        match polled {
            Ok(snapshot) if self.previous != Some(snapshot) => {
                self.last_received_at = Instant::now();
                self.process(snapshot, cancel).await;
                return;
            }
            Ok(_) => trace!("[Poll] Snapshot unchanged"),
            Err(e) => warn!("[Poll] Sensor poll failed: {}", e),
        }

        let silent_for = self.last_received_at.elapsed();
        if silent_for > self.stale_threshold && !cancel.is_cancelled() {
            warn!(
                "[Poll] No new data for {:?}; starting sensor recovery",
                silent_for
            );
            if self.recovery.recover(cancel).await {
                self.initialize_sensor(cancel).await;
            }
        }
    }

    /// Storage, rotation, then presence, all against the same snapshot.
    /// `None` when cancelled part-way.
    async fn process(
        &mut self,
        snapshot: MonitorSnapshot,
        cancel: &CancellationToken,
    ) -> Option<()> {
        let first = self.previous.is_none();
        self.previous = Some(snapshot);
        *self.latest.write() = Some(snapshot);
        // The first reading of a session only establishes who is in bed.
        if first {
            self.presence.seed(snapshot.presence);
        }

        if snapshot.storage_used_percent > self.storage_threshold {
            info!(
                "[Poll] Storage at {:.1}%; clearing frames",
                snapshot.storage_used_percent
            );
            sensor_write(
                self.gateway.delete_all_frames(),
                "Clearing stored frames failed",
                cancel,
            )
            .await?;
        }

        match self
            .rotation
            .evaluate(snapshot.rotation_countdown_seconds, self.presence.state())
        {
            RotationAction::None => {}
            RotationAction::ExpireAndReset => {
                info!("[Poll] Turn timer expired");
                let event = MonitorEvent::TurnTimerExpire {
                    sensor_id: self.sensor_id.clone(),
                };
                run_or_cancel(self.sink.send_event(&event), cancel).await?;
                self.reset_rotation(cancel).await?;
            }
            RotationAction::ResetSilently => self.reset_rotation(cancel).await?,
        }

        if let Some(transition) = self.presence.observe(snapshot.presence) {
            let event = transition.into_event(&self.sensor_id);
            info!("[Poll] {}", event.event_type());
            run_or_cancel(self.sink.send_event(&event), cancel).await?;
        }
        Some(())
    }

    async fn reset_rotation(&mut self, cancel: &CancellationToken) -> Option<()> {
        sensor_write(
            self.gateway.reset_rotation_interval(),
            "Turn timer reset not acknowledged",
            cancel,
        )
        .await?;
        self.rotation.reset_issued();
        Some(())
    }
}

/// Await one sensor write and log a refusal. `None` when cancelled.
async fn sensor_write(
    write: impl Future<Output = bool>,
    failure: &str,
    cancel: &CancellationToken,
) -> Option<()> {
    if !run_or_cancel(write, cancel).await? {
        warn!("[Poll] {}", failure);
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::LogStatusDisplay;
    use crate::testing::{MockRelay, MockSensor, MockWifi, RecordingRegistry, RecordingSink};
    use std::sync::atomic::Ordering;

    struct Harness {
        sensor: Arc<MockSensor>,
        sink: Arc<RecordingSink>,
        registry: Arc<RecordingRegistry>,
        wifi: Arc<MockWifi>,
        relay: Arc<MockRelay>,
        config: Config,
        ports: Ports,
    }

    impl Harness {
        fn new(sensor: MockSensor) -> Self {
            let mut config = Config::default();
            config.sensor.sensor_id = "TX-1".to_string();
            let sensor = Arc::new(sensor);
            let sink = Arc::new(RecordingSink::default());
            let registry = Arc::new(RecordingRegistry::default());
            let wifi = Arc::new(MockWifi::default());
            let relay = Arc::new(MockRelay::default());
            let ports = Ports {
                gateway: sensor.clone(),
                relay: relay.clone(),
                display: Arc::new(LogStatusDisplay::new()),
                sink: sink.clone(),
                registry: registry.clone(),
                wifi: wifi.clone(),
            };
            Self {
                sensor,
                sink,
                registry,
                wifi,
                relay,
                config,
                ports,
            }
        }

        fn orchestrator(&self) -> Orchestrator {
            Orchestrator::new(self.config.clone(), self.ports.clone())
        }

        fn poll_loop(&self) -> PollLoop {
            let board = Arc::new(ConnectionBoard::new(self.ports.display.clone()));
            let recovery = Arc::new(RecoveryController::new(
                self.ports.gateway.clone(),
                self.ports.relay.clone(),
                board.clone(),
                self.ports.sink.clone(),
                self.config.relay.pin,
                self.config.recovery.clone(),
                "TX-1",
            ));
            PollLoop::new(
                &self.config,
                &self.ports,
                board,
                recovery,
                Arc::new(RwLock::new(None)),
            )
        }
    }

    fn live() -> CancellationToken {
        CancellationToken::new()
    }

    fn present(flag: bool) -> MonitorSnapshot {
        MonitorSnapshot::new(flag, 600, 10.0)
    }

    fn exit_event() -> MonitorEvent {
        MonitorEvent::BedExit {
            sensor_id: "TX-1".to_string(),
        }
    }

    fn entry_event() -> MonitorEvent {
        MonitorEvent::BedEntry {
            sensor_id: "TX-1".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_present_absent_yields_single_exit() {
        let h = Harness::new(MockSensor::default());
        let mut poll = h.poll_loop();

        poll.process(present(true), &live()).await;
        assert!(h.sink.events().is_empty());
        poll.process(present(true), &live()).await;
        assert!(h.sink.events().is_empty());
        poll.process(present(false), &live()).await;
        assert_eq!(h.sink.events(), vec![exit_event()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_match_deduplicated_transitions() {
        let h = Harness::new(MockSensor::default());
        let mut poll = h.poll_loop();

        let samples = [false, true, true, false, false, true, false, true];
        for flag in samples {
            poll.process(present(flag), &live()).await;
        }

        let exits = h.sink.events().iter().filter(|e| **e == exit_event()).count();
        let entries = h.sink.events().iter().filter(|e| **e == entry_event()).count();
        assert_eq!(entries, 3);
        assert_eq!(exits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_snapshot_is_not_reprocessed() {
        let h = Harness::new(MockSensor::with_polls(vec![
            Some(present(true)),
            Some(present(false)),
            Some(present(false)),
        ]));
        let mut poll = h.poll_loop();
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            poll.tick(&cancel).await;
        }
        assert_eq!(h.sink.events(), vec![exit_event()]);
        assert_eq!(h.sensor.poll_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_above_threshold_clears_frames() {
        let h = Harness::new(MockSensor::default());
        let mut poll = h.poll_loop();

        poll.process(MonitorSnapshot::new(false, 600, 81.0), &live()).await;
        assert_eq!(h.sensor.delete_count(), 1);

        poll.process(MonitorSnapshot::new(false, 600, 79.0), &live()).await;
        assert_eq!(h.sensor.delete_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_timer_with_occupant_emits_and_resets() {
        let h = Harness::new(MockSensor::default());
        let mut poll = h.poll_loop();

        poll.process(MonitorSnapshot::new(true, -1, 10.0), &live()).await;

        assert_eq!(
            h.sink.events(),
            vec![MonitorEvent::TurnTimerExpire {
                sensor_id: "TX-1".to_string()
            }]
        );
        assert_eq!(h.sensor.reset_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_timer_with_empty_bed_resets_silently() {
        let h = Harness::new(MockSensor::default());
        let mut poll = h.poll_loop();

        poll.process(MonitorSnapshot::new(false, -1, 10.0), &live()).await;

        assert!(h.sink.events().is_empty());
        assert_eq!(h.sensor.reset_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_reset_is_retried_on_next_snapshot() {
        let h = Harness::new(MockSensor::default());
        h.sensor.reject_resets(true);
        let mut poll = h.poll_loop();

        poll.process(MonitorSnapshot::new(true, -1, 10.0), &live()).await;
        poll.process(MonitorSnapshot::new(true, -2, 10.0), &live()).await;
        assert_eq!(h.sink.events().len(), 2);
        assert_eq!(h.sensor.reset_count(), 2);

        h.sensor.reject_resets(false);
        poll.process(MonitorSnapshot::new(true, 7200, 10.0), &live()).await;
        assert_eq!(h.sink.events().len(), 2);
        assert_eq!(h.sensor.reset_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_sensor_triggers_recovery_and_reinitialises() {
        let h = Harness::new(MockSensor::with_polls(vec![Some(present(false))]));
        let mut poll = h.poll_loop();
        let cancel = CancellationToken::new();

        poll.initialize_sensor(&cancel).await;
        poll.tick(&cancel).await;
        assert_eq!(h.relay.energize_count(), 0);

        tokio::time::advance(Duration::from_secs(21)).await;
        poll.tick(&cancel).await;

        assert_eq!(h.relay.energize_count(), 1);
        assert_eq!(h.sensor.probe_count(), 1);
        // Initial setup plus the re-initialisation after recovery.
        assert_eq!(h.sensor.frequency_calls.load(Ordering::SeqCst), 2);
        assert!(h.sink.logs().iter().any(|l| l.contains("recovery episode 1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bed_id_command_writes_one_assignment() {
        let h = Harness::new(MockSensor::default());
        let orchestrator = h.orchestrator();

        orchestrator.handle_command("bed_id,42").await;

        assert_eq!(
            h.registry.assignments(),
            vec![("TX-1".to_string(), "42".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_wifi_command_is_noop() {
        let h = Harness::new(MockSensor::default());
        let orchestrator = h.orchestrator();

        orchestrator.handle_command("wifi,x").await;

        assert!(h.wifi.networks().is_empty());
        assert!(h.registry.assignments().is_empty());
        assert!(!orchestrator.is_monitoring());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wifi_command_connects_assigns_and_starts() {
        let h = Harness::new(MockSensor::with_polls(vec![Some(present(true))]));
        let orchestrator = h.orchestrator();

        orchestrator.handle_command("wifi,Ward 3,pw,42").await;

        assert_eq!(h.wifi.networks(), vec!["Ward 3".to_string()]);
        assert_eq!(
            h.registry.assignments(),
            vec![("TX-1".to_string(), "42".to_string())]
        );
        assert!(orchestrator.is_monitoring());
        assert_eq!(
            orchestrator.board().get(ConnectionType::WiFi),
            ConnectionStatus::Connected
        );
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_wifi_marks_not_connected() {
        let h = Harness::new(MockSensor::default());
        h.wifi.failing.store(true, Ordering::SeqCst);
        let orchestrator = h.orchestrator();

        orchestrator.handle_command("wifi,Ward 3,pw,42").await;

        assert_eq!(
            orchestrator.board().get(ConnectionType::WiFi),
            ConnectionStatus::NotConnected
        );
        assert!(h.registry.assignments().is_empty());
        assert!(!orchestrator.is_monitoring());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_lifecycle() {
        let h = Harness::new(MockSensor::with_polls(vec![
            Some(present(true)),
            Some(present(false)),
        ]));
        let orchestrator = h.orchestrator();

        orchestrator.handle_command("start").await;
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(orchestrator.is_monitoring());
        assert_eq!(orchestrator.latest_snapshot(), Some(present(false)));
        assert_eq!(h.sink.events(), vec![exit_event()]);

        orchestrator.handle_command("stop").await;
        assert!(!orchestrator.is_monitoring());
        assert_eq!(
            orchestrator.board().get(ConnectionType::Sensor),
            ConnectionStatus::NotConnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_running_loop() {
        let h = Harness::new(MockSensor::with_polls(vec![Some(present(true))]));
        let orchestrator = h.orchestrator();

        orchestrator.start_monitoring().await;
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        orchestrator.start_monitoring().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(orchestrator.is_monitoring());
        // Each loop start pushes the sensor configuration once.
        assert_eq!(h.sensor.frequency_calls.load(Ordering::SeqCst), 2);
        orchestrator.shutdown().await;
        assert!(!orchestrator.is_monitoring());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_returns_promptly_when_sensor_hangs() {
        let h = Harness::new(MockSensor::with_polls(vec![Some(present(true))]));
        h.sensor.stall_writes(Duration::from_secs(5));
        let orchestrator = h.orchestrator();

        orchestrator.handle_command("start").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        let started = Instant::now();
        orchestrator.handle_command("stop").await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!orchestrator.is_monitoring());
        assert_eq!(h.sensor.frequency_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.sensor.filter_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            orchestrator.board().get(ConnectionType::Sensor),
            ConnectionStatus::NotConnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_hung_reinitialisation() {
        let h = Harness::new(MockSensor::with_polls(vec![Some(present(false))]));
        let mut poll = h.poll_loop();
        let cancel = CancellationToken::new();
        poll.initialize_sensor(&cancel).await;
        poll.tick(&cancel).await;

        h.sensor.stall_writes(Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(21)).await;
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move { poll.tick(&cancel).await }
        });
        // Hold (5 s) plus the first probe, then into the stalled writes.
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        let started = Instant::now();
        cancel.cancel();
        task.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(h.relay.energize_count(), 1);
        assert_eq!(h.sensor.frequency_calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.sensor.rotation_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitoring_flag_readable_while_poll_slot_is_held() {
        let h = Harness::new(MockSensor::with_polls(vec![Some(present(true))]));
        let orchestrator = h.orchestrator();

        orchestrator.start_monitoring().await;
        let slot = orchestrator.poll.lock().await;
        assert!(orchestrator.is_monitoring());
        drop(slot);

        orchestrator.stop_monitoring().await;
        assert!(!orchestrator.is_monitoring());
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_watch_follows_uplink() {
        let h = Harness::new(MockSensor::default());
        let orchestrator = h.orchestrator();

        orchestrator.start_link_watch();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            orchestrator.board().get(ConnectionType::WiFi),
            ConnectionStatus::Connected
        );

        h.wifi.offline.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            orchestrator.board().get(ConnectionType::WiFi),
            ConnectionStatus::NotConnected
        );
        assert_eq!(h.wifi.check_count(), 2);
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_leaves_wifi_row_alone() {
        let h = Harness::new(MockSensor::with_polls(vec![Some(present(true))]));
        let orchestrator = h.orchestrator();

        orchestrator.start_monitoring().await;
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        assert_eq!(
            orchestrator.board().get(ConnectionType::Sensor),
            ConnectionStatus::Connected
        );
        assert_eq!(
            orchestrator.board().get(ConnectionType::WiFi),
            ConnectionStatus::Initializing
        );
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_wifi_command_leaves_current_network_first() {
        let h = Harness::new(MockSensor::with_polls(vec![Some(present(true))]));
        let orchestrator = h.orchestrator();

        orchestrator.handle_command("wifi,Ward 3,pw,42").await;
        assert_eq!(h.wifi.disconnect_count(), 0);

        orchestrator.handle_command("wifi,Ward 4,pw,42").await;
        assert_eq!(h.wifi.disconnect_count(), 1);
        assert_eq!(
            h.wifi.networks(),
            vec!["Ward 3".to_string(), "Ward 4".to_string()]
        );
        assert_eq!(
            orchestrator.board().get(ConnectionType::WiFi),
            ConnectionStatus::Connected
        );
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_writes_on_schedule() {
        let h = Harness::new(MockSensor::default());
        let orchestrator = h.orchestrator();

        orchestrator.start_heartbeat();
        tokio::time::sleep(Duration::from_secs(601)).await;
        orchestrator.shutdown().await;

        let logs = h.sink.logs();
        assert_eq!(logs.len(), 3);
        assert!(logs.iter().all(|l| l == "Sensor TX-1: heartbeat"));
    }
}
