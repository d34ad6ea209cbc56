//! Test doubles shared by the unit tests.

use crate::backend::{BedRegistry, EventSink};
use crate::error::{MonitorError, Result};
use crate::hardware::RelayControl;
use crate::monitor::{MonitorEvent, MonitorSnapshot};
use crate::network::WifiControl;
use crate::sensor::{Frame, SensorGateway};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Default)]
struct Recorded {
    requests: Vec<String>,
    bodies: Vec<String>,
    heads: Vec<String>,
}

/// Minimal HTTP/1.1 server answering one scripted response per connection.
pub struct StubHttpServer {
    port: u16,
    recorded: Arc<Mutex<Recorded>>,
}

impl StubHttpServer {
    pub async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let shared = recorded.clone();
        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                serve_one(stream, status, body, &shared).await;
            }
        });

        Self { port, recorded }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// `"METHOD /path?query"` for every request received so far.
    pub fn requests(&self) -> Vec<String> {
        self.recorded.lock().requests.clone()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.recorded.lock().bodies.clone()
    }

    /// Raw request heads (request line plus headers).
    pub fn heads(&self) -> Vec<String> {
        self.recorded.lock().heads.clone()
    }
}

async fn serve_one(mut stream: TcpStream, status: u16, body: &str, recorded: &Mutex<Recorded>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = head_end + 4;
    while buf.len() < body_start + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let body_end = buf.len().min(body_start + content_length);
    let request_body = String::from_utf8_lossy(&buf[body_start..body_end]).to_string();

    let request_line = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();

    {
        let mut recorded = recorded.lock();
        recorded.requests.push(format!("{} {}", method, target));
        recorded.bodies.push(request_body);
        recorded.heads.push(head.clone());
    }

    let response = if status == 204 {
        "HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n".to_string()
    } else {
        format!(
            "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    };
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Scripted sensor. Polls replay the script and then repeat the last
/// snapshot; `None` entries fail the poll.
#[derive(Default)]
pub struct MockSensor {
    polls: Mutex<VecDeque<Option<MonitorSnapshot>>>,
    last: Mutex<Option<MonitorSnapshot>>,
    failing_probes: AtomicU32,
    reset_rejected: AtomicBool,
    write_stall: Mutex<Option<Duration>>,
    pub poll_calls: AtomicU32,
    pub probe_calls: AtomicU32,
    pub reset_calls: AtomicU32,
    pub delete_calls: AtomicU32,
    pub filter_calls: AtomicU32,
    pub frequency_calls: AtomicU32,
    pub rotation_calls: AtomicU32,
}

impl MockSensor {
    pub fn with_polls(polls: Vec<Option<MonitorSnapshot>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Default::default()
        }
    }

    /// The first `failures` probes fail, every later one succeeds.
    pub fn probe_fails(failures: u32) -> Self {
        let sensor = Self::default();
        sensor.failing_probes.store(failures, Ordering::SeqCst);
        sensor
    }

    /// Every configuration write hangs for `stall` before answering.
    pub fn stall_writes(&self, stall: Duration) {
        *self.write_stall.lock() = Some(stall);
    }

    async fn write_delay(&self) {
        let stall = *self.write_stall.lock();
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
    }

    pub fn reject_resets(&self, rejected: bool) {
        self.reset_rejected.store(rejected, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> u32 {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> u32 {
        self.reset_calls.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorGateway for MockSensor {
    async fn poll(&self) -> Result<MonitorSnapshot> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.polls.lock().pop_front();
        match next {
            Some(Some(snapshot)) => {
                *self.last.lock() = Some(snapshot);
                Ok(snapshot)
            }
            Some(None) => Err(MonitorError::SensorPayload("scripted failure".to_string())),
            None => (*self.last.lock())
                .ok_or_else(|| MonitorError::SensorPayload("no snapshot".to_string())),
        }
    }

    async fn set_frequency(&self, _hz: u32) -> bool {
        self.frequency_calls.fetch_add(1, Ordering::SeqCst);
        self.write_delay().await;
        true
    }

    async fn set_rotation_interval(&self, _seconds: u32) -> bool {
        self.rotation_calls.fetch_add(1, Ordering::SeqCst);
        self.write_delay().await;
        true
    }

    async fn reset_rotation_interval(&self) -> bool {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        self.write_delay().await;
        !self.reset_rejected.load(Ordering::SeqCst)
    }

    async fn set_default_filters(&self) -> bool {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        self.write_delay().await;
        true
    }

    async fn delete_all_frames(&self) -> bool {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.write_delay().await;
        true
    }

    async fn probe_connectivity(&self) -> bool {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_probes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_probes.store(failing - 1, Ordering::SeqCst);
            return false;
        }
        true
    }

    async fn frames_within_window(&self, _frame_id: u64) -> Result<Vec<Frame>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MonitorEvent>>,
    logs: Mutex<Vec<String>>,
    stall: Mutex<Option<Duration>>,
}

impl RecordingSink {
    /// Every write hangs for `stall` before it is recorded.
    pub fn stall_for(&self, stall: Duration) {
        *self.stall.lock() = Some(stall);
    }

    async fn delay(&self) {
        let stall = *self.stall.lock();
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
    }

    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events.lock().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send_event(&self, event: &MonitorEvent) {
        self.delay().await;
        self.events.lock().push(event.clone());
    }

    async fn write_log(&self, message: &str) {
        self.delay().await;
        self.logs.lock().push(message.to_string());
    }
}

#[derive(Default)]
pub struct RecordingRegistry {
    assignments: Mutex<Vec<(String, String)>>,
}

impl RecordingRegistry {
    pub fn assignments(&self) -> Vec<(String, String)> {
        self.assignments.lock().clone()
    }
}

#[async_trait]
impl BedRegistry for RecordingRegistry {
    async fn assign_bed(&self, sensor_id: &str, bed_id: &str) -> bool {
        self.assignments
            .lock()
            .push((sensor_id.to_string(), bed_id.to_string()));
        true
    }
}

#[derive(Default)]
pub struct MockRelay {
    energized: AtomicU32,
    deenergized: AtomicU32,
}

impl MockRelay {
    pub fn energize_count(&self) -> u32 {
        self.energized.load(Ordering::SeqCst)
    }

    pub fn deenergize_count(&self) -> u32 {
        self.deenergized.load(Ordering::SeqCst)
    }
}

impl RelayControl for MockRelay {
    fn energize(&self, _pin: u8) {
        self.energized.fetch_add(1, Ordering::SeqCst);
    }

    fn deenergize(&self, _pin: u8) {
        self.deenergized.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wi-Fi double; associations succeed unless `failing` is set and the
/// uplink answers unless `offline` is set.
#[derive(Default)]
pub struct MockWifi {
    pub failing: AtomicBool,
    pub offline: AtomicBool,
    networks: Mutex<Vec<String>>,
    disconnects: AtomicU32,
    checks: AtomicU32,
}

impl MockWifi {
    pub fn networks(&self) -> Vec<String> {
        self.networks.lock().clone()
    }

    pub fn disconnect_count(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn check_count(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WifiControl for MockWifi {
    async fn associate(&self, ssid: &str, _password: &str) -> Result<()> {
        self.networks.lock().push(ssid.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(MonitorError::WifiAssociation(format!("{} not in range", ssid)));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn check_connectivity(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        !self.offline.load(Ordering::SeqCst)
    }
}
