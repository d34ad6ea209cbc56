use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Split `.env` content into key/value pairs, skipping blanks and comments
/// and stripping one level of surrounding quotes.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            if !key.is_empty() {
                pairs.push((key, value));
            }
        }
    }

    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sensor: SensorConfig,
    pub backend: BackendConfig,
    pub monitor: MonitorConfig,
    pub recovery: RecoveryConfig,
    pub relay: RelayConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Base URL of the sensor's on-device API (no trailing slash).
    pub url: String,
    /// Identifier reported with every event (the sensor's SSID in the field).
    pub sensor_id: String,
    pub frequency_hz: u32,
    pub rotation_interval_secs: u32,
    pub poll_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub event_endpoint: String,
    pub bed_endpoint: String,
    pub api_key: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    pub log_group: String,
    pub log_stream: String,
    /// Overrides the regional CloudWatch Logs endpoint.
    pub log_endpoint: Option<String>,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
    pub stale_threshold_secs: u64,
    pub storage_threshold_percent: f64,
    pub heartbeat_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    pub max_attempts: u32,
    pub probe_interval_secs: u64,
    pub power_cycle_hold_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub pin: u8,
    pub gpio_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wireless_interface: String,
    pub command_socket: String,
    pub association_timeout_secs: u64,
    /// Host pinged to decide whether the uplink works.
    pub connectivity_host: String,
    pub connectivity_check_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor: SensorConfig {
                url: "http://10.0.0.1".to_string(),
                sensor_id: "unassigned".to_string(),
                frequency_hz: 1,
                rotation_interval_secs: 7200,
                poll_timeout_ms: 10_000,
                request_timeout_ms: 5_000,
            },
            backend: BackendConfig {
                event_endpoint: "https://api.example.invalid/events".to_string(),
                bed_endpoint: "https://api.example.invalid/sensors".to_string(),
                api_key: None,
                access_key_id: None,
                secret_access_key: None,
                region: "us-west-2".to_string(),
                log_group: "bed-monitor".to_string(),
                log_stream: "devices".to_string(),
                log_endpoint: None,
                request_timeout_ms: 10_000,
            },
            monitor: MonitorConfig {
                poll_interval_ms: 1_000,
                stale_threshold_secs: 20,
                storage_threshold_percent: 80.0,
                heartbeat_interval_secs: 300,
            },
            recovery: RecoveryConfig {
                max_attempts: 10,
                probe_interval_secs: 2,
                power_cycle_hold_secs: 5,
            },
            relay: RelayConfig {
                pin: 17,
                gpio_root: "/sys/class/gpio".to_string(),
            },
            network: NetworkConfig {
                wireless_interface: "wlan1".to_string(),
                command_socket: "/tmp/bed-monitor-commands.sock".to_string(),
                association_timeout_secs: 60,
                connectivity_host: "8.8.8.8".to_string(),
                connectivity_check_secs: 30,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from defaults overridden by whatever `lookup` yields.
    /// Unparseable numeric values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // Sensor
        if let Some(url) = lookup("SENSOR_URL") {
            config.sensor.url = url.trim_end_matches('/').to_string();
        }
        if let Some(id) = lookup("SENSOR_SSID") {
            config.sensor.sensor_id = id;
        }
        if let Some(freq) = lookup("SENSOR_FREQUENCY")
            && let Ok(f) = freq.parse()
        {
            config.sensor.frequency_hz = f;
        }
        if let Some(rotation) = lookup("SENSOR_ROTATION")
            && let Ok(r) = rotation.parse()
        {
            config.sensor.rotation_interval_secs = r;
        }

        // Backend
        if let Some(endpoint) = lookup("EVENT_ENDPOINT") {
            config.backend.event_endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("BED_ENDPOINT") {
            config.backend.bed_endpoint = endpoint;
        }
        if let Some(key) = lookup("API_KEY") {
            config.backend.api_key = Some(key);
        }
        if let Some(id) = lookup("ACCESS_KEY_ID") {
            config.backend.access_key_id = Some(id);
        }
        if let Some(secret) = lookup("ACCESS_KEY_SECRET") {
            config.backend.secret_access_key = Some(secret);
        }
        if let Some(region) = lookup("AWS_REGION") {
            config.backend.region = region;
        }
        if let Some(group) = lookup("AWS_LOG_GROUP") {
            config.backend.log_group = group;
        }
        if let Some(stream) = lookup("AWS_LOG_STREAM") {
            config.backend.log_stream = stream;
        }
        if let Some(endpoint) = lookup("AWS_LOG_ENDPOINT") {
            config.backend.log_endpoint = Some(endpoint);
        }

        // Monitor timing
        if let Some(ms) = lookup("POLL_INTERVAL_MS")
            && let Ok(v) = ms.parse()
        {
            config.monitor.poll_interval_ms = v;
        }
        if let Some(secs) = lookup("STALE_THRESHOLD_SECS")
            && let Ok(v) = secs.parse()
        {
            config.monitor.stale_threshold_secs = v;
        }
        if let Some(percent) = lookup("STORAGE_THRESHOLD_PERCENT")
            && let Ok(v) = percent.parse()
        {
            config.monitor.storage_threshold_percent = v;
        }
        if let Some(secs) = lookup("HEARTBEAT_INTERVAL_SECS")
            && let Ok(v) = secs.parse()
        {
            config.monitor.heartbeat_interval_secs = v;
        }

        // Recovery
        if let Some(attempts) = lookup("RECOVERY_MAX_ATTEMPTS")
            && let Ok(v) = attempts.parse()
            && v >= 1
        {
            config.recovery.max_attempts = v;
        }

        // Relay and network
        if let Some(pin) = lookup("RELAY_PIN")
            && let Ok(p) = pin.parse()
        {
            config.relay.pin = p;
        }
        if let Some(iface) = lookup("WIRELESS_INTERFACE") {
            config.network.wireless_interface = iface;
        }
        if let Some(socket) = lookup("COMMAND_SOCKET") {
            config.network.command_socket = socket;
        }
        if let Some(host) = lookup("CONNECTIVITY_HOST") {
            config.network.connectivity_host = host;
        }
        if let Some(secs) = lookup("CONNECTIVITY_CHECK_SECS")
            && let Ok(v) = secs.parse()
        {
            config.network.connectivity_check_secs = v;
        }

        config
    }
}

impl SensorConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn log_endpoint(&self) -> String {
        self.log_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://logs.{}.amazonaws.com/", self.region))
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

impl RecoveryConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn power_cycle_hold(&self) -> Duration {
        Duration::from_secs(self.power_cycle_hold_secs)
    }
}

impl NetworkConfig {
    pub fn association_timeout(&self) -> Duration {
        Duration::from_secs(self.association_timeout_secs)
    }

    pub fn connectivity_check_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity_check_secs)
    }
}
