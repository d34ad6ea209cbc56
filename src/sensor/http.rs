//! HTTP adapter for the sensor API.

use super::gateway::{Frame, SensorGateway, frame_window};
use crate::config::SensorConfig;
use crate::error::{MonitorError, Result};
use crate::monitor::MonitorSnapshot;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;

const MONITOR: &str = "/api/monitor";
const FREQUENCY: &str = "/api/frequency";
const STORAGE_FREQUENCY: &str = "/api/monitor/storage/frequency";
const ATTENDED_INTERVAL: &str = "/api/monitor/attended/interval";
const ATTENDED_OK: &str = "/api/monitor/attended/ok";
const FRAMES: &str = "/api/monitor/frames";
const FILTERS: [&str; 3] = [
    "/api/filters/spot",
    "/api/filters/smooth",
    "/api/filters/noise",
];

/// Sensor gateway backed by the sensor's on-device HTTP server.
pub struct HttpSensorGateway {
    client: Client,
    base_url: String,
    poll_timeout: Duration,
    request_timeout: Duration,
}

impl HttpSensorGateway {
    pub fn new(config: &SensorConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &SensorConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            poll_timeout: config.poll_timeout(),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and report whether the sensor answered 204.
    async fn expect_no_content(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> bool {
        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .timeout(self.request_timeout);
        if let Some(body) = body {
            request = request.json(&body);
        }

        match request.send().await {
            Ok(response) if response.status() == StatusCode::NO_CONTENT => {
                debug!("[Sensor] {} {} -> 204", method, path);
                true
            }
            Ok(response) => {
                warn!(
                    "[Sensor] {} {} returned {}",
                    method,
                    path,
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("[Sensor] {} {} failed: {}", method, path, e);
                false
            }
        }
    }

    async fn get_text(&self, path_and_query: &str, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(self.url(path_and_query))
            .timeout(timeout)
            .send()
            .await
            .map_err(MonitorError::SensorRequest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::SensorStatus {
                endpoint: path_and_query.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(MonitorError::SensorRequest)
    }
}

#[async_trait]
impl SensorGateway for HttpSensorGateway {
    async fn poll(&self) -> Result<MonitorSnapshot> {
        let body = self.get_text(MONITOR, self.poll_timeout).await?;
        MonitorSnapshot::from_json(&body).map_err(|e| MonitorError::SensorPayload(e.to_string()))
    }

    async fn set_frequency(&self, hz: u32) -> bool {
        let sampling = self
            .expect_no_content(Method::PUT, FREQUENCY, Some(hz.into()))
            .await;
        let storage = self
            .expect_no_content(Method::PUT, STORAGE_FREQUENCY, Some(hz.into()))
            .await;
        sampling && storage
    }

    async fn set_rotation_interval(&self, seconds: u32) -> bool {
        self.expect_no_content(Method::PUT, ATTENDED_INTERVAL, Some(seconds.into()))
            .await
    }

    async fn reset_rotation_interval(&self) -> bool {
        self.expect_no_content(Method::PUT, ATTENDED_OK, Some(true.into()))
            .await
    }

    async fn set_default_filters(&self) -> bool {
        let mut all_applied = true;
        for filter in FILTERS {
            // Every filter is attempted even if an earlier one failed.
            let applied = self
                .expect_no_content(Method::PUT, filter, Some(false.into()))
                .await;
            all_applied &= applied;
        }
        all_applied
    }

    async fn delete_all_frames(&self) -> bool {
        let deleted = self.expect_no_content(Method::DELETE, FRAMES, None).await;
        if deleted {
            info!("[Sensor] All frames deleted");
        }
        deleted
    }

    async fn probe_connectivity(&self) -> bool {
        debug!("[Sensor] Probing connectivity");
        self.expect_no_content(Method::DELETE, FRAMES, None).await
    }

    async fn frames_within_window(&self, frame_id: u64) -> Result<Vec<Frame>> {
        let (after, before) = frame_window(frame_id);
        let query = format!("{FRAMES}?after={after}&before={before}&exclude=risks");
        let body = self.get_text(&query, self.request_timeout).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
