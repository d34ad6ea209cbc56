//! Signed HTTPS client for the cloud backend.

use super::payload::{BedAssignment, EventPayload, LogBatch};
use super::sigv4::SigV4Signer;
use super::sink::{BedRegistry, EventSink};
use crate::config::BackendConfig;
use crate::error::{MonitorError, Result};
use crate::monitor::MonitorEvent;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{Client, Method, Url};
use serde::Serialize;
use std::time::{Duration, SystemTime};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const API_SERVICE: &str = "execute-api";
const LOGS_SERVICE: &str = "logs";
const PUT_LOG_EVENTS_TARGET: &str = "Logs_20140328.PutLogEvents";

pub struct BackendClient {
    client: Client,
    config: BackendConfig,
    api_signer: Option<SigV4Signer>,
    logs_signer: Option<SigV4Signer>,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: BackendConfig) -> Self {
        let signer_for = |service: &str| match (&config.access_key_id, &config.secret_access_key) {
            (Some(id), Some(secret)) => Some(SigV4Signer::new(
                id.clone(),
                secret.clone(),
                config.region.clone(),
                service,
            )),
            _ => None,
        };
        let api_signer = signer_for(API_SERVICE);
        let logs_signer = signer_for(LOGS_SERVICE);
        if api_signer.is_none() {
            warn!("[Backend] No access keys configured; remote writes will be skipped");
        }

        Self {
            client,
            timeout: config.request_timeout(),
            api_signer,
            logs_signer,
            config,
        }
    }

    /// Send a signed JSON request and require a 2xx answer.
    async fn send_signed<T: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        signer: Option<&SigV4Signer>,
        target: Option<&str>,
        body: &T,
    ) -> Result<String> {
        let signer =
            signer.ok_or(MonitorError::MissingCredentials("ACCESS_KEY_ID/ACCESS_KEY_SECRET"))?;
        let url = Url::parse(endpoint)
            .map_err(|e| MonitorError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        let payload = serde_json::to_vec(body)?;

        let mut headers: Vec<(&str, &str)> = vec![("content-type", CONTENT_TYPE)];
        if let Some(key) = self.config.api_key.as_deref() {
            headers.push(("x-api-key", key));
        }
        if let Some(target) = target {
            headers.push(("x-amz-target", target));
        }

        let auth_headers = signer.sign(
            method.as_str(),
            url.as_str(),
            &headers,
            &payload,
            SystemTime::now(),
        )?;

        let mut request = self
            .client
            .request(method.clone(), url)
            .timeout(self.timeout)
            .body(payload);
        for (name, value) in headers.iter() {
            request = request.header(*name, *value);
        }
        for (name, value) in auth_headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(MonitorError::BackendRequest)?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(MonitorError::BackendStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        debug!("[Backend] {} {} -> {}: {}", method, endpoint, status, text);
        Ok(text)
    }
}

#[async_trait]
impl EventSink for BackendClient {
    async fn send_event(&self, event: &MonitorEvent) {
        let payload = EventPayload::from(event);
        match self
            .send_signed(
                Method::POST,
                &self.config.event_endpoint,
                self.api_signer.as_ref(),
                None,
                &payload,
            )
            .await
        {
            Ok(_) => info!("[Backend] {} event delivered", payload.event_type),
            Err(e) => warn!("[Backend] {} event not delivered: {}", payload.event_type, e),
        }
    }

    async fn write_log(&self, message: &str) {
        let batch = LogBatch::single(
            &self.config.log_group,
            &self.config.log_stream,
            Utc::now().timestamp_millis(),
            message,
        );
        let endpoint = self.config.log_endpoint();
        if let Err(e) = self
            .send_signed(
                Method::POST,
                &endpoint,
                self.logs_signer.as_ref(),
                Some(PUT_LOG_EVENTS_TARGET),
                &batch,
            )
            .await
        {
            warn!("[Backend] Remote log write failed: {}", e);
        }
    }
}

#[async_trait]
impl BedRegistry for BackendClient {
    async fn assign_bed(&self, sensor_id: &str, bed_id: &str) -> bool {
        let body = BedAssignment { sensor_id, bed_id };
        match self
            .send_signed(
                Method::PATCH,
                &self.config.bed_endpoint,
                self.api_signer.as_ref(),
                None,
                &body,
            )
            .await
        {
            Ok(_) => {
                info!("[Backend] Sensor {} assigned to bed {}", sensor_id, bed_id);
                true
            }
            Err(e) => {
                warn!("[Backend] Bed assignment failed: {}", e);
                false
            }
        }
    }
}
