//! Wi-Fi association through wpa_supplicant.
//!
//! The network block is written to the per-interface wpa_supplicant config,
//! the daemon is told to reload it and `wpa_cli status` is polled until the
//! interface reports the requested SSID as completed.
//!
//! Uplink health is checked separately by pinging a well-known host.

use crate::config::NetworkConfig;
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

const WPA_CONFIG_DIR: &str = "/etc/wpa_supplicant";
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(1);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait WifiControl: Send + Sync {
    /// Join `ssid`. Returns once the link is up or with an error after the
    /// association timeout.
    async fn associate(&self, ssid: &str, password: &str) -> Result<()>;

    /// Drop the network the interface is currently joined to, if any.
    async fn disconnect(&self) -> Result<()>;

    /// Whether the uplink reaches the outside world. Bounded in time.
    async fn check_connectivity(&self) -> bool;
}

pub struct WpaSupplicantWifi {
    interface: String,
    config_path: PathBuf,
    timeout: Duration,
    connectivity_host: String,
}

impl WpaSupplicantWifi {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            config_path: PathBuf::from(WPA_CONFIG_DIR)
                .join(format!("wpa_supplicant-{}.conf", config.wireless_interface)),
            interface: config.wireless_interface.clone(),
            timeout: config.association_timeout(),
            connectivity_host: config.connectivity_host.clone(),
        }
    }

    /// Run `program args`, bounded by [`COMMAND_TIMEOUT`], returning stdout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!("[WiFi] {} {}", program, args.join(" "));
        let output = tokio::time::timeout(COMMAND_TIMEOUT, Command::new(program).args(args).output())
            .await
            .map_err(|_| MonitorError::Timeout(COMMAND_TIMEOUT))??;

        if !output.status.success() {
            return Err(MonitorError::WifiAssociation(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn wait_for_ssid(&self, ssid: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        while tokio::time::Instant::now() < deadline {
            match self.run("wpa_cli", &["-i", &self.interface, "status"]).await {
                Ok(output) => {
                    let status = parse_status(&output);
                    let state = status.get("wpa_state").map(String::as_str);
                    let current = status.get("ssid").map(String::as_str);
                    if state == Some("COMPLETED") && current == Some(ssid) {
                        return Ok(());
                    }
                    debug!("[WiFi] {} state {:?}", self.interface, state);
                }
                Err(e) => debug!("[WiFi] Status query failed: {}", e),
            }
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
        }
        Err(MonitorError::WifiAssociation(format!(
            "{} did not associate with {} within {:?}",
            self.interface, ssid, self.timeout
        )))
    }
}

#[async_trait]
impl WifiControl for WpaSupplicantWifi {
    async fn associate(&self, ssid: &str, password: &str) -> Result<()> {
        info!("[WiFi] Associating {} with {}", self.interface, ssid);

        tokio::fs::write(&self.config_path, render_network_config(ssid, password)).await?;

        if let Err(e) = self.run("wpa_cli", &["-i", &self.interface, "reconfigure"]).await {
            warn!("[WiFi] Reconfigure failed ({}); restarting wpa_supplicant", e);
            let unit = format!("wpa_supplicant@{}", self.interface);
            self.run("systemctl", &["restart", &unit]).await?;
        }

        self.wait_for_ssid(ssid).await?;
        info!("[WiFi] {} connected to {}", self.interface, ssid);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let networks = self
            .run("wpa_cli", &["-i", &self.interface, "list_networks"])
            .await?;
        let Some(id) = current_network_id(&networks) else {
            debug!("[WiFi] {} has no current network", self.interface);
            return Ok(());
        };

        info!("[WiFi] Disconnecting {} from network {}", self.interface, id);
        self.run("wpa_cli", &["-i", &self.interface, "disable_network", &id])
            .await?;
        self.run("wpa_cli", &["-i", &self.interface, "remove_network", &id])
            .await?;
        self.run("wpa_cli", &["-i", &self.interface, "save_config"])
            .await?;
        Ok(())
    }

    async fn check_connectivity(&self) -> bool {
        match self
            .run("ping", &["-c", "3", "-W", "1", &self.connectivity_host])
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("[WiFi] {} unreachable: {}", self.connectivity_host, e);
                false
            }
        }
    }
}

/// Id of the network flagged `[CURRENT]` in `wpa_cli list_networks`.
pub fn current_network_id(output: &str) -> Option<String> {
    output
        .lines()
        .skip(1)
        .map(|line| line.split('\t').collect::<Vec<_>>())
        .find(|fields| fields.get(3).is_some_and(|flags| flags.contains("CURRENT")))
        .and_then(|fields| fields.first().map(|id| id.trim().to_string()))
}

/// Quote a value for wpa_supplicant's config syntax.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Complete wpa_supplicant config holding a single network. An empty
/// password yields an open network.
pub fn render_network_config(ssid: &str, password: &str) -> String {
    let security = if password.is_empty() {
        "    key_mgmt=NONE\n".to_string()
    } else {
        format!("    psk={}\n", quote(password))
    };
    format!(
        "ctrl_interface=DIR=/var/run/wpa_supplicant GROUP=netdev\n\
         update_config=1\n\
         \n\
         network={{\n    ssid={}\n{}}}\n",
        quote(ssid),
        security
    )
}

/// Parse `key=value` lines of `wpa_cli status`.
pub fn parse_status(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}
