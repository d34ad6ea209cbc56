//! Sensor power relay.
//!
//! The relay sits in the sensor's supply line; energizing it cuts power and
//! de-energizing it restores power. Both operations are idempotent and never
//! fail towards the caller: a relay that cannot be driven is logged and the
//! recovery loop simply tries again on its next episode.

use crate::error::{MonitorError, Result};
use log::{debug, error, info};
use std::fs;
use std::path::PathBuf;

/// A single digital output used to power-cycle the sensor.
pub trait RelayControl: Send + Sync {
    fn energize(&self, pin: u8);
    fn deenergize(&self, pin: u8);
}

/// Relay driven through the Linux sysfs GPIO interface.
pub struct SysfsRelay {
    root: PathBuf,
}

impl SysfsRelay {
    /// `root` is normally `/sys/class/gpio`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    /// Export the pin if needed and configure it as an output.
    fn ensure_output(&self, pin: u8) -> Result<()> {
        let dir = self.pin_dir(pin);
        if !dir.exists() {
            debug!("[Relay] Exporting GPIO {}", pin);
            fs::write(self.root.join("export"), pin.to_string())
                .map_err(|source| MonitorError::Relay { pin, source })?;
        }
        fs::write(dir.join("direction"), "out").map_err(|source| MonitorError::Relay { pin, source })
    }

    fn write_level(&self, pin: u8, high: bool) -> Result<()> {
        self.ensure_output(pin)?;
        let level = if high { "1" } else { "0" };
        fs::write(self.pin_dir(pin).join("value"), level)
            .map_err(|source| MonitorError::Relay { pin, source })
    }
}

impl RelayControl for SysfsRelay {
    fn energize(&self, pin: u8) {
        match self.write_level(pin, true) {
            Ok(()) => info!("[Relay] GPIO {} energized", pin),
            Err(e) => error!("[Relay] {}", e),
        }
    }

    fn deenergize(&self, pin: u8) {
        match self.write_level(pin, false) {
            Ok(()) => info!("[Relay] GPIO {} de-energized", pin),
            Err(e) => error!("[Relay] {}", e),
        }
    }
}

/// Relay stand-in for development hosts without GPIO.
pub struct NoopRelay;

impl RelayControl for NoopRelay {
    fn energize(&self, pin: u8) {
        info!("[Relay] (noop) GPIO {} energized", pin);
    }

    fn deenergize(&self, pin: u8) {
        info!("[Relay] (noop) GPIO {} de-energized", pin);
    }
}
