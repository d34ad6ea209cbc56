//! Connection status board.
//!
//! Tracks a [`ConnectionStatus`] for each [`ConnectionType`] and mirrors the
//! sensor and Wi-Fi rows onto the status display. Writers are the poll loop,
//! the recovery controller and the command dispatcher; readers get a copy and
//! never wait on I/O.

use crate::hardware::{DisplayLine, StatusChannel};
use log::info;
use parking_lot::RwLock;
use std::sync::Arc;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionType {
    Bluetooth,
    Sensor,
    #[strum(serialize = "WiFi")]
    WiFi,
}

impl ConnectionType {
    const ALL: [ConnectionType; 3] = [Self::Bluetooth, Self::Sensor, Self::WiFi];

    fn index(self) -> usize {
        match self {
            Self::Bluetooth => 0,
            Self::Sensor => 1,
            Self::WiFi => 2,
        }
    }

    /// Display line showing this connection, if any.
    fn display_line(self) -> Option<DisplayLine> {
        match self {
            Self::Sensor => Some(DisplayLine::First),
            Self::WiFi => Some(DisplayLine::Second),
            Self::Bluetooth => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionStatus {
    Initializing,
    Connected,
    #[strum(serialize = "Not Connected")]
    NotConnected,
    Disconnecting,
}

/// Shared, display-backed connection status table.
pub struct ConnectionBoard {
    statuses: RwLock<[ConnectionStatus; 3]>,
    display: Arc<dyn StatusChannel>,
}

impl ConnectionBoard {
    /// Every connection starts as `Initializing` and is shown immediately.
    pub fn new(display: Arc<dyn StatusChannel>) -> Self {
        let board = Self {
            statuses: RwLock::new([ConnectionStatus::Initializing; 3]),
            display,
        };
        for kind in ConnectionType::ALL {
            board.render(kind, ConnectionStatus::Initializing);
        }
        board
    }

    pub fn get(&self, kind: ConnectionType) -> ConnectionStatus {
        self.statuses.read()[kind.index()]
    }

    /// Copy of all three statuses in Bluetooth, Sensor, WiFi order.
    pub fn snapshot(&self) -> [ConnectionStatus; 3] {
        *self.statuses.read()
    }

    /// Update one status; the display is only touched on change.
    pub fn set(&self, kind: ConnectionType, status: ConnectionStatus) {
        let previous = {
            let mut statuses = self.statuses.write();
            std::mem::replace(&mut statuses[kind.index()], status)
        };
        if previous != status {
            info!("[Status] {}: {} -> {}", kind, previous, status);
            self.render(kind, status);
        }
    }

    fn render(&self, kind: ConnectionType, status: ConnectionStatus) {
        if let Some(line) = kind.display_line() {
            self.display.set_line(line, &format_line(kind, status));
        }
    }
}

/// `"<ConnectionType>: <ConnectionStatus>"`.
pub fn format_line(kind: ConnectionType, status: ConnectionStatus) -> String {
    format!("{}: {}", kind, status)
}
