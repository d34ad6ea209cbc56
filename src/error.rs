use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum MonitorError {
    #[error("Sensor request failed: {0}")]
    SensorRequest(#[source] reqwest::Error),

    #[error("Sensor returned unexpected status {status} for {endpoint}")]
    SensorStatus { endpoint: String, status: u16 },

    #[error("Malformed sensor payload: {0}")]
    SensorPayload(String),

    #[error("Backend request failed: {0}")]
    BackendRequest(#[source] reqwest::Error),

    #[error("Backend returned unexpected status {status} for {endpoint}")]
    BackendStatus { endpoint: String, status: u16 },

    #[error("Invalid endpoint URL {0}")]
    InvalidEndpoint(String),

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("Backend credentials missing: {0}")]
    MissingCredentials(&'static str),

    #[error("Relay control failed on pin {pin}: {source}")]
    Relay {
        pin: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("WiFi association failed: {0}")]
    WifiAssociation(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
