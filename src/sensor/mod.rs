//! Sensor control/status API.
//!
//! [`SensorGateway`] is the capability the orchestrator and the recovery
//! controller depend on; [`HttpSensorGateway`] is the production adapter
//! talking to the sensor's on-device HTTP server.

mod gateway;
mod http;

pub use gateway::{FRAME_WINDOW, Frame, SensorGateway, frame_window};
pub use http::HttpSensorGateway;
