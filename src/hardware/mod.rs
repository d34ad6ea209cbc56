//! Local hardware capabilities: the sensor power relay and the status display.

pub mod display;
pub mod relay;

pub use display::{DisplayLine, LogStatusDisplay, StatusChannel};
pub use relay::{NoopRelay, RelayControl, SysfsRelay};
