pub mod wifi;

pub use wifi::{WifiControl, WpaSupplicantWifi};
