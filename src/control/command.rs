use std::fmt;

/// A parsed control command.
///
/// Wire grammar is comma separated; the verb is case-insensitive and the
/// number of fields must match exactly:
///
/// | verb     | fields                           |
/// |----------|----------------------------------|
/// | `wifi`   | `wifi,<ssid>,<password>,<bedId>` |
/// | `bed_id` | `bed_id,<bedId>`                 |
/// | `start`  | `start`                          |
/// | `stop`   | `stop`                           |
#[derive(Clone, PartialEq, Eq)]
pub enum ControlCommand {
    ConnectWifi {
        ssid: String,
        password: String,
        bed_id: String,
    },
    AssignBed {
        bed_id: String,
    },
    Start,
    Stop,
}

impl ControlCommand {
    /// Parse one raw command. Anything malformed yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        if raw.trim().is_empty() {
            return None;
        }

        let fields: Vec<&str> = raw.split(',').collect();
        let verb = fields[0].trim().to_ascii_lowercase();

        match (verb.as_str(), fields.as_slice()) {
            ("wifi", [_, ssid, password, bed_id]) if !ssid.is_empty() && !bed_id.is_empty() => {
                Some(Self::ConnectWifi {
                    ssid: ssid.to_string(),
                    password: password.to_string(),
                    bed_id: bed_id.trim().to_string(),
                })
            }
            ("bed_id", [_, bed_id]) if !bed_id.trim().is_empty() => Some(Self::AssignBed {
                bed_id: bed_id.trim().to_string(),
            }),
            ("start", [_]) => Some(Self::Start),
            ("stop", [_]) => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::ConnectWifi { .. } => "wifi",
            Self::AssignBed { .. } => "bed_id",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Debug for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectWifi { ssid, bed_id, .. } => f
                .debug_struct("ConnectWifi")
                .field("ssid", ssid)
                .field("password", &"<redacted>")
                .field("bed_id", bed_id)
                .finish(),
            Self::AssignBed { bed_id } => {
                f.debug_struct("AssignBed").field("bed_id", bed_id).finish()
            }
            Self::Start => f.write_str("Start"),
            Self::Stop => f.write_str("Stop"),
        }
    }
}
