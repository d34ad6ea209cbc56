//! Two-line status display.

use log::info;
use parking_lot::Mutex;

/// Which of the two display lines to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLine {
    First,
    Second,
}

impl DisplayLine {
    pub fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

/// Text sink for the device's status display.
pub trait StatusChannel: Send + Sync {
    fn set_line(&self, line: DisplayLine, text: &str);
}

/// Display adapter for hosts without an attached LCD: mirrors both lines
/// into the log and keeps the last text of each line.
#[derive(Default)]
pub struct LogStatusDisplay {
    lines: Mutex<[String; 2]>,
}

impl LogStatusDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text of both lines.
    pub fn lines(&self) -> [String; 2] {
        self.lines.lock().clone()
    }
}

impl StatusChannel for LogStatusDisplay {
    fn set_line(&self, line: DisplayLine, text: &str) {
        let index = usize::from(line.number() - 1);
        let mut lines = self.lines.lock();
        if lines[index] != text {
            lines[index] = text.to_string();
            info!("[Display] line {}: {}", line.number(), text);
        }
    }
}
