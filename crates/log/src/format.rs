//! Format utilities (time)

use std::fmt;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};

/// Timer that can be switched off without changing the layer type.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    enabled: bool,
}

impl FormatTime for Timer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        if self.enabled {
            SystemTime.format_time(w)
        } else {
            Ok(())
        }
    }
}

/// Create the timer used by every fmt layer.
pub fn make_timer(enabled: bool) -> Timer {
    Timer { enabled }
}
