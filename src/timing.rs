//! Stage timing.

use std::time::{Duration, Instant};

use tracing::info;

/// Measures one pipeline stage and logs its duration when finished.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    /// Start a new timer with the given stage name.
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finish the timer and log the elapsed time.
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!("[{}] {}", format_duration(elapsed), self.name);
        elapsed
    }
}

/// `12.3s`, or `2.5m` past a minute.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 60.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}s", secs)
    }
}
