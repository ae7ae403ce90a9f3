//! Analytics file sink - appends events to a JSONL file
//!
//! One JSON object per line, in the order events were published.

use crate::io::analytics::AnalyticsEvent;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// JSONL writer for analytics events
pub struct AnalyticsLog {
    file_path: String,
}

impl AnalyticsLog {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "analytics_log_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Write an event; failures are logged, never propagated
    pub fn write_event(&self, event: &AnalyticsEvent) -> bool {
        match self.append_line(&event.to_json()) {
            Ok(()) => true,
            Err(e) => {
                warn!(file = %self.file_path, error = %e, "analytics_log_write_failed");
                false
            }
        }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path, bytes = %line.len(), "analytics_log_written");

        Ok(())
    }
}
