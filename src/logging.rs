//! Logging helpers shared by the relay pipeline

use std::time::Instant;

const PREVIEW_CHARS: usize = 150;

/// Logs how long a relay operation took when dropped
pub struct Timer {
    start: Instant,
    operation: &'static str,
    channel: String,
}

impl Timer {
    pub fn new(operation: &'static str, channel: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            operation,
            channel: channel.into(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        tracing::debug!(
            operation = self.operation,
            channel = %self.channel,
            duration_ms = duration_ms,
            "Operation completed"
        );
    }
}

/// Log an error with structured context
pub fn log_error(operation: &str, error: &impl std::error::Error) {
    tracing::error!(
        operation = %operation,
        error = %error,
        error_kind = std::any::type_name_of_val(error),
        "Operation failed"
    );
}

/// Shorten chat text for log lines
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}
