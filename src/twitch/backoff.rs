use std::time::Duration;

/// Exponential reconnect delay: 1s, 2s, 4s ... capped at `max_delay`
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    current_attempt: u32,
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::with_config(Duration::from_secs(1), Duration::from_secs(60))
    }

    pub fn with_config(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            current_attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.current_attempt);
        self.current_attempt = self.current_attempt.saturating_add(1);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Call after a session was established
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempt_count(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}
