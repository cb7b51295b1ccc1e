use std::time::Duration;

/// Bounded exponential backoff for session establishment.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    /// The delays to sleep between consecutive attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let base = self.base_delay;
        (0..self.attempts.saturating_sub(1)).map(move |i| base * 2u32.saturating_pow(i))
    }
}
