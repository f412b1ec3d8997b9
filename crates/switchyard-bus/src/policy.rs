//! Reconnect policy: a fixed delay between attempts, no backoff.

use std::time::Duration;

/// Default delay between attempts in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 200;
/// Default per-attempt connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// How the connection task retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay between attempts.
    pub delay: Duration,
    /// Consecutive failed attempts after which the client gives up (`None` = never).
    pub max_attempts: Option<u32>,
    /// Deadline for the WebSocket connect plus STOMP handshake.
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_attempts: None,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

impl ReconnectPolicy {
    /// Set the delay between attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Cap consecutive failed attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the per-attempt connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Whether another attempt is allowed after `failures` consecutive failures.
    pub fn allows_retry(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_200ms_unlimited() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay, Duration::from_millis(200));
        assert_eq!(policy.max_attempts, None);
        assert!(policy.allows_retry(u32::MAX));
    }

    #[test]
    fn cap_stops_after_max_failures() {
        let policy = ReconnectPolicy::default().with_max_attempts(3);
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }

    #[test]
    fn builders_set_fields() {
        let policy = ReconnectPolicy::default()
            .with_delay(Duration::from_millis(20))
            .with_connect_timeout(Duration::from_secs(1));
        assert_eq!(policy.delay, Duration::from_millis(20));
        assert_eq!(policy.connect_timeout, Duration::from_secs(1));
    }
}
