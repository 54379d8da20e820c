use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Exponential backoff for model calls. Rate limits, 5xx responses and
/// timeout/connect failures are retried, everything else is returned as is.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no backoff
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_attempts.max(1) - 1
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        // retry_bounds rejects a minimum above the maximum
        let max_delay = self.max_delay.max(self.base_delay);
        ExponentialBackoff::builder()
            .retry_bounds(self.base_delay, max_delay)
            .build_with_max_retries(self.max_retries())
    }

    /// Wraps `client` so transient failures are retried with this policy
    pub fn client(&self, client: Client) -> ClientWithMiddleware {
        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(self.backoff()))
            .build()
    }
}
