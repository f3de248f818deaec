//! Configuration for the transaction client.

use docstore_protocol::DatabaseName;
use rand::Rng;
use std::time::Duration;

/// Configuration for a client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Project id.
    pub project_id: String,
    /// Database id within the project.
    pub database_id: String,
    /// Server base URL, used by the HTTP transport.
    pub base_url: String,
    /// Per-request timeout, enforced by the transport.
    pub timeout: Duration,
    /// Attempts and backoff for whole transactions.
    pub transaction_retry: RetryConfig,
    /// Attempts and backoff for idempotent RPCs inside the transport.
    pub rpc_retry: RetryConfig,
}

impl ClientConfig {
    /// Creates a new client configuration.
    pub fn new(project_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".into(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(60),
            transaction_retry: RetryConfig::new(5),
            rpc_retry: RetryConfig::new(3),
        }
    }

    /// Sets the database id.
    pub fn with_database_id(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the transaction retry configuration.
    pub fn with_transaction_retry(mut self, retry: RetryConfig) -> Self {
        self.transaction_retry = retry;
        self
    }

    /// Sets the RPC retry configuration.
    pub fn with_rpc_retry(mut self, retry: RetryConfig) -> Self {
        self.rpc_retry = retry;
        self
    }

    /// Returns the fully qualified database name.
    pub fn database_name(&self) -> DatabaseName {
        DatabaseName::new(self.project_id.clone(), self.database_id.clone())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("local", "")
    }
}

/// Backoff policy shared by the transaction runner and the HTTP transport.
///
/// Attempt `0` runs immediately. Attempt `n` waits
/// `initial_delay * backoff_multiplier^(n-1)`, capped at `max_delay`, plus up
/// to a quarter of that again when jitter is on.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts allowed, counting the first.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single wait, before jitter.
    pub max_delay: Duration,
    /// Growth factor between consecutive waits.
    pub backoff_multiplier: f64,
    /// Randomizes waits so contending clients spread out.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Allows `max_attempts` attempts with a 1s initial wait growing by 1.5x.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.5,
            add_jitter: true,
        }
    }

    /// A single attempt and no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the wait before the second attempt.
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Caps every wait.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the growth factor between waits.
    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Returns how long to wait before attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let backoff = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        let backoff = Duration::from_secs_f64(backoff);

        if self.add_jitter {
            backoff + backoff.mul_f64(rand::thread_rng().gen_range(0.0..0.25))
        } else {
            backoff
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_builder() {
        let config = ClientConfig::new("demo", "https://docs.example.com")
            .with_database_id("orders")
            .with_timeout(Duration::from_secs(5))
            .with_transaction_retry(RetryConfig::new(2));

        assert_eq!(config.base_url, "https://docs.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.transaction_retry.max_attempts, 2);
        assert_eq!(
            config.database_name().to_string(),
            "projects/demo/databases/orders"
        );
    }

    #[test]
    fn default_database_id() {
        let config = ClientConfig::new("demo", "");
        assert_eq!(config.database_id, "(default)");
        assert_eq!(config.transaction_retry.max_attempts, 5);
    }

    #[test]
    fn single_attempt_never_waits() {
        let retry = RetryConfig::no_retry();
        assert_eq!(retry.max_attempts, 1);
        assert_eq!(retry.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn waits_grow_between_attempts() {
        let retry = RetryConfig::new(4)
            .with_initial_delay(Duration::from_secs(1))
            .with_backoff_multiplier(2.0)
            .with_jitter(false);

        assert_eq!(retry.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(retry.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(retry.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn jitter_adds_at_most_a_quarter() {
        let retry = RetryConfig::new(3).with_initial_delay(Duration::from_millis(400));
        for _ in 0..20 {
            let delay = retry.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= Duration::from_millis(500));
        }
    }

    #[test]
    fn waits_are_capped() {
        let retry = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(7))
            .with_backoff_multiplier(4.0)
            .with_jitter(false);

        assert_eq!(retry.delay_for_attempt(6), Duration::from_secs(7));
    }
}
