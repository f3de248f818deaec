//! Retry orchestration for transactions.

use crate::client::Client;
use crate::config::RetryConfig;
use crate::error::{TransactionError, TxnResult};
use crate::transaction::{AttemptState, RetryContext, Transaction};
use crate::transport::Transport;
use tracing::{debug, warn};

/// Runs user functions in transactions, retrying contended commits.
pub struct TransactionRunner<T: Transport> {
    client: Client<T>,
    retry: RetryConfig,
}

impl<T: Transport> TransactionRunner<T> {
    /// Creates a runner using the client's transaction retry settings.
    pub fn new(client: Client<T>) -> Self {
        let retry = client.config().transaction_retry.clone();
        Self { client, retry }
    }

    /// Overrides the retry settings.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Runs `f` inside a transaction and commits its writes.
    ///
    /// Each attempt begins a transaction, calls `f`, then commits. A begin
    /// failure is returned as is. If `f` fails, the attempt is rolled back
    /// and `f`'s error is returned. A retryable commit failure starts a new
    /// attempt (same request tag, empty write batch, retry marker naming the
    /// failed transaction) after a backoff, until `max_attempts` is reached.
    /// `f` may therefore run more than once.
    pub fn run<R, F>(&self, mut f: F) -> TxnResult<R>
    where
        F: FnMut(&mut Transaction<T>) -> TxnResult<R>,
    {
        let max_attempts = self.retry.max_attempts;
        let mut retry: Option<RetryContext> = None;
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for_attempt(attempt);
                std::thread::sleep(delay);
            }

            let mut txn = match retry.take() {
                Some(context) => Transaction::with_retry(self.client.clone(), context),
                None => Transaction::new(self.client.clone()),
            };
            txn.begin()?;

            let value = match f(&mut txn) {
                Ok(value) => value,
                Err(err) => {
                    debug!(request_tag = %txn.request_tag(), error = %err, "transaction function failed");
                    rollback_quietly(&mut txn);
                    return Err(err);
                }
            };

            match txn.commit() {
                Ok(_) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                    debug!(
                        request_tag = %txn.request_tag(),
                        attempt = attempt + 1,
                        error = %err,
                        "retrying transaction"
                    );
                    retry = Some(txn.retry_context());
                    last_error = Some(err);
                }
                Err(err) => {
                    rollback_quietly(&mut txn);
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransactionError::invalid_argument("max_attempts must be at least 1")
        }))
    }
}

/// Rolls back an attempt that is still live. Failures are logged only.
fn rollback_quietly<T: Transport>(txn: &mut Transaction<T>) {
    if !matches!(txn.state(), AttemptState::Active | AttemptState::CommitFailed) {
        return;
    }
    if let Err(err) = txn.rollback() {
        warn!(request_tag = %txn.request_tag(), error = %err, "rollback failed");
    }
}
