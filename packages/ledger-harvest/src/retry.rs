use std::{future::Future, time::Duration};

use backon::{ConstantBuilder, Retryable};

use crate::HarvestError;

/// Fixed-delay retry strategy shared by the block-index and transaction fetches.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,
    pub delay: Duration,
    /// Which errors are worth another attempt.
    pub retryable: fn(&HarvestError) -> bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            delay,
            retryable: HarvestError::is_retryable,
        }
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_attempts.saturating_sub(1))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or runs out of attempts.
    ///
    /// The last error is returned on failure. Sleeping happens on the tokio
    /// timer, so dropping the returned future cancels any pending backoff.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T, HarvestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HarvestError>>,
    {
        op.retry(self.backoff())
            .when(self.retryable)
            .notify(|err: &HarvestError, delay: Duration| {
                tracing::debug!("Retrying {label} in {delay:?}: {err}");
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let res = policy(5)
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(HarvestError::Transient("busy".to_owned()))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(res.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let res: Result<(), _> = policy(4)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HarvestError::Transient("busy".to_owned()))
            })
            .await;
        assert!(matches!(res, Err(HarvestError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let res: Result<(), _> = policy(10)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HarvestError::NotFound)
            })
            .await;
        assert!(matches!(res, Err(HarvestError::NotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
