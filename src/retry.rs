//! Retrying of backend calls and polling for asynchronous backend changes.
//!
//! Some backend mutations (adding a shared member, deleting a file system)
//! are acknowledged before every host reflects them. Instead of sleeping a
//! fixed time the console polls a status query with exponential backoff.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use crate::error::SamFsError;

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryAction<E: Debug> {
    RetryNow,
    WaitFor(Duration),
    ReturnError(E),
}

/// Decides, for every failed attempt, whether to retry and when.
pub trait RetryPolicy<E: Debug> {
    fn on_ok(&mut self, _: u32) {}
    fn on_err(&mut self, attempt: u32, err: E) -> RetryAction<E>;
}

impl<P, E: Debug> RetryPolicy<E> for P
where
    P: FnMut(u32, E) -> RetryAction<E>,
{
    fn on_err(&mut self, attempt: u32, err: E) -> RetryAction<E> {
        (*self)(attempt, err)
    }
}

/// Run the future built by `factory` until it succeeds or the policy gives up.
///
/// A finished future must not be polled again, so every attempt builds a new
/// one from the attempt number.
pub async fn retry_future<T, E, F, FF>(factory: FF, mut policy: impl RetryPolicy<E>) -> Result<T, E>
where
    E: Debug,
    F: Future<Output = Result<T, E>>,
    FF: Fn(u32) -> F,
{
    let mut attempt = 0u32;
    loop {
        match factory(attempt).await {
            Ok(x) => {
                policy.on_ok(attempt);
                return Ok(x);
            }
            Err(e) => {
                let action = policy.on_err(attempt, e);
                tracing::debug!("attempt {} => action: {:?}", attempt, action);
                match action {
                    RetryAction::RetryNow => {}
                    RetryAction::WaitFor(duration) => tokio::time::sleep(duration).await,
                    RetryAction::ReturnError(err) => return Err(err),
                }
            }
        }
        attempt += 1;
    }
}

/// Exponential backoff without jitter.
///
/// ```text
/// attempt  delay (initial 250ms)
///  0       250ms
///  1       375ms
///  2       562ms
///  3       843ms
///  4       1.265s
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            multiplier: 1.5,
            max_delay: Duration::from_secs(10),
            max_attempts,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Error used internally while polling.
#[derive(Debug)]
enum PollError {
    NotYet,
    Failed(SamFsError),
}

/// Result of [`poll_until`].
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Ready,
    /// The condition did not hold within the allowed attempts.
    TimedOut,
    Failed(SamFsError),
}

/// Poll `probe` until it reports `true`, backing off between attempts.
/// Backend errors stop the poll immediately.
pub async fn poll_until<F, FF>(probe: FF, backoff: &ExponentialBackoff) -> PollOutcome
where
    F: Future<Output = Result<bool, SamFsError>>,
    FF: Fn() -> F,
{
    let factory = |_| {
        let fut = probe();
        async move {
            match fut.await {
                Ok(true) => Ok(()),
                Ok(false) => Err(PollError::NotYet),
                Err(e) => Err(PollError::Failed(e)),
            }
        }
    };
    let policy = |attempt: u32, err: PollError| match err {
        PollError::NotYet if attempt + 1 < backoff.max_attempts => {
            RetryAction::WaitFor(backoff.delay(attempt))
        }
        other => RetryAction::ReturnError(other),
    };

    match retry_future(factory, policy).await {
        Ok(()) => PollOutcome::Ready,
        Err(PollError::NotYet) => PollOutcome::TimedOut,
        Err(PollError::Failed(e)) => PollOutcome::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> ExponentialBackoff {
        ExponentialBackoff::new(max_attempts).with_initial_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_backoff_delays() {
        let backoff = ExponentialBackoff::new(8);
        assert_eq!(backoff.delay(0), Duration::from_millis(250));
        assert_eq!(backoff.delay(1), Duration::from_millis(375));
        assert_eq!(backoff.delay(40), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_retry_future_gives_up() {
        let calls = AtomicU32::new(0);
        let res: Result<(), &str> = retry_future(
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            },
            |attempt: u32, e| {
                if attempt < 2 {
                    RetryAction::RetryNow
                } else {
                    RetryAction::ReturnError(e)
                }
            },
        )
        .await;
        assert_eq!(res, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_ready() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome = poll_until(
            || {
                let calls = calls.clone();
                async move { Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2) }
            },
            &fast(5),
        )
        .await;
        assert_eq!(outcome, PollOutcome::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome = poll_until(
            || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(false)
                }
            },
            &fast(4),
        )
        .await;
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_poll_until_stops_on_error() {
        let outcome = poll_until(|| async { Err(SamFsError::not_found()) }, &fast(4)).await;
        assert_eq!(outcome, PollOutcome::Failed(SamFsError::not_found()));
    }
}
