//! Bounded polling of long-running operations.
//!
//! [`wait_until_done`] drives a [`Probe`] until it reports a terminal
//! status. Time is read and slept through an injected [`Clock`] so tests can
//! fast-forward, and every await is raced against a [`CancellationToken`].
//!
//! # Budget
//!
//! | Outcome of one probe | Next step                                      |
//! |----------------------|------------------------------------------------|
//! | `InProgress`         | sleep `delay`, reset the retry counter         |
//! | `Succeeded`          | return `Ok(())`                                |
//! | `Failed(reason)`     | return `AppError::Transport`                   |
//! | transport error      | sleep `retry_delay`, up to `retry_attempts`    |
//! | any other error      | return it unchanged                            |
//!
//! The loop gives up with `AppError::Timeout` once the next sleep would
//! exceed `timeout` measured from the first probe.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{AppError, BoxFuture, Result};

/// Cadence and budget of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between probes while the operation is in progress.
    pub delay: Duration,
    /// Consecutive transient probe failures tolerated.
    pub retry_attempts: u32,
    /// Delay after a transient probe failure.
    pub retry_delay: Duration,
    /// Overall polling budget.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            retry_attempts: 30,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(15 * 60),
        }
    }
}

/// Status reported by one probe of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Still running.
    InProgress,
    /// Completed successfully.
    Succeeded,
    /// Completed with a failure reported by the backend.
    Failed(String),
}

/// One status query against a long-running operation.
pub trait Probe: Send {
    /// Query the current operation status.
    ///
    /// # Errors
    ///
    /// [`AppError::Transport`] is treated as transient; other errors abort
    /// the poll loop.
    fn probe(&mut self) -> BoxFuture<'_, ProbeStatus>;
}

/// Source of time for the poll loop.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Sleep for `duration`.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Wall clock backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Clock whose sleeps return immediately and advance virtual time.
///
/// Records every requested sleep so callers can assert on the cadence.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Create a clock starting at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Advance virtual time without recording a sleep.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += by;
        }
    }

    /// Virtual time elapsed since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or_default()
    }

    /// Sleeps requested so far, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        self.advance(duration);
        Box::pin(tokio::task::yield_now())
    }
}

/// Poll `probe` until the operation finishes, fails, times out, or `cancel`
/// fires.
///
/// `operation` names the operation in logs and error messages.
///
/// # Errors
///
/// - [`AppError::Cancelled`] when `cancel` fires.
/// - [`AppError::Timeout`] when the budget in `policy` is exhausted.
/// - [`AppError::Transport`] when the backend reports failure, or the last
///   transient error once `retry_attempts` is exceeded.
/// - Any non-transport error from the probe, unchanged.
pub async fn wait_until_done<P>(
    probe: &mut P,
    policy: &PollPolicy,
    clock: &dyn Clock,
    cancel: &CancellationToken,
    operation: &str,
) -> Result<()>
where
    P: Probe + ?Sized,
{
    let started = clock.now();
    let mut failures: u32 = 0;
    let mut polls: u32 = 0;

    loop {
        polls += 1;
        let outcome = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                return Err(AppError::Cancelled(format!("{operation}: polling cancelled")));
            }

            outcome = probe.probe() => outcome,
        };

        let delay = match outcome {
            Ok(ProbeStatus::Succeeded) => {
                info!(operation, polls, "long-running operation succeeded");
                return Ok(());
            }
            Ok(ProbeStatus::Failed(reason)) => {
                warn!(operation, %reason, "long-running operation failed");
                return Err(AppError::Transport(format!("{operation} failed: {reason}")));
            }
            Ok(ProbeStatus::InProgress) => {
                failures = 0;
                debug!(operation, polls, "operation in progress");
                policy.delay
            }
            Err(AppError::Transport(msg)) => {
                failures += 1;
                if failures > policy.retry_attempts {
                    warn!(operation, failures, "poll retry budget exhausted");
                    return Err(AppError::Transport(msg));
                }
                warn!(operation, failures, error = %msg, "transient poll failure, retrying");
                policy.retry_delay
            }
            Err(err) => return Err(err),
        };

        let elapsed = clock.now().saturating_duration_since(started);
        if elapsed + delay > policy.timeout {
            return Err(AppError::Timeout(format!(
                "{operation} did not complete within {:?}",
                policy.timeout
            )));
        }

        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                return Err(AppError::Cancelled(format!("{operation}: polling cancelled")));
            }

            () = clock.sleep(delay) => {}
        }
    }
}

/// Await `fut` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`AppError::Cancelled`] naming `what` if `cancel` wins, otherwise
/// whatever `fut` resolves to.
pub async fn cancellable<T, F>(cancel: &CancellationToken, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;

        () = cancel.cancelled() => Err(AppError::Cancelled(format!("{what} cancelled"))),
        outcome = fut => outcome,
    }
}
