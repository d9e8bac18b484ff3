//! Deadline-bounded execution of blocking telemetry work.
//!
//! Exporter construction and the final flush are synchronous calls that may
//! stall on the network. They run on a detached thread so the caller can stop
//! waiting at the deadline; the thread is abandoned, never joined, which keeps
//! a stuck collector from holding up the process.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::error::panic_message;

/// Outcome of [`run_bounded`].
#[derive(Debug)]
pub(crate) enum Bounded<T> {
    /// The work finished in time.
    Completed(T),
    /// The work panicked, or its thread could not be started.
    Failed(String),
    /// The deadline passed first.
    TimedOut,
}

/// Run `work` on a detached thread and wait at most `deadline` for it.
///
/// The worker enters the caller's tokio runtime, if any, so that constructors
/// which spawn background tasks keep working.
pub(crate) async fn run_bounded<F, T>(deadline: Duration, work: F) -> Bounded<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let runtime = Handle::try_current().ok();

    let spawned = thread::Builder::new()
        .name("otel-wrapper-bounded".to_string())
        .spawn(move || {
            let _guard = runtime.as_ref().map(Handle::enter);
            let outcome = catch_unwind(AssertUnwindSafe(work));
            // The receiver is gone when the caller already gave up.
            let _ = tx.send(outcome);
        });

    if let Err(e) = spawned {
        return Bounded::Failed(format!("failed to spawn worker thread: {}", e));
    }

    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(Ok(value))) => Bounded::Completed(value),
        Ok(Ok(Err(payload))) => Bounded::Failed(panic_message(payload.as_ref())),
        Ok(Err(_)) => Bounded::Failed("worker thread exited without a result".to_string()),
        Err(_) => Bounded::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let outcome = run_bounded(Duration::from_secs(1), || 40 + 2).await;
        assert!(matches!(outcome, Bounded::Completed(42)));
    }

    #[tokio::test]
    async fn test_abandons_slow_work() {
        let started = Instant::now();
        let outcome = run_bounded(Duration::from_millis(50), || {
            thread::sleep(Duration::from_millis(500));
        })
        .await;

        assert!(matches!(outcome, Bounded::TimedOut));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let outcome: Bounded<()> =
            run_bounded(Duration::from_secs(1), || panic!("exporter exploded")).await;
        match outcome {
            Bounded::Failed(message) => assert_eq!(message, "exporter exploded"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_worker_sees_runtime() {
        let outcome = run_bounded(Duration::from_secs(1), || Handle::try_current().is_ok()).await;
        assert!(matches!(outcome, Bounded::Completed(true)));
    }
}
