//! Cancellable deferred results and the timer/transport race.
//!
//! A [`Task`] is what every request returns: a future that resolves to the
//! response or rejects with a [`RequestError`], plus an [`AbortSignal`] the
//! caller can trigger. The same signal travels with the response, so
//! cancelling after the head arrived still aborts the body read.
//!
//! `ExchangeGuard` runs one phase of an exchange (head or body) against the
//! caller's signal and a deadline fixed when the request started. Whichever
//! side loses the race is dropped, which releases its timer or transport.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::RequestError;

/// Caller-side cancellation flag shared by a task, its provider and its response.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl AbortSignal {
    /// Creates a signal that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Triggers the signal. Idempotent.
    pub fn abort(&self) {
        self.sender.send_replace(true);
    }

    /// Returns true once [`abort`](Self::abort) has been called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves when the signal is triggered.
    pub async fn aborted(&self) {
        let mut receiver = self.sender.subscribe();
        if receiver.wait_for(|aborted| *aborted).await.is_err() {
            // sender lives as long as `self`
            std::future::pending::<()>().await;
        }
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Deferred result of a request or body read.
///
/// Awaiting the task yields the result; [`cancel`](Self::cancel) rejects it
/// with [`RequestError::Cancelled`] and aborts the transport.
pub struct Task<T> {
    future: BoxFuture<'static, Result<T, RequestError>>,
    signal: AbortSignal,
}

impl<T: Send + 'static> Task<T> {
    /// Wraps `future` so that triggering `signal` rejects it as cancelled.
    pub fn new<F>(signal: AbortSignal, url: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<T, RequestError>> + Send + 'static,
    {
        let url = url.into();
        let watched = signal.clone();
        let future = Box::pin(async move {
            tokio::select! {
                biased;
                () = watched.aborted() => Err(RequestError::cancelled(url)),
                result = future => result,
            }
        });
        Self { future, signal }
    }

    /// A task that is already rejected.
    #[must_use]
    pub fn rejected(error: RequestError) -> Self {
        Self {
            future: Box::pin(async move { Err(error) }),
            signal: AbortSignal::new(),
        }
    }
}

impl<T> Task<T> {
    /// Cancels the request: the transport is aborted and the timer released.
    pub fn cancel(&self) {
        self.signal.abort();
    }

    /// The signal shared with the provider and, once resolved, the response.
    #[must_use]
    pub fn abort_signal(&self) -> AbortSignal {
        self.signal.clone()
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, RequestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("aborted", &self.signal.is_aborted())
            .finish_non_exhaustive()
    }
}

/// One timeout window and one abort signal covering every phase of an exchange.
#[derive(Debug, Clone)]
pub(crate) struct ExchangeGuard {
    url: String,
    window: Option<(Instant, Duration)>,
    signal: AbortSignal,
}

impl ExchangeGuard {
    /// Starts the timer now. `url` must already be redacted.
    pub(crate) fn start(url: impl Into<String>, timeout: Option<Duration>, signal: AbortSignal) -> Self {
        Self {
            url: url.into(),
            // a window too large to represent never fires
            window: timeout.and_then(|timeout| {
                Instant::now()
                    .checked_add(timeout)
                    .map(|deadline| (deadline, timeout))
            }),
            signal,
        }
    }

    /// A guard with no timer and a private signal, for pre-buffered responses.
    pub(crate) fn unguarded() -> Self {
        Self::start(String::new(), None, AbortSignal::new())
    }

    pub(crate) fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Races `operation` against cancellation and the deadline.
    ///
    /// Completion wins ties with the timer; cancellation wins everything.
    pub(crate) async fn run<F, T>(&self, operation: F) -> Result<T, RequestError>
    where
        F: Future<Output = Result<T, RequestError>>,
    {
        if self.signal.is_aborted() {
            return Err(RequestError::cancelled(&self.url));
        }
        let timer = async {
            match self.window {
                Some((deadline, _)) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            () = self.signal.aborted() => Err(RequestError::cancelled(&self.url)),
            result = operation => result,
            () = timer => {
                let window = self.window.map(|(_, window)| window).unwrap_or_default();
                tracing::debug!(url = %self.url, timeout_ms = window.as_millis(), "request timed out");
                Err(RequestError::timeout(&self.url, window))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_starts_clear_and_latches() {
        let signal = AbortSignal::new();
        assert!(!signal.is_aborted());
        signal.abort();
        signal.abort();
        assert!(signal.is_aborted());
        // resolves immediately once triggered
        signal.aborted().await;
    }

    #[tokio::test]
    async fn test_task_resolves_with_inner_result() {
        let task = Task::new(AbortSignal::new(), "http://a/", async { Ok(7_u32) });
        assert_eq!(task.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_task_cancel_rejects_as_cancelled() {
        let task: Task<()> = Task::new(AbortSignal::new(), "http://a/", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });
        task.cancel();
        let error = task.await.unwrap_err();
        assert!(error.is_cancelled());
    }

    #[tokio::test]
    async fn test_rejected_task() {
        let task: Task<()> = Task::rejected(RequestError::dispatch("foo"));
        assert_eq!(task.await.unwrap_err().name(), "DispatchError");
    }

    #[tokio::test]
    async fn test_guard_times_out_slow_operation() {
        let guard = ExchangeGuard::start("http://a/", Some(Duration::from_millis(5)), AbortSignal::new());
        let result: Result<(), _> = guard
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        let error = result.unwrap_err();
        assert_eq!(error.name(), "TimeoutError");
    }

    #[tokio::test]
    async fn test_guard_window_is_not_restarted_between_phases() {
        let guard = ExchangeGuard::start("http://a/", Some(Duration::from_millis(40)), AbortSignal::new());
        let first: Result<(), _> = guard
            .run(async {
                tokio::time::sleep(Duration::from_millis(25)).await;
                Ok(())
            })
            .await;
        assert!(first.is_ok());
        // second phase alone fits in 40ms but the shared window does not
        let second: Result<(), _> = guard
            .run(async {
                tokio::time::sleep(Duration::from_millis(25)).await;
                Ok(())
            })
            .await;
        assert!(second.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_guard_cancel_is_not_timeout() {
        let signal = AbortSignal::new();
        let guard = ExchangeGuard::start("http://a/", Some(Duration::from_secs(30)), signal.clone());
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.abort();
        });
        let result: Result<(), _> = guard
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_guard_without_timeout_passes_result_through() {
        let guard = ExchangeGuard::unguarded();
        assert_eq!(guard.run(async { Ok(3) }).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unbounded_timeout_disables_timer() {
        let guard = ExchangeGuard::start("http://a/", Some(Duration::MAX), AbortSignal::new());
        let value = guard.run(async { Ok(1_u8) }).await.unwrap();
        assert_eq!(value, 1);

        let slow: Result<(), _> = guard
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(())
            })
            .await;
        assert!(slow.is_ok());
    }
}
