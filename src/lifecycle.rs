//! Process lifecycle: the shutdown signal shared by the loop and the capture stream
//!
//! Frame reads block their task, so the signal is an atomic flag that
//! blocking code polls between waits. Async code awaits
//! [`ShutdownSignal::triggered`] instead, which lets a pending network call
//! be dropped as soon as the interrupt arrives.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    raised: AtomicBool,
    notify: Notify,
}

/// Cloneable flag raised once when the process should stop
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl ShutdownSignal {
    /// Create a new, unraised signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown
    pub fn trigger(&self) {
        if !self.inner.raised.swap(true, Ordering::SeqCst) {
            tracing::debug!("shutdown signal raised");
        }
        self.inner.notify.notify_waiters();
    }

    /// Whether shutdown has been requested
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested
    pub async fn triggered(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a trigger in between is not lost
        notified.as_mut().enable();

        if self.is_triggered() {
            return;
        }
        notified.await;
    }

    /// Drive `fut` to completion unless shutdown is requested first
    ///
    /// Returns `None`, dropping `fut`, when the signal is or becomes raised.
    pub async fn run_until_triggered<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.triggered() => None,
            output = fut => Some(output),
        }
    }
}

/// Raise `signal` when the process receives Ctrl-C
///
/// Must be called from inside a tokio runtime.
pub fn listen_for_ctrl_c(signal: ShutdownSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            signal.trigger();
        }
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!other.is_triggered());

        signal.trigger();
        assert!(other.is_triggered());

        // Idempotent
        other.trigger();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_triggered_wakes_waiter() {
        let signal = ShutdownSignal::new();
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.triggered().await }
        });

        tokio::task::yield_now().await;
        signal.trigger();

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_triggered_returns_when_already_raised() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        tokio::time::timeout(Duration::from_secs(5), signal.triggered())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_until_triggered() {
        let signal = ShutdownSignal::new();
        assert_eq!(signal.run_until_triggered(async { 7 }).await, Some(7));

        // A call that never finishes is dropped once the signal is raised
        let hung = async {
            signal.trigger();
            std::future::pending::<()>().await;
        };
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            signal.run_until_triggered(hung),
        )
        .await
        .unwrap();
        assert_eq!(outcome, None);
    }
}
