use std::future::Future;

use tokio::sync::watch;

/// Owning side of a [`CancelToken`]. Dropping it also cancels.
#[derive(Debug)]
pub(crate) struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub(crate) fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Returns `false` if it was already cancelled.
    pub(crate) fn cancel(&self) -> bool {
        !self.tx.send_replace(true)
    }
}

/// Clonable teardown signal for async work started by a binder.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the owning binder is torn down.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // A dropped source counts as cancelled.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Drives `fut` unless cancellation wins first.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

#[cfg(test)]
#[path = "tests/cancel_tests.rs"]
mod tests;
