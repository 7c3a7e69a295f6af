//! Per-call cancellation and deadline signal.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use stockledger_core::{LedgerError, LedgerResult};

/// Cancellation/deadline carried by every backend call.
///
/// Cloning shares the cancellation signal. A context with neither a handle nor
/// a deadline never fires.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Fires the signal of the context it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CallContext {
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline(deadline)
    }

    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: Some(rx),
                deadline: None,
            },
            CancelHandle { tx },
        )
    }

    /// Tighten the deadline to `timeout` from now; an earlier deadline wins.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    /// Tighten the deadline; an earlier deadline wins.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline_at(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Fail fast if the signal has already fired.
    pub fn check(&self) -> LedgerResult<()> {
        if self.is_cancelled() {
            return Err(LedgerError::cancelled("cancelled by caller"));
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(LedgerError::cancelled("deadline exceeded"));
        }
        Ok(())
    }

    /// Drive `op` to completion unless the signal fires first, in which case
    /// `op` is dropped mid-flight and `Cancelled` is returned.
    pub async fn run<F, T>(&self, op: F) -> LedgerResult<T>
    where
        F: Future<Output = LedgerResult<T>>,
    {
        self.check()?;

        tokio::select! {
            biased;
            _ = wait_cancelled(self.cancel.clone()) => {
                Err(LedgerError::cancelled("cancelled by caller"))
            }
            _ = wait_deadline(self.deadline) => {
                Err(LedgerError::cancelled("deadline exceeded"))
            }
            out = op => out,
        }
    }
}

async fn wait_cancelled(rx: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = rx {
        if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
            return;
        }
    }
    // Handle dropped without firing: never cancels.
    std::future::pending::<()>().await
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_context_runs_to_completion() {
        let ctx = CallContext::background();
        let out = ctx.run(async { Ok::<_, LedgerError>(7) }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test]
    async fn cancel_aborts_in_flight_operation() {
        let (ctx, handle) = CallContext::cancellable();

        let task = tokio::spawn(async move {
            ctx.run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, LedgerError>(())
            })
            .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_cancelled() {
        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, LedgerError>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::cancelled("deadline exceeded"));
    }

    #[tokio::test]
    async fn already_cancelled_context_fails_before_polling() {
        let (ctx, handle) = CallContext::cancellable();
        handle.cancel();

        let mut polled = false;
        let out = ctx
            .run(async {
                polled = true;
                Ok::<_, LedgerError>(())
            })
            .await;

        assert!(out.is_err());
        assert!(!polled);
        assert!(ctx.check().is_err());
    }

    #[test]
    fn earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = CallContext::with_deadline(now + Duration::from_secs(1))
            .deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline_at(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn dropped_handle_never_cancels() {
        let (ctx, handle) = CallContext::cancellable();
        drop(handle);
        assert!(ctx.check().is_ok());
    }
}
