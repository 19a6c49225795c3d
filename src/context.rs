use std::{future, time::Duration};

use futures::future::select_all;
use tokio::{sync::watch, time::Instant};

/// Cancellation and deadline propagation for balancer calls.
///
/// Cheap to clone and may be shared between tasks. Children created with
/// [`Context::with_cancel`] or [`Context::with_timeout`] are done as soon as
/// their parent is done.
#[derive(Clone, Default)]
pub struct Context {
    cancels: Vec<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels the context it was created with. Dropping the handle cancels too.
#[must_use = "dropping the handle cancels the context immediately"]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Context {
    /// A context that is never done.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let (tx, rx) = watch::channel(false);

        let mut cancels = self.cancels.clone();
        cancels.push(rx);

        let ctx = Context {
            cancels,
            deadline: self.deadline,
        };
        (ctx, CancelHandle { tx })
    }

    pub fn with_timeout(&self, timeout: Duration) -> (Context, CancelHandle) {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> (Context, CancelHandle) {
        let (mut ctx, handle) = self.with_cancel();
        ctx.deadline = Some(match ctx.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        (ctx, handle)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_done(&self) -> bool {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }

        // a dropped sender means the handle is gone, which cancels as well
        self.cancels
            .iter()
            .any(|rx| *rx.borrow() || rx.has_changed().is_err())
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        // a passed deadline only fires once the timer driver runs
        if self.is_done() {
            return;
        }

        let cancelled = async {
            if self.cancels.is_empty() {
                return future::pending::<()>().await;
            }

            let waits = self.cancels.iter().cloned().map(|mut rx| {
                Box::pin(async move {
                    // Err means the sender was dropped
                    let _ = rx.wait_for(|cancelled| *cancelled).await;
                })
            });
            select_all(waits).await;
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = cancelled => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => cancelled.await,
        }
    }
}
