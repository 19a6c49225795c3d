use tokio::sync::watch;

use crate::context::Context;

/// One-shot broadcast flag telling the driver that its pool needs rediscovery.
///
/// Once armed it stays armed. Every balancer instance owns its own signal.
pub struct RefreshSignal {
    tx: watch::Sender<bool>,
}

impl RefreshSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Returns `true` only for the call that actually armed the signal.
    pub fn arm(&self) -> bool {
        self.tx.send_if_modified(|armed| {
            if *armed {
                return false;
            }
            *armed = true;
            true
        })
    }

    pub fn is_armed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until the signal is armed (`true`) or `ctx` is done (`false`).
    ///
    /// A done context always wins, even if the signal is armed at the same time.
    pub async fn wait(&self, ctx: &Context) -> bool {
        let mut rx = self.tx.subscribe();

        tokio::select! {
            biased;

            _ = ctx.done() => false,
            // the sender lives in `self`, so this can't fail while we wait
            armed = async { rx.wait_for(|armed| *armed).await.is_ok() } => armed,
        }
    }
}

impl Default for RefreshSignal {
    fn default() -> Self {
        Self::new()
    }
}
