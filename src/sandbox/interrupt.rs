use std::sync::OnceLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptReason {
    Timeout(Duration),
    Cancelled,
}

/// Cooperative cancel hook shared between one script execution and its watcher.
///
/// The interpreter polls [`Interrupt::is_triggered`] at its safepoints; blocking
/// host calls await [`Interrupt::triggered`]. The first trigger wins.
#[derive(Debug, Default)]
pub struct Interrupt {
    token: CancellationToken,
    reason: OnceLock<InterruptReason>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, reason: InterruptReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<InterruptReason> {
        self.reason.get().copied()
    }

    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }
}

/// Spawn the watcher for one execution.
///
/// It fires the interrupt when the caller's context is cancelled or the
/// execution budget elapses, and exits quietly once `finished` is cancelled.
pub fn spawn_watcher(
    ctx: CancellationToken,
    budget: Duration,
    interrupt: std::sync::Arc<Interrupt>,
    finished: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = finished.cancelled() => {}
            () = ctx.cancelled() => interrupt.trigger(InterruptReason::Cancelled),
            () = tokio::time::sleep(budget) => interrupt.trigger(InterruptReason::Timeout(budget)),
        }
    })
}
