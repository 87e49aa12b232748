use crate::selection::FilterSelection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Receives the selection that survived a quiescence window.
pub type ApplyFn = Arc<dyn Fn(FilterSelection) + Send + Sync>;

/// Trailing-edge debouncer for filter changes.
///
/// Every submitted selection restarts the timer; when the timer elapses the
/// most recent selection is applied once. Shutting the coalescer down (or
/// dropping it) discards whatever is still pending.
pub struct FilterCoalescer {
    tx: mpsc::UnboundedSender<FilterSelection>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl FilterCoalescer {
    /// Start the debounce task on the current tokio runtime.
    pub fn spawn<F>(delay: Duration, apply: F) -> Self
    where
        F: Fn(FilterSelection) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_coalescer(rx, delay, shutdown.clone(), Arc::new(apply)));
        Self { tx, shutdown, task }
    }

    /// Queue a selection. Returns `false` once the coalescer is shut down.
    pub fn submit(&self, selection: FilterSelection) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        self.tx.send(selection).is_ok()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled() || self.task.is_finished()
    }
}

impl Drop for FilterCoalescer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_coalescer(
    mut rx: mpsc::UnboundedReceiver<FilterSelection>,
    delay: Duration,
    shutdown: CancellationToken,
    apply: ApplyFn,
) {
    loop {
        let mut pending = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = rx.recv() => match next {
                Some(selection) => selection,
                None => break,
            },
        };
        let mut coalesced = 0usize;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(coalesced, "dropping pending filter change on shutdown");
                    return;
                }
                next = rx.recv() => match next {
                    Some(selection) => {
                        pending = selection;
                        coalesced += 1;
                    }
                    None => return,
                },
                _ = sleep(delay) => {
                    debug!(coalesced, values = pending.len(), "applying coalesced filter");
                    apply(pending);
                    break;
                }
            }
        }
    }
}
