use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A spawned loop with its own stop signal.
///
/// The loop receives a `watch::Receiver<bool>` and must return once it
/// changes (or once the sender is dropped, which happens if the `Worker` is
/// dropped without [`Worker::shutdown`]).
#[derive(Debug)]
pub(crate) struct Worker {
    name: &'static str,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Worker {
    pub(crate) fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(body(stop_rx));
        Self { name, stop, handle }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop and wait for it to exit. A loop that misses the
    /// deadline is aborted, and the abort is awaited too, so the task is gone
    /// when this returns.
    pub(crate) async fn shutdown(self, timeout: Duration) {
        let Worker { name, stop, mut handle } = self;
        let _ = stop.send(true);

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => debug!(task = name, "stopped"),
            Ok(Err(e)) => warn!(task = name, error = %e, "task ended abnormally"),
            Err(_) => {
                warn!(task = name, ?timeout, "task did not stop in time, aborting");
                handle.abort();
                let _ = handle.await;
            }
        }
    }
}
