use std::future::Future;

use tokio::task::JoinHandle;

/// A spawned background task that is aborted on `cancel()` or drop.
///
/// Aborting drops the future at its next suspension point, so a pending
/// sleep or in-flight fetch never resumes.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn onto the current tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
