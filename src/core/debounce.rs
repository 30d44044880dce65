use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Coalesces bursts of calls into one run after an idle window.
///
/// Every [`schedule`](Debouncer::schedule) cancels the pending run and starts
/// the window again, so only the last task of a burst executes.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run `task` once `window` has passed without another call.
    ///
    /// Outside a tokio runtime there is nothing to wait on, so the task runs
    /// immediately.
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::debug!("No runtime available, running debounced task immediately");
            task();
            return;
        };

        let window = self.window;
        let next = handle.spawn(async move {
            tokio::time::sleep(window).await;
            task();
        });

        if let Some(previous) = self.pending.lock().replace(next) {
            previous.abort();
        }
    }

    /// Drop the pending run, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
