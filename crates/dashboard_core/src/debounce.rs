use std::{
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

/// Trailing-edge debouncer: of a burst of submissions, only the value
/// still pending after a full quiet `window` reaches the receiver.
///
/// Each `submit` cancels the timer of the previous one, so intermediate
/// values are dropped without ever being delivered. Dropping the
/// debouncer cancels the pending timer too; nothing else is torn down.
pub struct Debouncer<T> {
    window: Duration,
    output: UnboundedSender<T>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(window: Duration) -> (Self, UnboundedReceiver<T>) {
        let (output, rx) = mpsc::unbounded_channel();
        (
            Self {
                window,
                output,
                pending: Mutex::new(None),
            },
            rx,
        )
    }

    /// Schedules `value` for delivery once the window elapses, dropping
    /// any value still waiting from an earlier call.
    pub fn submit(&self, value: T) {
        let window = self.window;
        let output = self.output.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = output.send(value);
        });
        if let Some(previous) = self.lock_pending().replace(task) {
            previous.abort();
        }
    }
}

impl<T> Debouncer<T> {
    /// Drops the pending value, if any, without delivering it.
    pub fn cancel(&self) {
        if let Some(previous) = self.lock_pending().take() {
            previous.abort();
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
