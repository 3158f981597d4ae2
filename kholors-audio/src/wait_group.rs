//! Counter that lets a submitter block until workers signal N completions.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct WaitGroup {
    count: Mutex<usize>,
    zero: Condvar,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Expect `n` more calls to [`done`](Self::done).
    pub fn add(&self, n: usize) {
        *self.lock() += n;
    }

    /// Signal one completion. Wakes every waiter when the count reaches zero.
    pub fn done(&self) {
        let mut count = self.lock();
        if *count == 0 {
            log::warn!(target: "fft", "wait group signalled more often than expected");
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    /// Block until the count is zero. Returns immediately if it already is.
    pub fn wait(&self) {
        let mut count = self.lock();
        while *count > 0 {
            count = self.zero.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn pending(&self) -> usize {
        *self.lock()
    }
}
