//! Single-slot notify/wait primitive.
//!
//! A `notify` that lands before the matching `wait` is remembered, so the
//! later `wait` returns at once instead of blocking.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct State {
    notified: bool,
    waiting: bool,
}

#[derive(Debug, Default)]
pub struct Rendezvous {
    state: Mutex<State>,
    cond: Condvar,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until notified. Consumes a notification that arrived early.
    pub fn wait(&self) {
        let mut state = self.lock();
        if state.notified {
            state.notified = false;
            return;
        }
        state.waiting = true;
        while state.waiting {
            state = self
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.notified = false;
    }

    /// Like [`Rendezvous::wait`] but gives up after `timeout`. Returns
    /// whether a notification was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        if state.notified {
            state.notified = false;
            return true;
        }
        state.waiting = true;
        while state.waiting {
            let now = Instant::now();
            if now >= deadline {
                state.waiting = false;
                return false;
            }
            let (next, _) = self
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }
        state.notified = false;
        true
    }

    /// Wake the waiter, or leave a notification for the next `wait`.
    pub fn notify(&self) {
        let mut state = self.lock();
        if state.waiting {
            // The waiter observes `waiting == false` as its wake condition,
            // which also filters spurious wakeups.
            state.waiting = false;
            self.cond.notify_one();
        } else {
            state.notified = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_notify_before_wait() {
        let r = Rendezvous::new();
        r.notify();
        r.wait();
        assert!(!r.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_before_notify() {
        let r = Arc::new(Rendezvous::new());
        let waiter = {
            let r = Arc::clone(&r);
            thread::spawn(move || r.wait())
        };
        while !r.lock().waiting {
            thread::yield_now();
        }
        r.notify();
        waiter.join().unwrap();
        assert!(!r.lock().notified);
    }

    #[test]
    fn test_repeated_notify_coalesces() {
        let r = Rendezvous::new();
        r.notify();
        r.notify();
        assert!(r.wait_timeout(Duration::from_millis(10)));
        assert!(!r.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_arbitrary_interleavings() {
        for i in 0..200 {
            let r = Arc::new(Rendezvous::new());
            let notifier = {
                let r = Arc::clone(&r);
                thread::spawn(move || {
                    if i % 2 == 0 {
                        thread::yield_now();
                    }
                    r.notify();
                })
            };
            assert!(r.wait_timeout(Duration::from_secs(5)));
            notifier.join().unwrap();
        }
    }
}
