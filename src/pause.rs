//! Interruptible waits for connection backoff and the cooling period

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub trait Pause: Send + Sync {
    /// Wait for `d`. Returns `false` when the wait was cancelled.
    fn pause(&self, d: Duration) -> bool;
}

/// Real-time timer that Ctrl-C can cut short.
#[derive(Default)]
pub struct CancellableTimer {
    cancelled: Mutex<bool>,
    cv: Condvar,
}

impl CancellableTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every waiter; all later pauses return `false` immediately.
    pub fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }
}

impl Pause for CancellableTimer {
    fn pause(&self, d: Duration) -> bool {
        let deadline = Instant::now() + d;
        let mut cancelled = self.cancelled.lock();
        while !*cancelled {
            if self.cv.wait_until(&mut cancelled, deadline).timed_out() {
                return !*cancelled;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn short_pause_completes() {
        let t = CancellableTimer::new();
        assert!(t.pause(Duration::from_millis(10)));
    }

    #[test]
    fn cancel_wakes_a_long_pause() {
        let t = Arc::new(CancellableTimer::new());
        let t2 = t.clone();
        let start = Instant::now();
        assert!(!t.is_cancelled());
        let h = thread::spawn(move || t2.pause(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(50));
        t.cancel();
        assert!(!h.join().unwrap());
        assert!(t.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(!t.pause(Duration::from_secs(30)));
    }
}
