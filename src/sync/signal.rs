//! One-shot signal: fire once, await many.
//!
//! A [`Signal`] starts unfired. [`Signal::fire`] flips it exactly once and
//! wakes every task waiting on it; later calls are no-ops. Waiting on a fired
//! signal resolves immediately, so a waiter that arrives late never misses
//! the notification.
//!
//! # Cancel Safety
//!
//! Dropping a [`SignalWait`] future is always safe; the only state it leaves
//! behind is a waker that will be discarded when the signal fires.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

#[derive(Debug, Default)]
struct SignalInner {
    fired: AtomicBool,
    waiters: Mutex<Vec<Waker>>,
}

/// A one-shot, multi-waiter notification cell.
///
/// Clones share the same cell.
#[derive(Debug, Clone, Default)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

impl Signal {
    /// Creates an unfired signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal, waking every waiter.
    ///
    /// Returns `true` if this call fired the signal and `false` if it had
    /// already been fired.
    pub fn fire(&self) -> bool {
        if self.inner.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        let waiters = std::mem::take(&mut *self.inner.waiters.lock());
        for waker in waiters {
            waker.wake();
        }
        true
    }

    /// Returns true once the signal has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Returns a future that resolves once the signal has fired.
    #[must_use]
    pub fn wait(&self) -> SignalWait {
        SignalWait {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns true if both handles refer to the same cell.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Future returned by [`Signal::wait`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct SignalWait {
    inner: Arc<SignalInner>,
}

impl Future for SignalWait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.inner.fired.load(Ordering::Acquire) {
            return Poll::Ready(());
        }

        let mut waiters = self.inner.waiters.lock();
        // Re-check under the lock: `fire` drains the list after setting the flag.
        if self.inner.fired.load(Ordering::Acquire) {
            return Poll::Ready(());
        }
        if !waiters.iter().any(|w| w.will_wake(cx.waker())) {
            waiters.push(cx.waker().clone());
        }
        drop(waiters);
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::noop_waker;
    use std::sync::atomic::AtomicUsize;
    use std::task::Wake;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[derive(Default)]
    struct WakeCounter {
        wakes: AtomicUsize,
    }

    impl Wake for WakeCounter {
        fn wake(self: Arc<Self>) {
            self.wakes.fetch_add(1, Ordering::Relaxed);
        }

        fn wake_by_ref(self: &Arc<Self>) {
            self.wakes.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn fire_is_idempotent() {
        init_test("fire_is_idempotent");
        let signal = Signal::new();
        assert!(!signal.is_fired());
        let first = signal.fire();
        let second = signal.clone().fire();
        crate::assert_with_log!(first && !second, "first call wins", (true, false), (first, second));
        assert!(signal.is_fired());
        crate::test_complete!("fire_is_idempotent");
    }

    #[test]
    fn fire_wakes_every_waiter() {
        init_test("fire_wakes_every_waiter");
        let signal = Signal::new();
        let counters: Vec<Arc<WakeCounter>> =
            (0..3).map(|_| Arc::new(WakeCounter::default())).collect();
        let mut waits: Vec<_> = counters.iter().map(|_| Box::pin(signal.wait())).collect();

        for (wait, counter) in waits.iter_mut().zip(&counters) {
            let waker = Waker::from(Arc::clone(counter));
            let mut cx = Context::from_waker(&waker);
            assert!(wait.as_mut().poll(&mut cx).is_pending());
        }

        signal.fire();
        for (wait, counter) in waits.iter_mut().zip(&counters) {
            let wakes = counter.wakes.load(Ordering::Relaxed);
            crate::assert_with_log!(wakes == 1, "woken once", 1, wakes);
            let waker = noop_waker();
            let mut cx = Context::from_waker(&waker);
            assert!(wait.as_mut().poll(&mut cx).is_ready());
        }
        crate::test_complete!("fire_wakes_every_waiter");
    }

    #[test]
    fn wait_after_fire_is_ready() {
        init_test("wait_after_fire_is_ready");
        let signal = Signal::new();
        signal.fire();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut wait = Box::pin(signal.wait());
        assert!(wait.as_mut().poll(&mut cx).is_ready());
        crate::test_complete!("wait_after_fire_is_ready");
    }

    #[test]
    fn repeated_polls_register_one_waker() {
        init_test("repeated_polls_register_one_waker");
        let signal = Signal::new();
        let counter = Arc::new(WakeCounter::default());
        let waker = Waker::from(Arc::clone(&counter));
        let mut cx = Context::from_waker(&waker);
        let mut wait = Box::pin(signal.wait());
        for _ in 0..5 {
            assert!(wait.as_mut().poll(&mut cx).is_pending());
        }
        signal.fire();
        let wakes = counter.wakes.load(Ordering::Relaxed);
        crate::assert_with_log!(wakes == 1, "single registration", 1, wakes);
        crate::test_complete!("repeated_polls_register_one_waker");
    }

    #[test]
    fn fire_from_another_thread() {
        init_test("fire_from_another_thread");
        let signal = Signal::new();
        let remote = signal.clone();
        let handle = std::thread::spawn(move || {
            remote.fire();
        });
        futures_lite::future::block_on(signal.wait());
        handle.join().expect("firing thread panicked");
        assert!(signal.is_fired());
        crate::test_complete!("fire_from_another_thread");
    }
}
