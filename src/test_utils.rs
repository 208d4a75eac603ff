//! Shared helpers for unit and integration tests.
//!
//! Tests call [`init_test_logging`] once at the top, then bracket their body
//! with [`test_phase!`](crate::test_phase) and
//! [`test_complete!`](crate::test_complete). Assertions that should leave a
//! trace in the log use [`assert_with_log!`](crate::assert_with_log).
//!
//! Set `RUST_LOG=confluence=trace` to see driver transitions.

use std::sync::Arc;
use std::sync::Once;
use std::task::{Context, Poll, Wake, Waker};

use crate::channel::{Executor, Step};

static INIT: Once = Once::new();

/// Installs a test-friendly tracing subscriber exactly once per process.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("confluence=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

struct NoopWaker;

impl Wake for NoopWaker {
    fn wake(self: Arc<Self>) {}
}

/// Returns a waker that does nothing when woken.
#[must_use]
pub fn noop_waker() -> Waker {
    Waker::from(Arc::new(NoopWaker))
}

/// Polls an executor once with a no-op waker.
pub fn pull_once<X: Executor>(
    executor: &mut X,
) -> Poll<Step<X::Out, X::Done, X::Error>> {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    executor.poll_pull(&mut cx)
}

/// Logs the start of a test phase.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::tracing_compat::info!(test = $name, "test phase start")
    };
}

/// Logs the successful end of a test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::tracing_compat::info!(test = $name, "test complete")
    };
}

/// Asserts a condition, logging the expected and actual values on failure.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {{
        let ok: bool = $cond;
        if !ok {
            $crate::tracing_compat::error!(
                expected = ?$expected,
                actual = ?$actual,
                "assertion failed: {}",
                $msg
            );
        }
        assert!(
            ok,
            "{}: expected {:?}, got {:?}",
            $msg,
            $expected,
            $actual
        );
    }};
}
