//! Helpers shared by the integration tests.

#![allow(dead_code)]

use confluence::channel::{Ensuring, Executor, ExecutorExt, Finalizer, PollFn, Step, from_poll_fn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::task::Poll;

pub use confluence::test_utils::init_test_logging;

/// A shared, ordered log of named events.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().iter().filter(|e| e.as_str() == event).count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == event)
    }
}

/// An executor that stays pending for `delay` pulls, waking itself each time,
/// then emits `items` and finishes with `done`.
pub fn delayed<T, D, E>(
    delay: usize,
    items: Vec<T>,
    done: D,
) -> PollFn<impl FnMut(&mut std::task::Context<'_>) -> Poll<Step<T, D, E>>, T, D, E>
where
    E: Clone + Send + 'static,
{
    let mut remaining = delay;
    let mut items = items.into_iter();
    let mut done = Some(done);
    from_poll_fn(move |cx| {
        if remaining > 0 {
            remaining -= 1;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        if let Some(item) = items.next() {
            return Poll::Ready(Step::Emit(item));
        }
        Poll::Ready(Step::Done(match done.take() {
            Some(done) => confluence::Exit::succeed(done),
            None => confluence::Exit::die(confluence::Defect::new("pulled after done")),
        }))
    })
}

/// Pulls until the executor finishes, collecting outputs.
pub fn drain<X: Executor>(executor: &mut X) -> (Vec<X::Out>, confluence::Exit<X::Error, X::Done>) {
    let mut items = Vec::new();
    loop {
        match futures_lite::future::block_on(executor.pull()) {
            Step::Emit(item) => items.push(item),
            Step::Done(exit) => return (items, exit),
        }
    }
}

/// Attaches a finalizer that records `"{name}:{how}"` when the executor is
/// closed, where `how` is `success`, `interrupted` or `failure`, and then
/// finishes with `outcome`.
pub fn logged_with<X: Executor>(
    executor: X,
    log: &EventLog,
    name: &'static str,
    outcome: confluence::Exit<X::Error, ()>,
) -> Ensuring<X, impl FnOnce(&confluence::Exit<X::Error, ()>) -> Finalizer<X::Error> + use<X>>
{
    let log = log.clone();
    executor.ensuring(move |exit: &confluence::Exit<X::Error, ()>| -> Finalizer<X::Error> {
        let how = if exit.is_success() {
            "success"
        } else if exit.is_interrupted() {
            "interrupted"
        } else {
            "failure"
        };
        Box::pin(async move {
            log.push(format!("{name}:{how}"));
            outcome
        })
    })
}

/// [`logged_with`] with a finalizer that succeeds.
pub fn logged<X: Executor>(
    executor: X,
    log: &EventLog,
    name: &'static str,
) -> Ensuring<X, impl FnOnce(&confluence::Exit<X::Error, ()>) -> Finalizer<X::Error> + use<X>>
{
    logged_with(executor, log, name, confluence::Exit::succeed(()))
}
