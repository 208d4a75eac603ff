//! Leaf executors and adapters.
//!
//! Sources:
//!
//! - [`from_iter`]: emits the items of an iterator
//! - [`from_stream`]: emits the `Ok` items of a stream, failing on `Err`
//! - [`from_handoff`] / [`handoff_channel`]: emits what a producer task
//!   sends through a [`Handoff`] of [`Take`] values
//! - [`from_poll_fn`]: wraps a closure
//!
//! Adapters:
//!
//! - [`Ensuring`]: attaches a finalizer to an executor
//! - [`TakeStream`]: views an executor as a stream of [`Take`] values
//! - [`Collect`]: drives an executor to completion

use super::executor::{Executor, FinalizeAll, Finalizer, Settled, Step, misuse};
use crate::error::ExecutorError;
use crate::stream::{Chunk, Take};
use crate::sync::Handoff;
use crate::tracing_compat::trace;
use crate::types::{Cause, Exit};
use futures_lite::{Stream, ready};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Executor emitting the items of an iterator.
///
/// Created by [`from_iter`].
pub struct IterExecutor<I, D, E> {
    iter: I,
    done: Option<D>,
    _error: PhantomData<fn() -> E>,
}

/// Emits every item of `items`, then finishes with `()`.
pub fn from_iter<I, E>(items: I) -> IterExecutor<I::IntoIter, (), E>
where
    I: IntoIterator,
{
    IterExecutor {
        iter: items.into_iter(),
        done: Some(()),
        _error: PhantomData,
    }
}

impl<I, D, E> IterExecutor<I, D, E> {
    /// Finishes with `done` instead of `()`.
    pub fn with_done<D2>(self, done: D2) -> IterExecutor<I, D2, E> {
        IterExecutor {
            iter: self.iter,
            done: Some(done),
            _error: PhantomData,
        }
    }
}

impl<I, D, E> Executor for IterExecutor<I, D, E>
where
    I: Iterator,
    E: Clone + Send + 'static,
{
    type Out = I::Item;
    type Done = D;
    type Error = E;

    fn poll_pull(&mut self, _cx: &mut Context<'_>) -> Poll<Step<I::Item, D, E>> {
        if let Some(item) = self.iter.next() {
            return Poll::Ready(Step::Emit(item));
        }
        Poll::Ready(Step::Done(match self.done.take() {
            Some(done) => Exit::Success(done),
            None => misuse(ExecutorError::PulledAfterCompletion),
        }))
    }

    fn close(&mut self, _exit: &Exit<E, ()>) -> Option<Finalizer<E>> {
        self.done = None;
        None
    }
}

impl<I, D, E> fmt::Debug for IterExecutor<I, D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterExecutor")
            .field("finished", &self.done.is_none())
            .finish_non_exhaustive()
    }
}

/// Executor backed by a closure.
///
/// Created by [`from_poll_fn`]. Closing drops nothing and has no finalizer.
pub struct PollFn<F, O, D, E> {
    f: F,
    _step: PhantomData<fn() -> Step<O, D, E>>,
}

/// Creates an executor that calls `f` on every pull.
pub fn from_poll_fn<O, D, E, F>(f: F) -> PollFn<F, O, D, E>
where
    F: FnMut(&mut Context<'_>) -> Poll<Step<O, D, E>>,
{
    PollFn {
        f,
        _step: PhantomData,
    }
}

impl<F, O, D, E> Executor for PollFn<F, O, D, E>
where
    F: FnMut(&mut Context<'_>) -> Poll<Step<O, D, E>>,
    E: Clone + Send + 'static,
{
    type Out = O;
    type Done = D;
    type Error = E;

    fn poll_pull(&mut self, cx: &mut Context<'_>) -> Poll<Step<O, D, E>> {
        (self.f)(cx)
    }

    fn close(&mut self, _exit: &Exit<E, ()>) -> Option<Finalizer<E>> {
        None
    }
}

impl<F, O, D, E> fmt::Debug for PollFn<F, O, D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollFn").finish_non_exhaustive()
    }
}

/// Executor emitting the `Ok` items of a stream.
///
/// An `Err` item fails the executor; the end of the stream finishes it with
/// `()`. Created by [`from_stream`].
pub struct StreamExecutor<S> {
    stream: Option<S>,
}

/// Emits the `Ok` items of `stream`, failing on the first `Err`.
pub fn from_stream<S, A, E>(stream: S) -> StreamExecutor<S>
where
    S: Stream<Item = Result<A, E>> + Unpin,
{
    StreamExecutor {
        stream: Some(stream),
    }
}

impl<S, A, E> Executor for StreamExecutor<S>
where
    S: Stream<Item = Result<A, E>> + Unpin,
    E: Clone + Send + 'static,
{
    type Out = A;
    type Done = ();
    type Error = E;

    fn poll_pull(&mut self, cx: &mut Context<'_>) -> Poll<Step<A, (), E>> {
        let Some(stream) = self.stream.as_mut() else {
            return Poll::Ready(Step::Done(misuse(ExecutorError::PulledAfterCompletion)));
        };
        let step = match ready!(Pin::new(stream).poll_next(cx)) {
            Some(Ok(item)) => return Poll::Ready(Step::Emit(item)),
            Some(Err(error)) => Step::Done(Exit::fail(error)),
            None => Step::Done(Exit::Success(())),
        };
        self.stream = None;
        Poll::Ready(step)
    }

    fn close(&mut self, _exit: &Exit<E, ()>) -> Option<Finalizer<E>> {
        self.stream = None;
        None
    }
}

impl<S> fmt::Debug for StreamExecutor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamExecutor")
            .field("finished", &self.stream.is_none())
            .finish()
    }
}

type PendingTake<E, A> = Pin<Box<dyn Future<Output = Take<E, A>> + Send>>;

/// Executor fed by a producer through a [`Handoff`].
///
/// Each [`Take`] the producer sends is unpacked: chunk elements are emitted
/// one by one, end-of-stream finishes the executor with `()`, and a failure
/// fails it. Created by [`from_handoff`] or [`handoff_channel`].
pub struct HandoffExecutor<E, A> {
    handoff: Handoff<Take<E, A>>,
    pending: Option<PendingTake<E, A>>,
    current: Option<(Chunk<A>, usize)>,
    finished: bool,
}

/// Consumes the takes offered on `handoff`.
pub fn from_handoff<E, A>(handoff: Handoff<Take<E, A>>) -> HandoffExecutor<E, A> {
    HandoffExecutor {
        handoff,
        pending: None,
        current: None,
        finished: false,
    }
}

/// Creates a connected producer/executor pair.
#[must_use]
pub fn handoff_channel<E, A>() -> (HandoffSink<E, A>, HandoffExecutor<E, A>) {
    let handoff = Handoff::new();
    (HandoffSink::new(handoff.clone()), from_handoff(handoff))
}

impl<E, A> Executor for HandoffExecutor<E, A>
where
    E: Clone + Send + 'static,
    A: Clone + Send + Sync + 'static,
{
    type Out = A;
    type Done = ();
    type Error = E;

    fn poll_pull(&mut self, cx: &mut Context<'_>) -> Poll<Step<A, (), E>> {
        loop {
            if let Some((chunk, next)) = self.current.as_mut() {
                if let Some(item) = chunk.get(*next) {
                    *next += 1;
                    return Poll::Ready(Step::Emit(item.clone()));
                }
                self.current = None;
            }
            if self.finished {
                return Poll::Ready(Step::Done(misuse(ExecutorError::PulledAfterCompletion)));
            }

            let pending = self.pending.get_or_insert_with(|| {
                let handoff = self.handoff.clone();
                Box::pin(async move { handoff.take().await })
            });
            let take = ready!(pending.as_mut().poll(cx));
            self.pending = None;
            match take.done() {
                Ok(chunk) => self.current = Some((chunk, 0)),
                Err(None) => {
                    trace!("handoff source reached end");
                    self.finished = true;
                    return Poll::Ready(Step::Done(Exit::Success(())));
                }
                Err(Some(cause)) => {
                    self.finished = true;
                    return Poll::Ready(Step::Done(Exit::Failure(cause)));
                }
            }
        }
    }

    fn close(&mut self, _exit: &Exit<E, ()>) -> Option<Finalizer<E>> {
        self.pending = None;
        self.current = None;
        self.finished = true;
        None
    }
}

impl<E, A> fmt::Debug for HandoffExecutor<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffExecutor")
            .field("waiting", &self.pending.is_some())
            .field("finished", &self.finished)
            .finish()
    }
}

/// The producer side of a [`HandoffExecutor`].
///
/// Every send completes only once the executor has taken the value.
pub struct HandoffSink<E, A> {
    handoff: Handoff<Take<E, A>>,
}

impl<E, A> HandoffSink<E, A> {
    /// Wraps the producer end of `handoff`.
    #[must_use]
    pub const fn new(handoff: Handoff<Take<E, A>>) -> Self {
        Self { handoff }
    }

    /// Sends one element.
    pub async fn emit(&self, item: A) {
        self.handoff.offer(Take::singleton(item)).await;
    }

    /// Sends a chunk of elements.
    pub async fn emit_chunk(&self, chunk: Chunk<A>) {
        self.handoff.offer(Take::chunk(chunk)).await;
    }

    /// Fails the executor.
    pub async fn fail(&self, error: E) {
        self.handoff.offer(Take::fail(error)).await;
    }

    /// Fails the executor with an arbitrary cause.
    pub async fn fail_cause(&self, cause: Cause<E>) {
        self.handoff.offer(Take::fail_cause(cause)).await;
    }

    /// Ends the executor successfully.
    pub async fn end(&self) {
        self.handoff.offer(Take::end()).await;
    }
}

impl<E, A> Clone for HandoffSink<E, A> {
    fn clone(&self) -> Self {
        Self {
            handoff: self.handoff.clone(),
        }
    }
}

impl<E, A> fmt::Debug for HandoffSink<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffSink")
            .field("handoff", &self.handoff)
            .finish()
    }
}

/// Executor with an extra finalizer.
///
/// Created by [`ExecutorExt::ensuring`](super::ExecutorExt::ensuring). The
/// extra finalizer runs after the inner executor's own finalizer.
pub struct Ensuring<X, F> {
    inner: X,
    finalizer: Option<F>,
}

impl<X, F> Ensuring<X, F> {
    pub(crate) const fn new(inner: X, finalizer: F) -> Self {
        Self {
            inner,
            finalizer: Some(finalizer),
        }
    }

    /// Returns the inner executor.
    pub const fn get_ref(&self) -> &X {
        &self.inner
    }
}

impl<X, F, Fut> Executor for Ensuring<X, F>
where
    X: Executor,
    F: FnOnce(&Exit<X::Error, ()>) -> Fut,
    Fut: Future<Output = Exit<X::Error, ()>> + Send + 'static,
{
    type Out = X::Out;
    type Done = X::Done;
    type Error = X::Error;

    fn poll_pull(&mut self, cx: &mut Context<'_>) -> Poll<Step<X::Out, X::Done, X::Error>> {
        self.inner.poll_pull(cx)
    }

    fn close(&mut self, exit: &Exit<X::Error, ()>) -> Option<Finalizer<X::Error>> {
        let mut all = FinalizeAll::new();
        all.push_opt(self.inner.close(exit));
        if let Some(finalizer) = self.finalizer.take() {
            all.push(Box::pin(finalizer(exit)));
        }
        all.into_finalizer()
    }
}

impl<X: fmt::Debug, F> fmt::Debug for Ensuring<X, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ensuring")
            .field("inner", &self.inner)
            .field("armed", &self.finalizer.is_some())
            .finish()
    }
}

/// Stream of [`Take`] values read from an executor.
///
/// Each output becomes a singleton take. When the executor finishes it is
/// closed, its finalizer runs, and the stream yields a final end or failure
/// take before ending. Created by
/// [`ExecutorExt::into_take_stream`](super::ExecutorExt::into_take_stream).
pub struct TakeStream<X: Executor> {
    executor: X,
    finishing: Option<Settled<X::Error, X::Done>>,
    ended: bool,
}

impl<X: Executor> TakeStream<X> {
    pub(crate) const fn new(executor: X) -> Self {
        Self {
            executor,
            finishing: None,
            ended: false,
        }
    }
}

impl<X: Executor> Unpin for TakeStream<X> {}

impl<X: Executor> Stream for TakeStream<X> {
    type Item = Take<X::Error, X::Out>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.ended {
                return Poll::Ready(None);
            }
            if let Some(settled) = this.finishing.as_mut() {
                ready!(settled.poll_finalize(cx));
                let exit = this.finishing.take().map(Settled::into_exit);
                this.ended = true;
                return Poll::Ready(Some(match exit {
                    Some(Exit::Failure(cause)) => Take::fail_cause(cause),
                    Some(Exit::Success(_)) | None => Take::end(),
                }));
            }
            match ready!(this.executor.poll_pull(cx)) {
                Step::Emit(out) => return Poll::Ready(Some(Take::singleton(out))),
                Step::Done(exit) => {
                    let finalizer = this.executor.close(&exit.to_unit());
                    this.finishing = Some(Settled::new(exit, finalizer));
                }
            }
        }
    }
}

impl<X: Executor> fmt::Debug for TakeStream<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TakeStream")
            .field("finishing", &self.finishing.is_some())
            .field("ended", &self.ended)
            .finish()
    }
}

/// Future driving an executor to completion.
///
/// Resolves to every output plus the done value, or to the failure. The
/// executor is closed with its own exit and the finalizer's outcome is
/// folded into the result. Created by
/// [`ExecutorExt::collect`](super::ExecutorExt::collect).
#[must_use = "futures do nothing unless polled"]
pub struct Collect<X: Executor> {
    executor: X,
    items: Vec<X::Out>,
    finishing: Option<Settled<X::Error, X::Done>>,
}

impl<X: Executor> Collect<X> {
    pub(crate) const fn new(executor: X) -> Self {
        Self {
            executor,
            items: Vec::new(),
            finishing: None,
        }
    }
}

impl<X: Executor> Unpin for Collect<X> {}

impl<X: Executor> Future for Collect<X> {
    type Output = Exit<X::Error, (Vec<X::Out>, X::Done)>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            if let Some(settled) = this.finishing.as_mut() {
                ready!(settled.poll_finalize(cx));
                let exit = match this.finishing.take() {
                    Some(settled) => settled.into_exit(),
                    None => misuse(ExecutorError::PulledAfterCompletion),
                };
                let items = std::mem::take(&mut this.items);
                return Poll::Ready(exit.map(|done| (items, done)));
            }
            match ready!(this.executor.poll_pull(cx)) {
                Step::Emit(out) => this.items.push(out),
                Step::Done(exit) => {
                    let finalizer = this.executor.close(&exit.to_unit());
                    this.finishing = Some(Settled::new(exit, finalizer));
                }
            }
        }
    }
}

impl<X: Executor> fmt::Debug for Collect<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collect")
            .field("collected", &self.items.len())
            .field("finishing", &self.finishing.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ExecutorExt;
    use futures_lite::StreamExt;
    use futures_lite::future::block_on;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn iter_source_emits_then_finishes_once() {
        init_test("iter_source_emits_then_finishes_once");
        let mut source = from_iter::<_, ()>(vec!['a', 'b']).with_done(7);
        let steps: Vec<_> = (0..4)
            .map(|_| crate::test_utils::pull_once(&mut source))
            .collect();
        assert!(matches!(steps[0], Poll::Ready(Step::Emit('a'))));
        assert!(matches!(steps[1], Poll::Ready(Step::Emit('b'))));
        assert!(matches!(steps[2], Poll::Ready(Step::Done(Exit::Success(7)))));
        let misuse_reported = matches!(
            &steps[3],
            Poll::Ready(Step::Done(Exit::Failure(Cause::Die(_))))
        );
        crate::assert_with_log!(misuse_reported, "second done is a defect", "Die", steps[3]);
        crate::test_complete!("iter_source_emits_then_finishes_once");
    }

    #[test]
    fn stream_source_fails_on_err() {
        init_test("stream_source_fails_on_err");
        let stream = futures_lite::stream::iter(vec![Ok(1), Ok(2), Err("bad"), Ok(3)]);
        let exit = block_on(from_stream(stream).collect());
        crate::assert_with_log!(exit == Exit::fail("bad"), "fails", "bad", exit);
        crate::test_complete!("stream_source_fails_on_err");
    }

    #[test]
    fn ensuring_runs_after_inner_finalizer_once() {
        init_test("ensuring_runs_after_inner_finalizer_once");
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (inner_log, outer_log) = (Arc::clone(&log), Arc::clone(&log));
        let source = from_iter::<_, &str>(vec![1, 2])
            .ensuring(move |_| async move {
                inner_log.lock().push("inner");
                Exit::succeed(())
            })
            .ensuring(move |exit| {
                let failed = exit.is_failure();
                async move {
                    outer_log.lock().push(if failed { "outer-failed" } else { "outer" });
                    Exit::succeed(())
                }
            });
        let exit = block_on(source.collect());
        assert_eq!(exit, Exit::succeed((vec![1, 2], ())));
        let order = log.lock().clone();
        crate::assert_with_log!(order == vec!["inner", "outer"], "inner first", vec!["inner", "outer"], order);
        crate::test_complete!("ensuring_runs_after_inner_finalizer_once");
    }

    #[test]
    fn collect_reports_finalizer_failure() {
        init_test("collect_reports_finalizer_failure");
        let source = from_iter::<_, &str>(vec![1]).ensuring(|_| async { Exit::fail("cleanup") });
        let exit = block_on(source.collect());
        crate::assert_with_log!(exit == Exit::fail("cleanup"), "cleanup failure", "cleanup", exit);
        crate::test_complete!("collect_reports_finalizer_failure");
    }

    #[test]
    fn take_stream_ends_with_end_or_failure() {
        init_test("take_stream_ends_with_end_or_failure");
        let takes: Vec<Take<&str, i32>> =
            block_on(from_iter::<_, &str>(vec![1, 2]).into_take_stream().collect());
        assert_eq!(takes.len(), 3);
        assert!(takes[0].is_success() && takes[1].is_success());
        assert!(takes[2].is_done());

        let stream = futures_lite::stream::iter(vec![Ok(1), Err("bad")]);
        let takes: Vec<Take<&str, i32>> = block_on(from_stream(stream).into_take_stream().collect());
        assert_eq!(takes.len(), 2);
        assert!(takes[1].is_failure());
        crate::test_complete!("take_stream_ends_with_end_or_failure");
    }

    #[test]
    fn handoff_source_receives_from_another_thread() {
        init_test("handoff_source_receives_from_another_thread");
        let (sink, source) = handoff_channel::<&'static str, i32>();
        let handle = std::thread::spawn(move || {
            block_on(async {
                sink.emit(1).await;
                sink.emit_chunk(Chunk::from(vec![2, 3])).await;
                sink.end().await;
            });
        });
        let exit = block_on(source.collect());
        handle.join().expect("producer panicked");
        crate::assert_with_log!(
            exit == Exit::succeed((vec![1, 2, 3], ())),
            "all elements in order",
            vec![1, 2, 3],
            exit
        );
        crate::test_complete!("handoff_source_receives_from_another_thread");
    }

    #[test]
    fn handoff_source_propagates_failure() {
        init_test("handoff_source_propagates_failure");
        let (sink, source) = handoff_channel::<&'static str, i32>();
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        let source = source.ensuring(move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Exit::succeed(())
        });
        let handle = std::thread::spawn(move || {
            block_on(async {
                sink.emit(1).await;
                sink.fail("producer failed").await;
            });
        });
        let exit = block_on(source.collect());
        handle.join().expect("producer panicked");
        assert_eq!(exit, Exit::fail("producer failed"));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        crate::test_complete!("handoff_source_propagates_failure");
    }
}
