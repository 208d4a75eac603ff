//! The pull/close contract shared by every source and driver.
//!
//! An [`Executor`] is a suspendable computation that emits a sequence of
//! outputs and then terminates with a done value or a failure. Consumers
//! drive it with [`Executor::poll_pull`] and must call [`Executor::close`]
//! exactly once when they are finished with it, whether it ran to
//! completion or not. `close` hands back the executor's finalizer, which the
//! caller runs to completion.
//!
//! # Finalization
//!
//! Finalizers are boxed `Send` futures. Once started, a finalizer is never
//! cancelled by the drivers in this crate: [`FinalizeAll`] runs a batch of
//! them one after another and keeps every failure side by side.

use crate::error::ExecutorError;
use crate::tracing_compat::warn;
use crate::types::{Defect, Exit};
use futures_lite::ready;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::halt::HaltStrategy;
use super::merge::{Merge, MergeDone, MergeExits, merge_exits};
use super::source::{Collect, Ensuring, TakeStream};
use super::subexecutor::FanOutBuilder;

/// A finalization computation returned by [`Executor::close`].
pub type Finalizer<E> = Pin<Box<dyn Future<Output = Exit<E, ()>> + Send>>;

/// One observable step of an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<O, D, E> {
    /// An output element.
    Emit(O),
    /// The executor terminated.
    Done(Exit<E, D>),
}

impl<O, D, E> Step<O, D, E> {
    /// Returns true for [`Step::Done`].
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// A pull-based source of outputs that terminates with a done value.
pub trait Executor {
    /// Emitted element type.
    type Out;
    /// Completion value type.
    type Done;
    /// Typed failure type.
    type Error: Clone + Send + 'static;

    /// Attempts to pull the next step.
    ///
    /// After [`Step::Done`] has been returned the executor is finished;
    /// pulling again yields a defect.
    fn poll_pull(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Step<Self::Out, Self::Done, Self::Error>>;

    /// Closes the executor with `exit`, returning its finalizer, if any.
    ///
    /// Closing twice returns `None` the second time.
    fn close(&mut self, exit: &Exit<Self::Error, ()>) -> Option<Finalizer<Self::Error>>;

    /// Returns a future resolving to the next step.
    fn pull(&mut self) -> Pull<'_, Self>
    where
        Self: Sized,
    {
        Pull { executor: self }
    }
}

impl<X: Executor + ?Sized> Executor for Box<X> {
    type Out = X::Out;
    type Done = X::Done;
    type Error = X::Error;

    fn poll_pull(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Step<Self::Out, Self::Done, Self::Error>> {
        (**self).poll_pull(cx)
    }

    fn close(&mut self, exit: &Exit<Self::Error, ()>) -> Option<Finalizer<Self::Error>> {
        (**self).close(exit)
    }
}

/// Future returned by [`Executor::pull`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Pull<'a, X> {
    executor: &'a mut X,
}

impl<X: Executor> Future for Pull<'_, X> {
    type Output = Step<X::Out, X::Done, X::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().executor.poll_pull(cx)
    }
}

/// A sequential batch of finalizers.
///
/// Each finalizer runs to completion before the next starts. The output
/// succeeds only if every finalizer succeeded; failures are combined with
/// [`Cause::both`](crate::Cause::both) in the order the finalizers ran.
pub struct FinalizeAll<E> {
    queue: VecDeque<Finalizer<E>>,
    exit: Exit<E, ()>,
}

impl<E> FinalizeAll<E> {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            exit: Exit::Success(()),
        }
    }

    /// Appends a finalizer.
    pub fn push(&mut self, finalizer: Finalizer<E>) {
        self.queue.push_back(finalizer);
    }

    /// Appends a finalizer if there is one.
    pub fn push_opt(&mut self, finalizer: Option<Finalizer<E>>) {
        if let Some(finalizer) = finalizer {
            self.push(finalizer);
        }
    }

    /// Number of finalizers still to run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if there is nothing left to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<E: Send + 'static> FinalizeAll<E> {
    /// Collapses the batch into one finalizer.
    ///
    /// Returns `None` for an empty batch and the finalizer itself for a batch
    /// of one.
    #[must_use]
    pub fn into_finalizer(mut self) -> Option<Finalizer<E>> {
        match self.queue.len() {
            0 => None,
            1 => self.queue.pop_front(),
            _ => Some(Box::pin(self)),
        }
    }
}

impl<E> Default for FinalizeAll<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> FromIterator<Finalizer<E>> for FinalizeAll<E> {
    fn from_iter<I: IntoIterator<Item = Finalizer<E>>>(iter: I) -> Self {
        Self {
            queue: iter.into_iter().collect(),
            exit: Exit::Success(()),
        }
    }
}

impl<E> Unpin for FinalizeAll<E> {}

impl<E> Future for FinalizeAll<E> {
    type Output = Exit<E, ()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Exit<E, ()>> {
        let this = self.get_mut();
        while let Some(finalizer) = this.queue.front_mut() {
            let exit = ready!(finalizer.as_mut().poll(cx));
            this.queue.pop_front();
            if exit.is_failure() {
                warn!(remaining = this.queue.len(), "finalizer failed");
            }
            let acc = std::mem::replace(&mut this.exit, Exit::Success(()));
            this.exit = acc.with_finalizer(exit);
        }
        Poll::Ready(std::mem::replace(&mut this.exit, Exit::Success(())))
    }
}

impl<E> fmt::Debug for FinalizeAll<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizeAll")
            .field("remaining", &self.queue.len())
            .field("failed", &self.exit.is_failure())
            .finish()
    }
}

/// A terminated executor: its exit plus the finalizer still to run.
///
/// The finalizer's outcome is folded into the exit with
/// [`Exit::with_finalizer`] once it has finished.
pub struct Settled<E, A> {
    exit: Exit<E, A>,
    finalizer: Option<Finalizer<E>>,
    finalized: Exit<E, ()>,
}

impl<E, A> Settled<E, A> {
    /// Records a terminated executor and its pending finalizer.
    #[must_use]
    pub fn new(exit: Exit<E, A>, finalizer: Option<Finalizer<E>>) -> Self {
        Self {
            exit,
            finalizer,
            finalized: Exit::Success(()),
        }
    }

    /// The exit reported by the executor itself.
    #[must_use]
    pub const fn exit(&self) -> &Exit<E, A> {
        &self.exit
    }

    /// Returns true once the finalizer has finished or if there was none.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalizer.is_none()
    }

    /// Drives the pending finalizer to completion.
    pub fn poll_finalize(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(finalizer) = self.finalizer.as_mut() {
            self.finalized = ready!(finalizer.as_mut().poll(cx));
            self.finalizer = None;
        }
        Poll::Ready(())
    }

    /// Returns the exit combined with the finalizer's outcome.
    #[must_use]
    pub fn into_exit(self) -> Exit<E, A> {
        self.exit.with_finalizer(self.finalized)
    }
}

impl<E: Send + 'static, A> Settled<E, A> {
    /// Hands over what is left of finalization: the finalizer if it has not
    /// finished yet, or the failure it already finished with.
    ///
    /// A recorded failure is handed over once; afterwards the settled exit
    /// no longer carries it.
    pub(crate) fn take_finalizer(&mut self) -> Option<Finalizer<E>> {
        if let Some(finalizer) = self.finalizer.take() {
            return Some(finalizer);
        }
        match std::mem::replace(&mut self.finalized, Exit::Success(())) {
            Exit::Success(()) => None,
            failed => Some(Box::pin(async move { failed })),
        }
    }
}

impl<E: fmt::Debug, A: fmt::Debug> fmt::Debug for Settled<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled")
            .field("exit", &self.exit)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

/// The exit reported when a finished executor is pulled again.
pub(crate) fn misuse<E, A>(err: ExecutorError) -> Exit<E, A> {
    Exit::die(Defect::from(err))
}

/// Combinators available on every [`Executor`].
pub trait ExecutorExt: Executor + Sized {
    /// Attaches a finalizer that runs after the executor's own finalizer
    /// whenever it is closed.
    fn ensuring<F, Fut>(self, finalizer: F) -> Ensuring<Self, F>
    where
        F: FnOnce(&Exit<Self::Error, ()>) -> Fut,
        Fut: Future<Output = Exit<Self::Error, ()>> + Send + 'static,
    {
        Ensuring::new(self, finalizer)
    }

    /// Views the executor as a stream of [`Take`](crate::Take) values.
    fn into_take_stream(self) -> TakeStream<Self> {
        TakeStream::new(self)
    }

    /// Drives the executor to completion, collecting every output.
    fn collect(self) -> Collect<Self> {
        Collect::new(self)
    }

    /// Merges with `right`, ending according to `strategy`.
    ///
    /// The done values are combined with [`merge_exits`].
    fn merge<R>(
        self,
        right: R,
        strategy: HaltStrategy,
    ) -> Merge<Self, R, MergeDone<Self::Done, R::Done>, MergeExits<Self::Error, Self::Done, R::Done>>
    where
        R: Executor<Out = Self::Out, Error = Self::Error>,
    {
        Merge::new(self, right, strategy, merge_exits)
    }

    /// Merges with `right`, folding both exits with `fold`.
    fn merge_with<R, D, F>(self, right: R, strategy: HaltStrategy, fold: F) -> Merge<Self, R, D, F>
    where
        R: Executor<Out = Self::Out, Error = Self::Error>,
        F: FnOnce(Exit<Self::Error, Self::Done>, Exit<Self::Error, R::Done>) -> Exit<Self::Error, D>,
    {
        Merge::new(self, right, strategy, fold)
    }

    /// Starts a fan-out: every upstream element spawns a child executor.
    ///
    /// Child done values are folded in registration order with
    /// `combine_child_results`; the fold is combined once with the upstream
    /// done value by `combine_with_child_result`.
    fn fan_out<C, D, F, G, H>(
        self,
        create_child: F,
        combine_child_results: G,
        combine_with_child_result: H,
    ) -> FanOutBuilder<Self, C, D>
    where
        C: Executor<Error = Self::Error>,
        F: FnMut(Self::Out) -> C + Send + 'static,
        G: FnMut(C::Done, C::Done) -> C::Done + Send + 'static,
        H: FnOnce(Option<C::Done>, Self::Done) -> D + Send + 'static,
    {
        FanOutBuilder::new(
            self,
            create_child,
            combine_child_results,
            combine_with_child_result,
        )
    }
}

impl<X: Executor> ExecutorExt for X {}
