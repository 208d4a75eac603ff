//! N-ary fan-out/fan-in: one upstream executor spawning child executors.
//!
//! Every element pulled from upstream becomes a child executor. The driver
//! pulls children one step at a time and emits whatever they produce, so the
//! combined output interleaves the children according to the caller's
//! policy:
//!
//! - `on_pull` picks an [`UpstreamPullStrategy`] at every decision point,
//!   which places a "pull upstream" marker in the ready queue and may emit a
//!   separator first
//! - `on_emit` answers every child element with a [`ChildExecutorDecision`]
//!
//! Children live in a [`SlotArena`]. A finished child's slot is settled with
//! its done value and never reused; settled values are folded with
//! `combine_child_results` strictly in registration order, whatever order the
//! children finished in. When upstream and every child have finished, the
//! fold is combined once with the upstream done value by
//! `combine_with_child_result`.
//!
//! # Failure
//!
//! A child failure, or a failing child finalizer, fails the whole fan-out:
//! the upstream executor and every running child are closed with the failure
//! exit and the final cause keeps every finalizer failure next to the
//! original one. An upstream failure does not cut children short; they drain
//! and the fan-out then finishes with the upstream failure.
//!
//! # Cancel Safety
//!
//! [`FanOut::close`] closes upstream and every running child, includes any
//! child finalizer already in progress, and returns one [`FinalizeAll`].

use super::decision::ChildExecutorDecision;
use super::executor::{Executor, FinalizeAll, Finalizer, Settled, Step, misuse};
use super::pull::{UpstreamPullRequest, UpstreamPullStrategy};
use crate::config::FanOutConfig;
use crate::error::{ConfigResult, ExecutorError};
use crate::tracing_compat::{debug, trace, warn};
use crate::types::{Cause, Exit};
use crate::util::arena::{SlotArena, SlotId};
use std::collections::VecDeque;
use std::fmt;
use std::task::{Context, Poll};

enum ChildSlot<C: Executor> {
    Running(C),
    Settled(C::Done),
}

/// An entry of the ready-work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ready {
    Upstream,
    Child(SlotId),
}

/// Resources shared by every state of one fan-out: the upstream executor,
/// the child arena, the ready queue and the running fold.
pub struct FanState<U: Executor, C: Executor> {
    upstream: U,
    children: SlotArena<ChildSlot<C>>,
    ready: VecDeque<Ready>,
    last_done: Option<C::Done>,
    fold_cursor: usize,
}

impl<U, C> FanState<U, C>
where
    U: Executor,
    C: Executor<Error = U::Error>,
{
    fn new(upstream: U) -> Self {
        Self {
            upstream,
            children: SlotArena::new(),
            ready: VecDeque::new(),
            last_done: None,
            fold_cursor: 0,
        }
    }

    /// Number of children that have not finished yet.
    #[must_use]
    pub fn active(&self) -> usize {
        self.children
            .iter()
            .filter(|(_, slot)| matches!(slot, ChildSlot::Running(_)))
            .count()
    }

    /// Number of children ever registered.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.children.registered()
    }

    /// Number of children waiting in the ready queue.
    #[must_use]
    pub fn queued_children(&self) -> usize {
        self.ready
            .iter()
            .filter(|entry| matches!(entry, Ready::Child(_)))
            .count()
    }

    /// Places the upstream marker the strategy asks for and returns its
    /// separator.
    ///
    /// Once upstream has finished the marker only decides when `on_pull` is
    /// consulted again, so it always goes behind at least one child and is
    /// dropped when no child is left.
    fn apply_pull_strategy(
        &mut self,
        strategy: UpstreamPullStrategy<C::Out>,
        upstream_finished: bool,
    ) -> Option<C::Out> {
        let pull_after_next = strategy.is_pull_after_next();
        let separator = strategy.into_separator();
        let queued = self.queued_children();
        if pull_after_next {
            if !upstream_finished {
                self.ready.push_front(Ready::Upstream);
            } else if queued > 0 {
                let at = self
                    .ready
                    .iter()
                    .position(|entry| matches!(entry, Ready::Child(_)))
                    .map_or(0, |index| index + 1);
                self.ready.insert(at, Ready::Upstream);
            }
        } else if !upstream_finished || queued > 0 {
            self.ready.push_back(Ready::Upstream);
        }
        separator
    }

    /// Settles `slot` with `done` and advances the fold.
    ///
    /// Returns the child if it was still running; the caller closes it.
    fn settle(
        &mut self,
        slot: SlotId,
        done: C::Done,
        combine: impl FnMut(C::Done, C::Done) -> C::Done,
    ) -> Option<C> {
        let previous = self.children.replace(slot, ChildSlot::Settled(done));
        self.fold_settled(combine);
        match previous {
            Some(ChildSlot::Running(child)) => Some(child),
            _ => None,
        }
    }

    /// Folds every settled slot that has no running slot before it.
    fn fold_settled(&mut self, mut combine: impl FnMut(C::Done, C::Done) -> C::Done) {
        while let Some(id) = self.children.id_at(self.fold_cursor) {
            if matches!(self.children.get(id), Some(ChildSlot::Running(_))) {
                break;
            }
            if let Some(ChildSlot::Settled(done)) = self.children.take(id) {
                self.last_done = Some(match self.last_done.take() {
                    Some(acc) => combine(acc, done),
                    None => done,
                });
            }
            self.fold_cursor += 1;
        }
    }

    /// Closes every running child in registration order, then upstream.
    fn close_all(mut self: Box<Self>, exit: &Exit<U::Error, ()>, all: &mut FinalizeAll<U::Error>) {
        for (_, slot) in self.children.iter_mut() {
            if let ChildSlot::Running(child) = slot {
                all.push_opt(child.close(exit));
            }
        }
        all.push_opt(self.upstream.close(exit));
    }
}

impl<U: Executor, C: Executor> fmt::Debug for FanState<U, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanState")
            .field("children", &self.children)
            .field("ready", &self.ready)
            .field("folded", &self.fold_cursor)
            .finish_non_exhaustive()
    }
}

/// The protocol state of a fan-out.
///
/// `PullFromChild` and `Emit` point back at the state they resume; only the
/// innermost `PullFromUpstream` or `DrainChildExecutors` owns the
/// [`FanState`].
pub enum Subexecutor<U: Executor, C: Executor> {
    /// Servicing the ready queue, pulling upstream when its marker comes up.
    PullFromUpstream(Box<FanState<U, C>>),
    /// Pulling one child.
    PullFromChild {
        /// The child's slot.
        slot: SlotId,
        /// The state to return to when the child finishes or yields.
        parent: Box<Self>,
    },
    /// Upstream has finished; servicing the remaining children.
    DrainChildExecutors {
        /// Shared resources.
        fan: Box<FanState<U, C>>,
        /// How upstream finished.
        upstream_done: Exit<U::Error, U::Done>,
    },
    /// A value to hand to the consumer before resuming `next`.
    Emit {
        /// The value.
        value: C::Out,
        /// The state to resume.
        next: Box<Self>,
    },
}

impl<U, C> Subexecutor<U, C>
where
    U: Executor,
    C: Executor<Error = U::Error>,
{
    /// Returns the name of the current state.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PullFromUpstream(_) => "PullFromUpstream",
            Self::PullFromChild { .. } => "PullFromChild",
            Self::DrainChildExecutors { .. } => "DrainChildExecutors",
            Self::Emit { .. } => "Emit",
        }
    }

    /// The shared resources this state works on.
    #[must_use]
    pub fn fan(&self) -> &FanState<U, C> {
        match self {
            Self::PullFromUpstream(fan) | Self::DrainChildExecutors { fan, .. } => &**fan,
            Self::PullFromChild { parent, .. } => parent.fan(),
            Self::Emit { next, .. } => next.fan(),
        }
    }

    fn fan_mut(&mut self) -> &mut FanState<U, C> {
        match self {
            Self::PullFromUpstream(fan) | Self::DrainChildExecutors { fan, .. } => &mut **fan,
            Self::PullFromChild { parent, .. } => parent.fan_mut(),
            Self::Emit { next, .. } => next.fan_mut(),
        }
    }

    fn emit_then(separator: Option<C::Out>, next: Self) -> Self {
        match separator {
            Some(value) => Self::Emit {
                value,
                next: Box::new(next),
            },
            None => next,
        }
    }

    fn close_into(self, exit: &Exit<U::Error, ()>, all: &mut FinalizeAll<U::Error>) {
        match self {
            Self::PullFromUpstream(fan) | Self::DrainChildExecutors { fan, .. } => {
                fan.close_all(exit, all);
            }
            Self::PullFromChild { parent, .. } => parent.close_into(exit, all),
            Self::Emit { next, .. } => next.close_into(exit, all),
        }
    }
}

impl<U: Executor, C: Executor> fmt::Debug for Subexecutor<U, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PullFromUpstream(fan) => f.debug_tuple("PullFromUpstream").field(fan).finish(),
            Self::PullFromChild { slot, parent } => f
                .debug_struct("PullFromChild")
                .field("slot", slot)
                .field("parent", parent)
                .finish(),
            Self::DrainChildExecutors { fan, upstream_done } => f
                .debug_struct("DrainChildExecutors")
                .field("fan", fan)
                .field("upstream_failed", &upstream_done.is_failure())
                .finish(),
            Self::Emit { next, .. } => f.debug_struct("Emit").field("next", next).finish_non_exhaustive(),
        }
    }
}

struct Policy<U: Executor, C: Executor, D> {
    create_child: Box<dyn FnMut(U::Out) -> C + Send>,
    combine_child_results: Box<dyn FnMut(C::Done, C::Done) -> C::Done + Send>,
    combine_with_child_result: Option<Box<dyn FnOnce(Option<C::Done>, U::Done) -> D + Send>>,
    on_pull: Option<Box<dyn FnMut(UpstreamPullRequest<&U::Out>) -> UpstreamPullStrategy<C::Out> + Send>>,
    on_emit: Option<Box<dyn FnMut(&C::Out) -> ChildExecutorDecision<C::Done> + Send>>,
}

impl<U: Executor, C: Executor, D> Policy<U, C, D> {
    fn pull_strategy(&mut self, request: UpstreamPullRequest<&U::Out>) -> UpstreamPullStrategy<C::Out> {
        match self.on_pull.as_mut() {
            Some(on_pull) => on_pull(request),
            None => UpstreamPullStrategy::PullAfterNext(None),
        }
    }

    fn decide(&mut self, value: &C::Out) -> ChildExecutorDecision<C::Done> {
        match self.on_emit.as_mut() {
            Some(on_emit) => on_emit(value),
            None => ChildExecutorDecision::Continue,
        }
    }
}

/// Builder for a [`FanOut`] driver.
///
/// Created by [`ExecutorExt::fan_out`](super::ExecutorExt::fan_out). Without
/// further configuration every decision point answers
/// `PullAfterNext(None)` and every child element answers `Continue`.
#[must_use = "builders do nothing until built"]
pub struct FanOutBuilder<U: Executor, C: Executor, D> {
    upstream: U,
    policy: Policy<U, C, D>,
}

impl<U, C, D> FanOutBuilder<U, C, D>
where
    U: Executor,
    C: Executor<Error = U::Error>,
{
    pub(crate) fn new<F, G, H>(
        upstream: U,
        create_child: F,
        combine_child_results: G,
        combine_with_child_result: H,
    ) -> Self
    where
        F: FnMut(U::Out) -> C + Send + 'static,
        G: FnMut(C::Done, C::Done) -> C::Done + Send + 'static,
        H: FnOnce(Option<C::Done>, U::Done) -> D + Send + 'static,
    {
        Self {
            upstream,
            policy: Policy {
                create_child: Box::new(create_child),
                combine_child_results: Box::new(combine_child_results),
                combine_with_child_result: Some(Box::new(combine_with_child_result)),
                on_pull: None,
                on_emit: None,
            },
        }
    }

    /// Sets the policy consulted whenever upstream produced an element or
    /// upstream has finished while children remain.
    pub fn on_pull<P>(mut self, on_pull: P) -> Self
    where
        P: FnMut(UpstreamPullRequest<&U::Out>) -> UpstreamPullStrategy<C::Out> + Send + 'static,
    {
        self.policy.on_pull = Some(Box::new(on_pull));
        self
    }

    /// Sets the policy consulted for every element a child emits.
    pub fn on_emit<P>(mut self, on_emit: P) -> Self
    where
        P: FnMut(&C::Out) -> ChildExecutorDecision<C::Done> + Send + 'static,
    {
        self.policy.on_emit = Some(Box::new(on_emit));
        self
    }

    /// Applies a preset.
    ///
    /// The preset replaces `on_pull`, and replaces `on_emit` when it sets
    /// `yield_every`.
    pub fn with_config(self, config: &FanOutConfig) -> ConfigResult<Self> {
        config.validate()?;
        let kind = config.pull_strategy;
        let mut builder = self.on_pull(move |_| kind.strategy());
        if let Some(every) = config.yield_every {
            let mut emitted = 0_usize;
            builder = builder.on_emit(move |_| {
                emitted += 1;
                if emitted % every == 0 {
                    ChildExecutorDecision::Yield
                } else {
                    ChildExecutorDecision::Continue
                }
            });
        }
        Ok(builder)
    }

    /// Builds the driver.
    pub fn build(self) -> FanOut<U, C, D> {
        FanOut {
            state: Some(Subexecutor::PullFromUpstream(Box::new(FanState::new(self.upstream)))),
            policy: self.policy,
            closing: None,
            finishing: None,
            closed: false,
        }
    }
}

impl<U: Executor, C: Executor, D> fmt::Debug for FanOutBuilder<U, C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutBuilder")
            .field("on_pull", &self.policy.on_pull.is_some())
            .field("on_emit", &self.policy.on_emit.is_some())
            .finish_non_exhaustive()
    }
}

/// What one step of the state machine decided.
enum Next<U: Executor, C: Executor> {
    Continue(Subexecutor<U, C>),
    Pending(Subexecutor<U, C>),
    Complete(Box<FanState<U, C>>, Exit<U::Error, U::Done>),
    Fail(Subexecutor<U, C>, Cause<U::Error>),
}

/// Driver running a fan-out to completion.
///
/// Child finalizers run as soon as the child finishes and before anything
/// else is pulled. The upstream finalizer runs once every child is done.
#[must_use = "executors do nothing unless pulled"]
pub struct FanOut<U: Executor, C: Executor, D> {
    state: Option<Subexecutor<U, C>>,
    policy: Policy<U, C, D>,
    closing: Option<Finalizer<U::Error>>,
    finishing: Option<Settled<U::Error, D>>,
    closed: bool,
}

impl<U, C, D> FanOut<U, C, D>
where
    U: Executor,
    C: Executor<Error = U::Error>,
{
    /// The current protocol state, or `None` once the fan-out has finished
    /// or been closed.
    #[must_use]
    pub const fn state(&self) -> Option<&Subexecutor<U, C>> {
        self.state.as_ref()
    }

    fn defer_finalizer(&mut self, finalizer: Option<Finalizer<U::Error>>) {
        self.closing = match (self.closing.take(), finalizer) {
            (Some(first), Some(second)) => FinalizeAll::from_iter([first, second]).into_finalizer(),
            (first, second) => first.or(second),
        };
    }

    /// Settles a child with `done`, closing it if it was still running.
    fn settle(&mut self, fan: &mut FanState<U, C>, slot: SlotId, done: C::Done) {
        if let Some(mut child) = fan.settle(slot, done, &mut self.policy.combine_child_results) {
            debug!(slot = %slot, "fan-out child settled");
            let finalizer = child.close(&Exit::Success(()));
            self.defer_finalizer(finalizer);
        }
    }

    fn step(&mut self, state: Subexecutor<U, C>, cx: &mut Context<'_>) -> Next<U, C> {
        match state {
            Subexecutor::PullFromUpstream(fan) => self.pull_upstream(fan, cx),
            Subexecutor::PullFromChild { slot, parent } => self.pull_child(slot, parent, cx),
            Subexecutor::DrainChildExecutors { fan, upstream_done } => self.drain(fan, upstream_done),
            state @ Subexecutor::Emit { .. } => Next::Continue(state),
        }
    }

    fn pull_upstream(&mut self, mut fan: Box<FanState<U, C>>, cx: &mut Context<'_>) -> Next<U, C> {
        let popped = match fan.ready.pop_front() {
            Some(Ready::Child(slot)) => {
                return Next::Continue(Subexecutor::PullFromChild {
                    slot,
                    parent: Box::new(Subexecutor::PullFromUpstream(fan)),
                });
            }
            popped => popped,
        };
        match fan.upstream.poll_pull(cx) {
            Poll::Pending => {
                if popped.is_some() {
                    fan.ready.push_front(Ready::Upstream);
                }
                Next::Pending(Subexecutor::PullFromUpstream(fan))
            }
            Poll::Ready(Step::Emit(value)) => {
                let strategy = self.policy.pull_strategy(UpstreamPullRequest::Pulled(&value));
                let child = (self.policy.create_child)(value);
                let slot = fan.children.insert(ChildSlot::Running(child));
                debug!(slot = %slot, "fan-out child registered");
                let separator = fan.apply_pull_strategy(strategy, false);
                let next = Subexecutor::PullFromChild {
                    slot,
                    parent: Box::new(Subexecutor::PullFromUpstream(fan)),
                };
                Next::Continue(Subexecutor::emit_then(separator, next))
            }
            Poll::Ready(Step::Done(exit)) => {
                fan.ready.retain(|entry| matches!(entry, Ready::Child(_)));
                debug!(
                    success = exit.is_success(),
                    remaining = fan.ready.len(),
                    "fan-out upstream finished"
                );
                if fan.ready.is_empty() {
                    Next::Complete(fan, exit)
                } else {
                    fan.ready.push_front(Ready::Upstream);
                    Next::Continue(Subexecutor::DrainChildExecutors {
                        fan,
                        upstream_done: exit,
                    })
                }
            }
        }
    }

    fn pull_child(
        &mut self,
        slot: SlotId,
        mut parent: Box<Subexecutor<U, C>>,
        cx: &mut Context<'_>,
    ) -> Next<U, C> {
        let polled = match parent.fan_mut().children.get_mut(slot) {
            Some(ChildSlot::Running(child)) => child.poll_pull(cx),
            _ => return Next::Continue(*parent),
        };
        match polled {
            Poll::Pending => Next::Pending(Subexecutor::PullFromChild { slot, parent }),
            Poll::Ready(Step::Emit(value)) => match self.policy.decide(&value) {
                ChildExecutorDecision::Continue => Next::Continue(Subexecutor::Emit {
                    value,
                    next: Box::new(Subexecutor::PullFromChild { slot, parent }),
                }),
                ChildExecutorDecision::Yield => {
                    trace!(slot = %slot, "fan-out child yielded");
                    parent.fan_mut().ready.push_back(Ready::Child(slot));
                    Next::Continue(Subexecutor::Emit { value, next: parent })
                }
                ChildExecutorDecision::Close(done) => {
                    self.settle(parent.fan_mut(), slot, done);
                    Next::Continue(Subexecutor::Emit { value, next: parent })
                }
            },
            Poll::Ready(Step::Done(Exit::Success(done))) => {
                self.settle(parent.fan_mut(), slot, done);
                Next::Continue(*parent)
            }
            Poll::Ready(Step::Done(Exit::Failure(cause))) => {
                debug!(slot = %slot, "fan-out child failed");
                Next::Fail(Subexecutor::PullFromChild { slot, parent }, cause)
            }
        }
    }

    fn drain(&mut self, mut fan: Box<FanState<U, C>>, upstream_done: Exit<U::Error, U::Done>) -> Next<U, C> {
        match fan.ready.pop_front() {
            None => Next::Complete(fan, upstream_done),
            Some(Ready::Child(slot)) => Next::Continue(Subexecutor::PullFromChild {
                slot,
                parent: Box::new(Subexecutor::DrainChildExecutors { fan, upstream_done }),
            }),
            Some(Ready::Upstream) => {
                let strategy = self
                    .policy
                    .pull_strategy(UpstreamPullRequest::NoUpstream(fan.active()));
                let separator = fan.apply_pull_strategy(strategy, true);
                Next::Continue(Subexecutor::emit_then(
                    separator,
                    Subexecutor::DrainChildExecutors { fan, upstream_done },
                ))
            }
        }
    }

    /// Closes upstream and computes the overall outcome.
    fn complete(&mut self, mut fan: Box<FanState<U, C>>, exit: Exit<U::Error, U::Done>) {
        let last_done = fan.last_done.take();
        let mut all = FinalizeAll::new();
        let unit = exit.to_unit();
        fan.close_all(&unit, &mut all);
        let outcome = match self.policy.combine_with_child_result.take() {
            Some(combine) => exit.map(|done| combine(last_done, done)),
            None => misuse(ExecutorError::PulledAfterCompletion),
        };
        debug!(success = outcome.is_success(), "fan-out finished");
        self.finishing = Some(Settled::new(outcome, all.into_finalizer()));
    }

    /// Closes everything with the failure and finishes with it.
    fn abort(&mut self, state: Subexecutor<U, C>, cause: Cause<U::Error>) {
        warn!(state = state.name(), "fan-out failed, closing everything");
        let exit = Exit::Failure(cause.clone());
        let mut all = FinalizeAll::new();
        all.push_opt(self.closing.take());
        state.close_into(&exit, &mut all);
        self.finishing = Some(Settled::new(Exit::Failure(cause), all.into_finalizer()));
    }
}

impl<U, C, D> Executor for FanOut<U, C, D>
where
    U: Executor,
    C: Executor<Error = U::Error>,
{
    type Out = C::Out;
    type Done = D;
    type Error = U::Error;

    fn poll_pull(&mut self, cx: &mut Context<'_>) -> Poll<Step<C::Out, D, U::Error>> {
        loop {
            if let Some(finishing) = self.finishing.as_mut() {
                if finishing.poll_finalize(cx).is_pending() {
                    return Poll::Pending;
                }
                let exit = self
                    .finishing
                    .take()
                    .map_or_else(|| misuse(ExecutorError::PulledAfterCompletion), Settled::into_exit);
                return Poll::Ready(Step::Done(exit));
            }

            let Some(state) = self.state.take() else {
                let err = if self.closed {
                    ExecutorError::PulledAfterClose
                } else {
                    ExecutorError::PulledAfterCompletion
                };
                return Poll::Ready(Step::Done(misuse(err)));
            };

            if let Subexecutor::Emit { value, next } = state {
                self.state = Some(*next);
                return Poll::Ready(Step::Emit(value));
            }

            if let Some(closing) = self.closing.as_mut() {
                match closing.as_mut().poll(cx) {
                    Poll::Pending => {
                        self.state = Some(state);
                        return Poll::Pending;
                    }
                    Poll::Ready(exit) => {
                        self.closing = None;
                        if let Exit::Failure(cause) = exit {
                            self.abort(state, cause);
                            continue;
                        }
                    }
                }
            }

            trace!(state = state.name(), "fan-out step");
            match self.step(state, cx) {
                Next::Continue(next) => self.state = Some(next),
                Next::Pending(next) => {
                    self.state = Some(next);
                    return Poll::Pending;
                }
                Next::Complete(fan, exit) => self.complete(fan, exit),
                Next::Fail(state, cause) => self.abort(state, cause),
            }
        }
    }

    fn close(&mut self, exit: &Exit<U::Error, ()>) -> Option<Finalizer<U::Error>> {
        if self.closed {
            return None;
        }
        self.closed = true;
        let mut all = FinalizeAll::new();
        all.push_opt(self.closing.take());
        if let Some(state) = self.state.take() {
            state.close_into(exit, &mut all);
        }
        if let Some(mut finishing) = self.finishing.take() {
            all.push_opt(finishing.take_finalizer());
        }
        trace!(finalizers = all.len(), "fan-out closed");
        all.into_finalizer()
    }
}

impl<U: Executor, C: Executor, D> fmt::Debug for FanOut<U, C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOut")
            .field("state", &self.state)
            .field("closing", &self.closing.is_some())
            .field("finishing", &self.finishing.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}
