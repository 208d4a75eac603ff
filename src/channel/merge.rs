//! Binary fan-in: two executors merged into one.
//!
//! The [`Merge`] driver owns both sides and polls them in the same task,
//! alternating which side goes first after every emission so neither can
//! starve the other. Elements are emitted as soon as either side produces
//! them; each side's own order is preserved.
//!
//! On the first side to finish, the [`HaltStrategy`] decides whether the
//! other side is interrupted. A finished side is closed with its own exit
//! and its finalizer runs to completion before the driver pulls anything
//! else. An interrupted side is closed with an interrupt exit and resolves
//! as `Failure(Interrupt(RaceLost))`. Once both sides have resolved, the
//! caller's fold turns the two exits into the merge's outcome.
//!
//! # Cancel Safety
//!
//! Closing a merge closes every side that has not been closed yet and
//! returns one [`FinalizeAll`] covering every pending finalizer.

use super::executor::{Executor, FinalizeAll, Finalizer, Settled, Step, misuse};
use super::halt::{HaltStrategy, MergeSide};
use crate::error::ExecutorError;
use crate::tracing_compat::{debug, trace};
use crate::types::{CancelReason, Exit};
use core::fmt;
use std::task::{Context, Poll};

/// The protocol state of a binary merge.
///
/// `BothRunning` moves to `LeftDone` or `RightDone` exactly once; the finished
/// side's exit is kept until the other side resolves.
pub enum MergeState<L, R, E, DL, DR> {
    /// Both sides are live.
    BothRunning {
        /// The left executor.
        left: L,
        /// The right executor.
        right: R,
    },
    /// The left side finished; the right side is still running.
    LeftDone {
        /// The left side's exit and pending finalizer.
        left: Settled<E, DL>,
        /// The right executor.
        right: R,
    },
    /// The right side finished; the left side is still running.
    RightDone {
        /// The left executor.
        left: L,
        /// The right side's exit and pending finalizer.
        right: Settled<E, DR>,
    },
}

impl<L, R, E, DL, DR> MergeState<L, R, E, DL, DR> {
    /// Returns the name of the current state.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BothRunning { .. } => "BothRunning",
            Self::LeftDone { .. } => "LeftDone",
            Self::RightDone { .. } => "RightDone",
        }
    }
}

impl<L, R, E, DL, DR> fmt::Debug for MergeState<L, R, E, DL, DR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The default merge outcome: which sides contributed a done value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDone<DL, DR> {
    /// Only the left side finished on its own.
    Left(DL),
    /// Only the right side finished on its own.
    Right(DR),
    /// Both sides finished on their own.
    Both(DL, DR),
}

/// Signature of [`merge_exits`].
pub type MergeExits<E, DL, DR> = fn(Exit<E, DL>, Exit<E, DR>) -> Exit<E, MergeDone<DL, DR>>;

/// The default fold for [`Merge`].
///
/// A side that was only interrupted contributes nothing. Any other failure
/// fails the merge; if both sides really failed, both causes are kept.
pub fn merge_exits<E, DL, DR>(left: Exit<E, DL>, right: Exit<E, DR>) -> Exit<E, MergeDone<DL, DR>> {
    match (left, right) {
        (Exit::Success(l), Exit::Success(r)) => Exit::Success(MergeDone::Both(l, r)),
        (Exit::Success(l), Exit::Failure(cause)) if cause.is_interrupted_only() => {
            Exit::Success(MergeDone::Left(l))
        }
        (Exit::Failure(cause), Exit::Success(r)) if cause.is_interrupted_only() => {
            Exit::Success(MergeDone::Right(r))
        }
        (Exit::Success(_), Exit::Failure(cause)) | (Exit::Failure(cause), Exit::Success(_)) => {
            Exit::Failure(cause)
        }
        (Exit::Failure(l), Exit::Failure(r)) => {
            let cause = match (l.is_interrupted_only(), r.is_interrupted_only()) {
                (true, false) => r,
                (false, true) => l,
                _ => l.both(r),
            };
            Exit::Failure(cause)
        }
    }
}

enum Phase<L, R, E, DL, DR> {
    Running(MergeState<L, R, E, DL, DR>),
    Settling {
        left: Settled<E, DL>,
        right: Settled<E, DR>,
    },
    Finished,
    Closed,
}

/// Outcome of polling both live sides once.
enum Race<O, E, DL, DR> {
    Emitted(O),
    Left(Exit<E, DL>),
    Right(Exit<E, DR>),
    Pending,
}

/// Driver merging two executors with the same output and error types.
///
/// Created by [`ExecutorExt::merge`](super::ExecutorExt::merge) and
/// [`ExecutorExt::merge_with`](super::ExecutorExt::merge_with).
#[must_use = "executors do nothing unless pulled"]
pub struct Merge<L: Executor, R: Executor, D, F> {
    phase: Phase<L, R, L::Error, L::Done, R::Done>,
    strategy: HaltStrategy,
    fold: Option<F>,
    left_first: bool,
    _done: std::marker::PhantomData<fn() -> D>,
}

impl<L, R, D, F> Merge<L, R, D, F>
where
    L: Executor,
    R: Executor<Out = L::Out, Error = L::Error>,
    F: FnOnce(Exit<L::Error, L::Done>, Exit<L::Error, R::Done>) -> Exit<L::Error, D>,
{
    /// Creates a merge of `left` and `right`.
    pub fn new(left: L, right: R, strategy: HaltStrategy, fold: F) -> Self {
        Self {
            phase: Phase::Running(MergeState::BothRunning { left, right }),
            strategy,
            fold: Some(fold),
            left_first: true,
            _done: std::marker::PhantomData,
        }
    }

    /// The halt strategy in effect.
    #[must_use]
    pub const fn strategy(&self) -> HaltStrategy {
        self.strategy
    }

    /// The current protocol state, or `None` once both sides have resolved.
    #[must_use]
    pub const fn state(&self) -> Option<&MergeState<L, R, L::Error, L::Done, R::Done>> {
        match &self.phase {
            Phase::Running(state) => Some(state),
            _ => None,
        }
    }

    fn race(
        &self,
        left: &mut L,
        right: &mut R,
        cx: &mut Context<'_>,
    ) -> Race<L::Out, L::Error, L::Done, R::Done> {
        let order = if self.left_first {
            [MergeSide::Left, MergeSide::Right]
        } else {
            [MergeSide::Right, MergeSide::Left]
        };
        for side in order {
            match side {
                MergeSide::Left => match left.poll_pull(cx) {
                    Poll::Ready(Step::Emit(out)) => return Race::Emitted(out),
                    Poll::Ready(Step::Done(exit)) => return Race::Left(exit),
                    Poll::Pending => {}
                },
                MergeSide::Right => match right.poll_pull(cx) {
                    Poll::Ready(Step::Emit(out)) => return Race::Emitted(out),
                    Poll::Ready(Step::Done(exit)) => return Race::Right(exit),
                    Poll::Pending => {}
                },
            }
        }
        Race::Pending
    }

    fn interrupt<X, DX>(other: &mut X, side: MergeSide) -> Settled<L::Error, DX>
    where
        X: Executor<Error = L::Error>,
    {
        debug!(side = %side, "merge interrupting remaining side");
        let reason = CancelReason::race_lost();
        let finalizer = other.close(&Exit::interrupt(reason.clone()));
        Settled::new(Exit::interrupt(reason), finalizer)
    }

    fn step(
        &mut self,
        state: MergeState<L, R, L::Error, L::Done, R::Done>,
        cx: &mut Context<'_>,
    ) -> (Phase<L, R, L::Error, L::Done, R::Done>, Option<Poll<L::Out>>) {
        match state {
            MergeState::BothRunning {
                mut left,
                mut right,
            } => match self.race(&mut left, &mut right, cx) {
                Race::Emitted(out) => {
                    self.left_first = !self.left_first;
                    (
                        Phase::Running(MergeState::BothRunning { left, right }),
                        Some(Poll::Ready(out)),
                    )
                }
                Race::Pending => (
                    Phase::Running(MergeState::BothRunning { left, right }),
                    Some(Poll::Pending),
                ),
                Race::Left(exit) => {
                    debug!(success = exit.is_success(), "merge left side finished");
                    let finalizer = left.close(&exit.to_unit());
                    let finished = Settled::new(exit, finalizer);
                    if self.strategy.halts_on(MergeSide::Left) {
                        let interrupted = Self::interrupt(&mut right, MergeSide::Right);
                        (
                            Phase::Settling {
                                left: finished,
                                right: interrupted,
                            },
                            None,
                        )
                    } else {
                        (
                            Phase::Running(MergeState::LeftDone {
                                left: finished,
                                right,
                            }),
                            None,
                        )
                    }
                }
                Race::Right(exit) => {
                    debug!(success = exit.is_success(), "merge right side finished");
                    let finalizer = right.close(&exit.to_unit());
                    let finished = Settled::new(exit, finalizer);
                    if self.strategy.halts_on(MergeSide::Right) {
                        let interrupted = Self::interrupt(&mut left, MergeSide::Left);
                        (
                            Phase::Settling {
                                left: interrupted,
                                right: finished,
                            },
                            None,
                        )
                    } else {
                        (
                            Phase::Running(MergeState::RightDone {
                                left,
                                right: finished,
                            }),
                            None,
                        )
                    }
                }
            },
            MergeState::LeftDone {
                mut left,
                mut right,
            } => {
                if left.poll_finalize(cx).is_pending() {
                    return (
                        Phase::Running(MergeState::LeftDone { left, right }),
                        Some(Poll::Pending),
                    );
                }
                match right.poll_pull(cx) {
                    Poll::Ready(Step::Emit(out)) => (
                        Phase::Running(MergeState::LeftDone { left, right }),
                        Some(Poll::Ready(out)),
                    ),
                    Poll::Ready(Step::Done(exit)) => {
                        debug!(success = exit.is_success(), "merge right side finished");
                        let finalizer = right.close(&exit.to_unit());
                        (
                            Phase::Settling {
                                left,
                                right: Settled::new(exit, finalizer),
                            },
                            None,
                        )
                    }
                    Poll::Pending => (
                        Phase::Running(MergeState::LeftDone { left, right }),
                        Some(Poll::Pending),
                    ),
                }
            }
            MergeState::RightDone {
                mut left,
                mut right,
            } => {
                if right.poll_finalize(cx).is_pending() {
                    return (
                        Phase::Running(MergeState::RightDone { left, right }),
                        Some(Poll::Pending),
                    );
                }
                match left.poll_pull(cx) {
                    Poll::Ready(Step::Emit(out)) => (
                        Phase::Running(MergeState::RightDone { left, right }),
                        Some(Poll::Ready(out)),
                    ),
                    Poll::Ready(Step::Done(exit)) => {
                        debug!(success = exit.is_success(), "merge left side finished");
                        let finalizer = left.close(&exit.to_unit());
                        (
                            Phase::Settling {
                                left: Settled::new(exit, finalizer),
                                right,
                            },
                            None,
                        )
                    }
                    Poll::Pending => (
                        Phase::Running(MergeState::RightDone { left, right }),
                        Some(Poll::Pending),
                    ),
                }
            }
        }
    }
}

impl<L, R, D, F> Executor for Merge<L, R, D, F>
where
    L: Executor,
    R: Executor<Out = L::Out, Error = L::Error>,
    F: FnOnce(Exit<L::Error, L::Done>, Exit<L::Error, R::Done>) -> Exit<L::Error, D>,
{
    type Out = L::Out;
    type Done = D;
    type Error = L::Error;

    fn poll_pull(&mut self, cx: &mut Context<'_>) -> Poll<Step<L::Out, D, L::Error>> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Running(state) => {
                    trace!(state = state.name(), "merge step");
                    let (phase, polled) = self.step(state, cx);
                    self.phase = phase;
                    match polled {
                        Some(Poll::Ready(out)) => return Poll::Ready(Step::Emit(out)),
                        Some(Poll::Pending) => return Poll::Pending,
                        None => {}
                    }
                }
                Phase::Settling {
                    mut left,
                    mut right,
                } => {
                    if left.poll_finalize(cx).is_pending() || right.poll_finalize(cx).is_pending() {
                        self.phase = Phase::Settling { left, right };
                        return Poll::Pending;
                    }
                    let exit = match self.fold.take() {
                        Some(fold) => fold(left.into_exit(), right.into_exit()),
                        None => misuse(ExecutorError::PulledAfterCompletion),
                    };
                    debug!(success = exit.is_success(), "merge finished");
                    return Poll::Ready(Step::Done(exit));
                }
                Phase::Finished => {
                    return Poll::Ready(Step::Done(misuse(ExecutorError::PulledAfterCompletion)));
                }
                Phase::Closed => {
                    self.phase = Phase::Closed;
                    return Poll::Ready(Step::Done(misuse(ExecutorError::PulledAfterClose)));
                }
            }
        }
    }

    fn close(&mut self, exit: &Exit<L::Error, ()>) -> Option<Finalizer<L::Error>> {
        let mut all = FinalizeAll::new();
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Running(MergeState::BothRunning {
                mut left,
                mut right,
            }) => {
                all.push_opt(left.close(exit));
                all.push_opt(right.close(exit));
            }
            Phase::Running(MergeState::LeftDone {
                mut left,
                mut right,
            }) => {
                all.push_opt(left.take_finalizer());
                all.push_opt(right.close(exit));
            }
            Phase::Running(MergeState::RightDone {
                mut left,
                mut right,
            }) => {
                all.push_opt(left.close(exit));
                all.push_opt(right.take_finalizer());
            }
            Phase::Settling {
                mut left,
                mut right,
            } => {
                all.push_opt(left.take_finalizer());
                all.push_opt(right.take_finalizer());
            }
            Phase::Finished | Phase::Closed => return None,
        }
        trace!(finalizers = all.len(), "merge closed");
        all.into_finalizer()
    }
}

impl<L: Executor, R: Executor, D, F> fmt::Debug for Merge<L, R, D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match &self.phase {
            Phase::Running(state) => state.name(),
            Phase::Settling { .. } => "Settling",
            Phase::Finished => "Finished",
            Phase::Closed => "Closed",
        };
        f.debug_struct("Merge")
            .field("phase", &phase)
            .field("strategy", &self.strategy)
            .field("left_first", &self.left_first)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ExecutorExt, from_iter, from_poll_fn};
    use crate::types::Cause;
    use futures_lite::future::block_on;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn merge_exits_ignores_interrupt_only_side() {
        init_test("merge_exits_ignores_interrupt_only_side");
        let interrupted: Exit<&str, i32> = Exit::interrupt(CancelReason::race_lost());
        let done = merge_exits(Exit::<&str, i32>::succeed(1), interrupted.clone());
        assert_eq!(done, Exit::succeed(MergeDone::Left(1)));

        let done = merge_exits(interrupted.clone(), Exit::<&str, i32>::fail("boom"));
        assert_eq!(done, Exit::fail("boom"));

        let done = merge_exits(Exit::<&str, i32>::fail("a"), Exit::<&str, i32>::fail("b"));
        let failures = done.cause().map(Cause::failures).unwrap_or_default();
        crate::assert_with_log!(failures == vec![&"a", &"b"], "both kept", vec!["a", "b"], failures);
        crate::test_complete!("merge_exits_ignores_interrupt_only_side");
    }

    #[test]
    fn sides_alternate_after_each_emission() {
        init_test("sides_alternate_after_each_emission");
        let left = from_iter::<_, &str>(vec![1, 3, 5]);
        let right = from_iter::<_, &str>(vec![2, 4, 6]);
        let exit = block_on(left.merge(right, HaltStrategy::Both).collect());
        let (items, done) = exit.into_result().expect("merge succeeds");
        crate::assert_with_log!(items == vec![1, 2, 3, 4, 5, 6], "interleaved", vec![1, 2, 3, 4, 5, 6], items);
        assert_eq!(done, MergeDone::Both((), ()));
        crate::test_complete!("sides_alternate_after_each_emission");
    }

    #[test]
    fn close_while_running_closes_both_sides_once() {
        init_test("close_while_running_closes_both_sides_once");
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = |closed: &Arc<AtomicUsize>| {
            let closed = Arc::clone(closed);
            move |_: &Exit<&'static str, ()>| async move {
                closed.fetch_add(1, Ordering::SeqCst);
                Exit::succeed(())
            }
        };
        let left = from_poll_fn(|_| Poll::<Step<i32, (), &'static str>>::Pending).ensuring(counter(&closed));
        let right = from_poll_fn(|_| Poll::<Step<i32, (), &'static str>>::Pending).ensuring(counter(&closed));
        let mut merge = left.merge(right, HaltStrategy::Either);
        assert!(crate::test_utils::pull_once(&mut merge).is_pending());

        let finalizer = merge.close(&Exit::interrupt(CancelReason::user("stop")));
        let exit = block_on(finalizer.expect("two finalizers"));
        assert!(exit.is_success());
        assert_eq!(closed.load(Ordering::SeqCst), 2);
        assert!(merge.close(&Exit::succeed(())).is_none());
        crate::test_complete!("close_while_running_closes_both_sides_once");
    }
}
