//! The unit of transfer between a source and its consumer.
//!
//! A [`Take`] is exactly one of:
//!
//! - a successful [`Chunk`] of elements,
//! - a failure carrying a [`Cause`],
//! - end-of-stream.
//!
//! Internally it is an [`Exit`] whose typed failure is `Option<E>`: a
//! `Fail(None)` leaf marks end-of-stream. A `Take` never signals failure by
//! panicking; every outcome is a value that can be inspected or folded.

use super::Chunk;
use crate::types::{Cause, Defect, Exit};
use futures_lite::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// One step of a pull-based source: a chunk, a failure, or end-of-stream.
#[derive(Clone, PartialEq, Eq)]
pub struct Take<E, A> {
    exit: Exit<Option<E>, Chunk<A>>,
}

impl<E, A> Take<E, A> {
    /// A successful chunk of elements.
    #[must_use]
    pub const fn chunk(chunk: Chunk<A>) -> Self {
        Self {
            exit: Exit::Success(chunk),
        }
    }

    /// A chunk holding a single element.
    #[must_use]
    pub fn singleton(item: A) -> Self {
        Self::chunk(Chunk::single(item))
    }

    /// End-of-stream.
    #[must_use]
    pub const fn end() -> Self {
        Self {
            exit: Exit::Failure(Cause::Fail(None)),
        }
    }

    /// A typed failure.
    #[must_use]
    pub const fn fail(error: E) -> Self {
        Self {
            exit: Exit::Failure(Cause::Fail(Some(error))),
        }
    }

    /// A failure with an arbitrary cause.
    #[must_use]
    pub fn fail_cause(cause: Cause<E>) -> Self {
        Self {
            exit: Exit::Failure(cause.map(Some)),
        }
    }

    /// A defect.
    #[must_use]
    pub const fn die(defect: Defect) -> Self {
        Self {
            exit: Exit::Failure(Cause::Die(defect)),
        }
    }

    /// A defect carrying only a message.
    #[must_use]
    pub fn die_message(message: impl Into<String>) -> Self {
        Self::die(Defect::new(message))
    }

    /// Lifts a finished computation: success becomes a singleton chunk.
    #[must_use]
    pub fn from_exit(exit: Exit<E, A>) -> Self {
        match exit {
            Exit::Success(item) => Self::singleton(item),
            Exit::Failure(cause) => Self::fail_cause(cause),
        }
    }

    /// Wraps a raw pull outcome, where a `Fail(None)` leaf already means
    /// end-of-stream.
    #[must_use]
    pub const fn from_pull_exit(exit: Exit<Option<E>, Chunk<A>>) -> Self {
        Self { exit }
    }

    /// Runs a fallible computation and captures its outcome.
    ///
    /// A panic inside the future is captured as a defect.
    pub async fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<A, E>>,
    {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(item)) => Self::singleton(item),
            Ok(Err(error)) => Self::fail(error),
            Err(payload) => Self::die(Defect::from_panic(payload.as_ref())),
        }
    }

    /// Runs one pull: `Err(None)` is end-of-stream, `Err(Some(e))` a failure.
    ///
    /// A panic inside the future is captured as a defect.
    pub async fn from_pull<F>(pull: F) -> Self
    where
        F: Future<Output = Result<Chunk<A>, Option<E>>>,
    {
        match AssertUnwindSafe(pull).catch_unwind().await {
            Ok(Ok(chunk)) => Self::chunk(chunk),
            Ok(Err(None)) => Self::end(),
            Ok(Err(Some(error))) => Self::fail(error),
            Err(payload) => Self::die(Defect::from_panic(payload.as_ref())),
        }
    }

    /// Folds the three outcomes into one value.
    pub fn fold<Z>(
        self,
        on_end: impl FnOnce() -> Z,
        on_failure: impl FnOnce(Cause<E>) -> Z,
        on_success: impl FnOnce(Chunk<A>) -> Z,
    ) -> Z {
        match self.exit {
            Exit::Success(chunk) => on_success(chunk),
            Exit::Failure(cause) => match cause.flip_option() {
                None => on_end(),
                Some(cause) => on_failure(cause),
            },
        }
    }

    /// Folds the three outcomes with asynchronous handlers.
    pub async fn fold_async<Z, FE, FF, FS>(
        self,
        on_end: impl FnOnce() -> FE,
        on_failure: impl FnOnce(Cause<E>) -> FF,
        on_success: impl FnOnce(Chunk<A>) -> FS,
    ) -> Z
    where
        FE: Future<Output = Z>,
        FF: Future<Output = Z>,
        FS: Future<Output = Z>,
    {
        match self.exit {
            Exit::Success(chunk) => on_success(chunk).await,
            Exit::Failure(cause) => match cause.flip_option() {
                None => on_end().await,
                Some(cause) => on_failure(cause).await,
            },
        }
    }

    /// Transforms the elements of a successful chunk.
    #[must_use]
    pub fn map<B>(self, f: impl FnMut(&A) -> B) -> Take<E, B> {
        Take {
            exit: self.exit.map(|chunk| chunk.map(f)),
        }
    }

    /// Runs a side effect on a successful chunk and returns the take
    /// unchanged.
    ///
    /// End and failure skip the effect. A failing effect becomes the result.
    pub async fn tap<F, Fut>(self, f: F) -> Result<Self, E>
    where
        F: FnOnce(&Chunk<A>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        if let Exit::Success(chunk) = &self.exit {
            f(chunk).await?;
        }
        Ok(self)
    }

    /// Returns true if this take is end-of-stream.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(&self.exit, Exit::Failure(cause) if only_end_markers(cause))
    }

    /// Returns true if this take is a failure other than end-of-stream.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(&self.exit, Exit::Failure(cause) if !only_end_markers(cause))
    }

    /// Returns true if this take carries a chunk.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.exit.is_success()
    }

    /// Splits into the chunk, or `None` for end-of-stream, or the failure.
    pub fn done(self) -> Result<Chunk<A>, Option<Cause<E>>> {
        match self.exit {
            Exit::Success(chunk) => Ok(chunk),
            Exit::Failure(cause) => Err(cause.flip_option()),
        }
    }

    /// Returns the underlying exit.
    #[must_use]
    pub fn into_exit(self) -> Exit<Option<E>, Chunk<A>> {
        self.exit
    }
}

fn only_end_markers<E>(cause: &Cause<Option<E>>) -> bool {
    match cause {
        Cause::Fail(None) => true,
        Cause::Fail(Some(_)) | Cause::Die(_) | Cause::Interrupt(_) => false,
        Cause::Both(left, right) => only_end_markers(left) && only_end_markers(right),
    }
}

impl<E: fmt::Debug, A: fmt::Debug> fmt::Debug for Take<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.exit {
            Exit::Success(chunk) => f.debug_tuple("Take::Chunk").field(chunk).finish(),
            Exit::Failure(cause) if only_end_markers(cause) => f.write_str("Take::End"),
            Exit::Failure(cause) => f.debug_tuple("Take::Failure").field(cause).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CancelReason;
    use futures_lite::future::block_on;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn describe(take: Take<&'static str, i32>) -> String {
        take.fold(
            || "end".to_string(),
            |cause| format!("failure: {cause}"),
            |chunk| format!("chunk: {:?}", chunk.to_vec()),
        )
    }

    #[test]
    fn fold_dispatches_each_outcome() {
        init_test("fold_dispatches_each_outcome");
        let cases = [
            (Take::end(), "end"),
            (Take::fail("boom"), "failure: boom"),
            (Take::chunk(Chunk::from(vec![1, 2])), "chunk: [1, 2]"),
        ];
        for (take, expected) in cases {
            let got = describe(take);
            crate::assert_with_log!(got == expected, "fold", expected, got);
        }
        crate::test_complete!("fold_dispatches_each_outcome");
    }

    #[test]
    fn predicates_are_exclusive() {
        init_test("predicates_are_exclusive");
        let end: Take<(), u8> = Take::end();
        assert!(end.is_done() && !end.is_failure() && !end.is_success());

        let failed: Take<(), u8> = Take::die_message("bad");
        assert!(!failed.is_done() && failed.is_failure() && !failed.is_success());

        let ok: Take<(), u8> = Take::singleton(1);
        assert!(!ok.is_done() && !ok.is_failure() && ok.is_success());
        crate::test_complete!("predicates_are_exclusive");
    }

    #[test]
    fn end_combined_with_interrupt_is_a_failure() {
        init_test("end_combined_with_interrupt_is_a_failure");
        let cause = Cause::Fail(None).both(Cause::interrupt(CancelReason::race_lost()));
        let take: Take<(), u8> = Take::from_pull_exit(Exit::Failure(cause));
        assert!(take.is_failure());
        let residue = take.done();
        crate::assert_with_log!(
            matches!(residue, Err(Some(Cause::Interrupt(_)))),
            "end marker removed",
            "Err(Some(Interrupt))",
            residue
        );
        crate::test_complete!("end_combined_with_interrupt_is_a_failure");
    }

    #[test]
    fn map_touches_only_success() {
        init_test("map_touches_only_success");
        let doubled = Take::<(), i32>::chunk(Chunk::from(vec![1, 2, 3])).map(|x| x * 2);
        assert_eq!(doubled.done().map(|c| c.to_vec()), Ok(vec![2, 4, 6]));

        let failed = Take::<&str, i32>::fail("x").map(|x| x * 2);
        assert_eq!(failed.done().map(|c| c.to_vec()), Err(Some(Cause::fail("x"))));
        crate::test_complete!("map_touches_only_success");
    }

    #[test]
    fn from_exit_lifts_outcomes() {
        init_test("from_exit_lifts_outcomes");
        let ok = Take::from_exit(Exit::<&str, i32>::succeed(5));
        assert_eq!(ok.done().map(|c| c.to_vec()), Ok(vec![5]));
        let failed = Take::from_exit(Exit::<&str, i32>::fail("no"));
        assert!(failed.is_failure());
        crate::test_complete!("from_exit_lifts_outcomes");
    }

    #[test]
    fn from_future_captures_panic_as_defect() {
        init_test("from_future_captures_panic_as_defect");
        let take: Take<&str, i32> = block_on(Take::from_future(async {
            if true {
                panic!("source exploded");
            }
            Ok(0)
        }));
        let residue = take.done();
        let is_defect = matches!(
            &residue,
            Err(Some(Cause::Die(d))) if d.message() == "source exploded"
        );
        crate::assert_with_log!(is_defect, "panic captured", "Die(source exploded)", residue);

        let ok: Take<&str, i32> = block_on(Take::from_future(async { Ok(3) }));
        assert_eq!(ok.done().map(|c| c.to_vec()), Ok(vec![3]));
        crate::test_complete!("from_future_captures_panic_as_defect");
    }

    #[test]
    fn from_pull_maps_absent_error_to_end() {
        init_test("from_pull_maps_absent_error_to_end");
        let end: Take<&str, i32> = block_on(Take::from_pull(async { Err(None) }));
        assert!(end.is_done());
        let failed: Take<&str, i32> = block_on(Take::from_pull(async { Err(Some("bad")) }));
        assert!(failed.is_failure());
        let ok: Take<&str, i32> =
            block_on(Take::from_pull(async { Ok(Chunk::from(vec![7, 8])) }));
        assert!(ok.is_success());
        crate::test_complete!("from_pull_maps_absent_error_to_end");
    }

    #[test]
    fn tap_runs_only_on_success() {
        init_test("tap_runs_only_on_success");
        let mut seen = Vec::new();
        let take = Take::<&str, i32>::chunk(Chunk::from(vec![1, 2]));
        let result = block_on(take.tap(|chunk| {
            seen.extend(chunk.iter().copied());
            async { Ok(()) }
        }));
        assert!(result.is_ok());
        assert_eq!(seen, vec![1, 2]);

        let mut called = false;
        let result = block_on(Take::<&str, i32>::end().tap(|_| {
            called = true;
            async { Ok(()) }
        }));
        assert!(result.is_ok_and(|t| t.is_done()));
        assert!(!called);

        let result = block_on(Take::<&str, i32>::singleton(1).tap(|_| async { Err("tap failed") }));
        crate::assert_with_log!(
            result == Err("tap failed"),
            "effect failure surfaces",
            Err::<(), _>("tap failed"),
            result
        );
        crate::test_complete!("tap_runs_only_on_success");
    }

    #[test]
    fn fold_async_awaits_the_selected_branch() {
        init_test("fold_async_awaits_the_selected_branch");
        let got = block_on(Take::<&str, i32>::singleton(4).fold_async(
            || async { 0 },
            |_| async { -1 },
            |chunk| async move { chunk.iter().sum::<i32>() },
        ));
        assert_eq!(got, 4);
        crate::test_complete!("fold_async_awaits_the_selected_branch");
    }
}
