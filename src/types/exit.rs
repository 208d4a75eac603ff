//! The outcome of a finished computation.

use super::{CancelReason, Cause, Defect};

/// Success with a value, or failure with a [`Cause`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit<E, A> {
    /// Completed with a value.
    Success(A),
    /// Failed; the cause may combine several concurrent failures.
    Failure(Cause<E>),
}

impl<E, A> Exit<E, A> {
    /// A successful exit.
    #[must_use]
    pub const fn succeed(value: A) -> Self {
        Self::Success(value)
    }

    /// A typed failure.
    #[must_use]
    pub const fn fail(error: E) -> Self {
        Self::Failure(Cause::Fail(error))
    }

    /// A failure with an arbitrary cause.
    #[must_use]
    pub const fn fail_cause(cause: Cause<E>) -> Self {
        Self::Failure(cause)
    }

    /// A defect.
    #[must_use]
    pub const fn die(defect: Defect) -> Self {
        Self::Failure(Cause::Die(defect))
    }

    /// An interruption.
    #[must_use]
    pub const fn interrupt(reason: CancelReason) -> Self {
        Self::Failure(Cause::Interrupt(reason))
    }

    /// Returns true on success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true on failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns true if this exit failed only because it was interrupted.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Failure(cause) if cause.is_interrupted_only())
    }

    /// Returns the failure cause, if any.
    #[must_use]
    pub const fn cause(&self) -> Option<&Cause<E>> {
        match self {
            Self::Success(_) => None,
            Self::Failure(cause) => Some(cause),
        }
    }

    /// Consumes the exit, returning the failure cause, if any.
    #[must_use]
    pub fn into_cause(self) -> Option<Cause<E>> {
        match self {
            Self::Success(_) => None,
            Self::Failure(cause) => Some(cause),
        }
    }

    /// Transforms the success value.
    #[must_use]
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> Exit<E, B> {
        match self {
            Self::Success(a) => Exit::Success(f(a)),
            Self::Failure(cause) => Exit::Failure(cause),
        }
    }

    /// Transforms the typed failures.
    #[must_use]
    pub fn map_error<E2>(self, f: impl FnMut(E) -> E2) -> Exit<E2, A> {
        match self {
            Self::Success(a) => Exit::Success(a),
            Self::Failure(cause) => Exit::Failure(cause.map(f)),
        }
    }

    /// Combines two exits of concurrent parties, keeping the right value.
    ///
    /// If both failed, both causes are kept side by side.
    #[must_use]
    pub fn zip_right<B>(self, other: Exit<E, B>) -> Exit<E, B> {
        match (self, other) {
            (Self::Success(_), other) => other,
            (Self::Failure(cause), Exit::Success(_)) => Exit::Failure(cause),
            (Self::Failure(left), Exit::Failure(right)) => Exit::Failure(left.both(right)),
        }
    }

    /// Folds the outcome of a finalizer into this exit.
    ///
    /// A failing finalizer turns a success into a failure and is added next
    /// to an existing failure.
    #[must_use]
    pub fn with_finalizer(self, finalizer: Exit<E, ()>) -> Self {
        match (self, finalizer) {
            (exit, Exit::Success(())) => exit,
            (Self::Success(_), Exit::Failure(cause)) => Self::Failure(cause),
            (Self::Failure(cause), Exit::Failure(fin)) => Self::Failure(cause.both(fin)),
        }
    }

    /// Returns the same outcome with the success value discarded.
    #[must_use]
    pub fn to_unit(&self) -> Exit<E, ()>
    where
        E: Clone,
    {
        match self {
            Self::Success(_) => Exit::Success(()),
            Self::Failure(cause) => Exit::Failure(cause.clone()),
        }
    }

    /// Converts into a `Result`.
    pub fn into_result(self) -> Result<A, Cause<E>> {
        match self {
            Self::Success(a) => Ok(a),
            Self::Failure(cause) => Err(cause),
        }
    }
}

impl<E, A> From<Result<A, E>> for Exit<E, A> {
    fn from(result: Result<A, E>) -> Self {
        match result {
            Ok(a) => Self::Success(a),
            Err(e) => Self::fail(e),
        }
    }
}
