//! Structured failure causes.
//!
//! A [`Cause`] records *why* a computation did not succeed: a typed failure,
//! an unrecoverable [`Defect`], an interruption, or several of these that
//! happened concurrently. Causes are combined with [`Cause::both`], which
//! keeps every party side by side instead of picking a winner.

use super::CancelReason;
use core::fmt;
use std::any::Any;
use thiserror::Error;

/// An unrecoverable fault, such as a panic inside a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{message}")]
pub struct Defect {
    message: String,
}

impl Defect {
    /// Creates a defect with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Builds a defect from a captured panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with non-string payload".to_string());
        Self { message }
    }

    /// Returns the defect message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<crate::error::ExecutorError> for Defect {
    fn from(err: crate::error::ExecutorError) -> Self {
        Self::new(err.to_string())
    }
}

/// Why a computation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause<E> {
    /// A typed, expected failure.
    Fail(E),
    /// An unrecoverable defect.
    Die(Defect),
    /// Cooperative interruption.
    Interrupt(CancelReason),
    /// Two causes that happened concurrently; both are kept.
    Both(Box<Cause<E>>, Box<Cause<E>>),
}

impl<E> Cause<E> {
    /// A typed failure.
    #[must_use]
    pub const fn fail(error: E) -> Self {
        Self::Fail(error)
    }

    /// A defect.
    #[must_use]
    pub const fn die(defect: Defect) -> Self {
        Self::Die(defect)
    }

    /// A defect carrying only a message.
    #[must_use]
    pub fn die_message(message: impl Into<String>) -> Self {
        Self::Die(Defect::new(message))
    }

    /// An interruption.
    #[must_use]
    pub const fn interrupt(reason: CancelReason) -> Self {
        Self::Interrupt(reason)
    }

    /// Combines two concurrent causes, keeping both.
    #[must_use]
    pub fn both(self, other: Self) -> Self {
        Self::Both(Box::new(self), Box::new(other))
    }

    /// Returns every leaf of this cause in left-to-right order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Self>) {
        match self {
            Self::Both(left, right) => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
            leaf => out.push(leaf),
        }
    }

    /// Returns every typed failure in left-to-right order.
    #[must_use]
    pub fn failures(&self) -> Vec<&E> {
        self.leaves()
            .into_iter()
            .filter_map(|leaf| match leaf {
                Self::Fail(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Returns every defect in left-to-right order.
    #[must_use]
    pub fn defects(&self) -> Vec<&Defect> {
        self.leaves()
            .into_iter()
            .filter_map(|leaf| match leaf {
                Self::Die(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    /// Returns every interruption reason in left-to-right order.
    #[must_use]
    pub fn interruptions(&self) -> Vec<&CancelReason> {
        self.leaves()
            .into_iter()
            .filter_map(|leaf| match leaf {
                Self::Interrupt(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Returns true if this cause contains at least one typed failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.failures().is_empty()
    }

    /// Returns true if this cause contains at least one defect.
    #[must_use]
    pub fn is_die(&self) -> bool {
        !self.defects().is_empty()
    }

    /// Returns true if every leaf is an interruption.
    #[must_use]
    pub fn is_interrupted_only(&self) -> bool {
        self.leaves()
            .into_iter()
            .all(|leaf| matches!(leaf, Self::Interrupt(_)))
    }

    /// Removes interruption leaves, returning `None` if nothing else remains.
    #[must_use]
    pub fn strip_interrupts(self) -> Option<Self> {
        match self {
            Self::Interrupt(_) => None,
            Self::Both(left, right) => match (left.strip_interrupts(), right.strip_interrupts()) {
                (Some(l), Some(r)) => Some(l.both(r)),
                (Some(only), None) | (None, Some(only)) => Some(only),
                (None, None) => None,
            },
            other => Some(other),
        }
    }

    /// Transforms the typed failures, keeping the structure.
    #[must_use]
    pub fn map<E2>(self, mut f: impl FnMut(E) -> E2) -> Cause<E2> {
        self.map_with(&mut f)
    }

    fn map_with<E2>(self, f: &mut impl FnMut(E) -> E2) -> Cause<E2> {
        match self {
            Self::Fail(e) => Cause::Fail(f(e)),
            Self::Die(d) => Cause::Die(d),
            Self::Interrupt(r) => Cause::Interrupt(r),
            Self::Both(left, right) => {
                let left = left.map_with(f);
                let right = right.map_with(f);
                Cause::Both(Box::new(left), Box::new(right))
            }
        }
    }
}

impl<E> Cause<Option<E>> {
    /// Separates end-of-stream from real failures.
    ///
    /// `Fail(None)` marks end-of-stream. Returns `None` when the cause is
    /// nothing but end markers, otherwise the remaining failures with the end
    /// markers removed.
    #[must_use]
    pub fn flip_option(self) -> Option<Cause<E>> {
        match self {
            Self::Fail(None) => None,
            Self::Fail(Some(e)) => Some(Cause::Fail(e)),
            Self::Die(d) => Some(Cause::Die(d)),
            Self::Interrupt(r) => Some(Cause::Interrupt(r)),
            Self::Both(left, right) => match (left.flip_option(), right.flip_option()) {
                (Some(l), Some(r)) => Some(l.both(r)),
                (Some(only), None) | (None, Some(only)) => Some(only),
                (None, None) => None,
            },
        }
    }
}

impl<E: fmt::Display> fmt::Display for Cause<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail(e) => write!(f, "{e}"),
            Self::Die(d) => write!(f, "defect: {d}"),
            Self::Interrupt(r) => write!(f, "interrupted ({r})"),
            Self::Both(left, right) => write!(f, "{left}; {right}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for Cause<E> {}
