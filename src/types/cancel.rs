//! Interruption reason and kind types.
//!
//! Interrupting a source is a termination reason, not a value-level error:
//! the interrupted side still runs its finalizers, and the reason travels in
//! the resulting [`Cause`](super::Cause) so the consumer can tell a halted
//! peer from a real failure.

use core::fmt;

/// Why a running source was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelKind {
    /// Explicit interruption requested by user code.
    User,
    /// The other side of a merge finished and the halt strategy ended the merge.
    RaceLost,
    /// The owning driver was closed while this source was still running.
    ParentClosed,
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::RaceLost => write!(f, "race lost"),
            Self::ParentClosed => write!(f, "parent closed"),
        }
    }
}

/// The reason for an interruption, including kind and optional context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CancelReason {
    /// The kind of interruption.
    pub kind: CancelKind,
    /// Optional human-readable message.
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// Creates a reason with the given kind and no message.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a user interruption with a message.
    #[must_use]
    pub const fn user(message: &'static str) -> Self {
        Self {
            kind: CancelKind::User,
            message: Some(message),
        }
    }

    /// The other merge side ended the merge.
    #[must_use]
    pub const fn race_lost() -> Self {
        Self::new(CancelKind::RaceLost)
    }

    /// The owning driver was closed.
    #[must_use]
    pub const fn parent_closed() -> Self {
        Self::new(CancelKind::ParentClosed)
    }

    /// Returns the kind of this reason.
    #[must_use]
    pub const fn kind(&self) -> CancelKind {
        self.kind
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::new(CancelKind::User)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}
