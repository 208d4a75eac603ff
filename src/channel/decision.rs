//! What a fan-out does with each element a child emits.

/// The per-emission answer of a fan-out's `on_emit` policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChildExecutorDecision<D> {
    /// Keep pulling this child.
    #[default]
    Continue,
    /// Stop this child now and contribute `D` instead of its natural done
    /// value.
    Close(D),
    /// Put this child at the back of the ready queue and let other work run.
    Yield,
}

impl<D> ChildExecutorDecision<D> {
    /// Transforms the close value.
    #[must_use]
    pub fn map<B>(self, f: impl FnOnce(D) -> B) -> ChildExecutorDecision<B> {
        match self {
            Self::Continue => ChildExecutorDecision::Continue,
            Self::Close(value) => ChildExecutorDecision::Close(f(value)),
            Self::Yield => ChildExecutorDecision::Yield,
        }
    }

    /// Returns true for [`ChildExecutorDecision::Close`].
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Self::Close(_))
    }
}
