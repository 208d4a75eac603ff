//! When a fan-out asks its upstream for more work.
//!
//! At each decision point the fan-out presents an [`UpstreamPullRequest`] to
//! the caller's policy, which answers with an [`UpstreamPullStrategy`]:
//!
//! - `PullAfterNext` pulls upstream before servicing queued children, trading
//!   memory for latency.
//! - `PullAfterAllEnqueued` services every queued child first, bounding
//!   concurrency.
//!
//! Either strategy may carry a separator that is emitted to the combined
//! output before anything else happens.

/// The situation a pull policy is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamPullRequest<A> {
    /// Upstream just produced `A`; a child for it is about to be registered.
    Pulled(A),
    /// Upstream has finished; the count is the number of currently active
    /// children, the ones that have not finished yet.
    NoUpstream(usize),
}

impl<A> UpstreamPullRequest<A> {
    /// Borrows the pulled value.
    #[must_use]
    pub const fn as_ref(&self) -> UpstreamPullRequest<&A> {
        match self {
            Self::Pulled(value) => UpstreamPullRequest::Pulled(value),
            Self::NoUpstream(active) => UpstreamPullRequest::NoUpstream(*active),
        }
    }

    /// Transforms the pulled value.
    #[must_use]
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> UpstreamPullRequest<B> {
        match self {
            Self::Pulled(value) => UpstreamPullRequest::Pulled(f(value)),
            Self::NoUpstream(active) => UpstreamPullRequest::NoUpstream(active),
        }
    }
}

/// A pull policy's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamPullStrategy<A> {
    /// Pull upstream next, emitting the separator first if present.
    PullAfterNext(Option<A>),
    /// Pull upstream once every queued child has been serviced, emitting the
    /// separator first if present.
    PullAfterAllEnqueued(Option<A>),
}

impl<A> UpstreamPullStrategy<A> {
    /// Returns the separator, if any.
    #[must_use]
    pub const fn separator(&self) -> Option<&A> {
        match self {
            Self::PullAfterNext(sep) | Self::PullAfterAllEnqueued(sep) => sep.as_ref(),
        }
    }

    /// Consumes the strategy, returning the separator.
    #[must_use]
    pub fn into_separator(self) -> Option<A> {
        match self {
            Self::PullAfterNext(sep) | Self::PullAfterAllEnqueued(sep) => sep,
        }
    }

    /// Returns true for [`UpstreamPullStrategy::PullAfterNext`].
    #[must_use]
    pub const fn is_pull_after_next(&self) -> bool {
        matches!(self, Self::PullAfterNext(_))
    }
}

impl<A> Default for UpstreamPullStrategy<A> {
    fn default() -> Self {
        Self::PullAfterNext(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_mapping_keeps_counts() {
        let pulled = UpstreamPullRequest::Pulled(3);
        assert_eq!(pulled.as_ref().map(|v| v * 2), UpstreamPullRequest::Pulled(6));
        let none: UpstreamPullRequest<i32> = UpstreamPullRequest::NoUpstream(4);
        assert_eq!(none.map(|v| v + 1), UpstreamPullRequest::NoUpstream(4));
    }

    #[test]
    fn separators() {
        let strategy = UpstreamPullStrategy::PullAfterAllEnqueued(Some(','));
        assert_eq!(strategy.separator(), Some(&','));
        assert!(!strategy.is_pull_after_next());
        assert_eq!(strategy.into_separator(), Some(','));
        let default: UpstreamPullStrategy<char> = UpstreamPullStrategy::default();
        assert!(default.is_pull_after_next());
        assert_eq!(default.separator(), None);
    }
}
