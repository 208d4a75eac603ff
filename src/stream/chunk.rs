//! Immutable ordered batches of elements.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// An immutable, cheaply clonable ordered batch of elements.
pub struct Chunk<A> {
    items: Arc<[A]>,
}

impl<A> Chunk<A> {
    /// An empty chunk.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Arc::from(Vec::new()),
        }
    }

    /// A chunk holding exactly one element.
    #[must_use]
    pub fn single(item: A) -> Self {
        Self {
            items: Arc::from(vec![item]),
        }
    }

    /// Returns the elements as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[A] {
        &self.items
    }

    /// Builds a new chunk by applying `f` to every element.
    #[must_use]
    pub fn map<B>(&self, f: impl FnMut(&A) -> B) -> Chunk<B> {
        self.items.iter().map(f).collect()
    }
}

impl<A: Clone> Chunk<A> {
    /// Copies the elements into a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<A> {
        self.items.to_vec()
    }

    /// Returns a new chunk with `other` appended.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        self.items.iter().chain(other.items.iter()).cloned().collect()
    }
}

impl<A> Clone for Chunk<A> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<A> Default for Chunk<A> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<A> Deref for Chunk<A> {
    type Target = [A];

    fn deref(&self) -> &[A] {
        &self.items
    }
}

impl<A> From<Vec<A>> for Chunk<A> {
    fn from(items: Vec<A>) -> Self {
        Self {
            items: Arc::from(items),
        }
    }
}

impl<A> FromIterator<A> for Chunk<A> {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a, A> IntoIterator for &'a Chunk<A> {
    type Item = &'a A;
    type IntoIter = std::slice::Iter<'a, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<A: PartialEq> PartialEq for Chunk<A> {
    fn eq(&self, other: &Self) -> bool {
        self.items[..] == other.items[..]
    }
}

impl<A: Eq> Eq for Chunk<A> {}

impl<A: fmt::Debug> fmt::Debug for Chunk<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}
