//! Append-only slot arena with stable identifiers.
//!
//! Slots are never reused: clearing a slot leaves a hole, so a [`SlotId`]
//! handed out earlier keeps referring to the same registration for the life
//! of the arena. Iteration follows registration order.

use core::fmt;

/// Stable identifier of a slot in a [`SlotArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    /// Returns the registration index of this slot.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// An arena whose slots are appended and cleared but never shifted or reused.
pub struct SlotArena<T> {
    slots: Vec<Option<T>>,
    occupied: usize,
}

impl<T> SlotArena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            occupied: 0,
        }
    }

    /// Registers a value in a fresh slot.
    pub fn insert(&mut self, value: T) -> SlotId {
        let id = SlotId(self.slots.len());
        self.slots.push(Some(value));
        self.occupied += 1;
        id
    }

    /// Returns a reference to the value in `id`, if the slot is occupied.
    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Returns a mutable reference to the value in `id`, if occupied.
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Clears the slot, returning its value. The slot id stays reserved.
    pub fn take(&mut self, id: SlotId) -> Option<T> {
        let taken = self.slots.get_mut(id.0).and_then(Option::take);
        if taken.is_some() {
            self.occupied -= 1;
        }
        taken
    }

    /// Replaces the value of an occupied slot, returning the old value.
    ///
    /// Does nothing and returns `None` if the slot is empty.
    pub fn replace(&mut self, id: SlotId, value: T) -> Option<T> {
        self.get_mut(id).map(|slot| std::mem::replace(slot, value))
    }

    /// Returns the id of the `index`-th registration, if there was one.
    #[must_use]
    pub fn id_at(&self, index: usize) -> Option<SlotId> {
        (index < self.slots.len()).then_some(SlotId(index))
    }

    /// Number of slots ever registered, including holes.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub const fn occupied(&self) -> usize {
        self.occupied
    }

    /// Returns true if no slot is occupied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Iterates over occupied slots in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (SlotId(i), v)))
    }

    /// Iterates mutably over occupied slots in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (SlotId(i), v)))
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SlotArena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotArena")
            .field("registered", &self.slots.len())
            .field("occupied", &self.occupied)
            .finish()
    }
}
