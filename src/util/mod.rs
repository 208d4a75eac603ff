//! Internal utilities.

pub mod arena;

pub use arena::{SlotArena, SlotId};
