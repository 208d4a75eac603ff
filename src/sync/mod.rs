//! Synchronization primitives for producer/consumer handoff.
//!
//! - [`Signal`]: one-shot notification, fire once and await many
//! - [`Handoff`]: single-slot rendezvous with one-outstanding-item backpressure

pub mod handoff;
pub mod signal;

pub use handoff::Handoff;
pub use signal::{Signal, SignalWait};
