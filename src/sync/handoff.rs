//! Single-slot synchronous rendezvous between a producer and a consumer.
//!
//! A [`Handoff`] holds at most one value. [`Handoff::offer`] places a value
//! and does not complete until a consumer has taken it, which gives strict
//! one-outstanding-item backpressure. [`Handoff::take`] waits for a value;
//! [`Handoff::try_take`] returns immediately.
//!
//! The state lives in one mutex-guarded cell and every transition replaces
//! the whole state value. Waiting is done on two one-shot [`Signal`]s: the
//! consumer signal of an empty slot (fired when a value arrives) and the
//! producer signal of a full slot (fired when the value is taken).
//!
//! # Fairness
//!
//! Offerers that find the slot occupied all wait on the occupant's producer
//! signal. When it fires they race for the slot and the first to acquire the
//! lock wins; the others wait on the new occupant. There is no FIFO order
//! among competing offerers.
//!
//! # Cancel Safety
//!
//! - `take` is cancel-safe: a dropped `take` never removes a value.
//! - Dropping an `offer` after its value was placed leaves the value in the
//!   slot; it will still be delivered to the next consumer.

use super::Signal;
use crate::tracing_compat::trace;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

enum HandoffState<A> {
    Empty { notify_consumer: Signal },
    Full { value: A, notify_producer: Signal },
}

impl<A> HandoffState<A> {
    fn empty() -> Self {
        Self::Empty {
            notify_consumer: Signal::new(),
        }
    }
}

/// Outcome of one attempt to place a value.
enum OfferAttempt<A> {
    Placed {
        notify_consumer: Signal,
        notify_producer: Signal,
    },
    Occupied {
        occupant: Signal,
        value: A,
    },
}

/// A single-slot rendezvous shared between a producer and a consumer.
///
/// Clones share the same slot.
pub struct Handoff<A> {
    state: Arc<Mutex<HandoffState<A>>>,
}

impl<A> Clone for Handoff<A> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<A> Default for Handoff<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Handoff<A> {
    /// Creates an empty handoff.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HandoffState::empty())),
        }
    }

    /// Returns true if a value is currently resident.
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(*self.state.lock(), HandoffState::Full { .. })
    }

    fn try_place(&self, value: A) -> OfferAttempt<A> {
        let notify_producer = Signal::new();
        let mut state = self.state.lock();
        if let HandoffState::Full {
            notify_producer: occupant,
            ..
        } = &*state
        {
            return OfferAttempt::Occupied {
                occupant: occupant.clone(),
                value,
            };
        }

        let previous = std::mem::replace(
            &mut *state,
            HandoffState::Full {
                value,
                notify_producer: notify_producer.clone(),
            },
        );
        drop(state);
        let notify_consumer = match previous {
            HandoffState::Empty { notify_consumer } => notify_consumer,
            // Checked above while holding the lock.
            HandoffState::Full { .. } => unreachable!("handoff slot was empty"),
        };
        OfferAttempt::Placed {
            notify_consumer,
            notify_producer,
        }
    }

    /// Offers a value, completing once a consumer has taken it.
    ///
    /// If the slot is occupied, waits for the occupant to be taken and then
    /// retries with the same value.
    pub async fn offer(&self, value: A) {
        let mut value = value;
        loop {
            match self.try_place(value) {
                OfferAttempt::Placed {
                    notify_consumer,
                    notify_producer,
                } => {
                    trace!("handoff value placed");
                    notify_consumer.fire();
                    notify_producer.wait().await;
                    return;
                }
                OfferAttempt::Occupied { occupant, value: v } => {
                    trace!("handoff occupied, waiting for occupant");
                    occupant.wait().await;
                    value = v;
                }
            }
        }
    }

    /// Takes the resident value, waiting for one if the slot is empty.
    pub async fn take(&self) -> A {
        loop {
            let waiting = match &*self.state.lock() {
                HandoffState::Empty { notify_consumer } => Some(notify_consumer.clone()),
                HandoffState::Full { .. } => None,
            };
            match waiting {
                Some(notify_consumer) => notify_consumer.wait().await,
                None => {
                    if let Some(value) = self.try_take() {
                        return value;
                    }
                }
            }
        }
    }

    /// Takes the resident value if there is one, without waiting.
    #[must_use]
    pub fn try_take(&self) -> Option<A> {
        let mut state = self.state.lock();
        if matches!(*state, HandoffState::Empty { .. }) {
            return None;
        }
        let previous = std::mem::replace(&mut *state, HandoffState::empty());
        drop(state);
        match previous {
            HandoffState::Full {
                value,
                notify_producer,
            } => {
                trace!("handoff value taken");
                notify_producer.fire();
                Some(value)
            }
            HandoffState::Empty { .. } => None,
        }
    }
}

impl<A> fmt::Debug for Handoff<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handoff")
            .field("full", &self.is_full())
            .finish()
    }
}
