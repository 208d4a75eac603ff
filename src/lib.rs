//! Confluence: the concurrent fan-in/fan-out execution core for pull-based
//! async streams.
//!
//! # Overview
//!
//! Confluence combines independently progressing pull-based sources into one
//! consumer. Backpressure, termination and failure propagation stay correct
//! when the sources run concurrently, and every owned resource is finalized
//! exactly once no matter how the combination ends.
//!
//! # Core Guarantees
//!
//! - **One outstanding item**: a [`Handoff`] never holds more than one value;
//!   a producer is suspended until its value is taken
//! - **Failures are data**: [`Take`] and [`Exit`] encode end, failure and
//!   success as values, never as panics
//! - **Nothing is dropped on close**: closing a driver closes every owned
//!   executor and combines every failure cause side by side
//! - **Caller policy, not core policy**: short-circuit versus wait-for-all is
//!   chosen by [`HaltStrategy`] and the fan-out callbacks
//!
//! # Module Structure
//!
//! - [`types`]: Failure model (`Cause`, `Exit`, `Defect`, cancellation reasons)
//! - [`sync`]: `Signal` and the single-slot `Handoff` rendezvous
//! - [`stream`]: `Chunk` and the `Take` result unit
//! - [`channel`]: The executor contract, binary merge and N-ary fan-out drivers
//! - [`config`]: Presets for merge and fan-out policies
//! - [`error`](mod@error): Crate error types
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)
//! - [`util`]: Internal utilities (slot arena)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::type_complexity)]

pub mod channel;
pub mod config;
pub mod error;
pub mod stream;
pub mod sync;
pub mod tracing_compat;
pub mod types;
pub mod util;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use channel::{
    ChildExecutorDecision, Executor, ExecutorExt, FanOut, FanOutBuilder, FinalizeAll, Finalizer,
    HaltStrategy, Merge, MergeDone, MergeState, Step, Subexecutor, UpstreamPullRequest,
    UpstreamPullStrategy,
};
pub use config::{ConfluenceConfig, FanOutConfig, MergeConfig, PullStrategyKind};
pub use error::{ConfigError, ExecutorError};
pub use stream::{Chunk, Take};
pub use sync::{Handoff, Signal};
pub use types::{CancelKind, CancelReason, Cause, Defect, Exit};
