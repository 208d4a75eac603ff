//! Executors and the drivers that combine them.
//!
//! - [`Executor`]: the pull/close contract every source and driver speaks
//! - [`Merge`]: binary fan-in, ended according to a [`HaltStrategy`]
//! - [`FanOut`]: N-ary fan-out/fan-in driven by [`Subexecutor`] states
//! - [`source`]: leaf executors and adapters
//!
//! Both drivers are executors themselves, so they nest: a merge of fan-outs
//! or a fan-out whose children are merges is just another executor.

pub mod decision;
pub mod executor;
pub mod halt;
pub mod merge;
pub mod pull;
pub mod source;
pub mod subexecutor;

pub use decision::ChildExecutorDecision;
pub use executor::{Executor, ExecutorExt, FinalizeAll, Finalizer, Pull, Settled, Step};
pub use halt::{HaltStrategy, MergeSide};
pub use merge::{Merge, MergeDone, MergeExits, MergeState, merge_exits};
pub use pull::{UpstreamPullRequest, UpstreamPullStrategy};
pub use source::{
    Collect, Ensuring, HandoffExecutor, HandoffSink, IterExecutor, PollFn, StreamExecutor,
    TakeStream, from_handoff, from_iter, from_poll_fn, from_stream, handoff_channel,
};
pub use subexecutor::{FanOut, FanOutBuilder, FanState, Subexecutor};
