//! Core types for stream outcomes.
//!
//! - [`cancel`]: Interruption reason and kind types
//! - [`cause`]: Structured, combinable failure causes and defects
//! - [`exit`]: Two-valued outcome of a finished computation

pub mod cancel;
pub mod cause;
pub mod exit;

pub use cancel::{CancelKind, CancelReason};
pub use cause::{Cause, Defect};
pub use exit::Exit;
