//! Transfer units exchanged between sources and consumers.
//!
//! - [`Chunk`]: immutable ordered batch of elements
//! - [`Take`]: one step of a source, a chunk or a failure or end-of-stream

pub mod chunk;
pub mod take;

pub use chunk::Chunk;
pub use take::Take;
