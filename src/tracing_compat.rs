//! Optional tracing integration.
//!
//! When the `tracing-integration` feature (or `test-internals`) is enabled
//! the macros in this module forward to [`tracing`]. Otherwise they expand to
//! nothing, so instrumented code costs nothing in builds without a
//! subscriber.
//!
//! ```ignore
//! use confluence::tracing_compat::debug;
//!
//! debug!(slot = 3, "child settled");
//! ```

#[cfg(any(feature = "tracing-integration", feature = "test-internals"))]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(any(feature = "tracing-integration", feature = "test-internals")))]
mod noop {
    #[doc(hidden)]
    #[macro_export]
    macro_rules! __confluence_noop_log {
        ($($arg:tt)*) => {{}};
    }
}

#[cfg(not(any(feature = "tracing-integration", feature = "test-internals")))]
pub use crate::__confluence_noop_log as trace;

#[cfg(not(any(feature = "tracing-integration", feature = "test-internals")))]
pub use crate::__confluence_noop_log as debug;

#[cfg(not(any(feature = "tracing-integration", feature = "test-internals")))]
pub use crate::__confluence_noop_log as info;

#[cfg(not(any(feature = "tracing-integration", feature = "test-internals")))]
pub use crate::__confluence_noop_log as warn;

#[cfg(not(any(feature = "tracing-integration", feature = "test-internals")))]
pub use crate::__confluence_noop_log as error;
