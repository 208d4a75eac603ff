//! Error types.
//!
//! Stream-level outcomes are values ([`Exit`](crate::Exit),
//! [`Cause`](crate::Cause), [`Take`](crate::Take)); the errors here cover
//! misuse of a driver and invalid configuration.

use thiserror::Error;

/// Misuse of an executor that has already reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ExecutorError {
    /// The executor was pulled after it reported its final exit.
    #[error("executor pulled after completion")]
    PulledAfterCompletion,
    /// The executor was pulled after it was closed.
    #[error("executor pulled after close")]
    PulledAfterClose,
}

/// Invalid merge or fan-out configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field held a value outside its allowed range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// A strategy name did not match any known variant.
    #[error("unknown {kind} `{name}`")]
    UnknownVariant {
        /// The kind of value being parsed.
        kind: &'static str,
        /// The name that failed to parse.
        name: String,
    },
    /// The TOML source could not be parsed.
    #[cfg(feature = "config-file")]
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_error_display() {
        assert_eq!(
            ExecutorError::PulledAfterCompletion.to_string(),
            "executor pulled after completion"
        );
        assert!(ExecutorError::PulledAfterClose.to_string().contains("close"));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "yield_every",
            reason: "must be non-zero".into(),
        };
        let text = err.to_string();
        assert!(text.contains("yield_every"));
        assert!(text.contains("non-zero"));

        let err = ConfigError::UnknownVariant {
            kind: "halt strategy",
            name: "sideways".into(),
        };
        assert_eq!(err.to_string(), "unknown halt strategy `sideways`");
    }
}
