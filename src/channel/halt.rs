//! Which side's completion ends a binary merge.

use crate::error::ConfigError;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One side of a binary merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeSide {
    /// The receiver of [`ExecutorExt::merge`](super::ExecutorExt::merge).
    Left,
    /// The argument of [`ExecutorExt::merge`](super::ExecutorExt::merge).
    Right,
}

impl MergeSide {
    /// The other side.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for MergeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Termination policy for a binary merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HaltStrategy {
    /// End when the left side finishes; the right side is interrupted.
    Left,
    /// End when the right side finishes; the left side is interrupted.
    Right,
    /// Wait for both sides.
    #[default]
    Both,
    /// End when either side finishes; the other is interrupted.
    Either,
}

impl HaltStrategy {
    /// Dispatches on the strategy.
    pub fn fold<Z>(
        self,
        on_left: impl FnOnce() -> Z,
        on_right: impl FnOnce() -> Z,
        on_both: impl FnOnce() -> Z,
        on_either: impl FnOnce() -> Z,
    ) -> Z {
        match self {
            Self::Left => on_left(),
            Self::Right => on_right(),
            Self::Both => on_both(),
            Self::Either => on_either(),
        }
    }

    /// Returns true if `finished` resolving first interrupts the other side.
    #[must_use]
    pub const fn halts_on(self, finished: MergeSide) -> bool {
        match self {
            Self::Left => matches!(finished, MergeSide::Left),
            Self::Right => matches!(finished, MergeSide::Right),
            Self::Both => false,
            Self::Either => true,
        }
    }
}

impl fmt::Display for HaltStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Both => "both",
            Self::Either => "either",
        };
        f.write_str(name)
    }
}

impl FromStr for HaltStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "both" => Ok(Self::Both),
            "either" => Ok(Self::Either),
            _ => Err(ConfigError::UnknownVariant {
                kind: "halt strategy",
                name: s.to_string(),
            }),
        }
    }
}
