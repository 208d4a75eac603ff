//! Presets for merge and fan-out policies.
//!
//! Presets are plain serde structs with defaults for every field, so a
//! partial configuration only names what it changes:
//!
//! ```toml
//! [merge]
//! halt_strategy = "either"
//!
//! [fan_out]
//! pull_strategy = "pull_after_all_enqueued"
//! yield_every = 4
//! ```
//!
//! Loading from TOML requires the `config-file` feature.

use crate::channel::{HaltStrategy, UpstreamPullStrategy};
use crate::error::{ConfigError, ConfigResult};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Separator-free upstream pull strategy for fan-out presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullStrategyKind {
    /// Pull upstream before servicing queued children.
    #[default]
    PullAfterNext,
    /// Service every queued child before pulling upstream again.
    PullAfterAllEnqueued,
}

impl PullStrategyKind {
    /// Builds the strategy this kind names, without a separator.
    #[must_use]
    pub const fn strategy<A>(self) -> UpstreamPullStrategy<A> {
        match self {
            Self::PullAfterNext => UpstreamPullStrategy::PullAfterNext(None),
            Self::PullAfterAllEnqueued => UpstreamPullStrategy::PullAfterAllEnqueued(None),
        }
    }
}

impl fmt::Display for PullStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PullAfterNext => f.write_str("pull_after_next"),
            Self::PullAfterAllEnqueued => f.write_str("pull_after_all_enqueued"),
        }
    }
}

impl FromStr for PullStrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pull_after_next" => Ok(Self::PullAfterNext),
            "pull_after_all_enqueued" => Ok(Self::PullAfterAllEnqueued),
            _ => Err(ConfigError::UnknownVariant {
                kind: "pull strategy",
                name: s.to_string(),
            }),
        }
    }
}

/// Binary merge preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    /// Which side's completion ends the merge.
    pub halt_strategy: HaltStrategy,
}

impl MergeConfig {
    /// The default preset: wait for both sides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the halt strategy.
    #[must_use]
    pub const fn with_halt_strategy(mut self, halt_strategy: HaltStrategy) -> Self {
        self.halt_strategy = halt_strategy;
        self
    }

    /// Checks the preset. Every halt strategy is valid.
    pub const fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }

    /// Parses and validates a preset from TOML.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }
}

/// Fan-out preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FanOutConfig {
    /// When the fan-out pulls upstream again.
    pub pull_strategy: PullStrategyKind,
    /// Yield to other ready work after this many emissions, if set.
    pub yield_every: Option<usize>,
}

impl FanOutConfig {
    /// The default preset: eager upstream pulls, no yielding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pull strategy.
    #[must_use]
    pub const fn with_pull_strategy(mut self, pull_strategy: PullStrategyKind) -> Self {
        self.pull_strategy = pull_strategy;
        self
    }

    /// Yields after every `n` emissions.
    #[must_use]
    pub const fn with_yield_every(mut self, n: usize) -> Self {
        self.yield_every = Some(n);
        self
    }

    /// Checks the preset.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.yield_every == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "yield_every",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Parses and validates a preset from TOML.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }
}

/// Both presets, as loaded from one configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfluenceConfig {
    /// The `[merge]` table.
    pub merge: MergeConfig,
    /// The `[fan_out]` table.
    pub fan_out: FanOutConfig,
}

impl ConfluenceConfig {
    /// Checks both presets.
    pub fn validate(&self) -> ConfigResult<()> {
        self.merge.validate()?;
        self.fan_out.validate()
    }

    /// Parses and validates both presets from TOML.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn defaults() {
        init_test("defaults");
        let config = ConfluenceConfig::default();
        assert_eq!(config.merge.halt_strategy, HaltStrategy::Both);
        assert_eq!(config.fan_out.pull_strategy, PullStrategyKind::PullAfterNext);
        assert_eq!(config.fan_out.yield_every, None);
        assert!(config.validate().is_ok());
        crate::test_complete!("defaults");
    }

    #[test]
    fn zero_yield_is_rejected() {
        init_test("zero_yield_is_rejected");
        let config = FanOutConfig::new().with_yield_every(0);
        let err = config.validate().unwrap_err();
        crate::assert_with_log!(
            matches!(err, ConfigError::InvalidValue { field: "yield_every", .. }),
            "yield_every rejected",
            "InvalidValue(yield_every)",
            err
        );
        assert!(FanOutConfig::new().with_yield_every(3).validate().is_ok());
        crate::test_complete!("zero_yield_is_rejected");
    }

    #[test]
    fn pull_strategy_kind_parses_names() {
        init_test("pull_strategy_kind_parses_names");
        assert_eq!(
            "pull-after-all-enqueued".parse::<PullStrategyKind>().ok(),
            Some(PullStrategyKind::PullAfterAllEnqueued)
        );
        assert_eq!(
            PullStrategyKind::PullAfterNext.to_string().parse::<PullStrategyKind>().ok(),
            Some(PullStrategyKind::PullAfterNext)
        );
        assert!("eventually".parse::<PullStrategyKind>().is_err());
        let strategy: UpstreamPullStrategy<u8> = PullStrategyKind::PullAfterAllEnqueued.strategy();
        assert_eq!(strategy, UpstreamPullStrategy::PullAfterAllEnqueued(None));
        crate::test_complete!("pull_strategy_kind_parses_names");
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn loads_presets_from_toml() {
        init_test("loads_presets_from_toml");
        let config = ConfluenceConfig::from_toml_str(
            r#"
            [merge]
            halt_strategy = "either"

            [fan_out]
            pull_strategy = "pull_after_all_enqueued"
            yield_every = 4
            "#,
        )
        .expect("valid config");
        assert_eq!(config.merge.halt_strategy, HaltStrategy::Either);
        assert_eq!(config.fan_out.pull_strategy, PullStrategyKind::PullAfterAllEnqueued);
        assert_eq!(config.fan_out.yield_every, Some(4));

        let partial = FanOutConfig::from_toml_str("yield_every = 2").expect("partial config");
        assert_eq!(partial.pull_strategy, PullStrategyKind::PullAfterNext);

        assert!(matches!(
            FanOutConfig::from_toml_str("yield_every = 0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            MergeConfig::from_toml_str("halt_strategy = \"sideways\""),
            Err(ConfigError::Toml(_))
        ));
        crate::test_complete!("loads_presets_from_toml");
    }
}
