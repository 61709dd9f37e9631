//! Configuration types for the allocator.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::strategy::Strategy;

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown allocation strategy: {0}")]
    UnknownStrategy(String),
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
    #[error("Mode {0} requires a time ceiling")]
    MissingTimeCeiling(Mode),
    #[error("Invalid {name} ceiling: {value} (must be finite and positive)")]
    InvalidCeiling { name: &'static str, value: f64 },
}

/// What a run produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// One allocation pass over every task.
    #[default]
    Plain,
    /// Allocation followed by the ceiling-constrained schedule optimizer.
    Optimize,
    /// Priority ordering of tasks, with unpredictable tasks kept on universal PEs.
    Unpredicted,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Plain => "plain",
            Mode::Optimize => "optimize",
            Mode::Unpredicted => "unpredicted",
        }
    }

    /// Strategy used when none is named: optimization starts from a min-time plan.
    pub fn default_strategy(&self) -> Strategy {
        match self {
            Mode::Optimize => Strategy::MinTime,
            Mode::Plain | Mode::Unpredicted => Strategy::StandardizedScore,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "allocate" => Ok(Mode::Plain),
            "optimize" | "optimise" => Ok(Mode::Optimize),
            "unpredicted" => Ok(Mode::Unpredicted),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Configuration of a single run.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocatorConfig {
    pub mode: Mode,
    /// How a PE is chosen for each task.
    pub strategy: Strategy,
    /// Maximum acceptable overall time. Required by [`Mode::Optimize`].
    pub time_ceiling: Option<f64>,
    /// Maximum acceptable overall cost.
    pub cost_ceiling: Option<f64>,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Plain,
            strategy: Strategy::StandardizedScore,
            time_ceiling: None,
            cost_ceiling: None,
            verbosity: 0,
        }
    }
}

impl AllocatorConfig {
    /// Build a configuration from textual mode/strategy names, falling back to defaults.
    pub fn from_names(
        mode: Option<&str>,
        strategy: Option<&str>,
        time_ceiling: Option<f64>,
        cost_ceiling: Option<f64>,
        verbosity: u8,
    ) -> Result<Self, ConfigError> {
        let mode = mode
            .map(str::parse::<Mode>)
            .transpose()?
            .unwrap_or_default();
        let config = Self {
            mode,
            strategy: strategy
                .map(str::parse::<Strategy>)
                .transpose()?
                .unwrap_or_else(|| mode.default_strategy()),
            time_ceiling,
            cost_ceiling,
            verbosity,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, ceiling) in [("time", self.time_ceiling), ("cost", self.cost_ceiling)] {
            if let Some(value) = ceiling {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ConfigError::InvalidCeiling { name, value });
                }
            }
        }
        if self.mode == Mode::Optimize && self.time_ceiling.is_none() {
            return Err(ConfigError::MissingTimeCeiling(self.mode));
        }
        Ok(())
    }
}
