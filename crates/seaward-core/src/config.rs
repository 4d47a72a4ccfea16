use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::map::{GridMap, MapError};

/// Errors raised while validating world configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Map(#[from] MapError),
}

/// Static configuration for a Seaward world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeawardConfig {
    /// Number of grid columns.
    pub map_width: u32,
    /// Number of grid rows.
    pub map_height: u32,
    /// Edge length of one cell in kilometres.
    pub cell_size_km: f64,
    /// Biology seeded into every cell before the scenario paints hotspots.
    pub initial_resource: f64,
    /// Number of fishers enrolled at start-up.
    pub fisher_count: usize,
    /// Length of the run in days.
    pub days: u32,
    /// Days between two adaptation steps for each fisher.
    pub adaptation_period_days: u32,
    /// Trailing window used by the cash-flow objective.
    pub cash_lookback_days: u32,
    /// Cost charged per kilometre travelled (both ways).
    pub travel_cost_per_km: f64,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for SeawardConfig {
    fn default() -> Self {
        Self {
            map_width: 20,
            map_height: 20,
            cell_size_km: 10.0,
            initial_resource: 1.0,
            fisher_count: 12,
            days: 365,
            adaptation_period_days: 15,
            cash_lookback_days: 60,
            travel_cost_per_km: 0.01,
            rng_seed: None,
        }
    }
}

impl SeawardConfig {
    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_width == 0 || self.map_height == 0 {
            return Err(ConfigError::InvalidConfig("map dimensions must be non-zero"));
        }
        if !self.cell_size_km.is_finite() || self.cell_size_km <= 0.0 {
            return Err(ConfigError::InvalidConfig("cell_size_km must be positive"));
        }
        if !self.initial_resource.is_finite() || self.initial_resource < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "initial_resource must be non-negative",
            ));
        }
        if self.fisher_count == 0 {
            return Err(ConfigError::InvalidConfig("fisher_count must be non-zero"));
        }
        if self.adaptation_period_days == 0 {
            return Err(ConfigError::InvalidConfig(
                "adaptation_period_days must be non-zero",
            ));
        }
        if self.cash_lookback_days == 0 {
            return Err(ConfigError::InvalidConfig(
                "cash_lookback_days must be non-zero",
            ));
        }
        if !self.travel_cost_per_km.is_finite() || self.travel_cost_per_km < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "travel_cost_per_km must be non-negative",
            ));
        }
        Ok(())
    }

    /// Build the grid map described by this configuration.
    pub fn build_map(&self) -> Result<GridMap, ConfigError> {
        self.validate()?;
        let map = GridMap::new(self.map_width, self.map_height, self.initial_resource)?
            .with_cell_size(self.cell_size_km)?;
        Ok(map)
    }

    /// Returns the configured RNG, generating a seed from entropy if absent.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}
