//! Feature extractors evaluated against a candidate cell.

use std::fmt;
use std::sync::Arc;

use seaward_core::{CellId, FisherView, StateView};
use seaward_geo::MapDiscretization;
use serde::{Deserialize, Serialize};

/// Pure function from (candidate, fisher, state) to a scalar feature.
///
/// Implementations must return a finite value even for unknown candidates.
pub trait FeatureExtractor: Send + Sync {
    /// Short identifier used in logs and debug output.
    fn name(&self) -> &'static str;

    fn extract(&self, candidate: CellId, fisher: &dyn FisherView, state: &StateView<'_>) -> f64;
}

/// Extractors are shared across rows and fishers.
pub type SharedExtractor = Arc<dyn FeatureExtractor>;

impl fmt::Debug for dyn FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Constant feature; paired with a coefficient it acts as the row intercept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterceptExtractor {
    pub value: f64,
}

impl InterceptExtractor {
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self { value }
    }
}

impl FeatureExtractor for InterceptExtractor {
    fn name(&self) -> &'static str {
        "intercept"
    }

    fn extract(&self, _candidate: CellId, _fisher: &dyn FisherView, _state: &StateView<'_>) -> f64 {
        self.value
    }
}

/// Grid x coordinate of the candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridXExtractor;

impl FeatureExtractor for GridXExtractor {
    fn name(&self) -> &'static str {
        "grid_x"
    }

    fn extract(&self, candidate: CellId, _fisher: &dyn FisherView, state: &StateView<'_>) -> f64 {
        state
            .map
            .cell(candidate)
            .map_or(0.0, |cell| f64::from(cell.coordinate.x))
    }
}

/// Grid y coordinate of the candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridYExtractor;

impl FeatureExtractor for GridYExtractor {
    fn name(&self) -> &'static str {
        "grid_y"
    }

    fn extract(&self, candidate: CellId, _fisher: &dyn FisherView, state: &StateView<'_>) -> f64 {
        state
            .map
            .cell(candidate)
            .map_or(0.0, |cell| f64::from(cell.coordinate.y))
    }
}

/// Kilometres between the fisher's home port and the candidate; zero without a port.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceFromHomeExtractor;

impl FeatureExtractor for DistanceFromHomeExtractor {
    fn name(&self) -> &'static str {
        "distance_from_home"
    }

    fn extract(&self, candidate: CellId, fisher: &dyn FisherView, state: &StateView<'_>) -> f64 {
        fisher
            .home()
            .and_then(|home| state.map.distance(home, candidate))
            .filter(|distance| distance.is_finite())
            .unwrap_or(0.0)
    }
}

/// Whether the habit feature counts trips or only flags their presence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitMode {
    #[default]
    Count,
    Boolean,
}

/// Trips the fisher made into the candidate's group during the trailing period.
#[derive(Debug, Clone)]
pub struct HabitExtractor {
    discretization: Arc<MapDiscretization>,
    period_days: u32,
    mode: HabitMode,
}

impl HabitExtractor {
    #[must_use]
    pub fn new(discretization: Arc<MapDiscretization>, period_days: u32, mode: HabitMode) -> Self {
        Self {
            discretization,
            period_days,
            mode,
        }
    }
}

impl FeatureExtractor for HabitExtractor {
    fn name(&self) -> &'static str {
        match self.mode {
            HabitMode::Count => "habit_count",
            HabitMode::Boolean => "habit_boolean",
        }
    }

    fn extract(&self, candidate: CellId, fisher: &dyn FisherView, state: &StateView<'_>) -> f64 {
        let Some(group) = self.discretization.group_of(candidate) else {
            return 0.0;
        };
        let visits = fisher
            .trips()
            .iter()
            .filter(|trip| state.day.since(trip.day) <= self.period_days)
            .filter(|trip| self.discretization.group_of(trip.destination) == Some(group))
            .count();
        match self.mode {
            HabitMode::Count => visits as f64,
            HabitMode::Boolean if visits > 0 => 1.0,
            HabitMode::Boolean => 0.0,
        }
    }
}

/// Wraps a closure as an extractor.
pub struct FnExtractor<F> {
    name: &'static str,
    function: F,
}

impl<F> FnExtractor<F>
where
    F: Fn(CellId, &dyn FisherView, &StateView<'_>) -> f64 + Send + Sync,
{
    pub fn new(name: &'static str, function: F) -> Self {
        Self { name, function }
    }
}

impl<F> FeatureExtractor for FnExtractor<F>
where
    F: Fn(CellId, &dyn FisherView, &StateView<'_>) -> f64 + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn extract(&self, candidate: CellId, fisher: &dyn FisherView, state: &StateView<'_>) -> f64 {
        (self.function)(candidate, fisher, state)
    }
}
