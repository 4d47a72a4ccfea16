//! Core types shared across the Seaward workspace.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, new_key_type};
use std::fmt;

mod config;
mod fisher;
mod map;
pub mod sampling;

pub use config::{ConfigError, SeawardConfig};
pub use fisher::{FisherRecord, FisherView, TripRecord};
pub use map::{Coordinate, GridMap, MapError, SeaCell, SeaMap};

new_key_type! {
    /// Stable handle for fishers backed by a generational slot map.
    pub struct AgentId;
}

/// Convenience alias for associating side data with fishers.
pub type AgentMap<T> = SecondaryMap<AgentId, T>;

/// Index of a cell inside the map collaborator's ordered cell list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub usize);

impl CellId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Identifier of a group produced by discretization (`0..number_of_groups`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub usize);

impl GroupId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Simulation clock measured in whole days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Day(pub u32);

impl Day {
    /// Returns the following day.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Days elapsed since `earlier`, zero when `earlier` lies in the future.
    #[must_use]
    pub const fn since(self, earlier: Day) -> u32 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Read-only view of the world handed to strategies and extractors on each decision.
#[derive(Clone, Copy)]
pub struct StateView<'a> {
    pub map: &'a dyn SeaMap,
    pub day: Day,
}

impl<'a> StateView<'a> {
    #[must_use]
    pub fn new(map: &'a dyn SeaMap, day: Day) -> Self {
        Self { map, day }
    }
}

impl fmt::Debug for StateView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateView")
            .field("cells", &self.map.cells().len())
            .field("day", &self.day)
            .finish()
    }
}

/// Thin trait object used by schedulers to ask a fisher where to go next.
pub trait DestinationStrategy: Send + Sync {
    /// Static identifier of the strategy implementation.
    fn kind(&self) -> &'static str;

    /// Pick the next destination cell for `fisher`.
    fn select_destination(
        &mut self,
        fisher: &dyn FisherView,
        state: &StateView<'_>,
        rng: &mut dyn RngCore,
    ) -> CellId;
}

impl fmt::Debug for dyn DestinationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationStrategy")
            .field("kind", &self.kind())
            .finish()
    }
}
