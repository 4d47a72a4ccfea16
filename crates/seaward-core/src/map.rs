//! Narrow interface onto the external map collaborator plus a grid implementation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CellId;

/// Errors raised when constructing a map.
#[derive(Debug, Error, PartialEq)]
pub enum MapError {
    #[error("map dimensions must be non-zero (got {width}x{height})")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("cell size must be positive and finite (got {0})")]
    InvalidCellSize(f64),
}

/// Integer grid coordinate of a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance in grid units.
    #[must_use]
    pub fn distance_sq(self, other: Coordinate) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

/// Atomic addressable unit of the environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeaCell {
    pub coordinate: Coordinate,
    /// Whether fishers may travel to and fish in this cell.
    pub traversable: bool,
    /// Biological productivity; only "zero or not" matters to the decision core.
    pub resource: f64,
}

impl SeaCell {
    #[must_use]
    pub const fn new(coordinate: Coordinate, resource: f64) -> Self {
        Self {
            coordinate,
            traversable: true,
            resource,
        }
    }

    /// True when the cell currently holds an exploitable resource.
    #[must_use]
    pub fn has_resource(&self) -> bool {
        self.resource > 0.0
    }
}

/// Ordered set of cells plus a distance metric.
pub trait SeaMap {
    /// All cells in a stable order; a [`CellId`] indexes into this slice.
    fn cells(&self) -> &[SeaCell];

    /// Distance in kilometres between two cells, `None` if either id is unknown.
    fn distance(&self, from: CellId, to: CellId) -> Option<f64>;

    fn cell(&self, id: CellId) -> Option<&SeaCell> {
        self.cells().get(id.index())
    }
}

/// Rectangular grid map storing cells in row-major order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridMap {
    width: u32,
    height: u32,
    cell_size_km: f64,
    cells: Vec<SeaCell>,
}

impl GridMap {
    /// Construct a `width * height` grid whose cells all hold `initial_resource`.
    pub fn new(width: u32, height: u32, initial_resource: f64) -> Result<Self, MapError> {
        if width == 0 || height == 0 {
            return Err(MapError::InvalidDimensions { width, height });
        }
        let mut cells = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                cells.push(SeaCell::new(
                    Coordinate::new(x as i32, y as i32),
                    initial_resource,
                ));
            }
        }
        Ok(Self {
            width,
            height,
            cell_size_km: 1.0,
            cells,
        })
    }

    /// Override the edge length of one cell used by [`SeaMap::distance`].
    pub fn with_cell_size(mut self, cell_size_km: f64) -> Result<Self, MapError> {
        if !cell_size_km.is_finite() || cell_size_km <= 0.0 {
            return Err(MapError::InvalidCellSize(cell_size_km));
        }
        self.cell_size_km = cell_size_km;
        Ok(self)
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub const fn cell_size_km(&self) -> f64 {
        self.cell_size_km
    }

    /// Id of the cell at `(x, y)`, if inside the grid.
    #[must_use]
    pub fn id_at(&self, x: u32, y: u32) -> Option<CellId> {
        (x < self.width && y < self.height)
            .then(|| CellId((y as usize) * (self.width as usize) + (x as usize)))
    }

    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut SeaCell> {
        self.cells.get_mut(id.index())
    }

    /// Set the biology signal of one cell, returning false if the id is unknown.
    pub fn set_resource(&mut self, id: CellId, resource: f64) -> bool {
        match self.cell_mut(id) {
            Some(cell) => {
                cell.resource = resource;
                true
            }
            None => false,
        }
    }

    pub fn set_traversable(&mut self, id: CellId, traversable: bool) -> bool {
        match self.cell_mut(id) {
            Some(cell) => {
                cell.traversable = traversable;
                true
            }
            None => false,
        }
    }

    /// Iterate mutable cells alongside their ids.
    pub fn cells_mut(&mut self) -> impl Iterator<Item = (CellId, &mut SeaCell)> + '_ {
        self.cells
            .iter_mut()
            .enumerate()
            .map(|(idx, cell)| (CellId(idx), cell))
    }
}

impl SeaMap for GridMap {
    fn cells(&self) -> &[SeaCell] {
        &self.cells
    }

    fn distance(&self, from: CellId, to: CellId) -> Option<f64> {
        let a = self.cell(from)?.coordinate;
        let b = self.cell(to)?.coordinate;
        Some((a.distance_sq(b) as f64).sqrt() * self.cell_size_km)
    }
}
