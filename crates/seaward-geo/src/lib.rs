//! Spatial discretization of the map into disjoint, ordered groups of cells.

use ordered_float::OrderedFloat;
use seaward_core::{CellId, Coordinate, GroupId, SeaMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted while discretizing a map.
#[derive(Debug, Error, PartialEq)]
pub enum DiscretizationError {
    /// Indicates configuration values that cannot be used (e.g., no centroids).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("map has no cells to discretize")]
    EmptyMap,
    #[error("discretizer returned {actual} assignments for {expected} cells")]
    AssignmentLength { expected: usize, actual: usize },
    #[error("{cell} assigned to {group} but only {groups} groups exist")]
    GroupOutOfRange {
        cell: CellId,
        group: GroupId,
        groups: usize,
    },
}

/// Group assignment for every cell of a map, in map order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAssignment {
    pub group_count: usize,
    pub groups: Vec<GroupId>,
}

/// Common behaviour exposed by discretization schemes.
pub trait Discretizer {
    /// Assign every cell of `map` to exactly one group.
    fn assign(&self, map: &dyn SeaMap) -> Result<GroupAssignment, DiscretizationError>;
}

/// Splits the bounding box of the map into `(x_splits + 1) * (y_splits + 1)` rectangles.
///
/// Group ids run row-major: `id = y_bucket * (x_splits + 1) + x_bucket`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquaresDiscretizer {
    /// Number of cuts along the x axis.
    pub x_splits: u32,
    /// Number of cuts along the y axis.
    pub y_splits: u32,
}

impl SquaresDiscretizer {
    #[must_use]
    pub const fn new(x_splits: u32, y_splits: u32) -> Self {
        Self { x_splits, y_splits }
    }
}

fn bucket(value: i32, min: i32, span: i64, parts: i64) -> usize {
    let offset = i64::from(value) - i64::from(min);
    ((offset * parts) / span).clamp(0, parts - 1) as usize
}

impl Discretizer for SquaresDiscretizer {
    fn assign(&self, map: &dyn SeaMap) -> Result<GroupAssignment, DiscretizationError> {
        let cells = map.cells();
        let first = cells.first().ok_or(DiscretizationError::EmptyMap)?;
        let (mut min, mut max) = (first.coordinate, first.coordinate);
        for cell in cells {
            min.x = min.x.min(cell.coordinate.x);
            min.y = min.y.min(cell.coordinate.y);
            max.x = max.x.max(cell.coordinate.x);
            max.y = max.y.max(cell.coordinate.y);
        }
        let parts_x = i64::from(self.x_splits) + 1;
        let parts_y = i64::from(self.y_splits) + 1;
        let group_count = parts_x
            .checked_mul(parts_y)
            .and_then(|count| usize::try_from(count).ok())
            .filter(|count| *count <= cells.len())
            .ok_or(DiscretizationError::InvalidConfig(
                "squares discretizer asks for more groups than the map has cells",
            ))?;
        let span_x = i64::from(max.x) - i64::from(min.x) + 1;
        let span_y = i64::from(max.y) - i64::from(min.y) + 1;

        let groups = cells
            .iter()
            .map(|cell| {
                let bx = bucket(cell.coordinate.x, min.x, span_x, parts_x);
                let by = bucket(cell.coordinate.y, min.y, span_y, parts_y);
                GroupId(by * parts_x as usize + bx)
            })
            .collect();
        Ok(GroupAssignment {
            group_count,
            groups,
        })
    }
}

/// Assigns every cell to its nearest centroid; ties go to the lower centroid index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentroidDiscretizer {
    pub centroids: Vec<Coordinate>,
}

impl CentroidDiscretizer {
    #[must_use]
    pub fn new(centroids: Vec<Coordinate>) -> Self {
        Self { centroids }
    }
}

impl Discretizer for CentroidDiscretizer {
    fn assign(&self, map: &dyn SeaMap) -> Result<GroupAssignment, DiscretizationError> {
        if self.centroids.is_empty() {
            return Err(DiscretizationError::InvalidConfig(
                "centroid discretizer needs at least one centroid",
            ));
        }
        if map.cells().is_empty() {
            return Err(DiscretizationError::EmptyMap);
        }
        let groups = map
            .cells()
            .iter()
            .map(|cell| {
                let (index, _) = self
                    .centroids
                    .iter()
                    .enumerate()
                    .min_by_key(|(index, centroid)| {
                        (cell.coordinate.distance_sq(**centroid), *index)
                    })
                    .unwrap_or((0, &cell.coordinate));
                GroupId(index)
            })
            .collect();
        Ok(GroupAssignment {
            group_count: self.centroids.len(),
            groups,
        })
    }
}

/// Serializable choice of discretization scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscretizerConfig {
    Squares(SquaresDiscretizer),
    Centroids(CentroidDiscretizer),
}

impl Default for DiscretizerConfig {
    fn default() -> Self {
        Self::Squares(SquaresDiscretizer::new(1, 1))
    }
}

impl Discretizer for DiscretizerConfig {
    fn assign(&self, map: &dyn SeaMap) -> Result<GroupAssignment, DiscretizationError> {
        match self {
            Self::Squares(squares) => squares.assign(map),
            Self::Centroids(centroids) => centroids.assign(map),
        }
    }
}

/// How a group picks the cell used to evaluate group-level features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentativePolicy {
    /// First member in map order.
    #[default]
    FirstMember,
    /// Member closest to the mean coordinate of the group.
    Centroid,
}

/// Immutable partition of a map's cells into groups.
#[derive(Debug, Clone)]
pub struct MapDiscretization {
    groups: Vec<Vec<CellId>>,
    cell_groups: Vec<GroupId>,
    representatives: Vec<Option<CellId>>,
    policy: RepresentativePolicy,
}

impl MapDiscretization {
    /// Partition `map` once; the result is read-only afterwards.
    pub fn discretize(
        discretizer: &dyn Discretizer,
        map: &dyn SeaMap,
        policy: RepresentativePolicy,
    ) -> Result<Self, DiscretizationError> {
        let GroupAssignment {
            group_count,
            groups: assignment,
        } = discretizer.assign(map)?;
        let cells = map.cells();
        if assignment.len() != cells.len() {
            return Err(DiscretizationError::AssignmentLength {
                expected: cells.len(),
                actual: assignment.len(),
            });
        }

        let mut groups = vec![Vec::new(); group_count];
        for (index, group) in assignment.iter().enumerate() {
            let members = groups.get_mut(group.index()).ok_or(
                DiscretizationError::GroupOutOfRange {
                    cell: CellId(index),
                    group: *group,
                    groups: group_count,
                },
            )?;
            members.push(CellId(index));
        }

        let representatives = groups
            .iter()
            .map(|members| representative_of(members, map, policy))
            .collect();

        Ok(Self {
            groups,
            cell_groups: assignment,
            representatives,
            policy,
        })
    }

    /// Number of groups fixed at discretization time (valid or not).
    #[must_use]
    pub fn number_of_groups(&self) -> usize {
        self.groups.len()
    }

    /// False for out-of-range ids and for groups without members.
    #[must_use]
    pub fn is_valid(&self, group: GroupId) -> bool {
        self.groups
            .get(group.index())
            .is_some_and(|members| !members.is_empty())
    }

    /// Members of `group` in map order; empty for unknown groups.
    #[must_use]
    pub fn members(&self, group: GroupId) -> &[CellId] {
        self.groups
            .get(group.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Group containing `cell`.
    #[must_use]
    pub fn group_of(&self, cell: CellId) -> Option<GroupId> {
        self.cell_groups.get(cell.index()).copied()
    }

    /// Canonical cell used to evaluate features for the whole group.
    #[must_use]
    pub fn representative(&self, group: GroupId) -> Option<CellId> {
        self.representatives.get(group.index()).copied().flatten()
    }

    /// True when no member currently holds a resource. Recomputed on every call.
    #[must_use]
    pub fn is_empty(&self, group: GroupId, map: &dyn SeaMap) -> bool {
        !self
            .members(group)
            .iter()
            .any(|cell| map.cell(*cell).is_some_and(|cell| cell.has_resource()))
    }

    /// True when at least one member can be travelled to.
    #[must_use]
    pub fn has_traversable_member(&self, group: GroupId, map: &dyn SeaMap) -> bool {
        self.members(group)
            .iter()
            .any(|cell| map.cell(*cell).is_some_and(|cell| cell.traversable))
    }

    /// Iterate valid group ids in ascending order.
    pub fn valid_groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        (0..self.groups.len())
            .map(GroupId)
            .filter(|group| self.is_valid(*group))
    }

    /// Total number of cells covered by the partition.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cell_groups.len()
    }
}

fn representative_of(
    members: &[CellId],
    map: &dyn SeaMap,
    policy: RepresentativePolicy,
) -> Option<CellId> {
    match policy {
        RepresentativePolicy::FirstMember => members.first().copied(),
        RepresentativePolicy::Centroid => {
            let coordinates: Vec<(CellId, Coordinate)> = members
                .iter()
                .filter_map(|id| map.cell(*id).map(|cell| (*id, cell.coordinate)))
                .collect();
            if coordinates.is_empty() {
                return members.first().copied();
            }
            let count = coordinates.len() as f64;
            let mean_x = coordinates.iter().map(|(_, c)| f64::from(c.x)).sum::<f64>() / count;
            let mean_y = coordinates.iter().map(|(_, c)| f64::from(c.y)).sum::<f64>() / count;
            coordinates
                .iter()
                .enumerate()
                .min_by_key(|(position, (_, c))| {
                    let dx = f64::from(c.x) - mean_x;
                    let dy = f64::from(c.y) - mean_y;
                    (OrderedFloat(dx * dx + dy * dy), *position)
                })
                .map(|(_, (id, _))| *id)
        }
    }
}
