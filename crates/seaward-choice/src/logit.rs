//! Multinomial-logit destination choice over discretized groups.

use std::sync::Arc;

use rand::{Rng, RngCore};
use seaward_core::sampling::{sample_index, stable_softmax};
use seaward_core::{CellId, DestinationStrategy, FisherView, GroupId, StateView};
use seaward_geo::MapDiscretization;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::features::SharedExtractor;

/// Configuration faults detected while building a logit strategy.
#[derive(Debug, Error, PartialEq)]
pub enum ChoiceError {
    #[error(
        "row counts disagree: {coefficients} coefficient rows, {extractors} extractor rows, {choices} choices"
    )]
    RowCountMismatch {
        coefficients: usize,
        extractors: usize,
        choices: usize,
    },
    #[error("row {row} has {extractors} extractors but only {coefficients} coefficients")]
    TooManyExtractors {
        row: usize,
        extractors: usize,
        coefficients: usize,
    },
    #[error("{group} is claimed by rows {first_row} and {row}")]
    DuplicateGroup {
        group: GroupId,
        first_row: usize,
        row: usize,
    },
    #[error("row {row} coefficient {index} is not finite")]
    NonFiniteCoefficient { row: usize, index: usize },
    #[error("no fallback strategy configured but every group may become ineligible")]
    MissingFallback,
}

/// Filters applied to groups before the softmax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogitOptions {
    /// Skip groups whose every cell is currently resource-empty.
    pub avoid_empty_groups: bool,
    /// Skip groups without a traversable cell, and only draw traversable cells.
    pub avoid_untraversable_groups: bool,
}

/// One row of the model: the group it scores and how.
#[derive(Debug, Clone)]
pub(crate) struct LogitRow {
    group: GroupId,
    coefficients: Vec<f64>,
    /// `None` marks a row that is never selected.
    extractors: Option<Vec<SharedExtractor>>,
}

impl LogitRow {
    fn utility(&self, candidate: CellId, fisher: &dyn FisherView, state: &StateView<'_>) -> f64 {
        let Some(extractors) = &self.extractors else {
            return f64::NEG_INFINITY;
        };
        // Coefficients beyond the extractor count are never evaluated.
        self.coefficients
            .iter()
            .zip(extractors)
            .map(|(beta, extractor)| beta * extractor.extract(candidate, fisher, state))
            .sum()
    }
}

/// Chooses a group by softmax over linear utilities, then a cell uniformly inside it.
#[derive(Debug)]
pub struct LogitDestinationStrategy {
    rows: Vec<LogitRow>,
    discretization: Arc<MapDiscretization>,
    fallback: Option<Box<dyn DestinationStrategy>>,
    options: LogitOptions,
    current_target: Option<CellId>,
}

/// Check row shapes and coefficients, returning the rows in ascending group order.
///
/// Row `i` of `coefficients`/`extractors` scores group `choices[i]`. Rows whose
/// group is invalid in `discretization` are tolerated and never selected.
pub(crate) fn validate_rows(
    coefficients: Vec<Vec<f64>>,
    extractors: Vec<Option<Vec<SharedExtractor>>>,
    choices: Vec<GroupId>,
    discretization: &MapDiscretization,
    has_fallback: bool,
    options: LogitOptions,
) -> Result<Vec<LogitRow>, ChoiceError> {
    if coefficients.len() != extractors.len() || coefficients.len() != choices.len() {
        return Err(ChoiceError::RowCountMismatch {
            coefficients: coefficients.len(),
            extractors: extractors.len(),
            choices: choices.len(),
        });
    }

    let mut rows: Vec<LogitRow> = Vec::with_capacity(choices.len());
    for (row, ((coefficients, extractors), group)) in coefficients
        .into_iter()
        .zip(extractors)
        .zip(choices)
        .enumerate()
    {
        if let Some(index) = coefficients.iter().position(|beta| !beta.is_finite()) {
            return Err(ChoiceError::NonFiniteCoefficient { row, index });
        }
        if let Some(list) = &extractors {
            if list.len() > coefficients.len() {
                return Err(ChoiceError::TooManyExtractors {
                    row,
                    extractors: list.len(),
                    coefficients: coefficients.len(),
                });
            }
        }
        if let Some(first_row) = rows.iter().position(|existing| existing.group == group) {
            return Err(ChoiceError::DuplicateGroup {
                group,
                first_row,
                row,
            });
        }
        rows.push(LogitRow {
            group,
            coefficients,
            extractors,
        });
    }

    let any_selectable = rows
        .iter()
        .any(|row| row.extractors.is_some() && discretization.is_valid(row.group));
    let may_filter = options.avoid_empty_groups || options.avoid_untraversable_groups;
    if !has_fallback && (may_filter || !any_selectable) {
        return Err(ChoiceError::MissingFallback);
    }

    // Ascending group order fixes the cumulative walk used for sampling.
    rows.sort_by_key(|row| row.group);
    Ok(rows)
}

impl LogitDestinationStrategy {
    /// Trait identifier for this strategy.
    pub const KIND: &'static str = "logit";

    /// Build and validate a logit strategy.
    ///
    /// Row `i` of `coefficients`/`extractors` scores group `choices[i]`. Rows whose
    /// group is invalid in `discretization` are tolerated and never selected.
    pub fn new(
        coefficients: Vec<Vec<f64>>,
        extractors: Vec<Option<Vec<SharedExtractor>>>,
        choices: Vec<GroupId>,
        discretization: Arc<MapDiscretization>,
        fallback: Option<Box<dyn DestinationStrategy>>,
        options: LogitOptions,
    ) -> Result<Self, ChoiceError> {
        let rows = validate_rows(
            coefficients,
            extractors,
            choices,
            &discretization,
            fallback.is_some(),
            options,
        )?;
        Ok(Self::from_rows(rows, discretization, fallback, options))
    }

    /// Assemble a strategy from rows already accepted by [`validate_rows`].
    pub(crate) fn from_rows(
        rows: Vec<LogitRow>,
        discretization: Arc<MapDiscretization>,
        fallback: Option<Box<dyn DestinationStrategy>>,
        options: LogitOptions,
    ) -> Self {
        Self {
            rows,
            discretization,
            fallback,
            options,
            current_target: None,
        }
    }

    /// Last destination returned by [`DestinationStrategy::select_destination`].
    #[must_use]
    pub const fn current_target(&self) -> Option<CellId> {
        self.current_target
    }

    #[must_use]
    pub const fn options(&self) -> LogitOptions {
        self.options
    }

    #[must_use]
    pub fn discretization(&self) -> &Arc<MapDiscretization> {
        &self.discretization
    }

    fn is_eligible(&self, group: GroupId, state: &StateView<'_>) -> bool {
        if !self.discretization.is_valid(group) {
            return false;
        }
        if self.options.avoid_empty_groups && self.discretization.is_empty(group, state.map) {
            return false;
        }
        if self.options.avoid_untraversable_groups
            && !self.discretization.has_traversable_member(group, state.map)
        {
            return false;
        }
        true
    }

    /// Utilities of every eligible group, in ascending group order.
    pub fn utilities(&self, fisher: &dyn FisherView, state: &StateView<'_>) -> Vec<(GroupId, f64)> {
        self.rows
            .iter()
            .filter(|row| row.extractors.is_some())
            .filter(|row| self.is_eligible(row.group, state))
            .filter_map(|row| {
                let candidate = self.discretization.representative(row.group)?;
                Some((row.group, row.utility(candidate, fisher, state)))
            })
            .collect()
    }

    /// Selection probability of every eligible group, in ascending group order.
    pub fn probabilities(
        &self,
        fisher: &dyn FisherView,
        state: &StateView<'_>,
    ) -> Vec<(GroupId, f64)> {
        let utilities = self.utilities(fisher, state);
        let values: Vec<f64> = utilities.iter().map(|(_, utility)| *utility).collect();
        utilities
            .iter()
            .zip(stable_softmax(&values))
            .map(|((group, _), probability)| (*group, probability))
            .collect()
    }

    fn draw_member(
        &self,
        group: GroupId,
        state: &StateView<'_>,
        rng: &mut dyn RngCore,
    ) -> Option<CellId> {
        let members = self.discretization.members(group);
        if !self.options.avoid_untraversable_groups {
            return (!members.is_empty()).then(|| members[rng.random_range(0..members.len())]);
        }
        let traversable: Vec<CellId> = members
            .iter()
            .copied()
            .filter(|cell| state.map.cell(*cell).is_some_and(|cell| cell.traversable))
            .collect();
        (!traversable.is_empty()).then(|| traversable[rng.random_range(0..traversable.len())])
    }

    fn fall_back(
        &mut self,
        fisher: &dyn FisherView,
        state: &StateView<'_>,
        rng: &mut dyn RngCore,
    ) -> CellId {
        debug!(day = state.day.0, "no eligible group; deferring to fallback strategy");
        let Some(fallback) = self.fallback.as_mut() else {
            unreachable!("construction requires a fallback whenever every group can be filtered");
        };
        fallback.select_destination(fisher, state, rng)
    }
}

impl DestinationStrategy for LogitDestinationStrategy {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn select_destination(
        &mut self,
        fisher: &dyn FisherView,
        state: &StateView<'_>,
        rng: &mut dyn RngCore,
    ) -> CellId {
        let probabilities = self.probabilities(fisher, state);
        let weights: Vec<f64> = probabilities.iter().map(|(_, p)| *p).collect();
        let chosen = sample_index(&weights, rng)
            .map(|index| probabilities[index].0)
            .and_then(|group| self.draw_member(group, state, rng));

        let destination = match chosen {
            Some(cell) => cell,
            None => self.fall_back(fisher, state, rng),
        };
        self.current_target = Some(destination);
        destination
    }
}
