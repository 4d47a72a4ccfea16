//! Serializable descriptions of logit strategies.

use std::sync::Arc;

use seaward_core::{CellId, DestinationStrategy, GroupId};
use seaward_geo::MapDiscretization;
use serde::{Deserialize, Serialize};

use crate::favorite::FavoriteDestination;
use crate::features::{
    DistanceFromHomeExtractor, GridXExtractor, GridYExtractor, HabitExtractor, HabitMode,
    InterceptExtractor, SharedExtractor,
};
use crate::logit::{ChoiceError, LogitDestinationStrategy, LogitOptions, LogitRow, validate_rows};

/// Built-in extractor kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorConfig {
    Intercept {
        #[serde(default = "unit")]
        value: f64,
    },
    GridX,
    GridY,
    DistanceFromHome,
    Habit {
        period_days: u32,
        #[serde(default)]
        mode: HabitMode,
    },
}

const fn unit() -> f64 {
    1.0
}

impl ExtractorConfig {
    fn build(&self, discretization: &Arc<MapDiscretization>) -> SharedExtractor {
        match self {
            Self::Intercept { value } => Arc::new(InterceptExtractor::new(*value)),
            Self::GridX => Arc::new(GridXExtractor),
            Self::GridY => Arc::new(GridYExtractor),
            Self::DistanceFromHome => Arc::new(DistanceFromHomeExtractor),
            Self::Habit { period_days, mode } => Arc::new(HabitExtractor::new(
                Arc::clone(discretization),
                *period_days,
                *mode,
            )),
        }
    }
}

/// Coefficients and extractors scoring one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogitRowConfig {
    pub group: GroupId,
    pub coefficients: Vec<f64>,
    /// Omitted or `null` marks the row as unused.
    #[serde(default)]
    pub extractors: Option<Vec<ExtractorConfig>>,
}

/// Strategy consulted when no group is eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackConfig {
    Favorite { cell: CellId },
}

impl FallbackConfig {
    fn build(self) -> Box<dyn DestinationStrategy> {
        match self {
            Self::Favorite { cell } => Box::new(FavoriteDestination::new(cell)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogitConfig {
    pub rows: Vec<LogitRowConfig>,
    #[serde(default)]
    pub options: LogitOptions,
    #[serde(default)]
    pub fallback: Option<FallbackConfig>,
}

impl LogitConfig {
    /// One intercept-only row per entry of `betas`, scoring groups `0..betas.len()`.
    #[must_use]
    pub fn intercepts(betas: &[f64]) -> Self {
        let rows = betas
            .iter()
            .enumerate()
            .map(|(group, beta)| LogitRowConfig {
                group: GroupId(group),
                coefficients: vec![*beta],
                extractors: Some(vec![ExtractorConfig::Intercept { value: 1.0 }]),
            })
            .collect();
        Self {
            rows,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: LogitOptions) -> Self {
        self.options = options;
        self
    }

    /// Instantiate a fresh strategy over `discretization`.
    pub fn build(
        &self,
        discretization: Arc<MapDiscretization>,
    ) -> Result<LogitDestinationStrategy, ChoiceError> {
        self.compile(discretization).map(|blueprint| blueprint.instantiate())
    }

    /// Validate once against `discretization`; the blueprint then stamps out
    /// strategies without further checks.
    pub fn compile(
        &self,
        discretization: Arc<MapDiscretization>,
    ) -> Result<LogitBlueprint, ChoiceError> {
        let mut coefficients = Vec::with_capacity(self.rows.len());
        let mut extractors = Vec::with_capacity(self.rows.len());
        let mut choices = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            coefficients.push(row.coefficients.clone());
            extractors.push(row.extractors.as_ref().map(|list| {
                list.iter()
                    .map(|extractor| extractor.build(&discretization))
                    .collect::<Vec<_>>()
            }));
            choices.push(row.group);
        }
        let rows = validate_rows(
            coefficients,
            extractors,
            choices,
            &discretization,
            self.fallback.is_some(),
            self.options,
        )?;
        Ok(LogitBlueprint {
            rows,
            discretization,
            options: self.options,
            fallback: self.fallback,
        })
    }
}

/// A validated logit model. Every call to [`LogitBlueprint::instantiate`]
/// yields an independent strategy sharing the same extractors.
#[derive(Debug, Clone)]
pub struct LogitBlueprint {
    rows: Vec<LogitRow>,
    discretization: Arc<MapDiscretization>,
    options: LogitOptions,
    fallback: Option<FallbackConfig>,
}

impl LogitBlueprint {
    #[must_use]
    pub fn instantiate(&self) -> LogitDestinationStrategy {
        LogitDestinationStrategy::from_rows(
            self.rows.clone(),
            Arc::clone(&self.discretization),
            self.fallback.map(FallbackConfig::build),
            self.options,
        )
    }

    #[must_use]
    pub fn discretization(&self) -> &Arc<MapDiscretization> {
        &self.discretization
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seaward_core::{Day, FisherRecord, GridMap, StateView};
    use seaward_geo::{RepresentativePolicy, SquaresDiscretizer};

    fn partition(map: &GridMap) -> Arc<MapDiscretization> {
        Arc::new(
            MapDiscretization::discretize(
                &SquaresDiscretizer::new(1, 0),
                map,
                RepresentativePolicy::FirstMember,
            )
            .expect("partition"),
        )
    }

    #[test]
    fn parses_json_rows() {
        let json = r#"{
            "rows": [
                {"group": 0, "coefficients": [0.5, -0.1],
                 "extractors": [{"kind": "intercept"}, {"kind": "distance_from_home"}]},
                {"group": 1, "coefficients": [0.0]}
            ],
            "options": {"avoid_empty_groups": true},
            "fallback": {"kind": "favorite", "cell": 3}
        }"#;
        let config: LogitConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.rows.len(), 2);
        assert_eq!(
            config.rows[0].extractors.as_deref(),
            Some(
                &[
                    ExtractorConfig::Intercept { value: 1.0 },
                    ExtractorConfig::DistanceFromHome
                ][..]
            )
        );
        assert!(config.rows[1].extractors.is_none());
        assert!(config.options.avoid_empty_groups);
        assert!(!config.options.avoid_untraversable_groups);
        assert_eq!(
            config.fallback,
            Some(FallbackConfig::Favorite { cell: CellId(3) })
        );

        let map = GridMap::new(4, 4, 1.0).expect("map");
        let strategy = config.build(partition(&map)).expect("strategy");
        let state = StateView::new(&map, Day(0));
        let probabilities = strategy.probabilities(&FisherRecord::new(None), &state);
        assert_eq!(probabilities, vec![(GroupId(0), 1.0)]);
    }

    #[test]
    fn intercept_helper_scores_each_group() {
        let map = GridMap::new(4, 4, 1.0).expect("map");
        let strategy = LogitConfig::intercepts(&[2.0, -1.0])
            .build(partition(&map))
            .expect("strategy");
        let state = StateView::new(&map, Day(0));
        let utilities = strategy.utilities(&FisherRecord::new(None), &state);
        assert_eq!(utilities, vec![(GroupId(0), 2.0), (GroupId(1), -1.0)]);
    }

    #[test]
    fn filters_without_fallback_fail_to_build() {
        let map = GridMap::new(4, 4, 1.0).expect("map");
        let err = LogitConfig::intercepts(&[1.0, 0.0])
            .with_options(LogitOptions {
                avoid_untraversable_groups: true,
                ..LogitOptions::default()
            })
            .build(partition(&map))
            .unwrap_err();
        assert_eq!(err, ChoiceError::MissingFallback);
    }

    #[test]
    fn blueprint_stamps_out_independent_strategies() {
        use rand::SeedableRng;
        use rand::rngs::SmallRng;

        let map = GridMap::new(4, 4, 1.0).expect("map");
        let config = LogitConfig::intercepts(&[0.5, 0.0])
            .with_fallback(FallbackConfig::Favorite { cell: CellId(0) });
        let blueprint = config.compile(partition(&map)).expect("blueprint");
        let state = StateView::new(&map, Day(0));
        let fisher = FisherRecord::new(None);
        let mut first = blueprint.instantiate();
        let second = blueprint.instantiate();
        assert_eq!(
            first.probabilities(&fisher, &state),
            config
                .build(partition(&map))
                .expect("strategy")
                .probabilities(&fisher, &state)
        );
        let mut rng = SmallRng::seed_from_u64(4);
        let destination = first.select_destination(&fisher, &state, &mut rng);
        assert_eq!(first.current_target(), Some(destination));
        assert_eq!(second.current_target(), None);

        let err = LogitConfig::intercepts(&[f64::NAN])
            .compile(partition(&map))
            .unwrap_err();
        assert_eq!(err, ChoiceError::NonFiniteCoefficient { row: 0, index: 0 });
    }
}
