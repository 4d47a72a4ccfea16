use std::collections::HashSet;

use anyhow::{Context, Result, bail, ensure};
use seaward_adapt::{BanditConfig, BanditRule, ProbabilityRule, RewardAverage, SelectionRule};
use seaward_choice::{
    ExtractorConfig, FallbackConfig, HabitMode, LogitConfig, LogitOptions, LogitRowConfig,
};
use seaward_core::{CellId, GridMap, SeawardConfig};
use seaward_geo::{DiscretizerConfig, MapDiscretization, RepresentativePolicy, SquaresDiscretizer};
use serde::{Deserialize, Serialize};

/// Cell painted with a custom resource level before the run starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub x: u32,
    pub y: u32,
    pub resource: f64,
}

/// Logit model whose coefficients are shared by every group of the partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogitTemplate {
    pub coefficients: Vec<f64>,
    pub extractors: Vec<ExtractorConfig>,
    #[serde(default)]
    pub options: LogitOptions,
}

impl LogitTemplate {
    /// Expand into one row per valid group, falling back to the port.
    #[must_use]
    pub fn logit_config(&self, discretization: &MapDiscretization, port: CellId) -> LogitConfig {
        let rows = discretization
            .valid_groups()
            .map(|group| LogitRowConfig {
                group,
                coefficients: self.coefficients.clone(),
                extractors: Some(self.extractors.clone()),
            })
            .collect();
        LogitConfig {
            rows,
            options: self.options,
            fallback: Some(FallbackConfig::Favorite { cell: port }),
        }
    }
}

/// Destination strategy a policy instantiates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyTemplate {
    Logit(LogitTemplate),
    /// One arm per valid group.
    Bandit {
        #[serde(default)]
        bandit: BanditConfig,
    },
}

/// Named menu entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTemplate {
    pub name: String,
    #[serde(flatten)]
    pub strategy: StrategyTemplate,
}

impl PolicyTemplate {
    fn logit(name: &str, coefficients: Vec<f64>, extractors: Vec<ExtractorConfig>) -> Self {
        Self {
            name: name.to_owned(),
            strategy: StrategyTemplate::Logit(LogitTemplate {
                coefficients,
                extractors,
                options: LogitOptions {
                    avoid_empty_groups: true,
                    avoid_untraversable_groups: false,
                },
            }),
        }
    }
}

fn default_policies() -> Vec<PolicyTemplate> {
    vec![
        PolicyTemplate::logit(
            "homebody",
            vec![-0.05],
            vec![ExtractorConfig::DistanceFromHome],
        ),
        PolicyTemplate::logit(
            "habitual",
            vec![0.5, -0.01],
            vec![
                ExtractorConfig::Habit {
                    period_days: 30,
                    mode: HabitMode::Count,
                },
                ExtractorConfig::DistanceFromHome,
            ],
        ),
        PolicyTemplate::logit(
            "roamer",
            vec![0.0],
            vec![ExtractorConfig::Intercept { value: 1.0 }],
        ),
        PolicyTemplate {
            name: "prospector".to_owned(),
            strategy: StrategyTemplate::Bandit {
                bandit: BanditConfig::new(
                    BanditRule::EpsilonGreedy { epsilon: 0.1 },
                    RewardAverage::ExponentialMovingAverage { alpha: 0.2 },
                ),
            },
        },
    ]
}

fn default_hotspots() -> Vec<Hotspot> {
    vec![
        Hotspot {
            x: 15,
            y: 4,
            resource: 4.0,
        },
        Hotspot {
            x: 6,
            y: 16,
            resource: 3.0,
        },
    ]
}

/// Full harness configuration, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub world: SeawardConfig,
    pub discretizer: DiscretizerConfig,
    pub representative: RepresentativePolicy,
    /// Grid coordinate of the shared home port.
    pub port: (u32, u32),
    pub hotspots: Vec<Hotspot>,
    pub policies: Vec<PolicyTemplate>,
    pub probability: ProbabilityRule,
    pub selection: SelectionRule,
    /// Share of a cell's resource landed by one trip.
    pub catch_fraction: f64,
    pub price: f64,
    /// Logistic regrowth rate applied daily to non-empty cells.
    pub regrowth_rate: f64,
    /// Trips older than this are dropped from fisher memory.
    pub trip_memory_days: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            world: SeawardConfig::default(),
            discretizer: DiscretizerConfig::Squares(SquaresDiscretizer::new(3, 3)),
            representative: RepresentativePolicy::Centroid,
            port: (0, 0),
            hotspots: default_hotspots(),
            policies: default_policies(),
            probability: ProbabilityRule::default(),
            selection: SelectionRule::UniformRandom,
            catch_fraction: 0.2,
            price: 10.0,
            regrowth_rate: 0.05,
            trip_memory_days: 90,
        }
    }
}

impl HarnessConfig {
    /// Parse a JSON document, filling omitted fields with defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("failed to parse harness config")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.world.validate().context("invalid world section")?;
        self.probability
            .validate()
            .context("invalid probability rule")?;
        if let Some(bandit) = self.selection.bandit() {
            bandit.validate().context("invalid bandit selection")?;
        }
        ensure!(!self.policies.is_empty(), "at least one policy is required");
        let mut names = HashSet::new();
        for policy in &self.policies {
            if !names.insert(policy.name.as_str()) {
                bail!("policy name {:?} is used twice", policy.name);
            }
            if let StrategyTemplate::Bandit { bandit } = &policy.strategy {
                bandit.validate().with_context(|| {
                    format!("policy {:?} has invalid bandit settings", policy.name)
                })?;
            }
        }
        ensure!(
            self.port.0 < self.world.map_width && self.port.1 < self.world.map_height,
            "port {:?} lies outside the map",
            self.port
        );
        for hotspot in &self.hotspots {
            ensure!(
                hotspot.x < self.world.map_width && hotspot.y < self.world.map_height,
                "hotspot ({}, {}) lies outside the map",
                hotspot.x,
                hotspot.y
            );
            ensure!(
                hotspot.resource.is_finite() && hotspot.resource >= 0.0,
                "hotspot resource must be non-negative"
            );
        }
        ensure!(
            self.catch_fraction > 0.0 && self.catch_fraction <= 1.0,
            "catch_fraction must lie in (0, 1]"
        );
        ensure!(
            self.price.is_finite() && self.price >= 0.0,
            "price must be non-negative"
        );
        ensure!(
            self.regrowth_rate.is_finite() && self.regrowth_rate >= 0.0,
            "regrowth_rate must be non-negative"
        );
        Ok(())
    }

    /// Build the grid with hotspots painted in.
    pub fn build_map(&self) -> Result<GridMap> {
        let mut map = self.world.build_map()?;
        for hotspot in &self.hotspots {
            if let Some(cell) = map.id_at(hotspot.x, hotspot.y) {
                map.set_resource(cell, hotspot.resource);
            }
        }
        Ok(map)
    }
}
