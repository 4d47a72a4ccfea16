//! Rules deciding how likely an agent is to explore or imitate in a period.

use serde::{Deserialize, Serialize};

use crate::adaptation::AdaptError;
use crate::bandit::BanditConfig;

/// Explore and imitate probabilities for one decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probabilities {
    pub explore: f64,
    pub imitate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbabilityRule {
    Fixed {
        explore: f64,
        imitate: f64,
    },
    /// Exploration shrinks by `decay` every period, never below `floor`.
    Annealed {
        initial: f64,
        decay: f64,
        floor: f64,
        imitate: f64,
    },
    /// Explore for certain while lagging `multiplier` times the mean peer objective.
    SocialAnnealing {
        multiplier: f64,
    },
    /// Hand every period to the bandit.
    BanditDriven,
}

impl Default for ProbabilityRule {
    fn default() -> Self {
        Self::Fixed {
            explore: 0.1,
            imitate: 0.8,
        }
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<(), AdaptError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AdaptError::InvalidProbability { name, value })
    }
}

impl ProbabilityRule {
    pub fn validate(&self) -> Result<(), AdaptError> {
        match *self {
            Self::Fixed { explore, imitate } => {
                unit_interval("explore", explore)?;
                unit_interval("imitate", imitate)
            }
            Self::Annealed {
                initial,
                decay,
                floor,
                imitate,
            } => {
                unit_interval("initial", initial)?;
                unit_interval("decay", decay)?;
                unit_interval("floor", floor)?;
                unit_interval("imitate", imitate)
            }
            Self::SocialAnnealing { multiplier } if !multiplier.is_finite() => {
                Err(AdaptError::InvalidProbability {
                    name: "multiplier",
                    value: multiplier,
                })
            }
            Self::SocialAnnealing { .. } | Self::BanditDriven => Ok(()),
        }
    }

    /// Starting value of the per-agent exploration probability.
    #[must_use]
    pub fn initial_exploration(&self) -> f64 {
        match *self {
            Self::Fixed { explore, .. } => explore,
            Self::Annealed { initial, .. } => initial,
            Self::SocialAnnealing { .. } => 0.0,
            Self::BanditDriven => 1.0,
        }
    }

    /// Advance the per-agent exploration probability by one period.
    #[must_use]
    pub fn anneal(&self, current: f64) -> f64 {
        match *self {
            Self::Annealed { decay, floor, .. } => (current * decay).max(floor),
            _ => current,
        }
    }

    /// Probabilities for an agent whose objective is `own`, given its peers' objectives.
    #[must_use]
    pub fn probabilities(&self, exploration: f64, own: f64, peer_objectives: &[f64]) -> Probabilities {
        match *self {
            Self::Fixed { explore, imitate } => Probabilities { explore, imitate },
            Self::Annealed { imitate, .. } => Probabilities {
                explore: exploration,
                imitate,
            },
            Self::SocialAnnealing { multiplier } => {
                let lagging = if peer_objectives.is_empty() {
                    false
                } else {
                    let mean = peer_objectives.iter().sum::<f64>() / peer_objectives.len() as f64;
                    own < multiplier * mean
                };
                Probabilities {
                    explore: if lagging { 1.0 } else { 0.0 },
                    imitate: 1.0,
                }
            }
            Self::BanditDriven => Probabilities {
                explore: 1.0,
                imitate: 0.0,
            },
        }
    }
}

/// How an exploring agent picks its next tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionRule {
    #[default]
    UniformRandom,
    Bandit(BanditConfig),
}

impl SelectionRule {
    #[must_use]
    pub fn bandit(&self) -> Option<&BanditConfig> {
        match self {
            Self::UniformRandom => None,
            Self::Bandit(config) => Some(config),
        }
    }
}
