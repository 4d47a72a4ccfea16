//! Multi-armed bandit rules over the arms of a policy menu.

use rand::{Rng, RngCore};
use seaward_core::sampling::{sample_index, stable_softmax};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BanditError {
    #[error("bandit needs at least one arm")]
    NoArms,
    #[error("epsilon must lie in [0, 1], got {0}")]
    InvalidEpsilon(f64),
    #[error("reward bounds must be finite with min < max, got [{min}, {max}]")]
    InvalidRewardBounds { min: f64, max: f64 },
    #[error("temperature must be positive and finite, got {0}")]
    InvalidTemperature(f64),
    #[error("temperature decay must lie in (0, 1], got {0}")]
    InvalidDecay(f64),
    #[error("moving-average alpha must lie in (0, 1], got {0}")]
    InvalidAlpha(f64),
}

fn default_temperature_floor() -> f64 {
    1.0
}

/// Arm-selection rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BanditRule {
    /// Random arm with probability `epsilon`, otherwise the best average.
    EpsilonGreedy { epsilon: f64 },
    /// Upper confidence bound over rewards normalised to `[min_reward, max_reward]`.
    Ucb1 { min_reward: f64, max_reward: f64 },
    /// Boltzmann draw whose temperature shrinks by `decay` after every selection.
    Softmax {
        initial_temperature: f64,
        decay: f64,
        #[serde(default = "default_temperature_floor")]
        temperature_floor: f64,
    },
}

impl Default for BanditRule {
    fn default() -> Self {
        Self::EpsilonGreedy { epsilon: 0.2 }
    }
}

/// How each arm's running reward estimate is maintained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardAverage {
    #[default]
    Mean,
    /// Exponential moving average; the first observation seeds the estimate.
    ExponentialMovingAverage { alpha: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BanditConfig {
    #[serde(default)]
    pub rule: BanditRule,
    #[serde(default)]
    pub averaging: RewardAverage,
}

impl BanditConfig {
    #[must_use]
    pub const fn new(rule: BanditRule, averaging: RewardAverage) -> Self {
        Self { rule, averaging }
    }

    pub fn validate(&self) -> Result<(), BanditError> {
        match self.rule {
            BanditRule::EpsilonGreedy { epsilon } => {
                if !(0.0..=1.0).contains(&epsilon) {
                    return Err(BanditError::InvalidEpsilon(epsilon));
                }
            }
            BanditRule::Ucb1 {
                min_reward,
                max_reward,
            } => {
                if !min_reward.is_finite() || !max_reward.is_finite() || min_reward >= max_reward {
                    return Err(BanditError::InvalidRewardBounds {
                        min: min_reward,
                        max: max_reward,
                    });
                }
            }
            BanditRule::Softmax {
                initial_temperature,
                decay,
                temperature_floor,
            } => {
                for temperature in [initial_temperature, temperature_floor] {
                    if !temperature.is_finite() || temperature <= 0.0 {
                        return Err(BanditError::InvalidTemperature(temperature));
                    }
                }
                if !(decay > 0.0 && decay <= 1.0) {
                    return Err(BanditError::InvalidDecay(decay));
                }
            }
        }
        if let RewardAverage::ExponentialMovingAverage { alpha } = self.averaging {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(BanditError::InvalidAlpha(alpha));
            }
        }
        Ok(())
    }
}

/// Per-agent bandit statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Bandit {
    config: BanditConfig,
    pulls: Vec<u64>,
    averages: Vec<f64>,
    temperature: f64,
}

impl Bandit {
    pub fn new(config: BanditConfig, arms: usize) -> Result<Self, BanditError> {
        config.validate()?;
        if arms == 0 {
            return Err(BanditError::NoArms);
        }
        let temperature = match config.rule {
            BanditRule::Softmax {
                initial_temperature,
                temperature_floor,
                ..
            } => initial_temperature.max(temperature_floor),
            _ => 0.0,
        };
        Ok(Self {
            config,
            pulls: vec![0; arms],
            averages: vec![0.0; arms],
            temperature,
        })
    }

    #[must_use]
    pub fn arms(&self) -> usize {
        self.pulls.len()
    }

    #[must_use]
    pub fn pulls(&self, arm: usize) -> u64 {
        self.pulls.get(arm).copied().unwrap_or_default()
    }

    /// Running reward estimate; zero for arms never pulled.
    #[must_use]
    pub fn average(&self, arm: usize) -> f64 {
        self.averages.get(arm).copied().unwrap_or_default()
    }

    /// Current softmax temperature; zero for other rules.
    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Pick an arm index in `0..arms()`.
    pub fn select_arm(&mut self, rng: &mut dyn RngCore) -> usize {
        match self.config.rule {
            BanditRule::EpsilonGreedy { epsilon } => {
                if rng.random::<f64>() < epsilon {
                    rng.random_range(0..self.arms())
                } else {
                    first_max(&self.averages)
                }
            }
            BanditRule::Ucb1 {
                min_reward,
                max_reward,
            } => {
                if let Some(unpulled) = self.pulls.iter().position(|pulls| *pulls == 0) {
                    return unpulled;
                }
                let total = self.pulls.iter().sum::<u64>() as f64;
                let span = max_reward - min_reward;
                let bounds: Vec<f64> = self
                    .averages
                    .iter()
                    .zip(&self.pulls)
                    .map(|(average, pulls)| {
                        let normalized = (average - min_reward) / span;
                        normalized + (2.0 * total.ln() / *pulls as f64).sqrt()
                    })
                    .collect();
                first_max(&bounds)
            }
            BanditRule::Softmax {
                decay,
                temperature_floor,
                ..
            } => {
                let scaled: Vec<f64> = self
                    .averages
                    .iter()
                    .map(|average| average / self.temperature)
                    .collect();
                let arm = sample_index(&stable_softmax(&scaled), rng).unwrap_or(0);
                self.temperature = (self.temperature * decay).max(temperature_floor);
                arm
            }
        }
    }

    /// Generic front end over a tag slice aligned with the arms.
    pub fn select<'t, T>(&mut self, tags: &'t [T], rng: &mut dyn RngCore) -> Option<&'t T> {
        tags.get(self.select_arm(rng))
    }

    /// Fold `reward` into the arm's estimate; out-of-range arms and non-finite rewards are ignored.
    pub fn update(&mut self, arm: usize, reward: f64) {
        if arm >= self.arms() || !reward.is_finite() {
            return;
        }
        self.pulls[arm] += 1;
        let pulls = self.pulls[arm];
        let average = &mut self.averages[arm];
        match self.config.averaging {
            _ if pulls == 1 => *average = reward,
            RewardAverage::Mean => *average += (reward - *average) / pulls as f64,
            RewardAverage::ExponentialMovingAverage { alpha } => {
                *average += alpha * (reward - *average);
            }
        }
    }
}

/// Index of the largest value, earliest on ties.
fn first_max(values: &[f64]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = index;
        }
    }
    best
}
