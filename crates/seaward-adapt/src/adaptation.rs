//! Explore / imitate / exploit adaptation of an agent's active policy.

use std::fmt;
use std::hash::Hash;

use rand::{Rng, RngCore};
use seaward_core::{AgentId, AgentMap, StateView};
use thiserror::Error;
use tracing::debug;

use crate::bandit::{Bandit, BanditError};
use crate::menu::{MenuError, PolicyMenu};
use crate::probability::{ProbabilityRule, SelectionRule};

#[derive(Debug, Error, PartialEq)]
pub enum AdaptError {
    #[error(transparent)]
    Menu(#[from] MenuError),
    #[error(transparent)]
    Bandit(#[from] BanditError),
    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("bandit-driven probabilities need a bandit selection rule")]
    BanditDrivenWithoutBandit,
    #[error("agent {0:?} is not enrolled")]
    NotEnrolled(AgentId),
}

/// Reads the tag of the agent's active policy.
pub type PolicySensor<A, T> = Box<dyn Fn(&A) -> Option<T> + Send + Sync>;
/// Installs a freshly built strategy on the agent, replacing the old one.
pub type Actuator<A, S> = Box<dyn Fn(&mut A, S) + Send + Sync>;
pub type ObjectiveSensor<A> = Box<dyn Fn(&A) -> f64 + Send + Sync>;
/// Whether adaptation runs for this agent today.
pub type AdaptationPredicate<A> = Box<dyn Fn(&A, &StateView<'_>) -> bool + Send + Sync>;
/// `(current, candidate) -> allowed`.
pub type ValidityCheck<T> = Box<dyn Fn(Option<&T>, &T) -> bool + Send + Sync>;

/// Predicate firing on every positive multiple of `period_days`.
#[must_use]
pub fn every_n_days<A: 'static>(period_days: u32) -> AdaptationPredicate<A> {
    Box::new(move |_agent: &A, state: &StateView<'_>| {
        period_days > 0 && state.day.0 > 0 && state.day.0 % period_days == 0
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AdaptationMode {
    #[default]
    Exploit,
    Explore,
    Imitate,
}

/// Read-only view of another agent offered for imitation.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSnapshot<T> {
    pub id: AgentId,
    pub policy: Option<T>,
    pub objective: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    /// The predicate declined to adapt this period.
    Skipped,
    /// The active policy stays in place.
    Kept,
    Explored(T),
    Imitated(T),
    /// The candidate was rejected by the validity check or is not on the menu.
    Vetoed(T),
}

/// Per-agent adaptation bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationState {
    last_decision: AdaptationMode,
    last_reward: Option<f64>,
    exploration: f64,
    bandit: Option<Bandit>,
    explorations: u32,
    imitations: u32,
    vetoes: u32,
}

impl AdaptationState {
    /// Mode chosen by the latest step; the agent is back to exploiting afterwards.
    #[must_use]
    pub const fn last_decision(&self) -> AdaptationMode {
        self.last_decision
    }

    #[must_use]
    pub const fn last_reward(&self) -> Option<f64> {
        self.last_reward
    }

    #[must_use]
    pub const fn exploration(&self) -> f64 {
        self.exploration
    }

    #[must_use]
    pub fn bandit(&self) -> Option<&Bandit> {
        self.bandit.as_ref()
    }

    /// Policy switches caused by exploration.
    #[must_use]
    pub const fn explorations(&self) -> u32 {
        self.explorations
    }

    #[must_use]
    pub const fn imitations(&self) -> u32 {
        self.imitations
    }

    #[must_use]
    pub const fn vetoes(&self) -> u32 {
        self.vetoes
    }
}

/// Periodically re-chooses each enrolled agent's policy from a [`PolicyMenu`].
pub struct ExploreImitateAdaptation<A, T, S> {
    menu: PolicyMenu<T, S>,
    sensor: PolicySensor<A, T>,
    actuator: Actuator<A, S>,
    objective: ObjectiveSensor<A>,
    predicate: Option<AdaptationPredicate<A>>,
    validity: Option<ValidityCheck<T>>,
    probability: ProbabilityRule,
    selection: SelectionRule,
    states: AgentMap<AdaptationState>,
}

impl<A, T, S> ExploreImitateAdaptation<A, T, S>
where
    T: Clone + Eq + Hash + fmt::Debug,
{
    pub fn new(
        menu: PolicyMenu<T, S>,
        sensor: PolicySensor<A, T>,
        actuator: Actuator<A, S>,
        objective: ObjectiveSensor<A>,
        probability: ProbabilityRule,
        selection: SelectionRule,
    ) -> Result<Self, AdaptError> {
        probability.validate()?;
        if let Some(config) = selection.bandit() {
            config.validate()?;
        } else if probability == ProbabilityRule::BanditDriven {
            return Err(AdaptError::BanditDrivenWithoutBandit);
        }
        Ok(Self {
            menu,
            sensor,
            actuator,
            objective,
            predicate: None,
            validity: None,
            probability,
            selection,
            states: AgentMap::new(),
        })
    }

    /// Restrict adaptation to days where `predicate` holds; without one every step adapts.
    #[must_use]
    pub fn with_predicate(mut self, predicate: AdaptationPredicate<A>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    #[must_use]
    pub fn with_validity(mut self, validity: ValidityCheck<T>) -> Self {
        self.validity = Some(validity);
        self
    }

    #[must_use]
    pub fn menu(&self) -> &PolicyMenu<T, S> {
        &self.menu
    }

    /// Create fresh adaptation state for `id`, replacing any existing state.
    pub fn enroll(&mut self, id: AgentId) -> Result<(), AdaptError> {
        let bandit = match self.selection.bandit() {
            Some(config) => Some(Bandit::new(*config, self.menu.len())?),
            None => None,
        };
        self.states.insert(
            id,
            AdaptationState {
                last_decision: AdaptationMode::Exploit,
                last_reward: None,
                exploration: self.probability.initial_exploration(),
                bandit,
                explorations: 0,
                imitations: 0,
                vetoes: 0,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, id: AgentId) -> Option<AdaptationState> {
        self.states.remove(id)
    }

    #[must_use]
    pub fn state(&self, id: AgentId) -> Option<&AdaptationState> {
        self.states.get(id)
    }

    #[must_use]
    pub fn enrolled(&self) -> usize {
        self.states.len()
    }

    /// Run one adaptation cycle for `agent`.
    ///
    /// `peers` may include the agent itself; its own snapshot is ignored.
    pub fn step(
        &mut self,
        id: AgentId,
        agent: &mut A,
        peers: &[PeerSnapshot<T>],
        state: &StateView<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<StepOutcome<T>, AdaptError> {
        let slot = self
            .states
            .get_mut(id)
            .ok_or(AdaptError::NotEnrolled(id))?;
        if self
            .predicate
            .as_ref()
            .is_some_and(|predicate| !predicate(&*agent, state))
        {
            return Ok(StepOutcome::Skipped);
        }

        let reward = (self.objective)(&*agent);
        let current = (self.sensor)(&*agent);
        slot.last_reward = Some(reward);
        if let (Some(bandit), Some(tag)) = (slot.bandit.as_mut(), current.as_ref()) {
            if let Some(arm) = self.menu.position(tag) {
                bandit.update(arm, reward);
            }
        }
        slot.exploration = self.probability.anneal(slot.exploration);

        let peer_objectives: Vec<f64> = peers
            .iter()
            .filter(|peer| peer.id != id)
            .map(|peer| peer.objective)
            .collect();
        let odds = self
            .probability
            .probabilities(slot.exploration, reward, &peer_objectives);

        let (mode, candidate) = if rng.random::<f64>() < odds.explore {
            let arm = match slot.bandit.as_mut() {
                Some(bandit) => bandit.select_arm(rng),
                None => rng.random_range(0..self.menu.len()),
            };
            (AdaptationMode::Explore, self.menu.tag_at(arm).cloned())
        } else if rng.random::<f64>() < odds.imitate {
            let best = best_peer(id, reward, peers).cloned();
            (AdaptationMode::Imitate, best)
        } else {
            (AdaptationMode::Exploit, None)
        };
        slot.last_decision = mode;

        let Some(candidate) = candidate else {
            return Ok(StepOutcome::Kept);
        };
        if current.as_ref() == Some(&candidate) {
            debug!(agent = ?id, tag = ?candidate, ?mode, "candidate already active");
            return Ok(StepOutcome::Kept);
        }
        let allowed = self.menu.contains(&candidate)
            && self
                .validity
                .as_ref()
                .is_none_or(|validity| validity(current.as_ref(), &candidate));
        let strategy = if allowed {
            self.menu.build(&candidate, state, rng)
        } else {
            None
        };
        let Some(strategy) = strategy else {
            slot.vetoes += 1;
            debug!(agent = ?id, tag = ?candidate, ?mode, "transition vetoed");
            return Ok(StepOutcome::Vetoed(candidate));
        };

        (self.actuator)(agent, strategy);
        debug!(agent = ?id, from = ?current, to = ?candidate, ?mode, reward, "policy switched");
        Ok(match mode {
            AdaptationMode::Explore => {
                slot.explorations += 1;
                StepOutcome::Explored(candidate)
            }
            AdaptationMode::Imitate => {
                slot.imitations += 1;
                StepOutcome::Imitated(candidate)
            }
            AdaptationMode::Exploit => StepOutcome::Kept,
        })
    }
}

/// Policy of the best-performing peer that strictly beats `own`; the earliest wins ties.
fn best_peer<T>(id: AgentId, own: f64, peers: &[PeerSnapshot<T>]) -> Option<&T> {
    let mut best: Option<(&T, f64)> = None;
    for peer in peers {
        let Some(policy) = peer.policy.as_ref() else {
            continue;
        };
        if peer.id == id || !peer.objective.is_finite() || peer.objective <= own {
            continue;
        }
        if best.is_none_or(|(_, objective)| peer.objective > objective) {
            best = Some((policy, peer.objective));
        }
    }
    best.map(|(policy, _)| policy)
}

impl<A, T: fmt::Debug, S> fmt::Debug for ExploreImitateAdaptation<A, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExploreImitateAdaptation")
            .field("menu", &self.menu)
            .field("probability", &self.probability)
            .field("selection", &self.selection)
            .field("enrolled", &self.states.len())
            .finish_non_exhaustive()
    }
}
