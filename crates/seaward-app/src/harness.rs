//! Day-by-day scheduler driving fishers through destination choice and adaptation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use seaward_adapt::{
    BanditDestinationStrategy, CashFlowObjective, ExploreImitateAdaptation, PeerSnapshot,
    PolicyMenu, StepOutcome, StrategyFactory, every_n_days,
};
use seaward_core::{
    AgentId, CellId, Day, DestinationStrategy, FisherRecord, FisherView, GridMap, SeaMap,
    StateView, TripRecord,
};
use seaward_geo::MapDiscretization;
use serde::Serialize;
use slotmap::SlotMap;
use tracing::{debug, info, warn};

use crate::config::{HarnessConfig, PolicyTemplate, StrategyTemplate};

/// Strategy built from a menu entry together with the tag that produced it.
pub struct ActivePolicy {
    pub tag: String,
    pub strategy: Box<dyn DestinationStrategy>,
}

impl fmt::Debug for ActivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivePolicy")
            .field("tag", &self.tag)
            .field("strategy", &self.strategy.kind())
            .finish()
    }
}

/// A simulated fisher: its record plus the live destination strategy.
#[derive(Debug)]
pub struct Fisher {
    pub record: FisherRecord,
    pub policy: ActivePolicy,
}

/// Totals of adaptation outcomes across the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeTally {
    pub skipped: u32,
    pub kept: u32,
    pub explored: u32,
    pub imitated: u32,
    pub vetoed: u32,
}

impl OutcomeTally {
    fn record<T>(&mut self, outcome: &StepOutcome<T>) {
        match outcome {
            StepOutcome::Skipped => self.skipped += 1,
            StepOutcome::Kept => self.kept += 1,
            StepOutcome::Explored(_) => self.explored += 1,
            StepOutcome::Imitated(_) => self.imitated += 1,
            StepOutcome::Vetoed(_) => self.vetoed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FisherSummary {
    pub policy: String,
    pub cash: f64,
    pub trips: usize,
    pub objective: f64,
}

/// Snapshot of the run, serialized by the binary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarnessReport {
    pub days: u32,
    pub groups: usize,
    pub fishers: Vec<FisherSummary>,
    pub policy_counts: BTreeMap<String, usize>,
    pub outcomes: OutcomeTally,
    pub remaining_resource: f64,
}

type Adaptation = ExploreImitateAdaptation<Fisher, String, ActivePolicy>;

#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    map: GridMap,
    discretization: Arc<MapDiscretization>,
    port: CellId,
    capacity: f64,
    fishers: SlotMap<AgentId, Fisher>,
    order: Vec<AgentId>,
    adaptation: Adaptation,
    objective: CashFlowObjective,
    rng: SmallRng,
    day: Day,
    outcomes: OutcomeTally,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let map = config.build_map()?;
        let discretization = Arc::new(
            MapDiscretization::discretize(&config.discretizer, &map, config.representative)
                .context("failed to discretize map")?,
        );
        let port = map
            .id_at(config.port.0, config.port.1)
            .context("port outside the map")?;

        let mut entries = Vec::with_capacity(config.policies.len());
        for template in &config.policies {
            let factory = policy_factory(template, &discretization, port)
                .with_context(|| format!("policy {:?} is misconfigured", template.name))?;
            entries.push((template.name.clone(), factory));
        }
        let menu = PolicyMenu::from_entries(entries).context("invalid policy menu")?;

        let objective = CashFlowObjective::new(config.world.cash_lookback_days as usize);
        let mut adaptation = ExploreImitateAdaptation::new(
            menu,
            Box::new(|fisher: &Fisher| Some(fisher.policy.tag.clone())),
            Box::new(|fisher: &mut Fisher, policy: ActivePolicy| fisher.policy = policy),
            Box::new(move |fisher: &Fisher| objective.evaluate(&fisher.record)),
            config.probability,
            config.selection,
        )
        .context("invalid adaptation settings")?
        .with_predicate(every_n_days(config.world.adaptation_period_days));

        let mut rng = config.world.seeded_rng();
        let mut fishers = SlotMap::with_key();
        let mut order = Vec::with_capacity(config.world.fisher_count);
        let state = StateView::new(&map, Day::zero());
        for index in 0..config.world.fisher_count {
            let tag = adaptation.menu().tags()[index % adaptation.menu().len()].clone();
            let policy = adaptation
                .menu()
                .build(&tag, &state, &mut rng)
                .context("menu lost a tag")?;
            let id = fishers.insert(Fisher {
                record: FisherRecord::new(Some(port)),
                policy,
            });
            adaptation.enroll(id)?;
            order.push(id);
        }

        info!(
            fishers = order.len(),
            groups = discretization.number_of_groups(),
            policies = config.policies.len(),
            "harness bootstrapped"
        );
        let capacity = config.world.initial_resource;
        Ok(Self {
            config,
            map,
            discretization,
            port,
            capacity,
            fishers,
            order,
            adaptation,
            objective,
            rng,
            day: Day::zero(),
            outcomes: OutcomeTally::default(),
        })
    }

    #[must_use]
    pub const fn day(&self) -> Day {
        self.day
    }

    #[must_use]
    pub fn map(&self) -> &GridMap {
        &self.map
    }

    #[must_use]
    pub fn discretization(&self) -> &MapDiscretization {
        &self.discretization
    }

    #[must_use]
    pub fn fisher(&self, id: AgentId) -> Option<&Fisher> {
        self.fishers.get(id)
    }

    pub fn fisher_mut(&mut self, id: AgentId) -> Option<&mut Fisher> {
        self.fishers.get_mut(id)
    }

    /// Fisher ids in scheduling order.
    #[must_use]
    pub fn fisher_ids(&self) -> &[AgentId] {
        &self.order
    }

    #[must_use]
    pub const fn outcomes(&self) -> OutcomeTally {
        self.outcomes
    }

    /// Fish, regrow, then adapt; advances the clock by one day.
    pub fn step_day(&mut self) -> Result<()> {
        self.day = self.day.next();
        self.fish();
        self.regrow();
        self.adapt()?;
        Ok(())
    }

    /// Run the configured number of days and summarise.
    pub fn run(&mut self) -> Result<HarnessReport> {
        for _ in 0..self.config.world.days {
            self.step_day()?;
        }
        Ok(self.report())
    }

    fn fish(&mut self) {
        for id in &self.order {
            let Some(fisher) = self.fishers.get_mut(*id) else {
                continue;
            };
            if !fisher.record.is_allowed_at_sea() {
                fisher.record.record_idle_day();
                continue;
            }
            let destination = {
                let state = StateView::new(&self.map, self.day);
                fisher
                    .policy
                    .strategy
                    .select_destination(&fisher.record, &state, &mut self.rng)
            };
            let distance = self
                .map
                .distance(self.port, destination)
                .unwrap_or_default();
            let stock = self
                .map
                .cell(destination)
                .map_or(0.0, |cell| cell.resource);
            let landed = stock * self.config.catch_fraction;
            self.map.set_resource(destination, stock - landed);
            let profit = landed * self.config.price
                - 2.0 * distance * self.config.world.travel_cost_per_km;
            fisher.record.record_trip(TripRecord {
                destination,
                day: self.day,
                profit,
            });
            fisher
                .record
                .forget_trips_before(self.day, self.config.trip_memory_days);
        }
    }

    fn regrow(&mut self) {
        if self.capacity <= 0.0 {
            return;
        }
        let rate = self.config.regrowth_rate;
        let capacity = self.capacity;
        for (_, cell) in self.map.cells_mut() {
            if cell.resource > 0.0 {
                cell.resource += rate * cell.resource * (1.0 - cell.resource / capacity);
                cell.resource = cell.resource.max(0.0);
            }
        }
    }

    fn adapt(&mut self) -> Result<()> {
        let peers: Vec<PeerSnapshot<String>> = self
            .order
            .iter()
            .filter_map(|id| {
                let fisher = self.fishers.get(*id)?;
                Some(PeerSnapshot {
                    id: *id,
                    policy: Some(fisher.policy.tag.clone()),
                    objective: self.objective.evaluate(&fisher.record),
                })
            })
            .collect();
        let state = StateView::new(&self.map, self.day);
        let mut ran = false;
        for id in &self.order {
            let Some(fisher) = self.fishers.get_mut(*id) else {
                continue;
            };
            let outcome = self
                .adaptation
                .step(*id, fisher, &peers, &state, &mut self.rng)?;
            if let StepOutcome::Vetoed(tag) = &outcome {
                warn!(agent = ?id, %tag, "policy change vetoed");
            }
            ran |= outcome != StepOutcome::Skipped;
            self.outcomes.record(&outcome);
        }
        if ran {
            let counts = self.policy_counts();
            let mean_cash = self
                .fishers
                .values()
                .map(|fisher| fisher.record.cash())
                .sum::<f64>()
                / self.fishers.len().max(1) as f64;
            info!(day = self.day.0, mean_cash, ?counts, "adaptation period closed");
        } else {
            debug!(day = self.day.0, "no adaptation today");
        }
        Ok(())
    }

    fn policy_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for fisher in self.fishers.values() {
            *counts.entry(fisher.policy.tag.clone()).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn report(&self) -> HarnessReport {
        let fishers = self
            .order
            .iter()
            .filter_map(|id| self.fishers.get(*id))
            .map(|fisher| FisherSummary {
                policy: fisher.policy.tag.clone(),
                cash: fisher.record.cash(),
                trips: fisher.record.trips().len(),
                objective: self.objective.evaluate(&fisher.record),
            })
            .collect();
        HarnessReport {
            days: self.day.0,
            groups: self.discretization.number_of_groups(),
            fishers,
            policy_counts: self.policy_counts(),
            outcomes: self.outcomes,
            remaining_resource: self.map.cells().iter().map(|cell| cell.resource).sum(),
        }
    }
}

/// Validate a template once; the returned factory only clones known-good prototypes.
fn policy_factory(
    template: &PolicyTemplate,
    discretization: &Arc<MapDiscretization>,
    port: CellId,
) -> Result<StrategyFactory<ActivePolicy>> {
    let tag = template.name.clone();
    let factory: StrategyFactory<ActivePolicy> = match &template.strategy {
        StrategyTemplate::Logit(logit) => {
            let blueprint = logit
                .logit_config(discretization, port)
                .compile(Arc::clone(discretization))?;
            Box::new(move |_state, _rng| ActivePolicy {
                tag: tag.clone(),
                strategy: Box::new(blueprint.instantiate()),
            })
        }
        StrategyTemplate::Bandit { bandit } => {
            let prototype = BanditDestinationStrategy::new(*bandit, Arc::clone(discretization))?;
            Box::new(move |_state, _rng| ActivePolicy {
                tag: tag.clone(),
                strategy: Box::new(prototype.clone()),
            })
        }
    };
    Ok(factory)
}
