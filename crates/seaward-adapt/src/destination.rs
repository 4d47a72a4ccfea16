//! Destination choice as a bandit over map groups.

use std::sync::Arc;

use rand::{Rng, RngCore};
use seaward_core::{CellId, Day, DestinationStrategy, FisherView, GroupId, StateView};
use seaward_geo::MapDiscretization;
use tracing::trace;

use crate::bandit::{Bandit, BanditConfig, BanditError};

/// Arm awaiting the profit of the trip it sent the fisher on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingPull {
    arm: usize,
    day: Day,
}

/// Treats every valid group as a bandit arm: pick a group, then a member cell uniformly.
///
/// The profit of the trip into the chosen group is fed back as the arm's reward the
/// next time a destination is requested.
#[derive(Debug, Clone)]
pub struct BanditDestinationStrategy {
    bandit: Bandit,
    groups: Vec<GroupId>,
    discretization: Arc<MapDiscretization>,
    pending: Option<PendingPull>,
    current_target: Option<CellId>,
}

impl BanditDestinationStrategy {
    pub const KIND: &'static str = "bandit";

    pub fn new(
        config: BanditConfig,
        discretization: Arc<MapDiscretization>,
    ) -> Result<Self, BanditError> {
        let groups: Vec<GroupId> = discretization.valid_groups().collect();
        let bandit = Bandit::new(config, groups.len())?;
        Ok(Self {
            bandit,
            groups,
            discretization,
            pending: None,
            current_target: None,
        })
    }

    /// Group behind each arm, in arm order.
    #[must_use]
    pub fn groups(&self) -> &[GroupId] {
        &self.groups
    }

    #[must_use]
    pub const fn bandit(&self) -> &Bandit {
        &self.bandit
    }

    #[must_use]
    pub const fn current_target(&self) -> Option<CellId> {
        self.current_target
    }

    /// Credit the pending arm with the latest trip into its group since it was pulled.
    fn settle(&mut self, fisher: &dyn FisherView) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let group = self.groups[pending.arm];
        let reward = fisher
            .trips()
            .iter()
            .rev()
            .take_while(|trip| trip.day >= pending.day)
            .find(|trip| self.discretization.group_of(trip.destination) == Some(group))
            .map(|trip| trip.profit);
        match reward {
            Some(reward) => self.bandit.update(pending.arm, reward),
            None => trace!(%group, "no trip recorded for the pending arm"),
        }
    }
}

impl DestinationStrategy for BanditDestinationStrategy {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn select_destination(
        &mut self,
        fisher: &dyn FisherView,
        state: &StateView<'_>,
        rng: &mut dyn RngCore,
    ) -> CellId {
        self.settle(fisher);
        let arm = self.bandit.select_arm(rng);
        let members = self.discretization.members(self.groups[arm]);
        let destination = members[rng.random_range(0..members.len())];
        self.pending = Some(PendingPull {
            arm,
            day: state.day,
        });
        self.current_target = Some(destination);
        destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandit::{BanditRule, RewardAverage};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use seaward_core::{FisherRecord, GridMap, TripRecord};
    use seaward_geo::{RepresentativePolicy, SquaresDiscretizer};

    fn halves(map: &GridMap, x_splits: u32) -> Arc<MapDiscretization> {
        Arc::new(
            MapDiscretization::discretize(
                &SquaresDiscretizer::new(x_splits, 0),
                map,
                RepresentativePolicy::FirstMember,
            )
            .expect("partition"),
        )
    }

    fn greedy() -> BanditConfig {
        BanditConfig::new(BanditRule::EpsilonGreedy { epsilon: 0.0 }, RewardAverage::Mean)
    }

    #[test]
    fn arms_are_the_valid_groups() {
        let map = GridMap::new(2, 2, 1.0).expect("map");
        let strategy = BanditDestinationStrategy::new(greedy(), halves(&map, 3)).expect("bandit");
        assert_eq!(strategy.groups(), &[GroupId(0), GroupId(2)]);
        assert_eq!(strategy.bandit().arms(), 2);
    }

    #[test]
    fn trip_profit_rewards_the_chosen_group() {
        let map = GridMap::new(4, 4, 1.0).expect("map");
        let partition = halves(&map, 1);
        let mut strategy =
            BanditDestinationStrategy::new(greedy(), Arc::clone(&partition)).expect("bandit");
        let mut fisher = FisherRecord::new(None);
        let mut rng = SmallRng::seed_from_u64(9);

        let state = StateView::new(&map, Day(1));
        let first = strategy.select_destination(&fisher, &state, &mut rng);
        assert_eq!(partition.group_of(first), Some(GroupId(0)));
        fisher.record_trip(TripRecord {
            destination: first,
            day: Day(1),
            profit: -2.0,
        });

        let state = StateView::new(&map, Day(2));
        let second = strategy.select_destination(&fisher, &state, &mut rng);
        assert_eq!(strategy.bandit().pulls(0), 1);
        assert_eq!(strategy.bandit().average(0), -2.0);
        assert_eq!(partition.group_of(second), Some(GroupId(1)));
        assert_eq!(strategy.current_target(), Some(second));
        fisher.record_trip(TripRecord {
            destination: second,
            day: Day(2),
            profit: 3.0,
        });

        let state = StateView::new(&map, Day(3));
        for _ in 0..20 {
            let cell = strategy.select_destination(&fisher, &state, &mut rng);
            assert_eq!(partition.group_of(cell), Some(GroupId(1)));
        }
        assert_eq!(strategy.bandit().average(1), 3.0);
    }

    #[test]
    fn skipped_trips_leave_the_estimate_untouched() {
        let map = GridMap::new(4, 4, 1.0).expect("map");
        let mut strategy =
            BanditDestinationStrategy::new(greedy(), halves(&map, 1)).expect("bandit");
        let fisher = FisherRecord::new(None);
        let mut rng = SmallRng::seed_from_u64(10);
        let state = StateView::new(&map, Day(0));
        strategy.select_destination(&fisher, &state, &mut rng);
        strategy.select_destination(&fisher, &state, &mut rng);
        assert_eq!(strategy.bandit().pulls(0), 0);
        assert_eq!(strategy.bandit().pulls(1), 0);
    }

    #[test]
    fn invalid_bandit_settings_are_rejected() {
        let map = GridMap::new(2, 2, 1.0).expect("map");
        let err = BanditDestinationStrategy::new(
            BanditConfig::new(BanditRule::EpsilonGreedy { epsilon: 2.0 }, RewardAverage::Mean),
            halves(&map, 0),
        )
        .unwrap_err();
        assert_eq!(err, BanditError::InvalidEpsilon(2.0));
    }

    #[test]
    fn fixed_seed_reproduces_destinations() {
        let map = GridMap::new(6, 6, 1.0).expect("map");
        let config = BanditConfig::new(
            BanditRule::EpsilonGreedy { epsilon: 0.5 },
            RewardAverage::ExponentialMovingAverage { alpha: 0.3 },
        );
        let strategy = BanditDestinationStrategy::new(config, halves(&map, 2)).expect("bandit");
        let fisher = FisherRecord::new(None);
        let state = StateView::new(&map, Day(0));
        let run = |mut strategy: BanditDestinationStrategy| {
            let mut rng = SmallRng::seed_from_u64(77);
            (0..30)
                .map(|_| strategy.select_destination(&fisher, &state, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(strategy.clone()), run(strategy));
    }
}
