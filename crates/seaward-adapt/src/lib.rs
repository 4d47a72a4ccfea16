//! Policy adaptation for Seaward fishers: a menu of strategies, bandit rules
//! (also usable directly as a destination strategy) and the explore/imitate/exploit
//! cycle that switches between them.

mod adaptation;
mod bandit;
mod destination;
mod menu;
mod objective;
mod probability;

pub use adaptation::{
    AdaptError, AdaptationMode, AdaptationPredicate, AdaptationState, Actuator,
    ExploreImitateAdaptation, ObjectiveSensor, PeerSnapshot, PolicySensor, StepOutcome,
    ValidityCheck, every_n_days,
};
pub use bandit::{Bandit, BanditConfig, BanditError, BanditRule, RewardAverage};
pub use destination::BanditDestinationStrategy;
pub use menu::{MenuError, PolicyMenu, StrategyFactory};
pub use objective::CashFlowObjective;
pub use probability::{Probabilities, ProbabilityRule, SelectionRule};
