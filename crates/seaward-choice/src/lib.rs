//! Destination choice for Seaward fishers: feature extractors and a
//! multinomial-logit strategy over discretized map groups.

mod config;
mod favorite;
pub mod features;
mod logit;

pub use config::{ExtractorConfig, FallbackConfig, LogitBlueprint, LogitConfig, LogitRowConfig};
pub use favorite::FavoriteDestination;
pub use features::{
    DistanceFromHomeExtractor, FeatureExtractor, FnExtractor, GridXExtractor, GridYExtractor,
    HabitExtractor, HabitMode, InterceptExtractor, SharedExtractor,
};
pub use logit::{ChoiceError, LogitDestinationStrategy, LogitOptions};
