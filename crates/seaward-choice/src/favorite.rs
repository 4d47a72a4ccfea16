use rand::RngCore;
use seaward_core::{CellId, DestinationStrategy, FisherView, StateView};
use serde::{Deserialize, Serialize};

/// Always heads to the same cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteDestination {
    pub cell: CellId,
}

impl FavoriteDestination {
    pub const KIND: &'static str = "favorite";

    #[must_use]
    pub const fn new(cell: CellId) -> Self {
        Self { cell }
    }
}

impl DestinationStrategy for FavoriteDestination {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn select_destination(
        &mut self,
        _fisher: &dyn FisherView,
        _state: &StateView<'_>,
        _rng: &mut dyn RngCore,
    ) -> CellId {
        self.cell
    }
}
