use seaward_core::FisherView;
use serde::{Deserialize, Serialize};

/// Change in cash over the trailing `lookback_days` of the daily cash series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlowObjective {
    pub lookback_days: usize,
}

impl Default for CashFlowObjective {
    fn default() -> Self {
        Self { lookback_days: 60 }
    }
}

impl CashFlowObjective {
    #[must_use]
    pub const fn new(lookback_days: usize) -> Self {
        Self { lookback_days }
    }

    /// `cash[now] - cash[now - lookback]`, clamped to the start of the series.
    #[must_use]
    pub fn evaluate(&self, fisher: &dyn FisherView) -> f64 {
        let history = fisher.cash_history();
        let Some(now) = history.len().checked_sub(1) else {
            return 0.0;
        };
        let then = now.saturating_sub(self.lookback_days);
        history[now] - history[then]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seaward_core::{CellId, Day, FisherRecord, TripRecord};

    #[test]
    fn measures_trailing_window() {
        let mut fisher = FisherRecord::new(None);
        let objective = CashFlowObjective::new(2);
        assert_eq!(objective.evaluate(&fisher), 0.0);
        for (day, profit) in [(0, 5.0), (1, -1.0), (2, 3.0), (3, 4.0)] {
            fisher.record_trip(TripRecord {
                destination: CellId(0),
                day: Day(day),
                profit,
            });
        }
        assert_eq!(objective.evaluate(&fisher), 7.0);
        assert_eq!(CashFlowObjective::new(100).evaluate(&fisher), 6.0);
    }
}
