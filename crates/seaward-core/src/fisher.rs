//! Read-only fisher interface consumed by extractors, objectives and strategies.

use serde::{Deserialize, Serialize};

use crate::{CellId, Day};

/// One completed trip as remembered by the fisher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub destination: CellId,
    pub day: Day,
    pub profit: f64,
}

/// What the decision core is allowed to know about a fisher.
pub trait FisherView {
    /// Home port cell, if the fisher has one.
    fn home(&self) -> Option<CellId>;

    /// Completed trips, oldest first.
    fn trips(&self) -> &[TripRecord];

    /// End-of-day cash balances, oldest first.
    fn cash_history(&self) -> &[f64];

    fn is_allowed_at_sea(&self) -> bool {
        true
    }
}

/// Plain in-memory fisher record used by schedulers and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FisherRecord {
    pub home: Option<CellId>,
    pub allowed_at_sea: bool,
    trips: Vec<TripRecord>,
    cash_history: Vec<f64>,
    /// Day whose balance is the last `cash_history` entry, while trips can still land on it.
    #[serde(default)]
    open_day: Option<Day>,
}

impl FisherRecord {
    #[must_use]
    pub fn new(home: Option<CellId>) -> Self {
        Self {
            home,
            allowed_at_sea: true,
            trips: Vec::new(),
            cash_history: Vec::new(),
            open_day: None,
        }
    }

    /// Current cash balance (zero before the first recorded day).
    #[must_use]
    pub fn cash(&self) -> f64 {
        self.cash_history.last().copied().unwrap_or_default()
    }

    /// Log a trip and book its profit onto the balance of the trip's day.
    /// Several trips on the same day share one `cash_history` entry.
    pub fn record_trip(&mut self, trip: TripRecord) {
        let balance = self.cash() + trip.profit;
        match self.cash_history.last_mut() {
            Some(last) if self.open_day == Some(trip.day) => *last = balance,
            _ => self.cash_history.push(balance),
        }
        self.open_day = Some(trip.day);
        self.trips.push(trip);
    }

    /// Close a day without fishing, carrying the balance forward.
    pub fn record_idle_day(&mut self) {
        let balance = self.cash();
        self.cash_history.push(balance);
        self.open_day = None;
    }

    /// Drop trips older than `keep_days` relative to `today`.
    pub fn forget_trips_before(&mut self, today: Day, keep_days: u32) {
        self.trips.retain(|trip| today.since(trip.day) <= keep_days);
    }
}

impl FisherView for FisherRecord {
    fn home(&self) -> Option<CellId> {
        self.home
    }

    fn trips(&self) -> &[TripRecord] {
        &self.trips
    }

    fn cash_history(&self) -> &[f64] {
        &self.cash_history
    }

    fn is_allowed_at_sea(&self) -> bool {
        self.allowed_at_sea
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(day: u32, profit: f64) -> TripRecord {
        TripRecord {
            destination: CellId(0),
            day: Day(day),
            profit,
        }
    }

    #[test]
    fn trips_accumulate_cash() {
        let mut fisher = FisherRecord::new(Some(CellId(3)));
        fisher.record_trip(trip(0, 5.0));
        fisher.record_idle_day();
        fisher.record_trip(trip(2, -1.5));
        assert_eq!(fisher.cash_history(), &[5.0, 5.0, 3.5]);
        assert!((fisher.cash() - 3.5).abs() < f64::EPSILON);
        assert_eq!(fisher.trips().len(), 2);
        assert_eq!(fisher.home(), Some(CellId(3)));
    }

    #[test]
    fn same_day_trips_share_one_balance() {
        let mut fisher = FisherRecord::new(None);
        fisher.record_trip(trip(1, 2.0));
        fisher.record_trip(trip(1, 3.0));
        assert_eq!(fisher.cash_history(), &[5.0]);
        fisher.record_trip(trip(2, -1.0));
        fisher.record_idle_day();
        fisher.record_trip(trip(4, 0.5));
        fisher.record_trip(trip(4, 0.5));
        assert_eq!(fisher.cash_history(), &[5.0, 4.0, 4.0, 5.0]);
        assert_eq!(fisher.trips().len(), 5);
    }

    #[test]
    fn forgetting_trims_old_trips_only() {
        let mut fisher = FisherRecord::new(None);
        for day in 0..10 {
            fisher.record_trip(trip(day, 1.0));
        }
        fisher.forget_trips_before(Day(9), 3);
        let days: Vec<u32> = fisher.trips().iter().map(|trip| trip.day.0).collect();
        assert_eq!(days, vec![6, 7, 8, 9]);
        assert_eq!(fisher.cash_history().len(), 10);
    }

    #[test]
    fn record_roundtrips_through_json() {
        let mut fisher = FisherRecord::new(Some(CellId(1)));
        fisher.record_trip(trip(4, 2.0));
        let json = serde_json::to_string(&fisher).expect("serialize");
        let restored: FisherRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored.trips(), fisher.trips());
        assert_eq!(restored.home, Some(CellId(1)));
    }
}
