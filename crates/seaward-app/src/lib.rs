//! Deterministic fishing harness that exercises the Seaward decision core end to end.

mod config;
mod harness;

pub use config::{HarnessConfig, Hotspot, LogitTemplate, PolicyTemplate, StrategyTemplate};
pub use harness::{ActivePolicy, Fisher, FisherSummary, Harness, HarnessReport, OutcomeTally};
