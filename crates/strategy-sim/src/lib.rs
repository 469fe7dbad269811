//! Keel Strategy Simulator
//!
//! A [`Strategy`](keel_ports::Strategy) implementation that keeps its ledger
//! in memory. It accrues yield at a configurable APY and can be told to fail
//! any capability call, which makes it the test double for the vault's
//! isolate-and-continue behaviour and the adapter behind the runner demo.

mod faults;
mod simulated;

pub use faults::{CallCounts, FaultPlan};
pub use simulated::SimulatedStrategy;
