use chrono::Duration;
use keel_core::{Amount, BPS_DENOMINATOR, Bps, apply_bps};
use keel_ports::{Strategy, StrategyError, StrategyResult};
use log::debug;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::faults::{CallCounts, FaultPlan};

const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Default)]
struct Ledger {
    deployed: Amount,
    pending_yield: Amount,
    faults: FaultPlan,
    calls: CallCounts,
}

/// In-memory yield strategy
pub struct SimulatedStrategy {
    name: String,
    apy_bps: Bps,
    ledger: Mutex<Ledger>,
}

impl SimulatedStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            apy_bps: 0,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Set the annual yield used by [`accrue`](Self::accrue)
    pub fn with_apy(mut self, apy_bps: Bps) -> Self {
        self.apy_bps = apy_bps;
        self
    }

    pub fn with_faults(self, faults: FaultPlan) -> Self {
        self.ledger.lock().faults = faults;
        self
    }

    pub fn apy_bps(&self) -> Bps {
        self.apy_bps
    }

    /// Accrue yield on deployed capital for `elapsed` at the configured APY
    pub fn accrue(&self, elapsed: Duration) -> Amount {
        self.accrue_at(elapsed, self.apy_bps)
    }

    /// Accrue yield for `elapsed` at an explicit APY (e.g. a jittered rate)
    pub fn accrue_at(&self, elapsed: Duration, apy_bps: Bps) -> Amount {
        let mut ledger = self.ledger.lock();
        let seconds = elapsed.num_seconds().max(0);
        let earned = apply_bps(ledger.deployed, apy_bps) * Decimal::from(seconds)
            / Decimal::from(SECONDS_PER_YEAR);
        ledger.pending_yield += earned;
        earned
    }

    /// Credit yield directly
    pub fn add_yield(&self, amount: Amount) {
        self.ledger.lock().pending_yield += amount;
    }

    /// Lose `loss_bps` of the deployed capital
    pub fn apply_loss(&self, loss_bps: Bps) {
        let mut ledger = self.ledger.lock();
        let loss = apply_bps(ledger.deployed, loss_bps.min(BPS_DENOMINATOR));
        ledger.deployed -= loss;
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        self.ledger.lock().faults = faults;
    }

    pub fn fail_execute(&self, fail: bool) {
        self.ledger.lock().faults.fail_execute = fail;
    }

    pub fn fail_harvest(&self, fail: bool) {
        self.ledger.lock().faults.fail_harvest = fail;
    }

    pub fn fail_emergency_exit(&self, fail: bool) {
        self.ledger.lock().faults.fail_emergency_exit = fail;
    }

    pub fn fail_balance(&self, fail: bool) {
        self.ledger.lock().faults.fail_balance = fail;
    }

    /// Misreport balances; `None` restores the ledger value
    pub fn misreport_balance(&self, amount: Option<Amount>) {
        self.ledger.lock().faults.report_balance = amount;
    }

    pub fn misreport_harvest(&self, amount: Option<Amount>) {
        self.ledger.lock().faults.report_harvest = amount;
    }

    pub fn misreport_exit(&self, amount: Option<Amount>) {
        self.ledger.lock().faults.report_exit = amount;
    }

    pub fn deployed(&self) -> Amount {
        self.ledger.lock().deployed
    }

    pub fn pending_yield(&self) -> Amount {
        self.ledger.lock().pending_yield
    }

    pub fn calls(&self) -> CallCounts {
        self.ledger.lock().calls
    }
}

impl Strategy for SimulatedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, amount: Amount, _data: &[u8]) -> StrategyResult<()> {
        let mut ledger = self.ledger.lock();
        ledger.calls.execute += 1;

        if ledger.faults.fail_execute {
            return Err(StrategyError::Execution(format!("{}: simulated fault", self.name)));
        }
        if amount <= Decimal::ZERO {
            return Err(StrategyError::Execution(format!(
                "{}: non-positive amount {}",
                self.name, amount
            )));
        }

        ledger.deployed += amount;
        debug!("[SIM] {} deployed {} (total {})", self.name, amount, ledger.deployed);
        Ok(())
    }

    fn harvest(&self, _data: &[u8]) -> StrategyResult<Amount> {
        let mut ledger = self.ledger.lock();
        ledger.calls.harvest += 1;

        if ledger.faults.fail_harvest {
            return Err(StrategyError::Harvest(format!("{}: simulated fault", self.name)));
        }

        let realized = std::mem::take(&mut ledger.pending_yield);
        debug!("[SIM] {} harvested {}", self.name, realized);
        Ok(ledger.faults.report_harvest.unwrap_or(realized))
    }

    fn emergency_exit(&self, _data: &[u8]) -> StrategyResult<Amount> {
        let mut ledger = self.ledger.lock();
        ledger.calls.emergency_exit += 1;

        if ledger.faults.fail_emergency_exit {
            return Err(StrategyError::EmergencyExit(format!(
                "{}: simulated fault",
                self.name
            )));
        }

        let gross = std::mem::take(&mut ledger.deployed) + std::mem::take(&mut ledger.pending_yield);
        let recovered = gross - apply_bps(gross, ledger.faults.exit_haircut_bps.min(BPS_DENOMINATOR));
        debug!("[SIM] {} exited, returned {}", self.name, recovered);
        Ok(ledger.faults.report_exit.unwrap_or(recovered))
    }

    fn balance(&self) -> StrategyResult<Amount> {
        let mut ledger = self.ledger.lock();
        ledger.calls.balance += 1;

        if ledger.faults.fail_balance {
            return Err(StrategyError::Valuation(format!("{}: simulated fault", self.name)));
        }
        Ok(ledger
            .faults
            .report_balance
            .unwrap_or(ledger.deployed + ledger.pending_yield))
    }
}
