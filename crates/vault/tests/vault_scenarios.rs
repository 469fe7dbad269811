//! End-to-end vault scenarios against simulated strategies

use chrono::Duration;
use keel_clock::ManualClock;
use keel_core::{
    AllocationTarget, Amount, ConfigError, Role, StrategyId, StrategyState, VaultConfig,
    VaultFlags,
};
use keel_ports::{Strategy, StrategyHandle, StrategyResult};
use keel_risk::{RiskError, RiskGateway, StaticRiskOracle};
use keel_strategy_sim::SimulatedStrategy;
use keel_vault::{AdmissionError, Vault, VaultError, VaultEvent};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, OnceLock, Weak};

const OWNER: &str = "owner";

struct Fixture {
    vault: Arc<Vault>,
    clock: Arc<ManualClock>,
}

fn manual_config() -> VaultConfig {
    VaultConfig {
        management_fee_bps: 0,
        flags: VaultFlags {
            auto_rebalance: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn fixture(config: VaultConfig) -> Fixture {
    let _ = env_logger::try_init();

    let clock = ManualClock::new(None);
    let oracle = StaticRiskOracle::default().with_score("degen", 9_000);
    let vault = Vault::new(
        OWNER,
        config,
        RiskGateway::new(Arc::new(oracle)),
        clock.clone(),
    )
    .unwrap();

    Fixture {
        vault: Arc::new(vault),
        clock,
    }
}

fn add(vault: &Vault, id: &str, target_bps: u32) -> Arc<SimulatedStrategy> {
    let strategy = Arc::new(SimulatedStrategy::new(id));
    vault
        .add_strategy(OWNER, id, strategy.clone(), 10_000)
        .unwrap();
    vault
        .update_allocation_target(OWNER, AllocationTarget::new(id, target_bps))
        .unwrap();
    strategy
}

fn sid(id: &str) -> StrategyId {
    StrategyId::from(id)
}

fn tracked(vault: &Vault, id: &str) -> Amount {
    vault.strategy(&sid(id)).unwrap().total_assets
}

// ----------------------------------------------------------------------
// Allocation and rebalancing
// ----------------------------------------------------------------------

#[test]
fn test_rebalance_reaches_targets() {
    let f = fixture(manual_config());
    let a = add(&f.vault, "a", 6_000);
    let b = add(&f.vault, "b", 4_000);

    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    let report = f.vault.rebalance(OWNER).unwrap();

    assert_eq!(report.rebalanced, 2);
    assert_eq!(a.deployed(), dec!(600));
    assert_eq!(b.deployed(), dec!(400));
    assert_eq!(tracked(&f.vault, "a"), dec!(600));
    assert_eq!(f.vault.strategy(&sid("a")).unwrap().current_allocation_bps, 6_000);
    assert_eq!(f.vault.pool_balance().unwrap(), dec!(0));

    // Every strategy that drifted past the threshold is now within it
    let drift = f.vault.compute_drift().unwrap();
    assert!(!drift.rebalance_needed);
    assert!(drift.entries.iter().all(|e| e.drift_bps <= drift.threshold_bps));
}

#[test]
fn test_deposit_auto_rebalances_after_cooldown() {
    let f = fixture(VaultConfig {
        management_fee_bps: 0,
        ..Default::default()
    });
    let a = add(&f.vault, "a", 6_000);
    let b = add(&f.vault, "b", 4_000);

    // First deposit: drift is 100%, no previous rebalance
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    assert_eq!(a.deployed(), dec!(600));
    assert_eq!(b.deployed(), dec!(400));

    // Drift above threshold, but inside the cooldown
    f.vault.deposit("bob", dec!(100), 5_000).unwrap();
    assert_eq!(f.vault.pool_balance().unwrap(), dec!(100));
    assert!(!f.vault.should_auto_rebalance().unwrap());

    f.clock.advance(Duration::hours(4));
    f.vault.deposit("carol", dec!(1), 5_000).unwrap();

    // a drifted to 5449bps (> 500) and is topped up; b at 3633bps stays
    assert_eq!(a.deployed(), dec!(660.6));
    assert_eq!(b.deployed(), dec!(400));
    assert_eq!(f.vault.pool_balance().unwrap(), dec!(40.4));
    assert_eq!(f.vault.metrics().unwrap().rebalance_count, 2);
}

#[test]
fn test_compute_drift_is_idempotent() {
    let f = fixture(manual_config());
    add(&f.vault, "a", 7_000);
    f.vault.deposit("alice", dec!(500), 5_000).unwrap();

    let first = f.vault.compute_drift().unwrap();
    let second = f.vault.compute_drift().unwrap();
    assert_eq!(first, second);
    assert!(first.rebalance_needed);
}

#[test]
fn test_allocation_targets_never_exceed_full_vault() {
    let f = fixture(manual_config());
    add(&f.vault, "a", 8_000);
    let b = Arc::new(SimulatedStrategy::new("b"));
    f.vault.add_strategy(OWNER, "b", b, 3_000).unwrap();

    assert_eq!(
        f.vault
            .update_allocation_target(OWNER, AllocationTarget::new("b", 3_000)),
        Err(VaultError::Config(ConfigError::AllocationOverflow { total: 11_000 }))
    );

    // Above b's own max allocation
    assert!(matches!(
        f.vault
            .update_allocation_target(OWNER, AllocationTarget::new("b", 3_500)),
        Err(VaultError::Config(ConfigError::InvalidParameter {
            field: "target_bps",
            ..
        }))
    ));

    // Band violated
    assert!(
        f.vault
            .update_allocation_target(
                OWNER,
                AllocationTarget::new("b", 2_000).with_band(2_500, 3_000)
            )
            .is_err()
    );

    assert_eq!(f.vault.strategy(&sid("b")).unwrap().target_allocation_bps, 0);
    assert!(f.vault.allocation_target(&sid("b")).unwrap().is_none());

    f.vault
        .update_allocation_target(OWNER, AllocationTarget::new("b", 2_000))
        .unwrap();
    let total: u32 = f
        .vault
        .active_strategies()
        .unwrap()
        .iter()
        .map(|id| f.vault.strategy(id).unwrap().target_allocation_bps)
        .sum();
    assert_eq!(total, 10_000);
}

// ----------------------------------------------------------------------
// Accounting
// ----------------------------------------------------------------------

#[test]
fn test_failing_valuation_falls_back_to_cache() {
    let f = fixture(manual_config());
    let a = add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();

    a.fail_balance(true);

    let total = f.vault.total_assets().unwrap();
    assert_eq!(total, dec!(1000));
    assert!(total >= f.vault.pool_balance().unwrap());
}

#[test]
fn test_stale_valuations_quarantine_strategy() {
    let f = fixture(manual_config());
    let a = add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();
    a.fail_balance(true);

    for _ in 0..3 {
        assert!(f.vault.refresh_valuations(OWNER).unwrap().is_empty());
    }
    assert_eq!(f.vault.refresh_valuations(OWNER).unwrap(), vec![sid("a")]);

    // Exit still worked even though valuations did not
    let summary = f.vault.strategy(&sid("a")).unwrap();
    assert_eq!(summary.state, StrategyState::Emergency);
    assert_eq!(f.vault.pool_balance().unwrap(), dec!(1000));
}

#[test]
fn test_misreported_amounts_leave_accounting_intact() {
    let f = fixture(manual_config());
    let a = add(&f.vault, "a", 5_000);
    let b = add(&f.vault, "b", 5_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();
    f.vault.deposit("alice", dec!(100), 5_000).unwrap();

    a.misreport_balance(Some(Decimal::MAX));
    b.misreport_balance(Some(dec!(-50)));

    let total = f.vault.total_assets().unwrap();
    assert_eq!(total, dec!(1100));
    assert!(total >= f.vault.pool_balance().unwrap());
    assert_eq!(f.vault.share_price().unwrap(), dec!(1));

    a.misreport_harvest(Some(Decimal::MAX));
    b.add_yield(dec!(10));
    let report = f.vault.harvest_all(OWNER).unwrap();

    assert_eq!(report.harvested, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.total_yield, dec!(10));
    assert_eq!(tracked(&f.vault, "a"), dec!(500));
    assert_eq!(tracked(&f.vault, "b"), dec!(500));
}

// ----------------------------------------------------------------------
// Harvest and fees
// ----------------------------------------------------------------------

#[test]
fn test_harvest_isolates_failing_strategy() {
    let f = fixture(manual_config());
    let a = add(&f.vault, "a", 3_000);
    let b = add(&f.vault, "b", 3_000);
    let c = add(&f.vault, "c", 4_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();

    a.add_yield(dec!(10));
    b.add_yield(dec!(20));
    c.add_yield(dec!(30));
    c.fail_harvest(true);
    let before = f.vault.strategy(&sid("c")).unwrap();

    let report = f.vault.harvest_all(OWNER).unwrap();

    assert_eq!(report.harvested, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.total_yield, dec!(30));
    assert_eq!(f.vault.strategy(&sid("c")).unwrap(), before);
    assert_eq!(f.vault.strategy(&sid("b")).unwrap().cumulative_returns, dec!(20));
    assert_eq!(f.vault.metrics().unwrap().yield_generated, dec!(30));
}

#[test]
fn test_fees_follow_configured_rates() {
    let f = fixture(VaultConfig {
        performance_fee_bps: 2_000,
        management_fee_bps: 200,
        flags: VaultFlags {
            auto_rebalance: false,
            ..Default::default()
        },
        ..Default::default()
    });
    let a = add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();

    f.clock.advance(Duration::days(365));
    a.add_yield(dec!(100));
    let report = f.vault.harvest_all(OWNER).unwrap();

    // 20% of 100, then 2% of (80 in pool + 1000 deployed) for one year
    assert_eq!(report.performance_fee, dec!(20));
    assert_eq!(report.management_fee, dec!(21.6));
    assert_eq!(f.vault.pool_balance().unwrap(), dec!(58.4));
    assert_eq!(f.vault.fees_owed("treasury").unwrap(), dec!(41.6));
    assert_eq!(f.vault.metrics().unwrap().fees_collected(), dec!(41.6));
}

#[test]
fn test_compounding_redeploys_yield() {
    let f = fixture(VaultConfig {
        management_fee_bps: 0,
        flags: VaultFlags {
            auto_rebalance: false,
            yield_compounding: true,
            ..Default::default()
        },
        ..Default::default()
    });
    let a = add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();

    a.add_yield(dec!(50));
    let report = f.vault.harvest_all(OWNER).unwrap();

    assert_eq!(report.compounded, dec!(45));
    assert_eq!(a.deployed(), dec!(1045));
    assert_eq!(f.vault.pool_balance().unwrap(), dec!(0));
    assert_eq!(f.vault.total_assets().unwrap(), dec!(1045));
}

// ----------------------------------------------------------------------
// Emergency
// ----------------------------------------------------------------------

#[test]
fn test_emergency_mode_pauses_but_allows_exits() {
    let f = fixture(manual_config());
    let a = add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();

    f.vault
        .activate_emergency_mode(OWNER, "oracle compromised")
        .unwrap();
    assert!(f.vault.is_paused().unwrap());

    let paused = VaultError::Paused {
        reason: "oracle compromised".to_string(),
    };
    assert_eq!(f.vault.rebalance(OWNER).unwrap_err(), paused);
    assert_eq!(f.vault.harvest_all(OWNER).unwrap_err(), paused);
    assert_eq!(f.vault.deposit("bob", dec!(10), 0).unwrap_err(), paused);
    assert_eq!(f.vault.withdraw("alice", dec!(10)).unwrap_err(), paused);

    let outcome = f
        .vault
        .emergency_exit_strategy(OWNER, &sid("a"), "incident")
        .unwrap();
    assert_eq!(outcome.recovered, Some(dec!(1000)));
    assert_eq!(a.deployed(), dec!(0));
    assert_eq!(f.vault.pool_balance().unwrap(), dec!(1000));

    assert!(f.vault.deactivate_emergency_mode(OWNER).unwrap());
    assert_eq!(f.vault.withdraw("alice", dec!(1000)).unwrap(), dec!(1000));
}

#[test]
fn test_failed_emergency_exit_still_quarantines() {
    let f = fixture(manual_config());
    let a = add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();
    a.fail_emergency_exit(true);

    let outcome = f
        .vault
        .emergency_exit_strategy(OWNER, &sid("a"), "drained")
        .unwrap();

    assert_eq!(outcome.recovered, None);
    assert_eq!(outcome.unrecovered, dec!(1000));
    let summary = f.vault.strategy(&sid("a")).unwrap();
    assert_eq!(summary.state, StrategyState::Emergency);
    assert_eq!(summary.total_assets, dec!(0));
    assert_eq!(f.vault.metrics().unwrap().emergency_exit_count, 1);

    let journal = f.vault.journal().unwrap();
    assert!(matches!(
        journal.last().map(|e| &e.event),
        Some(VaultEvent::StrategyExited {
            recovered: None,
            ..
        })
    ));

    // Quarantined strategies are no longer routed to or valued
    f.vault.rebalance(OWNER).unwrap();
    assert_eq!(a.calls().execute, 1);
    assert_eq!(f.vault.total_assets().unwrap(), dec!(0));
}

#[test]
fn test_emergency_exit_all() {
    let f = fixture(manual_config());
    add(&f.vault, "a", 5_000);
    let b = add(&f.vault, "b", 5_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();
    b.fail_emergency_exit(true);

    let report = f.vault.emergency_exit_all(OWNER, "shutdown").unwrap();

    assert_eq!(report.exited, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.recovered, dec!(500));
    assert_eq!(report.unrecovered, dec!(500));
    assert_eq!(f.vault.total_assets().unwrap(), dec!(500));
}

// ----------------------------------------------------------------------
// Registry lifecycle
// ----------------------------------------------------------------------

#[test]
fn test_add_then_remove_returns_funds() {
    let f = fixture(manual_config());
    let a = add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();
    a.add_yield(dec!(5));

    let recovered = f.vault.remove_strategy(OWNER, &sid("a")).unwrap();

    assert_eq!(recovered, dec!(1005));
    assert_eq!(f.vault.pool_balance().unwrap(), dec!(1005));
    assert_eq!(f.vault.strategy(&sid("a")).unwrap().state, StrategyState::Inactive);
    assert!(f.vault.active_strategies().unwrap().is_empty());
    assert!(f.vault.allocation_target(&sid("a")).unwrap().is_none());
    assert_eq!(
        f.vault.remove_strategy(OWNER, &sid("a")),
        Err(VaultError::StrategyInactive(sid("a")))
    );

    // Re-admission starts from a clean record
    let again = Arc::new(SimulatedStrategy::new("a"));
    f.vault.add_strategy(OWNER, "a", again, 10_000).unwrap();
    assert_eq!(f.vault.strategy(&sid("a")).unwrap().state, StrategyState::Active);
}

#[test]
fn test_remove_allowed_while_paused() {
    let f = fixture(manual_config());
    add(&f.vault, "a", 10_000);
    f.vault.activate_emergency_mode(OWNER, "incident").unwrap();

    assert!(f.vault.remove_strategy(OWNER, &sid("a")).is_ok());
    assert!(matches!(
        f.vault
            .add_strategy(OWNER, "b", Arc::new(SimulatedStrategy::new("b")), 10_000),
        Err(VaultError::Paused { .. })
    ));
}

#[test]
fn test_admission_rejections_mutate_nothing() {
    let f = fixture(VaultConfig {
        max_strategies: 2,
        max_risk_score: 6_000,
        ..manual_config()
    });
    let a = add(&f.vault, "a", 1_000);

    let degen = Arc::new(SimulatedStrategy::new("degen"));
    assert!(matches!(
        f.vault.add_strategy(OWNER, "degen", degen, 1_000),
        Err(VaultError::Admission(AdmissionError::Risk(RiskError::NotApproved { .. })))
    ));

    let handle: StrategyHandle = a.clone();
    assert!(matches!(
        f.vault.add_strategy(OWNER, "a2", handle, 1_000),
        Err(VaultError::Admission(AdmissionError::HandleInUse(_)))
    ));
    assert!(matches!(
        f.vault
            .add_strategy(OWNER, "a", Arc::new(SimulatedStrategy::new("a")), 1_000),
        Err(VaultError::Admission(AdmissionError::AlreadyActive(_)))
    ));
    assert!(matches!(
        f.vault
            .add_strategy(OWNER, "x", Arc::new(SimulatedStrategy::new("x")), 10_001),
        Err(VaultError::Admission(AdmissionError::MaxAllocationTooHigh(10_001)))
    ));

    assert_eq!(f.vault.active_strategies().unwrap(), vec![sid("a")]);

    add(&f.vault, "b", 1_000);
    assert!(matches!(
        f.vault
            .add_strategy(OWNER, "c", Arc::new(SimulatedStrategy::new("c")), 1_000),
        Err(VaultError::Admission(AdmissionError::CapacityReached { max: 2 }))
    ));
}

#[test]
fn test_risk_cap_rejects_approved_strategy() {
    let f = fixture(VaultConfig {
        max_risk_score: 4_000,
        ..manual_config()
    });

    // Default oracle score 5000 is approved by the oracle, above the vault cap
    let result = f
        .vault
        .add_strategy(OWNER, "mid", Arc::new(SimulatedStrategy::new("mid")), 1_000);
    assert!(matches!(
        result,
        Err(VaultError::Admission(AdmissionError::Risk(RiskError::ScoreTooHigh {
            score: 5_000,
            cap: 4_000,
            ..
        })))
    ));
    assert!(f.vault.active_strategies().unwrap().is_empty());
}

#[test]
fn test_upgrade_clears_quarantine() {
    let f = fixture(manual_config());
    let old = add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();
    old.fail_emergency_exit(true);
    f.vault
        .emergency_exit_strategy(OWNER, &sid("a"), "stuck")
        .unwrap();

    // The old handle releases its funds during the upgrade
    old.fail_emergency_exit(false);
    let replacement = Arc::new(SimulatedStrategy::new("a-v2"));
    let recovered = f
        .vault
        .upgrade_strategy(OWNER, &sid("a"), replacement.clone())
        .unwrap();

    assert_eq!(recovered, dec!(1000));
    let summary = f.vault.strategy(&sid("a")).unwrap();
    assert_eq!(summary.state, StrategyState::Active);
    assert_eq!(summary.name, "a-v2");
    assert_eq!(summary.total_assets, dec!(0));

    f.vault.rebalance(OWNER).unwrap();
    assert_eq!(replacement.deployed(), dec!(1000));
}

// ----------------------------------------------------------------------
// Deposits and withdrawals
// ----------------------------------------------------------------------

#[test]
fn test_withdraw_is_atomic_on_short_liquidity() {
    let f = fixture(manual_config());
    add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();

    assert_eq!(
        f.vault.withdraw("alice", dec!(500)),
        Err(VaultError::InsufficientLiquidity {
            requested: dec!(500),
            available: dec!(0),
        })
    );
    assert_eq!(f.vault.position("alice").unwrap().unwrap().shares, dec!(1000));
    assert!(matches!(
        f.vault.withdraw("alice", dec!(2000)),
        Err(VaultError::InsufficientShares { .. })
    ));
}

#[test]
fn test_shares_track_vault_value() {
    let f = fixture(manual_config());
    let a = add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();

    // Unrealized gain raises the share price
    a.add_yield(dec!(1000));
    assert_eq!(f.vault.share_price().unwrap(), dec!(2));
    assert_eq!(f.vault.preview_deposit(dec!(100)).unwrap(), dec!(50));

    let shares = f.vault.deposit("bob", dec!(100), 2_000).unwrap();
    assert_eq!(shares, dec!(50));
    assert_eq!(f.vault.preview_withdraw(dec!(50)).unwrap(), dec!(100));
    assert_eq!(f.vault.metrics().unwrap().users_served, 2);

    f.vault
        .set_preferred_strategies("bob", vec![sid("a")])
        .unwrap();
    assert_eq!(
        f.vault.position("bob").unwrap().unwrap().preferred_strategies,
        vec![sid("a")]
    );
    assert_eq!(
        f.vault.set_preferred_strategies("nobody", vec![]),
        Err(VaultError::UnknownAccount("nobody".to_string()))
    );
}

// ----------------------------------------------------------------------
// Access control and configuration
// ----------------------------------------------------------------------

#[test]
fn test_unauthorized_callers_are_rejected() {
    let f = fixture(manual_config());
    add(&f.vault, "a", 10_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();

    assert_eq!(
        f.vault.rebalance("mallory"),
        Err(VaultError::Unauthorized {
            caller: "mallory".to_string(),
            role: Role::Rebalancer,
        })
    );
    assert!(matches!(
        f.vault
            .add_strategy("mallory", "m", Arc::new(SimulatedStrategy::new("m")), 1_000),
        Err(VaultError::Unauthorized { .. })
    ));
    assert!(matches!(
        f.vault.activate_emergency_mode("mallory", "no"),
        Err(VaultError::Unauthorized { .. })
    ));
    assert_eq!(f.vault.active_strategies().unwrap(), vec![sid("a")]);
    assert_eq!(f.vault.pool_balance().unwrap(), dec!(1000));
    assert!(!f.vault.is_paused().unwrap());

    assert!(f.vault.grant_role(OWNER, "keeper", Role::Rebalancer).unwrap());
    assert!(f.vault.rebalance("keeper").is_ok());
    assert!(f.vault.harvest_all("keeper").is_ok());
    assert!(matches!(
        f.vault.update_vault_config("keeper", manual_config()),
        Err(VaultError::Unauthorized { role: Role::Admin, .. })
    ));

    assert!(f.vault.revoke_role(OWNER, "keeper", Role::Rebalancer).unwrap());
    assert!(f.vault.rebalance("keeper").is_err());

    // The last admin cannot lock everyone out
    assert!(matches!(
        f.vault.revoke_role(OWNER, OWNER, Role::Admin),
        Err(VaultError::Config(_))
    ));
}

#[test]
fn test_config_updates_are_validated() {
    let f = fixture(manual_config());
    add(&f.vault, "a", 5_000);
    add(&f.vault, "b", 5_000);

    assert!(matches!(
        f.vault.update_vault_config(
            OWNER,
            VaultConfig {
                max_strategies: 1,
                ..manual_config()
            }
        ),
        Err(VaultError::Config(ConfigError::InvalidParameter {
            field: "max_strategies",
            ..
        }))
    ));
    assert!(
        f.vault
            .update_vault_config(
                OWNER,
                VaultConfig {
                    performance_fee_bps: 9_000,
                    ..manual_config()
                }
            )
            .is_err()
    );

    let updated = VaultConfig {
        rebalance_threshold_bps: 100,
        ..manual_config()
    };
    f.vault.update_vault_config(OWNER, updated.clone()).unwrap();
    assert_eq!(f.vault.config().unwrap(), updated);
}

#[test]
fn test_snapshot_serializes_state() {
    let f = fixture(manual_config());
    add(&f.vault, "a", 6_000);
    f.vault.deposit("alice", dec!(1000), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();

    let snapshot = f.vault.snapshot().unwrap();
    assert_eq!(snapshot.strategies.len(), 1);
    assert_eq!(snapshot.targets.len(), 1);
    assert_eq!(snapshot.pool_balance, dec!(400));
    assert_eq!(snapshot.total_assets, dec!(1000));

    let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(json["strategies"][0]["id"], "a");
    assert_eq!(json["strategies"][0]["state"], "Active");
}

// ----------------------------------------------------------------------
// Reentrancy
// ----------------------------------------------------------------------

/// Strategy that calls back into the vault while it is being funded
struct CallbackStrategy {
    vault: OnceLock<Weak<Vault>>,
    deployed: Mutex<Amount>,
    observed: Mutex<Vec<VaultError>>,
}

impl Strategy for CallbackStrategy {
    fn name(&self) -> &str {
        "callback"
    }

    fn execute(&self, amount: Amount, _data: &[u8]) -> StrategyResult<()> {
        *self.deployed.lock() += amount;
        if let Some(vault) = self.vault.get().and_then(Weak::upgrade) {
            let mut observed = self.observed.lock();
            if let Err(e) = vault.deposit("attacker", dec!(10), 0) {
                observed.push(e);
            }
            if let Err(e) = vault.total_assets() {
                observed.push(e);
            }
        }
        Ok(())
    }

    fn harvest(&self, _data: &[u8]) -> StrategyResult<Amount> {
        Ok(Decimal::ZERO)
    }

    fn emergency_exit(&self, _data: &[u8]) -> StrategyResult<Amount> {
        Ok(std::mem::take(&mut *self.deployed.lock()))
    }

    fn balance(&self) -> StrategyResult<Amount> {
        Ok(*self.deployed.lock())
    }
}

#[test]
fn test_reentrant_calls_are_rejected() {
    let f = fixture(manual_config());
    let strategy = Arc::new(CallbackStrategy {
        vault: OnceLock::new(),
        deployed: Mutex::new(Decimal::ZERO),
        observed: Mutex::new(Vec::new()),
    });
    let _ = strategy.vault.set(Arc::downgrade(&f.vault));

    f.vault
        .add_strategy(OWNER, "callback", strategy.clone(), 10_000)
        .unwrap();
    f.vault
        .update_allocation_target(OWNER, AllocationTarget::new("callback", 10_000))
        .unwrap();
    f.vault.deposit("alice", dec!(100), 5_000).unwrap();
    f.vault.rebalance(OWNER).unwrap();

    assert_eq!(
        *strategy.observed.lock(),
        vec![VaultError::Concurrency, VaultError::Concurrency]
    );
    assert!(f.vault.position("attacker").unwrap().is_none());

    // Guard released after the batch
    assert!(f.vault.deposit("bob", dec!(10), 5_000).is_ok());
}
