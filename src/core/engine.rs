use std::cmp::Ordering;
use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::types::{Account, AccountPayoff, RepaymentPolicy, SimulationResult, TrajectoryPoint};

/// Percent to fraction, then annual to monthly.
const MONTHLY_RATE_DIVISOR: Decimal = dec!(1200);

#[derive(Debug, Clone)]
struct DebtState {
    id: String,
    name: String,
    balance: Decimal,
    annual_rate_percent: Decimal,
    minimum_payment: Decimal,
    cleared_in: Option<u32>,
}

impl DebtState {
    fn from_account(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            name: account.display_name().to_owned(),
            balance: account.balance,
            annual_rate_percent: account.annual_interest_rate_percent,
            minimum_payment: account.minimum_payment,
            cleared_in: None,
        }
    }

    fn is_active(&self) -> bool {
        self.balance > Decimal::ZERO
    }

    fn overflow(&self, month: u32) -> EngineError {
        EngineError::Overflow {
            account_id: self.id.clone(),
            month,
        }
    }
}

#[derive(Debug, Default)]
struct RunTotals {
    interest: Decimal,
    paid: Decimal,
}

pub fn simulate(
    accounts: &[Account],
    extra_monthly_payment: Decimal,
    policy: RepaymentPolicy,
) -> Result<SimulationResult, EngineError> {
    simulate_with(
        &EngineConfig::default(),
        accounts,
        extra_monthly_payment,
        policy,
    )
}

pub fn simulate_with(
    config: &EngineConfig,
    accounts: &[Account],
    extra_monthly_payment: Decimal,
    policy: RepaymentPolicy,
) -> Result<SimulationResult, EngineError> {
    config.validate()?;
    validate_accounts(accounts)?;
    validate_extra_payment(extra_monthly_payment)?;
    run_simulation(config, accounts, extra_monthly_payment, policy)
}

pub fn validate_accounts(accounts: &[Account]) -> Result<(), EngineError> {
    let mut seen = HashSet::with_capacity(accounts.len());
    for account in accounts {
        for (field, value) in [
            ("balance", account.balance),
            ("annualInterestRatePercent", account.annual_interest_rate_percent),
            ("minimumPayment", account.minimum_payment),
        ] {
            if value < Decimal::ZERO {
                return Err(EngineError::NegativeAccountField {
                    account_id: account.id.clone(),
                    field,
                    value,
                });
            }
        }

        if !seen.insert(account.id.as_str()) {
            return Err(EngineError::DuplicateAccountId(account.id.clone()));
        }
    }
    Ok(())
}

pub fn validate_extra_payment(extra_monthly_payment: Decimal) -> Result<(), EngineError> {
    if extra_monthly_payment < Decimal::ZERO {
        return Err(EngineError::NegativeExtraPayment(extra_monthly_payment));
    }
    Ok(())
}

/// Runs one amortization without re-validating; callers must have checked
/// `config`, `accounts` and the extra payment already.
pub(crate) fn run_simulation(
    config: &EngineConfig,
    accounts: &[Account],
    extra_monthly_payment: Decimal,
    policy: RepaymentPolicy,
) -> Result<SimulationResult, EngineError> {
    let mut debts = ordered_debts(accounts, policy);
    if debts.is_empty() {
        return Ok(SimulationResult::empty(policy, extra_monthly_payment));
    }

    let starting_balance = aggregate_balance(&debts, 0)?;
    let mut remaining = starting_balance;
    let mut totals = RunTotals::default();
    let mut trajectory = Vec::new();
    let mut payoff_order = Vec::new();
    let mut month = 0;
    // Sub-epsilon balances count as cleared before the first statement.
    record_cleared(&mut debts, config.payoff_epsilon, month, &mut payoff_order);

    while remaining > config.payoff_epsilon && month < config.horizon_months {
        month += 1;

        let interest = accrue_interest(&mut debts, config.money_scale, month)?;
        let paid = apply_payments(&mut debts, extra_monthly_payment, month)?;
        totals.interest = checked_sum(totals.interest, interest, &debts, month)?;
        totals.paid = checked_sum(totals.paid, paid, &debts, month)?;

        remaining = aggregate_balance(&debts, month)?;
        record_cleared(&mut debts, config.payoff_epsilon, month, &mut payoff_order);

        trajectory.push(TrajectoryPoint {
            month,
            remaining_balance: remaining,
        });
    }

    let converged = remaining <= config.payoff_epsilon;
    if converged {
        debug!(
            %policy,
            months = month,
            interest = %totals.interest,
            "simulation paid off all accounts"
        );
    } else {
        warn!(
            %policy,
            horizon = config.horizon_months,
            remaining = %remaining,
            "simulation reached the safety horizon with debt outstanding"
        );
    }

    Ok(SimulationResult {
        policy,
        extra_monthly_payment,
        payoff_months: month,
        converged,
        total_interest_paid: totals.interest,
        total_paid: totals.paid,
        starting_balance,
        final_balance: remaining,
        monthly_trajectory: trajectory,
        payoff_order,
    })
}

fn record_cleared(
    debts: &mut [DebtState],
    payoff_epsilon: Decimal,
    month: u32,
    payoff_order: &mut Vec<AccountPayoff>,
) {
    for debt in debts.iter_mut() {
        if debt.cleared_in.is_none() && debt.balance <= payoff_epsilon {
            debt.cleared_in = Some(month);
            payoff_order.push(AccountPayoff {
                id: debt.id.clone(),
                name: debt.name.clone(),
                month,
            });
        }
    }
}

fn ordered_debts(accounts: &[Account], policy: RepaymentPolicy) -> Vec<DebtState> {
    let mut debts: Vec<DebtState> = accounts
        .iter()
        .filter(|a| a.balance > Decimal::ZERO)
        .map(DebtState::from_account)
        .collect();
    // Stable: accounts tied on both keys keep the caller's order.
    debts.sort_by(|a, b| policy_order(policy, a, b));
    debts
}

fn policy_order(policy: RepaymentPolicy, a: &DebtState, b: &DebtState) -> Ordering {
    match policy {
        RepaymentPolicy::Avalanche => b
            .annual_rate_percent
            .cmp(&a.annual_rate_percent)
            .then_with(|| b.balance.cmp(&a.balance)),
        RepaymentPolicy::Snowball => a
            .balance
            .cmp(&b.balance)
            .then_with(|| b.annual_rate_percent.cmp(&a.annual_rate_percent)),
    }
}

fn accrue_interest(
    debts: &mut [DebtState],
    money_scale: u32,
    month: u32,
) -> Result<Decimal, EngineError> {
    let mut accrued = Decimal::ZERO;
    for debt in debts.iter_mut().filter(|d| d.is_active()) {
        let interest = debt
            .balance
            .checked_mul(debt.annual_rate_percent)
            .and_then(|v| v.checked_div(MONTHLY_RATE_DIVISOR))
            .map(|v| v.round_dp(money_scale))
            .ok_or_else(|| debt.overflow(month))?;
        debt.balance = debt
            .balance
            .checked_add(interest)
            .ok_or_else(|| debt.overflow(month))?;
        accrued = accrued
            .checked_add(interest)
            .ok_or_else(|| debt.overflow(month))?;
    }
    Ok(accrued)
}

/// Pays every active account its own minimum, then cascades what is left of
/// the pool through the accounts in policy order. Returns the amount applied.
fn apply_payments(
    debts: &mut [DebtState],
    extra_monthly_payment: Decimal,
    month: u32,
) -> Result<Decimal, EngineError> {
    let mut pool = extra_monthly_payment;
    for debt in debts.iter().filter(|d| d.is_active()) {
        pool = pool
            .checked_add(debt.minimum_payment)
            .ok_or_else(|| debt.overflow(month))?;
    }

    let mut applied = Decimal::ZERO;
    for debt in debts.iter_mut().filter(|d| d.is_active()) {
        let payment = debt.minimum_payment.min(debt.balance);
        debt.balance -= payment;
        pool -= payment;
        applied += payment;
    }

    for debt in debts.iter_mut() {
        if pool <= Decimal::ZERO {
            break;
        }
        let payment = pool.min(debt.balance);
        debt.balance -= payment;
        pool -= payment;
        applied += payment;
    }

    Ok(applied)
}

fn aggregate_balance(debts: &[DebtState], month: u32) -> Result<Decimal, EngineError> {
    debts.iter().try_fold(Decimal::ZERO, |total, debt| {
        total
            .checked_add(debt.balance)
            .ok_or_else(|| debt.overflow(month))
    })
}

fn checked_sum(
    total: Decimal,
    amount: Decimal,
    debts: &[DebtState],
    month: u32,
) -> Result<Decimal, EngineError> {
    total.checked_add(amount).ok_or_else(|| EngineError::Overflow {
        account_id: debts.first().map(|d| d.id.clone()).unwrap_or_default(),
        month,
    })
}
