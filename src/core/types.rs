use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepaymentPolicy {
    /// Highest annual rate first.
    #[default]
    #[serde(alias = "Avalanche", alias = "highest-interest")]
    Avalanche,
    /// Smallest balance first.
    #[serde(alias = "Snowball", alias = "smallest-balance")]
    Snowball,
}

impl RepaymentPolicy {
    pub const ALL: [RepaymentPolicy; 2] = [RepaymentPolicy::Avalanche, RepaymentPolicy::Snowball];

    pub fn as_str(self) -> &'static str {
        match self {
            RepaymentPolicy::Avalanche => "avalanche",
            RepaymentPolicy::Snowball => "snowball",
        }
    }
}

impl fmt::Display for RepaymentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller-owned liability. The engine only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub balance: Decimal,
    #[serde(alias = "annualRate", alias = "ratePercent")]
    pub annual_interest_rate_percent: Decimal,
    #[serde(alias = "minimum")]
    pub minimum_payment: Decimal,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        balance: Decimal,
        annual_interest_rate_percent: Decimal,
        minimum_payment: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            balance,
            annual_interest_rate_percent,
            minimum_payment,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The label shown in reports: `name`, or `id` when no name was given.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryPoint {
    pub month: u32,
    pub remaining_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPayoff {
    pub id: String,
    pub name: String,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    #[serde(rename = "policyName")]
    pub policy: RepaymentPolicy,
    pub extra_monthly_payment: Decimal,
    pub payoff_months: u32,
    /// `false` when the safety horizon was reached with debt still owed.
    pub converged: bool,
    pub total_interest_paid: Decimal,
    pub total_paid: Decimal,
    pub starting_balance: Decimal,
    pub final_balance: Decimal,
    pub monthly_trajectory: Vec<TrajectoryPoint>,
    pub payoff_order: Vec<AccountPayoff>,
}

impl SimulationResult {
    pub(crate) fn empty(policy: RepaymentPolicy, extra_monthly_payment: Decimal) -> Self {
        Self {
            policy,
            extra_monthly_payment,
            payoff_months: 0,
            converged: true,
            total_interest_paid: Decimal::ZERO,
            total_paid: Decimal::ZERO,
            starting_balance: Decimal::ZERO,
            final_balance: Decimal::ZERO,
            monthly_trajectory: Vec::new(),
            payoff_order: Vec::new(),
        }
    }

    pub fn month_cleared(&self, account_id: &str) -> Option<u32> {
        self.payoff_order
            .iter()
            .find(|p| p.id == account_id)
            .map(|p| p.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityStep {
    pub additional_payment: Decimal,
    pub extra_monthly_payment: Decimal,
    pub payoff_months: u32,
    pub converged: bool,
    pub total_interest_paid: Decimal,
    pub months_saved: u32,
    pub interest_saved: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub avalanche: SimulationResult,
    pub snowball: SimulationResult,
    /// Minimums only, no extra payment.
    pub baseline: SimulationResult,
    pub recommended_policy: RepaymentPolicy,
    pub interest_delta: Decimal,
    pub months_saved: u32,
    pub sensitivity: Vec<SensitivityStep>,
}

impl ComparisonResult {
    pub fn result_for(&self, policy: RepaymentPolicy) -> &SimulationResult {
        match policy {
            RepaymentPolicy::Avalanche => &self.avalanche,
            RepaymentPolicy::Snowball => &self.snowball,
        }
    }

    pub fn recommended(&self) -> &SimulationResult {
        self.result_for(self.recommended_policy)
    }
}
