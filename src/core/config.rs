use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::EngineError;

/// Fifty years of monthly statements.
pub const DEFAULT_HORIZON_MONTHS: u32 = 600;
pub const MAX_HORIZON_MONTHS: u32 = 1_200;
/// Balances at or below half a cent count as cleared.
pub const DEFAULT_PAYOFF_EPSILON: Decimal = dec!(0.005);
/// Interest is rounded to cents.
pub const DEFAULT_MONEY_SCALE: u32 = 2;
pub const DEFAULT_SWEEP_STEPS: [Decimal; 3] = [dec!(100), dec!(250), dec!(500)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub horizon_months: u32,
    pub payoff_epsilon: Decimal,
    pub money_scale: u32,
    /// Additional monthly amounts tried on top of the caller's extra payment.
    pub sweep_steps: Vec<Decimal>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon_months: DEFAULT_HORIZON_MONTHS,
            payoff_epsilon: DEFAULT_PAYOFF_EPSILON,
            money_scale: DEFAULT_MONEY_SCALE,
            sweep_steps: DEFAULT_SWEEP_STEPS.to_vec(),
        }
    }
}

impl EngineConfig {
    pub fn with_horizon_months(mut self, horizon_months: u32) -> Self {
        self.horizon_months = horizon_months;
        self
    }

    pub fn with_sweep_steps(mut self, sweep_steps: Vec<Decimal>) -> Self {
        self.sweep_steps = sweep_steps;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.horizon_months == 0 || self.horizon_months > MAX_HORIZON_MONTHS {
            return Err(EngineError::InvalidConfig(format!(
                "horizon months must be between 1 and {MAX_HORIZON_MONTHS}, got {}",
                self.horizon_months
            )));
        }

        if self.payoff_epsilon.is_sign_negative() {
            return Err(EngineError::InvalidConfig(format!(
                "payoff epsilon must be >= 0, got {}",
                self.payoff_epsilon
            )));
        }

        if self.money_scale > 10 {
            return Err(EngineError::InvalidConfig(format!(
                "money scale must be <= 10, got {}",
                self.money_scale
            )));
        }

        let mut previous = Decimal::ZERO;
        for step in &self.sweep_steps {
            if *step <= previous {
                return Err(EngineError::InvalidConfig(
                    "sweep steps must be positive and strictly increasing".to_string(),
                ));
            }
            previous = *step;
        }

        Ok(())
    }
}
