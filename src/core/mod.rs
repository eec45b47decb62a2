mod compare;
mod config;
mod engine;
mod error;
mod types;

pub use compare::{compare, compare_with, recommend, sensitivity_sweep};
pub use config::{
    DEFAULT_HORIZON_MONTHS, DEFAULT_MONEY_SCALE, DEFAULT_PAYOFF_EPSILON, DEFAULT_SWEEP_STEPS,
    EngineConfig, MAX_HORIZON_MONTHS,
};
pub use engine::{simulate, simulate_with, validate_accounts, validate_extra_payment};
pub use error::EngineError;
pub use types::{
    Account, AccountPayoff, ComparisonResult, RepaymentPolicy, SensitivityStep,
    SimulationResult, TrajectoryPoint,
};
