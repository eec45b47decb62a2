use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised at the engine call boundary.
///
/// Non-convergence is not an error; it is reported through
/// `SimulationResult::converged`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("account {account_id}: {field} must be >= 0, got {value}")]
    NegativeAccountField {
        account_id: String,
        field: &'static str,
        value: Decimal,
    },

    #[error("extra monthly payment must be >= 0, got {0}")]
    NegativeExtraPayment(Decimal),

    #[error("duplicate account id: {0}")]
    DuplicateAccountId(String),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("account {account_id}: balance left the representable range in month {month}")]
    Overflow { account_id: String, month: u32 },
}
