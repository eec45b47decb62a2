use rust_decimal::Decimal;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::config::EngineConfig;
use super::engine::{run_simulation, validate_accounts, validate_extra_payment};
use super::error::EngineError;
use super::types::{
    Account, ComparisonResult, RepaymentPolicy, SensitivityStep, SimulationResult,
};

type RunOutcome = Result<SimulationResult, EngineError>;

pub fn compare(
    accounts: &[Account],
    extra_monthly_payment: Decimal,
) -> Result<ComparisonResult, EngineError> {
    compare_with(&EngineConfig::default(), accounts, extra_monthly_payment)
}

/// Runs both policies and a minimums-only baseline, then picks the cheaper
/// policy and sweeps larger extra payments under it.
pub fn compare_with(
    config: &EngineConfig,
    accounts: &[Account],
    extra_monthly_payment: Decimal,
) -> Result<ComparisonResult, EngineError> {
    config.validate()?;
    validate_accounts(accounts)?;
    validate_extra_payment(extra_monthly_payment)?;

    let (avalanche, snowball, baseline) = run_policies(config, accounts, extra_monthly_payment);
    let avalanche = avalanche?;
    let snowball = snowball?;
    let baseline = baseline?;

    let recommended_policy = recommend(&avalanche, &snowball);
    let recommended = match recommended_policy {
        RepaymentPolicy::Avalanche => &avalanche,
        RepaymentPolicy::Snowball => &snowball,
    };
    let interest_delta = interest_delta(&baseline, recommended);
    let months_saved = baseline
        .payoff_months
        .saturating_sub(recommended.payoff_months);
    let sensitivity = run_sweep(config, accounts, recommended)?;

    info!(
        recommended = %recommended_policy,
        avalanche_interest = %avalanche.total_interest_paid,
        snowball_interest = %snowball.total_interest_paid,
        interest_delta = %interest_delta,
        "comparison complete"
    );

    Ok(ComparisonResult {
        avalanche,
        snowball,
        baseline,
        recommended_policy,
        interest_delta,
        months_saved,
        sensitivity,
    })
}

/// Converged plans beat non-convergent ones, then lower interest, then fewer
/// months. Full ties go to avalanche.
///
/// Convergence is checked first: a plan still carrying debt at the horizon
/// loses even when it reports less interest, since its interest total stops
/// at the horizon.
pub fn recommend(avalanche: &SimulationResult, snowball: &SimulationResult) -> RepaymentPolicy {
    let rank = |r: &SimulationResult| (!r.converged, r.total_interest_paid, r.payoff_months);
    if rank(snowball) < rank(avalanche) {
        RepaymentPolicy::Snowball
    } else {
        RepaymentPolicy::Avalanche
    }
}

/// What-if runs of `base`'s policy with each configured step added to its
/// extra payment.
pub fn sensitivity_sweep(
    config: &EngineConfig,
    accounts: &[Account],
    base: &SimulationResult,
) -> Result<Vec<SensitivityStep>, EngineError> {
    config.validate()?;
    validate_accounts(accounts)?;
    validate_extra_payment(base.extra_monthly_payment)?;
    run_sweep(config, accounts, base)
}

fn interest_delta(baseline: &SimulationResult, recommended: &SimulationResult) -> Decimal {
    (baseline.total_interest_paid - recommended.total_interest_paid).max(Decimal::ZERO)
}

#[cfg(feature = "parallel")]
fn run_policies(
    config: &EngineConfig,
    accounts: &[Account],
    extra_monthly_payment: Decimal,
) -> (RunOutcome, RunOutcome, RunOutcome) {
    let (avalanche, (snowball, baseline)) = rayon::join(
        || run_simulation(config, accounts, extra_monthly_payment, RepaymentPolicy::Avalanche),
        || {
            rayon::join(
                || run_simulation(config, accounts, extra_monthly_payment, RepaymentPolicy::Snowball),
                || run_simulation(config, accounts, Decimal::ZERO, RepaymentPolicy::Avalanche),
            )
        },
    );
    (avalanche, snowball, baseline)
}

#[cfg(not(feature = "parallel"))]
fn run_policies(
    config: &EngineConfig,
    accounts: &[Account],
    extra_monthly_payment: Decimal,
) -> (RunOutcome, RunOutcome, RunOutcome) {
    (
        run_simulation(config, accounts, extra_monthly_payment, RepaymentPolicy::Avalanche),
        run_simulation(config, accounts, extra_monthly_payment, RepaymentPolicy::Snowball),
        run_simulation(config, accounts, Decimal::ZERO, RepaymentPolicy::Avalanche),
    )
}

fn run_sweep(
    config: &EngineConfig,
    accounts: &[Account],
    base: &SimulationResult,
) -> Result<Vec<SensitivityStep>, EngineError> {
    let candidates = config
        .sweep_steps
        .iter()
        .map(|step| {
            base.extra_monthly_payment
                .checked_add(*step)
                .map(|extra| (*step, extra))
                .ok_or_else(|| {
                    EngineError::InvalidConfig(format!(
                        "sweep step {step} pushes the extra payment out of range"
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let evaluate = |(step, extra): &(Decimal, Decimal)| -> Result<SensitivityStep, EngineError> {
        let run = run_simulation(config, accounts, *extra, base.policy)?;
        debug!(step = %step, months = run.payoff_months, "sensitivity step evaluated");
        Ok(SensitivityStep {
            additional_payment: *step,
            extra_monthly_payment: *extra,
            payoff_months: run.payoff_months,
            converged: run.converged,
            total_interest_paid: run.total_interest_paid,
            months_saved: base.payoff_months.saturating_sub(run.payoff_months),
            interest_saved: (base.total_interest_paid - run.total_interest_paid)
                .max(Decimal::ZERO),
        })
    };

    #[cfg(feature = "parallel")]
    let steps: Result<Vec<SensitivityStep>, EngineError> =
        candidates.par_iter().map(evaluate).collect();
    #[cfg(not(feature = "parallel"))]
    let steps: Result<Vec<SensitivityStep>, EngineError> =
        candidates.iter().map(evaluate).collect();

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::simulate;
    use proptest::prelude::{prop_assert, proptest};
    use rust_decimal_macros::dec;

    fn two_card_scenario() -> Vec<Account> {
        vec![
            Account::new("A", dec!(100000), dec!(24), dec!(3000)),
            Account::new("B", dec!(20000), dec!(12), dec!(1000)),
        ]
    }

    fn result_with(
        policy: RepaymentPolicy,
        interest: Decimal,
        months: u32,
        converged: bool,
    ) -> SimulationResult {
        let mut result = SimulationResult::empty(policy, Decimal::ZERO);
        result.total_interest_paid = interest;
        result.payoff_months = months;
        result.converged = converged;
        result
    }

    #[test]
    fn recommends_avalanche_for_high_rate_large_balance() {
        let comparison = compare(&two_card_scenario(), dec!(5000)).expect("valid");

        assert_eq!(comparison.recommended_policy, RepaymentPolicy::Avalanche);
        assert!(
            comparison.avalanche.total_interest_paid <= comparison.snowball.total_interest_paid
        );
        assert_eq!(comparison.baseline.extra_monthly_payment, Decimal::ZERO);
        assert!(comparison.interest_delta > Decimal::ZERO);
        assert_eq!(
            comparison.interest_delta,
            comparison.baseline.total_interest_paid - comparison.avalanche.total_interest_paid
        );
        assert!(comparison.months_saved > 0);
        assert_eq!(comparison.recommended(), &comparison.avalanche);
    }

    #[test]
    fn policy_results_match_direct_simulation() {
        let accounts = two_card_scenario();
        let comparison = compare(&accounts, dec!(5000)).expect("valid");

        let snowball = simulate(&accounts, dec!(5000), RepaymentPolicy::Snowball).expect("valid");
        let baseline = simulate(&accounts, dec!(0), RepaymentPolicy::Avalanche).expect("valid");
        assert_eq!(comparison.snowball, snowball);
        assert_eq!(comparison.baseline, baseline);
    }

    #[test]
    fn empty_accounts_compare_to_neutral_zero_result() {
        let comparison = compare(&[], dec!(300)).expect("valid");

        assert_eq!(comparison.recommended_policy, RepaymentPolicy::Avalanche);
        assert_eq!(comparison.interest_delta, Decimal::ZERO);
        assert_eq!(comparison.months_saved, 0);
        for result in [&comparison.avalanche, &comparison.snowball, &comparison.baseline] {
            assert_eq!(result.payoff_months, 0);
            assert!(result.monthly_trajectory.is_empty());
        }
        assert_eq!(comparison.sensitivity.len(), 3);
        assert!(
            comparison
                .sensitivity
                .iter()
                .all(|s| s.payoff_months == 0 && s.months_saved == 0)
        );
    }

    #[test]
    fn recommend_prefers_lower_interest() {
        let avalanche = result_with(RepaymentPolicy::Avalanche, dec!(900), 10, true);
        let snowball = result_with(RepaymentPolicy::Snowball, dec!(850), 12, true);
        assert_eq!(recommend(&avalanche, &snowball), RepaymentPolicy::Snowball);
    }

    #[test]
    fn recommend_breaks_interest_ties_on_months_then_avalanche() {
        let avalanche = result_with(RepaymentPolicy::Avalanche, dec!(500), 14, true);
        let snowball = result_with(RepaymentPolicy::Snowball, dec!(500.00), 13, true);
        assert_eq!(recommend(&avalanche, &snowball), RepaymentPolicy::Snowball);

        let snowball = result_with(RepaymentPolicy::Snowball, dec!(500), 14, true);
        assert_eq!(recommend(&avalanche, &snowball), RepaymentPolicy::Avalanche);
        assert_eq!(recommend(&snowball, &avalanche), RepaymentPolicy::Avalanche);
    }

    #[test]
    fn recommend_never_picks_a_plan_that_does_not_pay_off() {
        let avalanche = result_with(RepaymentPolicy::Avalanche, dec!(9000), 80, true);
        let snowball = result_with(RepaymentPolicy::Snowball, dec!(100), 600, false);
        assert_eq!(recommend(&avalanche, &snowball), RepaymentPolicy::Avalanche);

        let avalanche = result_with(RepaymentPolicy::Avalanche, dec!(100), 600, false);
        let snowball = result_with(RepaymentPolicy::Snowball, dec!(9000), 80, true);
        assert_eq!(recommend(&avalanche, &snowball), RepaymentPolicy::Snowball);
    }

    #[test]
    fn interest_delta_is_clamped_at_zero() {
        let baseline = result_with(RepaymentPolicy::Avalanche, dec!(99.99), 20, true);
        let recommended = result_with(RepaymentPolicy::Snowball, dec!(100), 18, true);
        assert_eq!(interest_delta(&baseline, &recommended), Decimal::ZERO);
        assert_eq!(interest_delta(&recommended, &baseline), dec!(0.01));
    }

    #[test]
    fn sensitivity_sweep_reports_months_saved_per_step() {
        let comparison = compare(&two_card_scenario(), dec!(5000)).expect("valid");
        let recommended = comparison.recommended();

        let steps: Vec<_> = comparison
            .sensitivity
            .iter()
            .map(|s| s.additional_payment)
            .collect();
        assert_eq!(steps, vec![dec!(100), dec!(250), dec!(500)]);

        let mut previous_months = recommended.payoff_months;
        for step in &comparison.sensitivity {
            assert_eq!(step.extra_monthly_payment, dec!(5000) + step.additional_payment);
            assert!(step.payoff_months <= previous_months);
            assert_eq!(
                step.months_saved,
                recommended.payoff_months - step.payoff_months
            );
            assert!(step.total_interest_paid < recommended.total_interest_paid);
            previous_months = step.payoff_months;
        }
    }

    #[test]
    fn sensitivity_sweep_uses_configured_steps() {
        let accounts = two_card_scenario();
        let config = EngineConfig::default().with_sweep_steps(vec![dec!(1000), dec!(5000)]);
        let base = simulate(&accounts, dec!(0), RepaymentPolicy::Snowball).expect("valid");

        let steps = sensitivity_sweep(&config, &accounts, &base).expect("valid");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].extra_monthly_payment, dec!(5000));
        assert!(steps[1].months_saved >= steps[0].months_saved);
        assert!(steps[0].months_saved > 0);
    }

    #[test]
    fn compare_fails_fast_on_invalid_input() {
        let err = compare(&two_card_scenario(), dec!(-1)).expect_err("negative extra");
        assert_eq!(err, EngineError::NegativeExtraPayment(dec!(-1)));

        let accounts = vec![Account::new("A", dec!(100), dec!(-3), dec!(10))];
        let err = compare(&accounts, dec!(0)).expect_err("negative rate");
        assert!(err.to_string().contains("annualInterestRatePercent"));
    }

    #[test]
    fn compare_is_deterministic_and_leaves_inputs_alone() {
        let accounts = two_card_scenario();
        let before = accounts.clone();

        let first = compare(&accounts, dec!(750)).expect("valid");
        let second = compare(&accounts, dec!(750)).expect("valid");

        assert_eq!(first, second);
        assert_eq!(accounts, before);
    }

    #[test]
    fn non_convergent_baseline_is_surfaced() {
        let accounts = vec![Account::new("card", dec!(10000), dec!(24), dec!(150))];
        let comparison = compare(&accounts, dec!(400)).expect("valid");

        assert!(!comparison.baseline.converged);
        assert_eq!(comparison.baseline.payoff_months, 600);
        assert!(comparison.recommended().converged);
        assert!(comparison.months_saved > 0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_recommended_policy_is_never_more_expensive(
            balances in proptest::collection::vec(1u32..3_000_000, 1..4),
            rates in proptest::collection::vec(0u32..3_000, 4),
            extra in 0u32..60_000,
        ) {
            let accounts: Vec<Account> = balances
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    let balance = Decimal::new(i64::from(*b), 2);
                    Account::new(
                        format!("d{i}"),
                        balance,
                        Decimal::new(i64::from(rates[i]), 2),
                        (balance * dec!(0.03)).round_dp(2),
                    )
                })
                .collect();
            let comparison = compare(&accounts, Decimal::new(i64::from(extra), 2)).expect("valid");
            let recommended = comparison.recommended();
            let other = match comparison.recommended_policy {
                RepaymentPolicy::Avalanche => &comparison.snowball,
                RepaymentPolicy::Snowball => &comparison.avalanche,
            };
            if recommended.converged == other.converged {
                prop_assert!(recommended.total_interest_paid <= other.total_interest_paid);
            } else {
                prop_assert!(recommended.converged);
            }
            prop_assert!(comparison.interest_delta >= Decimal::ZERO);
        }
    }
}
