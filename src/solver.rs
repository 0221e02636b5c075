//! The solve loop (C13): inverts `Input::solve_type` against `Input::solve_target` by running
//! `MonthlyEngine` repeatedly with a bracketed root finder, the way `AccountValue::Solve`/
//! `SolveTest` drive `ihs_avsolve.cpp`'s search loop over a single scalar candidate value.
//!
//! Four of the five solvable quantities (specified amount, employee premium, employer premium,
//! withdrawal, loan) all reduce to "find the scalar `x` such that running the cell with `x`
//! substituted for that quantity across `[solve_begin_year, solve_end_year)` makes the chosen
//! target condition hold at `solve_target_year`" -- a continuous root-find. The fifth,
//! avoiding MEC status, is a monotone boolean predicate rather than a continuous function; it's
//! solved with the same bracketing machinery by mapping "is a MEC" to a signed residual.

use crate::account_value::{Basis, MonthlyEngine};
use crate::currency::Currency;
use crate::error::LmiError;
use crate::input::{Input, SolveTarget, SolveType};
use crate::ledger::{LedgerInvariant, LedgerVariant};
use crate::tables::product::ProductDatabase;
use std::sync::Arc;

const MAX_BRACKET_EXPANSIONS: u32 = 40;
const MAX_BRENT_ITERATIONS: u32 = 100;
const TOLERANCE: f64 = 0.005;

fn initial_upper_bound(solve_type: SolveType) -> f64 {
    match solve_type {
        SolveType::SpecAmt => 100_000_000.0,
        SolveType::EePrem | SolveType::ErPrem => 10_000_000.0,
        SolveType::Loan | SolveType::Wd => 10_000_000.0,
    }
}

/// Expand `[lo, hi]` by doubling `hi` until `f(lo)` and `f(hi)` have opposite signs, or give up.
fn bracket(f: &mut impl FnMut(f64) -> Result<f64, LmiError>, mut lo: f64, mut hi: f64) -> Result<(f64, f64, f64, f64), LmiError> {
    let mut f_lo = f(lo)?;
    let mut f_hi = f(hi)?;
    let mut expansions = 0;
    while f_lo.signum() == f_hi.signum() && f_lo != 0.0 && f_hi != 0.0 {
        if expansions >= MAX_BRACKET_EXPANSIONS {
            return Err(LmiError::Convergence(
                "solver could not bracket a root: objective has the same sign across the whole search range".into(),
            ));
        }
        lo = hi;
        f_lo = f_hi;
        hi *= 2.0;
        f_hi = f(hi)?;
        expansions += 1;
    }
    Ok((lo, f_lo, hi, f_hi))
}

/// Brent's method: combine bisection's guaranteed convergence with the faster superlinear
/// convergence of inverse quadratic/secant steps, falling back to bisection whenever a fast
/// step would leave the bracket or fails to make adequate progress.
fn brent(mut f: impl FnMut(f64) -> Result<f64, LmiError>, lo: f64, hi: f64) -> Result<f64, LmiError> {
    let (mut a, mut fa, mut b, mut fb) = bracket(&mut f, lo, hi)?;
    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut c = a;
    let mut fc = fa;
    let mut mflag = true;
    let mut d = a;

    for _ in 0..MAX_BRENT_ITERATIONS {
        if fb.abs() < TOLERANCE || (b - a).abs() < TOLERANCE {
            return Ok(b);
        }

        let s = if fa != fc && fb != fc {
            // Inverse quadratic interpolation.
            a * fb * fc / ((fa - fb) * (fa - fc))
                + b * fa * fc / ((fb - fa) * (fb - fc))
                + c * fa * fb / ((fc - fa) * (fc - fb))
        } else {
            // Secant step.
            b - fb * (b - a) / (fb - fa)
        };

        let bisection_midpoint = (a + b) / 2.0;
        let needs_bisection = !((3.0 * a + b) / 4.0 < s && s < b || (3.0 * a + b) / 4.0 > s && s > b)
            || (mflag && (s - b).abs() >= (b - c).abs() / 2.0)
            || (!mflag && (s - b).abs() >= (c - d).abs() / 2.0)
            || (mflag && (b - c).abs() < TOLERANCE)
            || (!mflag && (c - d).abs() < TOLERANCE);

        let s = if needs_bisection {
            mflag = true;
            bisection_midpoint
        } else {
            mflag = false;
            s
        };

        let fs = f(s)?;
        d = c;
        c = b;
        fc = fb;
        if fa.signum() != fs.signum() {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }
        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
        let _ = d;
    }
    Err(LmiError::Convergence(format!(
        "solver did not converge within {MAX_BRENT_ITERATIONS} iterations (last residual {fb})"
    )))
}

/// Run the objective once for a candidate scalar value: build a fresh engine (a solve never
/// reuses a prior iteration's mutated outlay state), install the override -- which also
/// suppresses the lapse transition in `MonthlyEngine::run` for the duration of this
/// iteration -- project, and reduce to a signed residual for [`brent`].
///
/// The target-year CSV is replaced by `worst_negative` (the more negative of the solve range's
/// lowest CSV and its highest loan/withdrawal ullage, negated) whenever that's below zero, so a
/// candidate that would have lapsed or run short of collateral anywhere in the solve range is
/// penalized instead of read as a flat, lapsed-and-zeroed plateau.
fn objective(
    input: &Input,
    db: &Arc<ProductDatabase>,
    basis: Basis,
    solve_begin_year: usize,
    solve_end_year: usize,
    target_year: usize,
    target: SolveTarget,
    target_csv: Currency,
    candidate: f64,
) -> Result<f64, LmiError> {
    let value = Currency::from_fraction(candidate).unwrap_or(Currency::ZERO);
    let mut engine = MonthlyEngine::new(input, db.clone(), basis)?;
    engine.set_override(value);
    let (inv, var) = engine.run()?;

    let last_year = var.years().saturating_sub(1);
    let solve_years = solve_begin_year.min(last_year)..=solve_end_year.saturating_sub(1).min(last_year);

    let most_negative_csv = solve_years.clone().map(|y| var.csv[y]).min().unwrap_or(Currency::ZERO);
    let greatest_ullage = solve_years
        .map(|y| var.loan_ullage[y].max(var.withdrawal_ullage[y]))
        .max()
        .unwrap_or(Currency::ZERO);
    let worst_negative = most_negative_csv.min(-greatest_ullage);

    let year = target_year.min(last_year);
    let value_at_target = if worst_negative < Currency::ZERO { worst_negative } else { var.csv[year] };

    Ok(match target {
        SolveTarget::Endowment => (value_at_target - inv.specamt[year]).value(),
        SolveTarget::ScalarCsv => (value_at_target - target_csv).value(),
        SolveTarget::TaxBasis => (value_at_target - inv.tax_basis[year]).value(),
        SolveTarget::NonMec => {
            if inv.is_mec {
                1.0
            } else {
                -1.0
            }
        }
    })
}

/// Solve one cell (C13): invert `input.solve_type` so that `input.solve_target` holds at
/// `input.solve_target_year`, and return the solved value alongside the ledgers from the
/// winning candidate's final run.
pub fn solve_cell(
    input: &Input,
    db: Arc<ProductDatabase>,
    basis: Basis,
) -> Result<(Currency, LedgerInvariant, LedgerVariant), LmiError> {
    let solve = input.solve();
    let solve_type = solve
        .solve_type
        .ok_or_else(|| LmiError::Configuration("solve_cell called on a cell with no solve_type".into()))?;

    let root = brent(
        |candidate| {
            objective(
                input,
                &db,
                basis,
                solve.begin_year,
                solve.end_year,
                solve.target_year,
                solve.target,
                solve.target_csv,
                candidate,
            )
        },
        0.0,
        initial_upper_bound(solve_type),
    )?;

    let value = Currency::from_fraction(root).unwrap_or(Currency::ZERO);
    let mut engine = MonthlyEngine::new(input, db, basis)?;
    engine.set_override(value);
    let (inv, var) = engine.run()?;
    Ok((value, inv, var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{GenBasis, SepBasis};
    use crate::calendar::CalendarDate;
    use crate::death_benefit::DeathBenefitOption;
    use crate::input::{PaymentStrategy, SpecAmtStrategy, Sex, UnderwritingClass};
    use crate::outlay::Mode;
    use crate::tables::state::State;
    use crate::tax_qualification::DefinitionOfLifeInsurance;

    fn sample_input() -> Input {
        Input {
            issue_age: 45,
            sex: Sex::Male,
            underwriting_class: UnderwritingClass::Standard,
            tax_state: State::CA,
            domicile: State::CA,
            birthdate: CalendarDate::from_ymd(1980, 1, 1).unwrap(),
            effective_date: CalendarDate::from_ymd(2025, 1, 1).unwrap(),
            inforce_as_of_date: None,
            years_to_maturity: 20,
            initial_specamt: Currency::from_fraction(500_000.0).unwrap(),
            initial_death_benefit_option: DeathBenefitOption::Level,
            specamt_strategy: SpecAmtStrategy::InputScalar,
            salary: Currency::ZERO,
            salary_multiplier: 0.0,
            salary_offset: Currency::ZERO,
            payment_strategy: PaymentStrategy::InputScalar,
            payment_mode: Mode::Annual,
            initial_employee_premium: Currency::ZERO,
            initial_employer_premium: Currency::ZERO,
            payment_table_multiplier: 1.0,
            withdrawal_begin_year: 1000,
            annual_withdrawal: Currency::ZERO,
            loan_begin_year: 1000,
            annual_loan: Currency::ZERO,
            loan_is_preferred: false,
            rider_adb: false,
            rider_waiver_of_premium: false,
            rider_children_term: false,
            rider_spouse_term: false,
            definition_of_life_insurance: DefinitionOfLifeInsurance::Cvat,
            avoid_mec: false,
            general_basis: GenBasis::Current,
            separate_basis: SepBasis::Zero,
            separate_account_allocation: 0.0,
            solve_type: Some(SolveType::EePrem),
            solve_begin_year: 0,
            solve_end_year: 20,
            solve_target: SolveTarget::ScalarCsv,
            solve_target_year: 19,
            solve_target_csv: Currency::from_fraction(200_000.0).unwrap(),
        }
    }

    #[test]
    fn solved_premium_hits_the_target_csv_within_tolerance() {
        let input = sample_input();
        let db = Arc::new(ProductDatabase::sample(input.years_to_maturity));
        let basis = Basis { gen: GenBasis::Current, sep: SepBasis::Zero };
        let (_premium, _inv, var) = solve_cell(&input, db, basis).unwrap();
        let achieved = var.csv[19].value();
        assert!((achieved - 200_000.0).abs() < 50.0);
    }

    #[test]
    fn solved_premium_is_positive_for_a_positive_target() {
        let input = sample_input();
        let db = Arc::new(ProductDatabase::sample(input.years_to_maturity));
        let basis = Basis { gen: GenBasis::Current, sep: SepBasis::Zero };
        let (premium, _inv, _var) = solve_cell(&input, db, basis).unwrap();
        assert!(premium > Currency::ZERO);
    }

    #[test]
    fn unset_solve_type_is_rejected() {
        let mut input = sample_input();
        input.solve_type = None;
        let db = Arc::new(ProductDatabase::sample(input.years_to_maturity));
        let basis = Basis { gen: GenBasis::Current, sep: SepBasis::Zero };
        assert!(solve_cell(&input, db, basis).is_err());
    }
}
