//! Census driver (C14): runs every cell in a block through [`crate::account_value`] or
//! [`crate::solver`] and reduces the results into one composite ledger pair, the way
//! `bin/run_block.rs`'s `par_iter().map().collect()` plus month-indexed aggregation turns many
//! single-policy `CashflowRow` vectors into one `AggregatedRow` series.
//!
//! Two execution modes:
//! - [`run_census_serial`]: one cell after another, in input order. Simplest to reason about;
//!   the mode the teacher's own `load_default_inforce`-then-loop style favors for a single
//!   policy spot check.
//! - [`run_census_parallel`]: every cell's projection runs independently on the rayon thread
//!   pool, twice. The first pass uses each basis's static separate-account rate to estimate
//!   the block's total separate-account assets by policy year; those totals feed
//!   `MAndESchedule::dynamic_rate` to derive one asset-tiered monthly net rate per year, which
//!   the second (authoritative) pass installs into every cell via
//!   `MonthlyEngine::set_dynamic_separate_account_rates`. This two-pass estimate-then-finalize
//!   scheme stands in for a true month-by-month barrier (recomputing the tiered rate after
//!   every single month rather than once per year): `MonthlyEngine::run` projects a whole cell
//!   in one call, so synchronizing at every monthiversary across the whole block would require
//!   turning it into a resumable state machine. Annual granularity is close enough for a tiered
//!   schedule whose bands span millions of dollars of assets; a cell solving for a scalar
//!   (C13) is run once, against the static schedule only -- combining the solver's own
//!   candidate-value iteration with a second, block-wide re-pricing pass is out of scope here.

use crate::account_value::{Basis, MonthlyEngine};
use crate::basis::GenBasis;
use crate::currency::Currency;
use crate::error::LmiError;
use crate::input::Input;
use crate::ledger::{LedgerInvariant, LedgerVariant};
use crate::solver;
use crate::tables::product::ProductDatabase;
use rayon::prelude::*;
use std::sync::Arc;

/// One cell's outcome: its position in the input census, the solved value if it was a solve
/// cell (`None` for a plain illustration), and its ledger pair.
pub struct CellOutcome {
    pub cell_index: usize,
    pub solved_value: Option<Currency>,
    pub invariant: LedgerInvariant,
    pub variant: LedgerVariant,
}

/// The full census result: every cell's own outcome, plus the block-wide composite produced by
/// folding each cell's ledgers together with [`LedgerInvariant::plus_eq`]/
/// [`LedgerVariant::plus_eq`].
pub struct CensusResult {
    pub cells: Vec<CellOutcome>,
    pub composite_invariant: LedgerInvariant,
    pub composite_variant: LedgerVariant,
}

fn run_one_cell(
    cell_index: usize,
    input: &Input,
    db: &Arc<ProductDatabase>,
    basis: Basis,
    dynamic_sep_rates: Option<&[f64]>,
) -> Result<CellOutcome, LmiError> {
    if input.solve().solve_type.is_some() {
        let (value, invariant, variant) = solver::solve_cell(input, db.clone(), basis)?;
        return Ok(CellOutcome { cell_index, solved_value: Some(value), invariant, variant });
    }
    let mut engine = MonthlyEngine::new(input, db.clone(), basis)?;
    if let Some(rates) = dynamic_sep_rates {
        engine.set_dynamic_separate_account_rates(rates.to_vec());
    }
    let (invariant, variant) = engine.run()?;
    Ok(CellOutcome { cell_index, solved_value: None, invariant, variant })
}

fn compose(outcomes: Vec<CellOutcome>) -> CensusResult {
    let years = outcomes.iter().map(|o| o.invariant.years()).max().unwrap_or(0);
    let basis = outcomes.first().map(|o| o.variant.basis).unwrap_or(GenBasis::Current);
    let mut composite_invariant = LedgerInvariant::new(years, 0, 0);
    let mut composite_variant = LedgerVariant::new(years, basis);
    for outcome in &outcomes {
        composite_invariant.plus_eq(&outcome.invariant);
        composite_variant.plus_eq(&outcome.variant);
    }
    CensusResult { cells: outcomes, composite_invariant, composite_variant }
}

/// Run every cell in input order, one at a time.
pub fn run_census_serial(cells: &[Input], db: Arc<ProductDatabase>, basis: Basis) -> Result<CensusResult, LmiError> {
    let mut outcomes = Vec::with_capacity(cells.len());
    for (index, input) in cells.iter().enumerate() {
        outcomes.push(run_one_cell(index, input, &db, basis, None)?);
    }
    Ok(compose(outcomes))
}

/// Run every cell on the rayon thread pool, re-pricing the separate account's M&E charge from
/// the block's own total assets (see the module doc's two-pass description).
pub fn run_census_parallel(cells: &[Input], db: Arc<ProductDatabase>, basis: Basis) -> Result<CensusResult, LmiError> {
    let estimate: Vec<CellOutcome> = cells
        .par_iter()
        .enumerate()
        .map(|(index, input)| run_one_cell(index, input, &db, basis, None))
        .collect::<Result<Vec<_>, _>>()?;

    let years = estimate.iter().map(|o| o.invariant.years()).max().unwrap_or(0);
    let mut case_assets_by_year = vec![0.0; years];
    for outcome in &estimate {
        for (year, av_sep) in outcome.variant.av_sep.iter().enumerate() {
            case_assets_by_year[year] += av_sep.value();
        }
    }
    let dynamic_rates: Vec<f64> = case_assets_by_year
        .iter()
        .map(|&assets| db.m_and_e_schedule.dynamic_rate(assets, db.round_rate()).monthly_net_rate)
        .collect();

    let outcomes: Vec<CellOutcome> = cells
        .par_iter()
        .enumerate()
        .map(|(index, input)| run_one_cell(index, input, &db, basis, Some(&dynamic_rates)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(compose(outcomes))
}

/// Which cells in `cells` have already reached their inforce-valuation date as of
/// `(year, month)` into the block's shared timeline -- the month-by-month driver's
/// `PrecedesInforceDuration` filter, for a caller staging new-business cells into a growing
/// in-force block rather than running every cell over its own full lifetime at once.
pub fn active_cell_indices(cells: &[Input], year: usize, month: usize) -> Vec<usize> {
    cells
        .iter()
        .enumerate()
        .filter(|(_, input)| !input.precedes_inforce_duration(year, month))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::SepBasis;
    use crate::calendar::CalendarDate;
    use crate::death_benefit::DeathBenefitOption;
    use crate::input::{PaymentStrategy, SolveTarget, SolveType, SpecAmtStrategy, Sex, UnderwritingClass};
    use crate::outlay::Mode;
    use crate::tables::state::State;
    use crate::tax_qualification::DefinitionOfLifeInsurance;

    fn sample_cell(issue_age: u32, premium: f64) -> Input {
        Input {
            issue_age,
            sex: Sex::Male,
            underwriting_class: UnderwritingClass::Standard,
            tax_state: State::CA,
            domicile: State::CA,
            birthdate: CalendarDate::from_ymd(1980, 1, 1).unwrap(),
            effective_date: CalendarDate::from_ymd(2025, 1, 1).unwrap(),
            inforce_as_of_date: None,
            years_to_maturity: 10,
            initial_specamt: Currency::from_fraction(500_000.0).unwrap(),
            initial_death_benefit_option: DeathBenefitOption::Level,
            specamt_strategy: SpecAmtStrategy::InputScalar,
            salary: Currency::ZERO,
            salary_multiplier: 0.0,
            salary_offset: Currency::ZERO,
            payment_strategy: PaymentStrategy::InputScalar,
            payment_mode: Mode::Annual,
            initial_employee_premium: Currency::from_fraction(premium).unwrap(),
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
            separate_basis: SepBasis::Input,
            separate_account_allocation: 1.0,
            solve_type: None,
            solve_begin_year: 0,
            solve_end_year: 0,
            solve_target: SolveTarget::Endowment,
            solve_target_year: 0,
            solve_target_csv: Currency::ZERO,
        }
    }

    #[test]
    fn serial_and_parallel_census_agree_on_cell_count() {
        let cells = vec![sample_cell(35, 8_000.0), sample_cell(55, 20_000.0)];
        let db = Arc::new(ProductDatabase::sample(10));
        let basis = Basis { gen: GenBasis::Current, sep: SepBasis::Input };
        let serial = run_census_serial(&cells, db.clone(), basis).unwrap();
        let parallel = run_census_parallel(&cells, db, basis).unwrap();
        assert_eq!(serial.cells.len(), 2);
        assert_eq!(parallel.cells.len(), 2);
    }

    #[test]
    fn composite_account_value_is_the_sum_of_the_cells() {
        let cells = vec![sample_cell(35, 8_000.0), sample_cell(55, 20_000.0)];
        let db = Arc::new(ProductDatabase::sample(10));
        let basis = Basis { gen: GenBasis::Current, sep: SepBasis::Input };
        let result = run_census_serial(&cells, db, basis).unwrap();
        let expected = result.cells[0].variant.account_value[0] + result.cells[1].variant.account_value[0];
        assert_eq!(result.composite_variant.account_value[0], expected);
    }

    #[test]
    fn a_solve_cell_reports_its_solved_value() {
        let mut solve_cell = sample_cell(45, 0.0);
        solve_cell.solve_type = Some(SolveType::EePrem);
        solve_cell.solve_begin_year = 0;
        solve_cell.solve_end_year = 10;
        solve_cell.solve_target = SolveTarget::ScalarCsv;
        solve_cell.solve_target_year = 9;
        solve_cell.solve_target_csv = Currency::from_fraction(100_000.0).unwrap();
        let cells = vec![solve_cell];
        let db = Arc::new(ProductDatabase::sample(10));
        let basis = Basis { gen: GenBasis::Current, sep: SepBasis::Input };
        let result = run_census_serial(&cells, db, basis).unwrap();
        assert!(result.cells[0].solved_value.is_some());
    }

    #[test]
    fn active_cell_indices_excludes_cells_not_yet_inforce() {
        let mut future_cell = sample_cell(35, 8_000.0);
        future_cell.effective_date = CalendarDate::from_ymd(2025, 1, 1).unwrap();
        future_cell.inforce_as_of_date = Some(CalendarDate::from_ymd(2024, 1, 1).unwrap());
        let cells = vec![sample_cell(35, 8_000.0), future_cell];
        let active = active_cell_indices(&cells, 0, 0);
        assert_eq!(active, vec![0]);
    }
}
