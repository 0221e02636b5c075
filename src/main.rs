//! Illustration runner.
//!
//! Loads a census CSV (or, with no argument, projects one built-in sample cell) and prints the
//! composite year-end account value and cash surrender value, the way the teacher's
//! `bin/run_block.rs` prints an `AggregatedRow` series after reducing a block's cashflows.

use lmi::account_value::Basis;
use lmi::basis::{GenBasis, SepBasis};
use lmi::tables::product::ProductDatabase;
use lmi::{run_census_serial, Input};
use std::path::PathBuf;
use std::sync::Arc;

fn main() {
    env_logger::init();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let cells = match path {
        Some(path) => match lmi::load_census(&path) {
            Ok(cells) => cells,
            Err(e) => {
                log::error!("failed to load census from {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => {
            log::info!("no census path given, projecting one built-in sample cell");
            vec![sample_cell()]
        }
    };

    let years = cells.iter().map(|c| c.years_to_maturity).max().unwrap_or(0);
    let db = Arc::new(ProductDatabase::sample(years));
    let basis = Basis { gen: GenBasis::Current, sep: SepBasis::Input };

    let result = match run_census_serial(&cells, db, basis) {
        Ok(result) => result,
        Err(e) => {
            log::error!("projection failed: {e}");
            std::process::exit(1);
        }
    };

    println!("{:>4} {:>16} {:>16} {:>16}", "Year", "AccountValue", "CSV", "DeathBenefit");
    for year in 0..result.composite_variant.years() {
        println!(
            "{:>4} {:>16} {:>16} {:>16}",
            year + 1,
            result.composite_variant.account_value[year],
            result.composite_variant.csv[year],
            result.composite_variant.death_benefit[year],
        );
    }
}

fn sample_cell() -> Input {
    use lmi::death_benefit::DeathBenefitOption;
    use lmi::input::{PaymentStrategy, Sex, SolveTarget, SpecAmtStrategy, UnderwritingClass};
    use lmi::outlay::Mode;
    use lmi::tables::state::State;
    use lmi::tax_qualification::DefinitionOfLifeInsurance;
    use lmi::Currency;

    Input {
        issue_age: 45,
        sex: Sex::Male,
        underwriting_class: UnderwritingClass::Standard,
        tax_state: State::CA,
        domicile: State::CA,
        birthdate: lmi::calendar::CalendarDate::from_ymd(1980, 1, 1).expect("valid sample birthdate"),
        effective_date: lmi::calendar::CalendarDate::from_ymd(2025, 1, 1).expect("valid sample effective date"),
        inforce_as_of_date: None,
        years_to_maturity: 30,
        initial_specamt: Currency::from_fraction(500_000.0).expect("finite sample specamt"),
        initial_death_benefit_option: DeathBenefitOption::Level,
        specamt_strategy: SpecAmtStrategy::InputScalar,
        salary: Currency::ZERO,
        salary_multiplier: 0.0,
        salary_offset: Currency::ZERO,
        payment_strategy: PaymentStrategy::InputScalar,
        payment_mode: Mode::Annual,
        initial_employee_premium: Currency::from_fraction(10_000.0).expect("finite sample premium"),
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
