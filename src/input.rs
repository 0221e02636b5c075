//! The read-only per-cell `Input` record (C18) and its census CSV loader.
//!
//! `Input` has no separate wire struct the way the teacher's `policy::loader::CsvRow`
//! sits in front of `Policy`: every field here is already the shape a CSV column can hold
//! (currency/date/enum newtypes all implement `serde`), so a census row deserializes
//! straight into the domain type `load_census` hands to the driver.

use crate::basis::{GenBasis, SepBasis};
use crate::calendar::CalendarDate;
use crate::currency::Currency;
use crate::death_benefit::DeathBenefitOption;
use crate::error::LmiError;
use crate::outlay::Mode;
use crate::tables::state::State;
use crate::tax_qualification::DefinitionOfLifeInsurance;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UnderwritingClass {
    Standard,
    Preferred,
    Substandard,
}

/// How the payment strategy resolver (C12) derives a year's modal premium. `InputScalar`
/// takes its value from `Input::initial_employee_premium`; `Table` scales a proxy-table
/// premium by `Input::payment_table_multiplier`; the rest are parameterless rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PaymentStrategy {
    InputScalar,
    Minimum,
    Target,
    Mep,
    Glp,
    Gsp,
    Corridor,
    Table,
}

/// How the specified-amount resolver (C12) derives a year's face amount. `InputScalar`
/// takes `Input::initial_specamt`; `Salary` uses `Input::salary_multiplier`/`salary_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SpecAmtStrategy {
    InputScalar,
    Maximum,
    Target,
    Mep,
    Glp,
    Gsp,
    Corridor,
    Salary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SolveType {
    SpecAmt,
    EePrem,
    ErPrem,
    Loan,
    Wd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SolveTarget {
    Endowment,
    TaxBasis,
    NonMec,
    ScalarCsv,
}

/// Which riders are in force; term amounts and multipliers for each live in the product
/// database's rider-rate tables (C7), not here. Built from [`Input`]'s flat `rider_*` fields
/// by [`Input::riders`]; CSV rows cannot hold a nested record, so `Input` itself stays flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RiderElections {
    pub adb: bool,
    pub waiver_of_premium: bool,
    pub children_term: bool,
    pub spouse_term: bool,
}

/// Solve parameters (C13), built from [`Input`]'s flat `solve_*` fields by [`Input::solve`].
/// `solve_type` of `None` means this cell is a straight illustration with no inversion; all
/// other fields are then ignored.
#[derive(Debug, Clone, Copy)]
pub struct SolveParameters {
    pub solve_type: Option<SolveType>,
    pub begin_year: usize,
    pub end_year: usize,
    pub target: SolveTarget,
    pub target_year: usize,
    pub target_csv: Currency,
}

/// The read-only per-cell record C11/C14 consume (C18, §6 "Consumed by the core").
#[derive(Debug, Clone, Deserialize)]
pub struct Input {
    pub issue_age: u32,
    pub sex: Sex,
    pub underwriting_class: UnderwritingClass,
    pub tax_state: State,
    pub domicile: State,

    pub birthdate: CalendarDate,
    pub effective_date: CalendarDate,
    /// `None` for an as-issued illustration; `Some(date)` for an inforce cell valued as of
    /// some later monthiversary.
    pub inforce_as_of_date: Option<CalendarDate>,

    pub years_to_maturity: usize,

    pub initial_specamt: Currency,
    pub initial_death_benefit_option: DeathBenefitOption,
    pub specamt_strategy: SpecAmtStrategy,
    pub salary: Currency,
    pub salary_multiplier: f64,
    pub salary_offset: Currency,

    pub payment_strategy: PaymentStrategy,
    pub payment_mode: Mode,
    pub initial_employee_premium: Currency,
    pub initial_employer_premium: Currency,
    pub payment_table_multiplier: f64,

    pub withdrawal_begin_year: usize,
    pub annual_withdrawal: Currency,
    pub loan_begin_year: usize,
    pub annual_loan: Currency,
    /// Whether new loan draws go to the preferred-loan bucket (`AV_prfLn`/`PrfLnBal`, credited
    /// and charged at `preferred_loan_credited_monthly`/`preferred_loan_due_monthly`) instead
    /// of the regular-loan bucket. A cell elects one loan type for its whole duration; this
    /// crate does not model switching mid-projection.
    pub loan_is_preferred: bool,

    pub rider_adb: bool,
    pub rider_waiver_of_premium: bool,
    pub rider_children_term: bool,
    pub rider_spouse_term: bool,

    pub definition_of_life_insurance: DefinitionOfLifeInsurance,
    pub avoid_mec: bool,

    pub general_basis: GenBasis,
    pub separate_basis: SepBasis,
    /// Fraction (0.0-1.0) of each payment allocated to the separate account; the remainder
    /// goes to the general account. Mirrors the original's `GenAcctPaymentAllocation`/
    /// `SepAcctPaymentAllocation` pair as a single complementary scalar.
    pub separate_account_allocation: f64,

    pub solve_type: Option<SolveType>,
    pub solve_begin_year: usize,
    pub solve_end_year: usize,
    pub solve_target: SolveTarget,
    pub solve_target_year: usize,
    pub solve_target_csv: Currency,
}

impl Input {
    pub fn riders(&self) -> RiderElections {
        RiderElections {
            adb: self.rider_adb,
            waiver_of_premium: self.rider_waiver_of_premium,
            children_term: self.rider_children_term,
            spouse_term: self.rider_spouse_term,
        }
    }

    pub fn solve(&self) -> SolveParameters {
        SolveParameters {
            solve_type: self.solve_type,
            begin_year: self.solve_begin_year,
            end_year: self.solve_end_year,
            target: self.solve_target,
            target_year: self.solve_target_year,
            target_csv: self.solve_target_csv,
        }
    }

    /// Whether this cell has already started as of `(year, month)` -- used by the census
    /// driver's parallel mode to skip cells whose inforce duration has not yet been reached
    /// (`PrecedesInforceDuration` in §4.14).
    pub fn precedes_inforce_duration(&self, year: usize, month: usize) -> bool {
        match self.inforce_as_of_date {
            None => false,
            Some(as_of) => {
                let months_elapsed = crate::calendar::attained_age(
                    self.effective_date,
                    as_of,
                    crate::calendar::AgeBasis::LastBirthday,
                )
                .unwrap_or(0) as usize;
                year * 12 + month < months_elapsed
            }
        }
    }
}

/// Read a census CSV from `path` into one `Input` per row, the way `policy::load_policies`
/// reads `pricing_inforce.csv`.
pub fn load_census(path: &Path) -> Result<Vec<Input>, LmiError> {
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| crate::error::TableLoadError::Csv { path: path.display().to_string(), source: e })?;
    load_census_from_reader(reader.into_inner())
}

/// As [`load_census`], but from an already-open reader (tests, embedded fixtures, stdin).
pub fn load_census_from_reader<R: Read>(reader: R) -> Result<Vec<Input>, LmiError> {
    let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut cells = Vec::new();
    for record in csv_reader.deserialize::<Input>() {
        let record = record.map_err(|e| crate::error::TableLoadError::Csv { path: "<reader>".into(), source: e })?;
        cells.push(record);
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_and_row() -> String {
        "issue_age,sex,underwriting_class,tax_state,domicile,birthdate,effective_date,inforce_as_of_date,years_to_maturity,initial_specamt,initial_death_benefit_option,specamt_strategy,salary,salary_multiplier,salary_offset,payment_strategy,payment_mode,initial_employee_premium,initial_employer_premium,payment_table_multiplier,withdrawal_begin_year,annual_withdrawal,loan_begin_year,annual_loan,loan_is_preferred,rider_adb,rider_waiver_of_premium,rider_children_term,rider_spouse_term,definition_of_life_insurance,avoid_mec,general_basis,separate_basis,separate_account_allocation,solve_type,solve_begin_year,solve_end_year,solve_target,solve_target_year,solve_target_csv\n\
         35,Male,Preferred,CA,CA,1990-01-01,2025-01-01,,65,500000.00,Level,InputScalar,0.00,0.0,0.00,InputScalar,Annual,3000.00,0.00,0.0,0,0.00,0,0.00,false,false,false,false,false,Cvat,false,Current,Input,0.0,,0,0,Endowment,0,0.00\n".to_string()
    }

    #[test]
    fn loads_one_row_from_a_reader() {
        let csv = header_and_row();
        let cells = load_census_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].issue_age, 35);
        assert_eq!(cells[0].initial_specamt, Currency::from_fraction(500_000.0).unwrap());
        assert!(cells[0].solve().solve_type.is_none());
    }

    #[test]
    fn precedes_inforce_duration_is_false_without_an_inforce_date() {
        let csv = header_and_row();
        let cells = load_census_from_reader(csv.as_bytes()).unwrap();
        assert!(!cells[0].precedes_inforce_duration(0, 0));
    }
}
