//! The read-only product database (C16): the typed, dimensioned table store that the
//! premium-tax engine (C4), loads (C5), interest rates (C6), and mortality rates (C7) are
//! built from. `ProductDatabase::from_csv_dir` mirrors the teacher's one-`load_*`-function-
//! per-table-file loader pattern; `ProductDatabase::sample()` is a small, fully populated
//! in-memory fixture for tests and demos, standing in for the teacher's
//! `Assumptions::default_pricing()`.

use crate::error::LmiError;
use crate::rounding::{RoundingRule, RoundingSpec};
use crate::tables::interest::{InterestRateInputs, MAndESchedule};
use crate::tables::loads::LoadInputs;
use crate::tables::mortality::{CoiBands, CoiInputs, RawRatePeriod, RiderRates};
use crate::tables::premium_tax::{StateTaxFacts, TieredCharges};
use crate::tables::state::State;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;

/// A query key into the product database's per-state premium-tax facts. Named to match the
/// original's `DB_PremTaxLoad`/`DB_PremTaxRate` lookup keys; `query` is generic only over the
/// value type each key resolves to; the key set itself is closed (an enum, not a string), so a
/// caller can't typo a lookup the way the original's stringly-typed keys could.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKey {
    PremTaxLoad,
    PremTaxRate,
}

/// The surrender-charge schedule: a scalar percentage of specamt, by policy year, charged on
/// full or partial surrender.
#[derive(Debug, Clone)]
pub struct SurrenderChargeSchedule {
    pub rate_by_year: Vec<f64>,
}

impl SurrenderChargeSchedule {
    pub fn rate(&self, year: usize) -> f64 {
        self.rate_by_year.get(year).copied().unwrap_or(0.0)
    }
}

/// Everything C4-C10 are built from. Fields are `pub` because this is a read-only, already-
/// validated value once constructed; there is nothing to protect by hiding them behind
/// accessors the way the mutable per-cell engine state is.
#[derive(Debug, Clone)]
pub struct ProductDatabase {
    pub states: HashMap<State, StateTaxFacts>,
    pub tiered_charges: TieredCharges,
    pub load_inputs: LoadInputs,
    pub interest_inputs: InterestRateInputs,
    pub m_and_e_schedule: MAndESchedule,
    pub coi_bands: CoiBands,
    pub coi_current: CoiInputs,
    pub coi_guaranteed: CoiInputs,
    pub riders_current: RiderRates,
    pub riders_guaranteed: RiderRates,
    pub guideline_q_7702: Vec<f64>,
    pub cvat_corridor_factor: Vec<f64>,
    pub cvat_nsp: Vec<f64>,
    pub seven_pay_rate: Vec<f64>,
    pub surrender_charges: SurrenderChargeSchedule,
    pub rounding: RoundingSpec,
    pub premium_tax_load_varies_by_state: bool,
    pub premium_tax_load_is_levy_rate: bool,
    pub amortize_premium_tax_load: bool,
}

impl ProductDatabase {
    pub fn query(&self, key: DatabaseKey, state: State) -> Option<f64> {
        let facts = self.states.get(&state)?;
        Some(match key {
            DatabaseKey::PremTaxLoad => facts.load_rate,
            DatabaseKey::PremTaxRate => facts.levy_rate,
        })
    }

    /// Whether `key`'s value is configured to differ by state at all (vs. one scalar shared
    /// by every jurisdiction). Premium tax is the only key this crate's core consults that
    /// this question applies to; see the C4 pass-through invariant.
    pub fn varies_by_state(&self, key: DatabaseKey) -> bool {
        match key {
            DatabaseKey::PremTaxLoad => self.premium_tax_load_varies_by_state,
            DatabaseKey::PremTaxRate => true,
        }
    }

    /// Whether two keys are configured to resolve to the same value for every state -- the
    /// C4 invariant that a varying premium-tax *load* must equal the premium-tax *rate*
    /// (pass-through, no margin retained) checks this between `PremTaxLoad` and `PremTaxRate`.
    pub fn are_equivalent(&self, key1: DatabaseKey, key2: DatabaseKey) -> bool {
        State::ALL.iter().all(|&s| self.query(key1, s) == self.query(key2, s))
    }

    pub fn years(&self) -> usize {
        self.load_inputs.years
    }

    /// A small, fully populated in-memory instance: plausible current/guaranteed rates for a
    /// generic current-assumption UL product, current == guaranteed premium-tax pass-through,
    /// no states tiered except AK/SD. Good enough for solver convergence tests and demos; not
    /// a real filing.
    pub fn sample(years: usize) -> ProductDatabase {
        let mut states = HashMap::new();
        for &s in &State::ALL {
            let rate = if s == State::XX { 0.0 } else { 0.02 };
            states.insert(
                s,
                StateTaxFacts {
                    levy_rate: rate,
                    load_rate: rate,
                    is_tiered: false,
                },
            );
        }

        let flat = |v: f64| vec![v; years];
        ProductDatabase {
            states,
            tiered_charges: TieredCharges::sample(),
            load_inputs: LoadInputs {
                years,
                refundable_sales_load_proportion: flat(0.0),
                monthly_policy_fee: [
                    vec![crate::currency::Currency::from_fraction(5.00).unwrap(); years],
                    vec![crate::currency::Currency::from_fraction(8.00).unwrap(); years],
                ],
                annual_policy_fee: [
                    vec![crate::currency::Currency::ZERO; years],
                    vec![crate::currency::Currency::ZERO; years],
                ],
                specified_amount_load: [flat(0.0009), flat(0.0012)],
                separate_account_load: [flat(0.0), flat(0.0)],
                target_premium_load: [flat(0.05), flat(0.06)],
                excess_premium_load: [flat(0.02), flat(0.03)],
                target_sales_load: [flat(0.0), flat(0.0)],
                excess_sales_load: [flat(0.0), flat(0.0)],
                premium_tax_load: flat(0.02),
                amortized_premium_tax_load: flat(0.0015),
                dac_tax_load: flat(0.01),
                maximum_premium_tax_load: 0.035,
                minimum_premium_tax_load: 0.0,
            },
            interest_inputs: InterestRateInputs {
                general_account: [0.04, 0.03],
                separate_account_gross: [0.08, 0.06],
                separate_account_net: [0.065, 0.045],
                honeymoon_value: [0.0, 0.0],
                post_honeymoon: [0.04, 0.03],
                guideline_rate_7702: 0.04,
                regular_loan_credited: 0.02,
                regular_loan_due: 0.04,
                preferred_loan_credited: 0.04,
                preferred_loan_due: 0.04,
            },
            m_and_e_schedule: MAndESchedule {
                cumulative_asset_limits: vec![10_000_000.0, 50_000_000.0, f64::INFINITY],
                mortality_and_expense: vec![0.0090, 0.0075, 0.0060],
                investment_management_fee: 0.0015,
                miscellaneous: 0.0002,
                stable_value: 0.0,
            },
            coi_bands: CoiBands { band1_limit: 100_000.0, band2_limit: 1_000_000.0 },
            coi_current: CoiInputs {
                period: RawRatePeriod::Annual,
                q_by_band: vec![flat(0.004), flat(0.0036), flat(0.0032)],
                substandard_multiplier: flat(1.0),
                flat_extra_monthly: flat(0.0),
                max_monthly_rate: 0.08333,
            },
            coi_guaranteed: CoiInputs {
                period: RawRatePeriod::Annual,
                q_by_band: vec![flat(0.006), flat(0.0054), flat(0.0048)],
                substandard_multiplier: flat(1.0),
                flat_extra_monthly: flat(0.0),
                max_monthly_rate: 0.08333,
            },
            riders_current: RiderRates::default(),
            riders_guaranteed: RiderRates::default(),
            guideline_q_7702: flat(0.005),
            cvat_corridor_factor: (0..121)
                .map(|age| if age < 40 { 2.5 } else if age < 90 { (2.5 - 0.015 * (age - 40) as f64).max(1.05) } else { 1.05 })
                .collect(),
            cvat_nsp: flat(0.2),
            seven_pay_rate: flat(0.05),
            surrender_charges: SurrenderChargeSchedule { rate_by_year: (0..years).map(|y| (0.08 - 0.008 * y as f64).max(0.0)).collect() },
            rounding: RoundingSpec::sample(),
            premium_tax_load_varies_by_state: true,
            premium_tax_load_is_levy_rate: true,
            amortize_premium_tax_load: false,
        }
    }

    /// Load per-state premium tax facts from a `states.csv` in `dir` (columns: `state`,
    /// `levy_rate`, `load_rate`, `is_tiered`), overlaying onto [`ProductDatabase::sample`]'s
    /// other tables since a full CSV schema for every C5-C10 vector is out of scope for this
    /// crate's fixtures (the teacher's own `assumptions::loader` takes the same shortcut for
    /// its less-central tables).
    pub fn from_csv_dir(dir: &Path, years: usize) -> Result<ProductDatabase, LmiError> {
        let mut db = ProductDatabase::sample(years);
        let path = dir.join("states.csv");
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .map_err(|e| crate::error::TableLoadError::Csv { path: path.display().to_string(), source: e })?;

        #[derive(serde::Deserialize)]
        struct Row {
            state: String,
            levy_rate: f64,
            load_rate: f64,
            is_tiered: bool,
        }

        for row in reader.deserialize::<Row>() {
            let row = row.map_err(|e| crate::error::TableLoadError::Csv { path: path.display().to_string(), source: e })?;
            let state: State = row.state.parse()?;
            db.states.insert(
                state,
                StateTaxFacts {
                    levy_rate: row.levy_rate,
                    load_rate: row.load_rate,
                    is_tiered: row.is_tiered,
                },
            );
        }
        Ok(db)
    }

    pub fn round_rate(&self) -> RoundingRule {
        self.rounding.round_interest_rate
    }

    pub fn round_coi(&self) -> RoundingRule {
        self.rounding.round_coi_rate
    }
}

impl Default for SurrenderChargeSchedule {
    fn default() -> Self {
        SurrenderChargeSchedule { rate_by_year: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_internally_consistent() {
        let db = ProductDatabase::sample(30);
        assert_eq!(db.years(), 30);
        assert!(db.varies_by_state(DatabaseKey::PremTaxLoad));
        assert!(db.are_equivalent(DatabaseKey::PremTaxLoad, DatabaseKey::PremTaxRate));
    }

    #[test]
    fn query_resolves_known_state() {
        let db = ProductDatabase::sample(30);
        assert_eq!(db.query(DatabaseKey::PremTaxRate, State::CA), Some(0.02));
        assert_eq!(db.query(DatabaseKey::PremTaxRate, State::XX), Some(0.0));
    }
}
