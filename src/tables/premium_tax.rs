//! Premium tax: calculated per payment, with retaliation between the premium-tax state and
//! the state of domicile, and with support for a tiered (not merely scalar) tax rate in the
//! premium-tax state.
//!
//! Scalar and tiered rates belong in the product database and the tiered-charge tables,
//! respectively; this module only combines them and tracks year-to-date state. Retaliation
//! is handled here so that product data never needs a domicile-specific variant.

use crate::currency::Currency;
use crate::error::LmiError;
use crate::stratified::tiered_product;
use crate::tables::state::State;
use std::collections::HashMap;

const RECIPROCAL_NONRETALIATION_STATES: [State; 5] =
    [State::AZ, State::MA, State::MN, State::NY, State::RI];

fn is_retaliatory(tax_state: State, domicile: State) -> bool {
    let reciprocally_nonretaliatory = RECIPROCAL_NONRETALIATION_STATES.contains(&tax_state)
        && RECIPROCAL_NONRETALIATION_STATES.contains(&domicile);
    let nonretaliatory = reciprocally_nonretaliatory
        || tax_state == State::HI
        || tax_state == State::XX
        || tax_state == State::AK
        || tax_state == State::SD;
    !nonretaliatory
}

/// Loose equality, tolerant of the rounding noise ordinary floating-point arithmetic
/// accumulates, used only to decide whether the scalar and tiered-history formulations of
/// this month's incremental tax agree closely enough to prefer the numerically simpler one.
fn materially_equal(a: f64, b: f64) -> bool {
    let tolerance = 100.0 * f64::EPSILON * a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= tolerance
}

/// A tiered premium-tax rate schedule: incremental (not cumulative) premium bands and the
/// rate applying to each, read from the stratified-charges tables for states that tier.
#[derive(Debug, Clone)]
pub struct TieredPremiumTaxRates {
    pub incremental_limits: Vec<f64>,
    pub rates: Vec<f64>,
}

impl TieredPremiumTaxRates {
    fn max_rate(&self) -> f64 {
        self.rates.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    fn min_rate(&self) -> f64 {
        self.rates.iter().cloned().fold(f64::INFINITY, f64::min)
    }
}

/// The subset of stratified-charges data premium tax needs: which states tier their rate,
/// and the schedule each one uses.
#[derive(Debug, Clone, Default)]
pub struct TieredCharges {
    schedules: HashMap<State, TieredPremiumTaxRates>,
}

impl TieredCharges {
    pub fn is_tiered(&self, state: State) -> bool {
        self.schedules.contains_key(&state)
    }

    pub fn tiered_premium_tax(&self, state: State, payment: f64, ytd_taxable_premium: f64) -> f64 {
        let schedule = &self.schedules[&state];
        let after = tiered_product(
            payment,
            ytd_taxable_premium,
            &schedule.incremental_limits,
            &schedule.rates,
        )
        .unwrap_or(0.0);
        after
    }

    pub fn maximum_tiered_rate(&self, state: State) -> f64 {
        self.schedules[&state].max_rate()
    }

    pub fn minimum_tiered_rate(&self, state: State) -> f64 {
        self.schedules[&state].min_rate()
    }

    /// A plausible two-tier schedule for AK and SD, the only states this engine tiers by
    /// default; real brackets and rates come from the product's `.strata` file.
    pub fn sample() -> TieredCharges {
        let mut schedules = HashMap::new();
        let ak_sd_schedule = TieredPremiumTaxRates {
            incremental_limits: vec![100_000.0, f64::INFINITY],
            rates: vec![0.0270, 0.0010],
        };
        schedules.insert(State::AK, ak_sd_schedule.clone());
        schedules.insert(State::SD, ak_sd_schedule);
        TieredCharges { schedules }
    }
}

/// The product-database facts a premium-tax engine needs about one state: the scalar load
/// and rate charged there, and whether that state's rate is tiered.
#[derive(Debug, Clone, Copy)]
pub struct StateTaxFacts {
    pub levy_rate: f64,
    pub load_rate: f64,
    pub is_tiered: bool,
}

pub struct PremiumTaxEngine {
    tax_state: State,
    domicile: State,
    amortize_premium_load: bool,

    levy_rate: f64,
    load_rate: f64,
    tax_state_load_rate: f64,
    domiciliary_load_rate: f64,
    maximum_load_rate: f64,
    minimum_load_rate: f64,
    is_tiered_in_tax_state: bool,
    is_retaliatory: bool,
    varies_by_state: bool,

    ytd_taxable_premium: f64,
    ytd_load: f64,
    ytd_load_in_tax_state: f64,
    ytd_load_in_domicile: f64,
}

impl PremiumTaxEngine {
    /// Construct a premium-tax engine for one contract's tax state and domicile.
    ///
    /// `varies_by_state` and `load_rate_is_levy_rate` come from the product database's
    /// `DB_PremTaxLoad`/`DB_PremTaxRate` entries (see [`crate::tables::database`]).
    ///
    /// A domicile whose rate is tiered is a configuration error: lmi's retaliation logic
    /// only ever evaluates the domicile's *scalar* rate, so a tiered domicile would silently
    /// produce an understated tax. Upstream products must not configure one.
    pub fn new(
        tax_state: State,
        domicile: State,
        amortize_premium_load: bool,
        varies_by_state: bool,
        load_rate_is_levy_rate: bool,
        tax_state_facts: StateTaxFacts,
        domiciliary_facts: StateTaxFacts,
        tiers: &TieredCharges,
    ) -> Result<PremiumTaxEngine, LmiError> {
        if varies_by_state && !load_rate_is_levy_rate {
            return Err(LmiError::Configuration(
                "premium-tax load varies by state but differs from premium-tax rates".into(),
            ));
        }
        if tax_state_facts.is_tiered && tax_state_facts.load_rate != 0.0 {
            return Err(LmiError::Configuration(format!(
                "premium-tax load is tiered in tax state {tax_state} but a nonzero scalar load is also configured"
            )));
        }
        if domiciliary_facts.is_tiered {
            return Err(LmiError::Configuration(format!(
                "premium tax is tiered in state of domicile {domicile}, which is not supported"
            )));
        }

        let is_retaliatory = is_retaliatory(tax_state, domicile);

        let (tax_state_levy_rate, tax_state_load_rate, domiciliary_levy_rate, domiciliary_load_rate) =
            if amortize_premium_load {
                (0.0, 0.0, 0.0, 0.0)
            } else {
                (
                    tax_state_facts.levy_rate,
                    tax_state_facts.load_rate,
                    domiciliary_facts.levy_rate,
                    domiciliary_facts.load_rate,
                )
            };

        let (levy_rate, load_rate) = if is_retaliatory {
            (
                tax_state_levy_rate.max(domiciliary_levy_rate),
                tax_state_load_rate.max(domiciliary_load_rate),
            )
        } else {
            (tax_state_levy_rate, tax_state_load_rate)
        };

        let (maximum_load_rate, minimum_load_rate) = if amortize_premium_load {
            (0.0, 0.0)
        } else if !varies_by_state {
            (load_rate, load_rate)
        } else if tax_state_facts.is_tiered {
            (
                tiers.maximum_tiered_rate(tax_state),
                tiers.minimum_tiered_rate(tax_state),
            )
        } else {
            (load_rate, load_rate)
        };

        Ok(PremiumTaxEngine {
            tax_state,
            domicile,
            amortize_premium_load,
            levy_rate,
            load_rate,
            tax_state_load_rate,
            domiciliary_load_rate,
            maximum_load_rate,
            minimum_load_rate,
            is_tiered_in_tax_state: tax_state_facts.is_tiered,
            is_retaliatory,
            varies_by_state,
            ytd_taxable_premium: 0.0,
            ytd_load: 0.0,
            ytd_load_in_tax_state: 0.0,
            ytd_load_in_domicile: 0.0,
        })
    }

    pub fn start_new_year(&mut self) {
        self.ytd_taxable_premium = 0.0;
        self.ytd_load = 0.0;
        self.ytd_load_in_tax_state = 0.0;
        self.ytd_load_in_domicile = 0.0;
    }

    /// Incremental premium-tax load on one payment, reflecting retaliation and, where
    /// applicable, tiering. Tiered tax is always greatest on the first dollar, so the
    /// incidence of taxation is front-loaded across a year's modal payments; this function
    /// must therefore track year-to-date history rather than apply a single scalar rate
    /// throughout the year.
    pub fn calculate_load(&mut self, payment: Currency, tiers: &TieredCharges) -> Currency {
        let payment = payment.value();

        let mut tax_in_tax_state = self.tax_state_load_rate * payment;
        if self.varies_by_state && self.is_tiered_in_tax_state {
            tax_in_tax_state =
                tiers.tiered_premium_tax(self.tax_state, payment, self.ytd_taxable_premium);
        }
        self.ytd_load_in_tax_state += tax_in_tax_state;

        let mut tax_in_domicile = 0.0;
        if self.is_retaliatory {
            tax_in_domicile = self.domiciliary_load_rate * payment;
            self.ytd_load_in_domicile += tax_in_domicile;
        }

        self.ytd_taxable_premium += payment;

        let ytd_tax_reflecting_retaliation = self.ytd_load_in_tax_state.max(self.ytd_load_in_domicile);
        let history_based = (ytd_tax_reflecting_retaliation - self.ytd_load).max(0.0);
        let scalar_based = tax_in_tax_state.max(tax_in_domicile);
        let no_tiering = !self.is_tiered_in_tax_state;
        let incremental = if no_tiering || materially_equal(history_based, scalar_based) {
            scalar_based
        } else {
            history_based
        };
        self.ytd_load += incremental;
        Currency::from_fraction(incremental).unwrap_or(Currency::ZERO)
    }

    pub fn ytd_load(&self) -> f64 {
        self.ytd_load
    }

    pub fn levy_rate(&self) -> f64 {
        self.levy_rate
    }

    pub fn load_rate(&self) -> f64 {
        self.load_rate
    }

    pub fn maximum_load_rate(&self) -> f64 {
        self.maximum_load_rate
    }

    pub fn minimum_load_rate(&self) -> f64 {
        self.minimum_load_rate
    }

    pub fn is_tiered(&self) -> bool {
        self.is_tiered_in_tax_state
    }

    pub fn tax_state(&self) -> State {
        self.tax_state
    }

    pub fn domicile(&self) -> State {
        self.domicile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_facts(rate: f64) -> StateTaxFacts {
        StateTaxFacts {
            levy_rate: rate,
            load_rate: rate,
            is_tiered: false,
        }
    }

    #[test]
    fn reciprocal_states_do_not_retaliate() {
        assert!(!is_retaliatory(State::NY, State::MA));
        assert!(!is_retaliatory(State::AZ, State::RI));
    }

    #[test]
    fn hi_and_xx_never_retaliate() {
        assert!(!is_retaliatory(State::HI, State::CA));
        assert!(!is_retaliatory(State::XX, State::CA));
    }

    #[test]
    fn most_states_retaliate() {
        assert!(is_retaliatory(State::CA, State::TX));
    }

    #[test]
    fn retaliation_takes_the_higher_of_two_scalar_rates() {
        let tiers = TieredCharges::default();
        let mut engine = PremiumTaxEngine::new(
            State::CA,
            State::TX,
            false,
            false,
            true,
            flat_facts(0.0235),
            flat_facts(0.0175),
            &tiers,
        )
        .unwrap();
        assert!((engine.load_rate() - 0.0235).abs() < 1e-9);

        let load = engine.calculate_load(Currency::from_fraction(1000.0).unwrap(), &tiers);
        assert_eq!(load, Currency::from_fraction(23.50).unwrap());
    }

    #[test]
    fn tiered_domicile_is_a_configuration_error() {
        let tiers = TieredCharges::sample();
        let result = PremiumTaxEngine::new(
            State::CA,
            State::AK,
            false,
            false,
            true,
            flat_facts(0.0235),
            StateTaxFacts {
                levy_rate: 0.0,
                load_rate: 0.0,
                is_tiered: true,
            },
            &tiers,
        );
        assert!(matches!(result, Err(LmiError::Configuration(_))));
    }

    #[test]
    fn tiered_tax_state_front_loads_within_the_year() {
        let tiers = TieredCharges::sample();
        let mut engine = PremiumTaxEngine::new(
            State::AK,
            State::AK,
            false,
            true,
            true,
            StateTaxFacts {
                levy_rate: 0.0,
                load_rate: 0.0,
                is_tiered: true,
            },
            flat_facts(0.0),
            &tiers,
        )
        .unwrap();

        let first = engine.calculate_load(Currency::from_fraction(50_000.0).unwrap(), &tiers);
        let second = engine.calculate_load(Currency::from_fraction(100_000.0).unwrap(), &tiers);
        // First dollars taxed at the higher first-tier rate; later dollars spill into the
        // lower second tier, so the marginal rate on the second payment is lower.
        assert!(second.value() / 100_000.0 < first.value() / 50_000.0);
    }
}
