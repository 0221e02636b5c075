//! Death-benefit time series (C8): the specified amount and supplemental (term-rider) amount,
//! one entry per policy year, plus the parallel death-benefit-option vector. Writers replace a
//! contiguous `[from_year, to_year)` slice; readers get a read-only view. Values are expected
//! to already be rounded by the caller (`round_specamt`) before they're written here.

use crate::currency::Currency;
use crate::error::LmiError;

/// Death-benefit option in effect for a policy year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathBenefitOption {
    /// DB = specamt (level).
    Level,
    /// DB = specamt + AV (increasing).
    Increasing,
    /// DB = specamt + cumulative premiums less withdrawals (return of premium).
    ReturnOfPremium,
    /// DB = max(specamt, corridor x AV), specamt never rises with AV.
    MinimumDeathBenefit,
}

/// The specamt/supplamt/option time series (C8). All three vectors share one length: the
/// number of policy years to maturity.
#[derive(Debug, Clone)]
pub struct DeathBenefits {
    specamt: Vec<Currency>,
    supplamt: Vec<Currency>,
    option: Vec<DeathBenefitOption>,
}

impl DeathBenefits {
    pub fn new(years: usize, initial_specamt: Currency, initial_option: DeathBenefitOption) -> DeathBenefits {
        DeathBenefits {
            specamt: vec![initial_specamt; years],
            supplamt: vec![Currency::ZERO; years],
            option: vec![initial_option; years],
        }
    }

    pub fn years(&self) -> usize {
        self.specamt.len()
    }

    pub fn specamt(&self, year: usize) -> Currency {
        self.specamt[year]
    }

    pub fn supplamt(&self, year: usize) -> Currency {
        self.supplamt[year]
    }

    pub fn option(&self, year: usize) -> DeathBenefitOption {
        self.option[year]
    }

    /// Replace `[from_year, to_year)` of the specified-amount vector with `value`.
    pub fn set_specamt_range(&mut self, from_year: usize, to_year: usize, value: Currency) -> Result<(), LmiError> {
        self.bounds_check(from_year, to_year)?;
        self.specamt[from_year..to_year].fill(value);
        Ok(())
    }

    pub fn set_supplamt_range(&mut self, from_year: usize, to_year: usize, value: Currency) -> Result<(), LmiError> {
        self.bounds_check(from_year, to_year)?;
        self.supplamt[from_year..to_year].fill(value);
        Ok(())
    }

    pub fn set_option_range(
        &mut self,
        from_year: usize,
        to_year: usize,
        value: DeathBenefitOption,
    ) -> Result<(), LmiError> {
        self.bounds_check(from_year, to_year)?;
        self.option[from_year..to_year].fill(value);
        Ok(())
    }

    fn bounds_check(&self, from_year: usize, to_year: usize) -> Result<(), LmiError> {
        if from_year > to_year || to_year > self.specamt.len() {
            return Err(LmiError::Invariant(format!(
                "death-benefit range [{from_year}, {to_year}) out of bounds for {} years",
                self.specamt.len()
            )));
        }
        Ok(())
    }
}

/// Compute the death benefit for one month from specamt/supplamt/option, AV, and the CVAT
/// corridor factor (always applied; under GPT the corridor factor is conventionally 1.0).
pub fn death_benefit(
    option: DeathBenefitOption,
    specamt: Currency,
    supplamt: Currency,
    account_value: Currency,
    cumulative_premiums_less_withdrawals: Currency,
    corridor_factor: f64,
) -> Currency {
    let corridor_floor =
        Currency::from_fraction(corridor_factor * account_value.value()).unwrap_or(Currency::ZERO);
    let base = match option {
        DeathBenefitOption::Level => specamt,
        DeathBenefitOption::Increasing => specamt + account_value,
        DeathBenefitOption::ReturnOfPremium => specamt.max(cumulative_premiums_less_withdrawals),
        DeathBenefitOption::MinimumDeathBenefit => specamt,
    };
    base.max(corridor_floor) + supplamt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_option_ignores_av_until_corridor_binds() {
        let specamt = Currency::from_fraction(500_000.0).unwrap();
        let av = Currency::from_fraction(100_000.0).unwrap();
        let db = death_benefit(DeathBenefitOption::Level, specamt, Currency::ZERO, av, Currency::ZERO, 2.5);
        assert_eq!(db, Currency::from_fraction(500_000.0).unwrap());
    }

    #[test]
    fn corridor_raises_db_above_specamt_when_av_is_large() {
        let specamt = Currency::from_fraction(500_000.0).unwrap();
        let av = Currency::from_fraction(300_000.0).unwrap();
        let db = death_benefit(DeathBenefitOption::Level, specamt, Currency::ZERO, av, Currency::ZERO, 2.5);
        assert_eq!(db, Currency::from_fraction(750_000.0).unwrap());
    }

    #[test]
    fn increasing_option_adds_av_to_specamt() {
        let specamt = Currency::from_fraction(500_000.0).unwrap();
        let av = Currency::from_fraction(100_000.0).unwrap();
        let db = death_benefit(DeathBenefitOption::Increasing, specamt, Currency::ZERO, av, Currency::ZERO, 1.0);
        assert_eq!(db, Currency::from_fraction(600_000.0).unwrap());
    }

    #[test]
    fn set_range_replaces_only_the_requested_slice() {
        let mut db = DeathBenefits::new(5, Currency::from_fraction(500_000.0).unwrap(), DeathBenefitOption::Level);
        db.set_specamt_range(2, 5, Currency::from_fraction(750_000.0).unwrap()).unwrap();
        assert_eq!(db.specamt(1), Currency::from_fraction(500_000.0).unwrap());
        assert_eq!(db.specamt(2), Currency::from_fraction(750_000.0).unwrap());
    }

    #[test]
    fn set_range_rejects_out_of_bounds() {
        let mut db = DeathBenefits::new(5, Currency::from_fraction(500_000.0).unwrap(), DeathBenefitOption::Level);
        assert!(db.set_specamt_range(3, 6, Currency::ZERO).is_err());
    }
}
