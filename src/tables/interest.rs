//! Interest-rate tables (C6): net/gross, annual/monthly, by general-account basis and, for
//! the separate account, by [`SepBasis`] as well. Every annual rate a product configures is
//! converted to its monthly equivalent once, at construction, via `(1+i)^(1/12) - 1`, rounded
//! per the configured rounding rule -- the monthly engine never recomputes this conversion
//! per month.

use crate::basis::{GenBasis, SepBasis};
use crate::rounding::RoundingRule;
use crate::stratified::banded_rate;

fn monthly_equivalent(annual: f64, round_rate: RoundingRule) -> f64 {
    round_rate.round((1.0 + annual).powf(1.0 / 12.0) - 1.0)
}

/// Annual general-account, separate-account, honeymoon, loan, and 7702-guideline rate
/// inputs a product configures, current and guaranteed only; midpoint is always their mean.
#[derive(Debug, Clone)]
pub struct InterestRateInputs {
    pub general_account: [f64; 2],
    pub separate_account_gross: [f64; 2],
    pub separate_account_net: [f64; 2],
    pub honeymoon_value: [f64; 2],
    pub post_honeymoon: [f64; 2],
    pub guideline_rate_7702: f64,
    pub regular_loan_credited: f64,
    pub regular_loan_due: f64,
    pub preferred_loan_credited: f64,
    pub preferred_loan_due: f64,
}

/// The components a dynamic (asset-tiered) M&E re-derivation breaks the separate-account
/// monthly net rate into, so a ledger can show each piece rather than just the blended total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicSepAcctRate {
    pub monthly_net_rate: f64,
    pub mortality_and_expense: f64,
    pub investment_management_fee: f64,
    pub miscellaneous: f64,
    pub stable_value: f64,
}

/// A banded M&E schedule keyed by total case separate-account assets: as assets grow, the
/// effective M&E charge shrinks, the common "asset-tiered" pricing lever census runs need
/// (hence [`crate::census`] computing `assets` before crediting interest).
#[derive(Debug, Clone)]
pub struct MAndESchedule {
    pub cumulative_asset_limits: Vec<f64>,
    pub mortality_and_expense: Vec<f64>,
    pub investment_management_fee: f64,
    pub miscellaneous: f64,
    pub stable_value: f64,
}

impl MAndESchedule {
    pub fn dynamic_rate(&self, case_assets: f64, round_rate: RoundingRule) -> DynamicSepAcctRate {
        let me = banded_rate(case_assets, &self.cumulative_asset_limits, &self.mortality_and_expense)
            .unwrap_or(*self.mortality_and_expense.last().unwrap_or(&0.0));
        let annual_net = me + self.investment_management_fee + self.miscellaneous + self.stable_value;
        DynamicSepAcctRate {
            monthly_net_rate: monthly_equivalent(annual_net, round_rate),
            mortality_and_expense: me,
            investment_management_fee: self.investment_management_fee,
            miscellaneous: self.miscellaneous,
            stable_value: self.stable_value,
        }
    }
}

/// Pre-computed net/gross, annual/monthly interest rates, keyed by [`GenBasis`] (and, for the
/// separate account, also by [`SepBasis`]).
#[derive(Debug, Clone)]
pub struct InterestRates {
    general_account_annual: [f64; 3],
    general_account_monthly: [f64; 3],
    separate_account_gross_annual: [[f64; 3]; 3],
    separate_account_gross_monthly: [[f64; 3]; 3],
    separate_account_net_annual: [[f64; 3]; 3],
    separate_account_net_monthly: [[f64; 3]; 3],
    honeymoon_value_annual: [f64; 3],
    honeymoon_value_monthly: [f64; 3],
    post_honeymoon_annual: [f64; 3],
    post_honeymoon_monthly: [f64; 3],
    guideline_rate_7702_annual: f64,
    guideline_rate_7702_monthly: f64,
    regular_loan_credited_monthly: f64,
    regular_loan_due_monthly: f64,
    preferred_loan_credited_monthly: f64,
    preferred_loan_due_monthly: f64,
}

fn by_basis(current: f64, guaranteed: f64) -> [f64; 3] {
    [current, 0.5 * (current + guaranteed), guaranteed]
}

fn monthly_by_basis(annual: &[f64; 3], round_rate: RoundingRule) -> [f64; 3] {
    [
        monthly_equivalent(annual[0], round_rate),
        monthly_equivalent(annual[1], round_rate),
        monthly_equivalent(annual[2], round_rate),
    ]
}

impl InterestRates {
    /// Build the full basis x rate-period matrix from a product's annual current/guaranteed
    /// inputs. Applying a [`SepBasis`] to the separate-account *input* rate happens at the
    /// call site in [`InterestRates::separate_account_net_monthly`], not here: this matrix
    /// always stores the illustrated ("input") separate-account rate.
    pub fn new(inputs: &InterestRateInputs, round_rate: RoundingRule) -> InterestRates {
        let general_account_annual = by_basis(inputs.general_account[0], inputs.general_account[1]);
        let separate_account_gross_annual =
            by_basis(inputs.separate_account_gross[0], inputs.separate_account_gross[1]);
        let separate_account_net_annual =
            by_basis(inputs.separate_account_net[0], inputs.separate_account_net[1]);
        let honeymoon_value_annual = by_basis(inputs.honeymoon_value[0], inputs.honeymoon_value[1]);
        let post_honeymoon_annual = by_basis(inputs.post_honeymoon[0], inputs.post_honeymoon[1]);

        let sep_account_gross_by_sep_basis = |annual: [f64; 3]| -> [[f64; 3]; 3] {
            [
                annual,
                annual.map(|r| 0.5 * r),
                [0.0, 0.0, 0.0],
            ]
        };

        InterestRates {
            general_account_monthly: monthly_by_basis(&general_account_annual, round_rate),
            general_account_annual,
            separate_account_gross_monthly: sep_account_gross_by_sep_basis(separate_account_gross_annual)
                .map(|row| monthly_by_basis(&row, round_rate)),
            separate_account_gross_annual: sep_account_gross_by_sep_basis(separate_account_gross_annual),
            separate_account_net_monthly: sep_account_gross_by_sep_basis(separate_account_net_annual)
                .map(|row| monthly_by_basis(&row, round_rate)),
            separate_account_net_annual: sep_account_gross_by_sep_basis(separate_account_net_annual),
            honeymoon_value_monthly: monthly_by_basis(&honeymoon_value_annual, round_rate),
            honeymoon_value_annual,
            post_honeymoon_monthly: monthly_by_basis(&post_honeymoon_annual, round_rate),
            post_honeymoon_annual,
            guideline_rate_7702_annual: inputs.guideline_rate_7702,
            guideline_rate_7702_monthly: monthly_equivalent(inputs.guideline_rate_7702, round_rate),
            regular_loan_credited_monthly: monthly_equivalent(inputs.regular_loan_credited, round_rate),
            regular_loan_due_monthly: monthly_equivalent(inputs.regular_loan_due, round_rate),
            preferred_loan_credited_monthly: monthly_equivalent(inputs.preferred_loan_credited, round_rate),
            preferred_loan_due_monthly: monthly_equivalent(inputs.preferred_loan_due, round_rate),
        }
    }

    pub fn general_account_annual(&self, basis: GenBasis) -> f64 {
        self.general_account_annual[basis.index()]
    }
    pub fn general_account_monthly(&self, basis: GenBasis) -> f64 {
        self.general_account_monthly[basis.index()]
    }
    pub fn separate_account_gross_monthly(&self, gen: GenBasis, sep: SepBasis) -> f64 {
        self.separate_account_gross_monthly[sep.index()][gen.index()]
    }
    pub fn separate_account_net_monthly(&self, gen: GenBasis, sep: SepBasis) -> f64 {
        self.separate_account_net_monthly[sep.index()][gen.index()]
    }
    pub fn separate_account_net_annual(&self, gen: GenBasis, sep: SepBasis) -> f64 {
        self.separate_account_net_annual[sep.index()][gen.index()]
    }
    pub fn honeymoon_value_monthly(&self, basis: GenBasis) -> f64 {
        self.honeymoon_value_monthly[basis.index()]
    }
    pub fn post_honeymoon_monthly(&self, basis: GenBasis) -> f64 {
        self.post_honeymoon_monthly[basis.index()]
    }
    pub fn guideline_rate_7702_annual(&self) -> f64 {
        self.guideline_rate_7702_annual
    }
    pub fn guideline_rate_7702_monthly(&self) -> f64 {
        self.guideline_rate_7702_monthly
    }
    pub fn regular_loan_credited_monthly(&self) -> f64 {
        self.regular_loan_credited_monthly
    }
    pub fn regular_loan_due_monthly(&self) -> f64 {
        self.regular_loan_due_monthly
    }
    pub fn preferred_loan_credited_monthly(&self) -> f64 {
        self.preferred_loan_credited_monthly
    }
    pub fn preferred_loan_due_monthly(&self) -> f64 {
        self.preferred_loan_due_monthly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounding::RoundingStyle;
    use approx::assert_relative_eq;

    fn round_rate() -> RoundingRule {
        RoundingRule::new(10, RoundingStyle::ToNearest)
    }

    fn sample_inputs() -> InterestRateInputs {
        InterestRateInputs {
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
        }
    }

    #[test]
    fn monthly_rate_compounds_to_the_annual_rate() {
        let rates = InterestRates::new(&sample_inputs(), round_rate());
        let monthly = rates.general_account_monthly(GenBasis::Current);
        let compounded = (1.0 + monthly).powi(12) - 1.0;
        assert_relative_eq!(compounded, 0.04, epsilon = 1e-8);
    }

    #[test]
    fn midpoint_basis_is_the_mean_of_current_and_guaranteed() {
        let rates = InterestRates::new(&sample_inputs(), round_rate());
        assert_relative_eq!(
            rates.general_account_annual(GenBasis::Midpoint),
            0.5 * (0.04 + 0.03)
        );
    }

    #[test]
    fn sep_basis_zero_means_zero_rate() {
        let rates = InterestRates::new(&sample_inputs(), round_rate());
        assert_eq!(rates.separate_account_net_monthly(GenBasis::Current, SepBasis::Zero), 0.0);
        assert!(rates.separate_account_net_monthly(GenBasis::Current, SepBasis::Input) > 0.0);
    }

    #[test]
    fn dynamic_me_schedule_shrinks_with_assets() {
        let schedule = MAndESchedule {
            cumulative_asset_limits: vec![10_000_000.0, f64::INFINITY],
            mortality_and_expense: vec![0.0090, 0.0065],
            investment_management_fee: 0.0015,
            miscellaneous: 0.0002,
            stable_value: 0.0,
        };
        let small = schedule.dynamic_rate(1_000_000.0, round_rate());
        let large = schedule.dynamic_rate(50_000_000.0, round_rate());
        assert!(large.monthly_net_rate < small.monthly_net_rate);
        assert_relative_eq!(small.investment_management_fee, 0.0015);
    }
}
