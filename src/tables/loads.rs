//! Vectorized per-policy-year loads and expense charges, by general-account basis.
//!
//! Every load vector here has one entry per policy year (length = years to maturity). The
//! midpoint basis is always the arithmetic mean of current and guaranteed, never an
//! independently configured input -- that is true of every table keyed by [`GenBasis`] in
//! this crate, not just loads.

use crate::basis::GenBasis;
use crate::currency::Currency;
use crate::rounding::RoundingRule;

/// Per-year scalar load inputs, current and guaranteed only; midpoint is derived.
#[derive(Debug, Clone)]
pub struct LoadInputs {
    pub years: usize,
    pub refundable_sales_load_proportion: Vec<f64>,
    pub monthly_policy_fee: [Vec<Currency>; 2],
    pub annual_policy_fee: [Vec<Currency>; 2],
    pub specified_amount_load: [Vec<f64>; 2],
    pub separate_account_load: [Vec<f64>; 2],
    pub target_premium_load: [Vec<f64>; 2],
    pub excess_premium_load: [Vec<f64>; 2],
    pub target_sales_load: [Vec<f64>; 2],
    pub excess_sales_load: [Vec<f64>; 2],
    pub premium_tax_load: Vec<f64>,
    pub amortized_premium_tax_load: Vec<f64>,
    pub dac_tax_load: Vec<f64>,
    /// Premium-tax load bounds from the premium-tax engine, for 7702 corridor calculations
    /// that must use the most conservative rate rather than the one actually charged.
    pub maximum_premium_tax_load: f64,
    pub minimum_premium_tax_load: f64,
}

fn midpoint(current: &[f64], guaranteed: &[f64]) -> Vec<f64> {
    current
        .iter()
        .zip(guaranteed.iter())
        .map(|(c, g)| 0.5 * (c + g))
        .collect()
}

fn midpoint_currency(current: &[Currency], guaranteed: &[Currency]) -> Vec<Currency> {
    current
        .iter()
        .zip(guaranteed.iter())
        .map(|(c, g)| Currency::from_fraction(0.5 * (c.value() + g.value())).unwrap_or(Currency::ZERO))
        .collect()
}

fn sum(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b.iter()).map(|(x, y)| x + y).collect()
}

/// Per-policy-year load vectors, indexed by [`GenBasis`].
#[derive(Debug, Clone)]
pub struct Loads {
    refundable_sales_load_proportion: Vec<f64>,
    monthly_policy_fee: [Vec<Currency>; 3],
    annual_policy_fee: [Vec<Currency>; 3],
    specified_amount_load: [Vec<f64>; 3],
    separate_account_load: [Vec<f64>; 3],
    target_premium_load: [Vec<f64>; 3],
    excess_premium_load: [Vec<f64>; 3],
    target_sales_load: [Vec<f64>; 3],
    excess_sales_load: [Vec<f64>; 3],
    target_total_load: [Vec<f64>; 3],
    excess_total_load: [Vec<f64>; 3],

    premium_tax_load: Vec<f64>,
    amortized_premium_tax_load: Vec<f64>,
    dac_tax_load: Vec<f64>,

    target_premium_load_excluding_premium_tax: Vec<f64>,
    excess_premium_load_excluding_premium_tax: Vec<f64>,
    target_premium_load_maximum_premium_tax: Vec<f64>,
    excess_premium_load_maximum_premium_tax: Vec<f64>,
    target_premium_load_minimum_premium_tax: Vec<f64>,
    excess_premium_load_minimum_premium_tax: Vec<f64>,
}

impl Loads {
    pub fn new(inputs: &LoadInputs, round_policy_fee: RoundingRule) -> Loads {
        let n = inputs.years;
        let current = 0usize;
        let guaranteed = 1usize;

        let mp_fee = midpoint_currency(&inputs.monthly_policy_fee[current], &inputs.monthly_policy_fee[guaranteed])
            .into_iter()
            .map(|c| Currency::from_fraction(round_policy_fee.round(c.value())).unwrap_or(Currency::ZERO))
            .collect();
        let ap_fee = midpoint_currency(&inputs.annual_policy_fee[current], &inputs.annual_policy_fee[guaranteed])
            .into_iter()
            .map(|c| Currency::from_fraction(round_policy_fee.round(c.value())).unwrap_or(Currency::ZERO))
            .collect();

        let monthly_policy_fee = [
            inputs.monthly_policy_fee[current].clone(),
            mp_fee,
            inputs.monthly_policy_fee[guaranteed].clone(),
        ];
        let annual_policy_fee = [
            inputs.annual_policy_fee[current].clone(),
            ap_fee,
            inputs.annual_policy_fee[guaranteed].clone(),
        ];

        let by_basis = |cur: &[f64], gua: &[f64]| -> [Vec<f64>; 3] {
            [cur.to_vec(), midpoint(cur, gua), gua.to_vec()]
        };

        let specified_amount_load =
            by_basis(&inputs.specified_amount_load[current], &inputs.specified_amount_load[guaranteed]);
        let separate_account_load =
            by_basis(&inputs.separate_account_load[current], &inputs.separate_account_load[guaranteed]);
        let target_premium_load =
            by_basis(&inputs.target_premium_load[current], &inputs.target_premium_load[guaranteed]);
        let excess_premium_load =
            by_basis(&inputs.excess_premium_load[current], &inputs.excess_premium_load[guaranteed]);
        let target_sales_load =
            by_basis(&inputs.target_sales_load[current], &inputs.target_sales_load[guaranteed]);
        let excess_sales_load =
            by_basis(&inputs.excess_sales_load[current], &inputs.excess_sales_load[guaranteed]);

        let policy_and_tax = sum(&inputs.premium_tax_load, &inputs.dac_tax_load);
        let target_total_load = [
            sum(&sum(&target_premium_load[0], &target_sales_load[0]), &policy_and_tax),
            sum(&sum(&target_premium_load[1], &target_sales_load[1]), &policy_and_tax),
            sum(&sum(&target_premium_load[2], &target_sales_load[2]), &policy_and_tax),
        ];
        let excess_total_load = [
            sum(&sum(&excess_premium_load[0], &excess_sales_load[0]), &policy_and_tax),
            sum(&sum(&excess_premium_load[1], &excess_sales_load[1]), &policy_and_tax),
            sum(&sum(&excess_premium_load[2], &excess_sales_load[2]), &policy_and_tax),
        ];

        // The "_excluding_premium_tax" and "_{maximum,minimum}_premium_tax" variants exist
        // only on the current basis: 7702/7702A corridor and guideline-premium tests always
        // use the most conservative (i.e. current, not guaranteed) expense load, varying
        // only the premium-tax component to bound the guideline premium from above and below.
        let target_premium_load_excluding_premium_tax =
            sum(&target_premium_load[0], &vec![0.0; n])
                .iter()
                .zip(inputs.premium_tax_load.iter())
                .map(|(t, p)| t - p)
                .collect::<Vec<_>>();
        let excess_premium_load_excluding_premium_tax = excess_premium_load[0]
            .iter()
            .zip(inputs.premium_tax_load.iter())
            .map(|(t, p)| t - p)
            .collect::<Vec<_>>();

        let target_premium_load_maximum_premium_tax = target_premium_load_excluding_premium_tax
            .iter()
            .map(|t| t + inputs.maximum_premium_tax_load)
            .collect();
        let excess_premium_load_maximum_premium_tax = excess_premium_load_excluding_premium_tax
            .iter()
            .map(|t| t + inputs.maximum_premium_tax_load)
            .collect();
        let target_premium_load_minimum_premium_tax = target_premium_load_excluding_premium_tax
            .iter()
            .map(|t| t + inputs.minimum_premium_tax_load)
            .collect();
        let excess_premium_load_minimum_premium_tax = excess_premium_load_excluding_premium_tax
            .iter()
            .map(|t| t + inputs.minimum_premium_tax_load)
            .collect();

        Loads {
            refundable_sales_load_proportion: inputs.refundable_sales_load_proportion.clone(),
            monthly_policy_fee,
            annual_policy_fee,
            specified_amount_load,
            separate_account_load,
            target_premium_load,
            excess_premium_load,
            target_sales_load,
            excess_sales_load,
            target_total_load,
            excess_total_load,
            premium_tax_load: inputs.premium_tax_load.clone(),
            amortized_premium_tax_load: inputs.amortized_premium_tax_load.clone(),
            dac_tax_load: inputs.dac_tax_load.clone(),
            target_premium_load_excluding_premium_tax,
            excess_premium_load_excluding_premium_tax,
            target_premium_load_maximum_premium_tax,
            excess_premium_load_maximum_premium_tax,
            target_premium_load_minimum_premium_tax,
            excess_premium_load_minimum_premium_tax,
        }
    }

    pub fn refundable_sales_load_proportion(&self) -> &[f64] {
        &self.refundable_sales_load_proportion
    }
    pub fn monthly_policy_fee(&self, basis: GenBasis) -> &[Currency] {
        &self.monthly_policy_fee[basis.index()]
    }
    pub fn annual_policy_fee(&self, basis: GenBasis) -> &[Currency] {
        &self.annual_policy_fee[basis.index()]
    }
    pub fn specified_amount_load(&self, basis: GenBasis) -> &[f64] {
        &self.specified_amount_load[basis.index()]
    }
    pub fn separate_account_load(&self, basis: GenBasis) -> &[f64] {
        &self.separate_account_load[basis.index()]
    }
    pub fn target_premium_load(&self, basis: GenBasis) -> &[f64] {
        &self.target_premium_load[basis.index()]
    }
    pub fn excess_premium_load(&self, basis: GenBasis) -> &[f64] {
        &self.excess_premium_load[basis.index()]
    }
    pub fn target_sales_load(&self, basis: GenBasis) -> &[f64] {
        &self.target_sales_load[basis.index()]
    }
    pub fn excess_sales_load(&self, basis: GenBasis) -> &[f64] {
        &self.excess_sales_load[basis.index()]
    }
    pub fn target_total_load(&self, basis: GenBasis) -> &[f64] {
        &self.target_total_load[basis.index()]
    }
    pub fn excess_total_load(&self, basis: GenBasis) -> &[f64] {
        &self.excess_total_load[basis.index()]
    }
    pub fn premium_tax_load(&self) -> &[f64] {
        &self.premium_tax_load
    }
    pub fn amortized_premium_tax_load(&self) -> &[f64] {
        &self.amortized_premium_tax_load
    }
    pub fn dac_tax_load(&self) -> &[f64] {
        &self.dac_tax_load
    }
    pub fn target_premium_load_excluding_premium_tax(&self) -> &[f64] {
        &self.target_premium_load_excluding_premium_tax
    }
    pub fn excess_premium_load_excluding_premium_tax(&self) -> &[f64] {
        &self.excess_premium_load_excluding_premium_tax
    }
    pub fn target_premium_load_maximum_premium_tax(&self) -> &[f64] {
        &self.target_premium_load_maximum_premium_tax
    }
    pub fn excess_premium_load_maximum_premium_tax(&self) -> &[f64] {
        &self.excess_premium_load_maximum_premium_tax
    }
    pub fn target_premium_load_minimum_premium_tax(&self) -> &[f64] {
        &self.target_premium_load_minimum_premium_tax
    }
    pub fn excess_premium_load_minimum_premium_tax(&self) -> &[f64] {
        &self.excess_premium_load_minimum_premium_tax
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounding::RoundingStyle;

    fn sample_inputs() -> LoadInputs {
        let n = 3;
        LoadInputs {
            years: n,
            refundable_sales_load_proportion: vec![1.0; n],
            monthly_policy_fee: [vec![Currency::from_fraction(8.00).unwrap(); n], vec![Currency::from_fraction(10.00).unwrap(); n]],
            annual_policy_fee: [vec![Currency::ZERO; n], vec![Currency::ZERO; n]],
            specified_amount_load: [vec![0.0; n], vec![0.0; n]],
            separate_account_load: [vec![0.0; n], vec![0.0; n]],
            target_premium_load: [vec![0.05; n], vec![0.06; n]],
            excess_premium_load: [vec![0.02; n], vec![0.03; n]],
            target_sales_load: [vec![0.0; n], vec![0.0; n]],
            excess_sales_load: [vec![0.0; n], vec![0.0; n]],
            premium_tax_load: vec![0.02; n],
            amortized_premium_tax_load: vec![0.0; n],
            dac_tax_load: vec![0.005; n],
            maximum_premium_tax_load: 0.035,
            minimum_premium_tax_load: 0.0,
        }
    }

    #[test]
    fn midpoint_is_arithmetic_mean() {
        let inputs = sample_inputs();
        let loads = Loads::new(&inputs, RoundingRule::new(2, RoundingStyle::ToNearest));
        assert_eq!(loads.target_premium_load(GenBasis::Midpoint)[0], 0.055);
        assert_eq!(loads.monthly_policy_fee(GenBasis::Midpoint)[0], Currency::from_fraction(9.00).unwrap());
    }

    #[test]
    fn total_load_combines_premium_sales_and_tax_components() {
        let inputs = sample_inputs();
        let loads = Loads::new(&inputs, RoundingRule::new(2, RoundingStyle::ToNearest));
        let expected = 0.05 + 0.0 + 0.02 + 0.005;
        assert!((loads.target_total_load(GenBasis::Current)[0] - expected).abs() < 1e-9);
    }
}
