//! Mortality-derived rate tables (C7): cost-of-insurance, rider, and IRC-7702 rate vectors,
//! one entry per policy year, by [`GenBasis`].
//!
//! The source annual or monthly base rates (`q`) are combined with a substandard multiplier
//! and flat extra, capped at a maximum monthly rate, and (if the raw table is annual) converted
//! to monthly via the standard actuarial formula `1 - (1-q)^(1/12)` rather than simple division
//! by twelve -- the two differ materially at the high end of the mortality curve.

use crate::basis::GenBasis;
use crate::rounding::RoundingRule;

/// Whether a raw `q` vector from the product database is already monthly, or needs the
/// `1 - (1-q)^(1/12)` conversion applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawRatePeriod {
    Annual,
    Monthly,
}

/// One basis's (current/guaranteed; midpoint is their mean) raw COI inputs: up to three
/// specified-amount bands, a substandard multiplier, and a flat extra (always monthly, added
/// after the cap).
#[derive(Debug, Clone)]
pub struct CoiInputs {
    pub period: RawRatePeriod,
    /// `q` by band (band 0 is the lowest specamt band) and policy year.
    pub q_by_band: Vec<Vec<f64>>,
    pub substandard_multiplier: Vec<f64>,
    pub flat_extra_monthly: Vec<f64>,
    pub max_monthly_rate: f64,
}

fn coi_monthly_rate(inputs: &CoiInputs, band: usize, year: usize) -> f64 {
    let q = inputs.q_by_band[band][year];
    let mult = inputs.substandard_multiplier[year];
    let capped_annual_or_monthly = (q * mult).min(inputs.max_monthly_rate);
    let base = match inputs.period {
        RawRatePeriod::Annual => 1.0 - (1.0 - capped_annual_or_monthly).powf(1.0 / 12.0),
        RawRatePeriod::Monthly => capped_annual_or_monthly,
    };
    base + inputs.flat_extra_monthly[year]
}

/// Specified-amount bands a COI rate is selected by: `[0, band1)`, `[band1, band2)`, `[band2, inf)`.
#[derive(Debug, Clone, Copy)]
pub struct CoiBands {
    pub band1_limit: f64,
    pub band2_limit: f64,
}

impl CoiBands {
    fn select(&self, specamt: f64) -> usize {
        if specamt < self.band1_limit {
            0
        } else if specamt < self.band2_limit {
            1
        } else {
            2
        }
    }
}

/// Rider charge rate vectors: ADB, waiver of premium, children's term, spouse's term.
#[derive(Debug, Clone, Default)]
pub struct RiderRates {
    pub adb: Vec<f64>,
    pub waiver_of_premium: Vec<f64>,
    pub children_term: Vec<f64>,
    pub spouse_term: Vec<f64>,
}

/// Per-basis, per-year mortality-derived rate vectors (C7): COI, riders, and the IRC-7702
/// rate family (guideline `q`, CVAT corridor factor, CVAT net single premium, 7-pay rate).
#[derive(Debug, Clone)]
pub struct MortalityRates {
    years: usize,
    bands: CoiBands,
    coi_monthly: [Vec<Vec<f64>>; 3],
    riders: [RiderRates; 3],
    guideline_q_7702: Vec<f64>,
    cvat_corridor_factor: Vec<f64>,
    cvat_nsp: Vec<f64>,
    seven_pay_rate: Vec<f64>,
}

fn mean_vec(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b.iter()).map(|(x, y)| 0.5 * (x + y)).collect()
}

fn mean_rider(a: &RiderRates, b: &RiderRates) -> RiderRates {
    RiderRates {
        adb: mean_vec(&a.adb, &b.adb),
        waiver_of_premium: mean_vec(&a.waiver_of_premium, &b.waiver_of_premium),
        children_term: mean_vec(&a.children_term, &b.children_term),
        spouse_term: mean_vec(&a.spouse_term, &b.spouse_term),
    }
}

impl MortalityRates {
    pub fn new(
        years: usize,
        bands: CoiBands,
        current: &CoiInputs,
        guaranteed: &CoiInputs,
        riders_current: RiderRates,
        riders_guaranteed: RiderRates,
        guideline_q_7702: Vec<f64>,
        cvat_corridor_factor: Vec<f64>,
        cvat_nsp: Vec<f64>,
        seven_pay_rate: Vec<f64>,
        round_coi: RoundingRule,
    ) -> MortalityRates {
        let band_count = current.q_by_band.len();
        let monthly = |inputs: &CoiInputs| -> Vec<Vec<f64>> {
            (0..band_count)
                .map(|band| (0..years).map(|y| round_coi.round(coi_monthly_rate(inputs, band, y))).collect())
                .collect()
        };
        let current_monthly = monthly(current);
        let guaranteed_monthly = monthly(guaranteed);
        let midpoint_monthly: Vec<Vec<f64>> = (0..band_count)
            .map(|band| mean_vec(&current_monthly[band], &guaranteed_monthly[band]))
            .collect();
        let riders_midpoint = mean_rider(&riders_current, &riders_guaranteed);

        MortalityRates {
            years,
            bands,
            coi_monthly: [current_monthly, midpoint_monthly, guaranteed_monthly],
            riders: [riders_current, riders_midpoint, riders_guaranteed],
            guideline_q_7702,
            cvat_corridor_factor,
            cvat_nsp,
            seven_pay_rate,
        }
    }

    pub fn years(&self) -> usize {
        self.years
    }

    /// Monthly COI rate for policy year `year` (0-indexed), selected by `specamt`'s band.
    pub fn coi_monthly_rate(&self, basis: GenBasis, year: usize, specamt: f64) -> f64 {
        self.coi_monthly[basis.index()][self.bands.select(specamt)][year]
    }

    pub fn riders(&self, basis: GenBasis) -> &RiderRates {
        &self.riders[basis.index()]
    }

    pub fn guideline_q_7702(&self, year: usize) -> f64 {
        self.guideline_q_7702[year]
    }

    pub fn cvat_corridor_factor(&self, attained_age: usize) -> f64 {
        let idx = attained_age.min(self.cvat_corridor_factor.len() - 1);
        self.cvat_corridor_factor[idx]
    }

    pub fn cvat_nsp(&self, attained_age: usize) -> f64 {
        let idx = attained_age.min(self.cvat_nsp.len() - 1);
        self.cvat_nsp[idx]
    }

    pub fn seven_pay_rate(&self, year: usize) -> f64 {
        self.seven_pay_rate[year]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounding::RoundingStyle;
    use approx::assert_relative_eq;

    fn bands() -> CoiBands {
        CoiBands { band1_limit: 100_000.0, band2_limit: 1_000_000.0 }
    }

    fn inputs(q: f64) -> CoiInputs {
        CoiInputs {
            period: RawRatePeriod::Annual,
            q_by_band: vec![vec![q; 5], vec![q * 0.9; 5], vec![q * 0.8; 5]],
            substandard_multiplier: vec![1.0; 5],
            flat_extra_monthly: vec![0.0; 5],
            max_monthly_rate: 0.08333,
        }
    }

    #[test]
    fn annual_to_monthly_conversion_is_not_simple_division() {
        let round = RoundingRule::new(8, RoundingStyle::ToNearest);
        let rates = MortalityRates::new(
            5,
            bands(),
            &inputs(0.01),
            &inputs(0.02),
            RiderRates::default(),
            RiderRates::default(),
            vec![0.0; 5],
            vec![1.0; 5],
            vec![0.0; 5],
            vec![0.0; 5],
            round,
        );
        let monthly = rates.coi_monthly_rate(GenBasis::Current, 0, 50_000.0);
        assert!(monthly < 0.01 / 12.0);
        assert_relative_eq!(monthly, 1.0 - (1.0 - 0.01f64).powf(1.0 / 12.0), epsilon = 1e-6);
    }

    #[test]
    fn band_selection_picks_the_right_bracket() {
        let round = RoundingRule::new(8, RoundingStyle::ToNearest);
        let rates = MortalityRates::new(
            5,
            bands(),
            &inputs(0.01),
            &inputs(0.02),
            RiderRates::default(),
            RiderRates::default(),
            vec![0.0; 5],
            vec![1.0; 5],
            vec![0.0; 5],
            vec![0.0; 5],
            round,
        );
        let low = rates.coi_monthly_rate(GenBasis::Current, 0, 50_000.0);
        let mid = rates.coi_monthly_rate(GenBasis::Current, 0, 500_000.0);
        let high = rates.coi_monthly_rate(GenBasis::Current, 0, 5_000_000.0);
        assert!(low > mid);
        assert!(mid > high);
    }

    #[test]
    fn midpoint_is_mean_of_current_and_guaranteed() {
        let round = RoundingRule::new(10, RoundingStyle::ToNearest);
        let rates = MortalityRates::new(
            5,
            bands(),
            &inputs(0.01),
            &inputs(0.02),
            RiderRates::default(),
            RiderRates::default(),
            vec![0.0; 5],
            vec![1.0; 5],
            vec![0.0; 5],
            vec![0.0; 5],
            round,
        );
        let current = rates.coi_monthly_rate(GenBasis::Current, 0, 50_000.0);
        let guaranteed = rates.coi_monthly_rate(GenBasis::Guaranteed, 0, 50_000.0);
        let midpoint = rates.coi_monthly_rate(GenBasis::Midpoint, 0, 50_000.0);
        assert_relative_eq!(midpoint, 0.5 * (current + guaranteed), epsilon = 1e-12);
    }
}
