//! IRC section 7702 (guideline premium / cash value accumulation) and section 7702A
//! (seven-pay / modified-endowment-contract) tax-qualification machinery (C10).
//!
//! GPT and CVAT are the two elections a contract can make under section 7702 for what
//! "life insurance" means; a contract must satisfy whichever one it elected at every month
//! or it loses its tax-favored status. Section 7702A is a separate, always-on test (applies
//! regardless of the 7702 election) for whether the contract has become a modified endowment
//! contract (MEC) by being funded too quickly.

use crate::currency::Currency;

/// Which section-7702 definition of life insurance a contract elected at issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionOfLifeInsurance {
    /// Guideline premium test: limits cumulative premium (single and level guidelines).
    Gpt,
    /// Cash value accumulation test: limits the ratio of AV to death benefit (corridor).
    Cvat,
}

/// A simplified net-single-premium insurance factor per $1 of specified amount, computed from
/// a flat-mortality/flat-interest approximation to the standard actuarial reserve formula.
/// This crate does not reproduce the IRS's full prescribed mortality/interest tables (out of
/// scope, per spec 4.10's silence on the exact basis); the shape -- level premium per $1,
/// decreasing in a level death benefit as the insured ages -- is what the monthly engine's
/// corridor and forceout logic actually depends on.
fn term_insurance_factor(ages_to_maturity: &[f64], monthly_interest: f64) -> (f64, f64) {
    let v = 1.0 / (1.0 + monthly_interest);
    let mut tpx = 1.0;
    let mut nsp = 0.0;
    let mut annuity_due = 0.0;
    let mut discount = 1.0;
    for &qx in ages_to_maturity {
        annuity_due += tpx * discount;
        nsp += tpx * qx * discount * v;
        tpx *= 1.0 - qx;
        discount *= v;
    }
    (nsp, annuity_due)
}

/// Per-issue-age guideline single/level premium factors (per $1 of specamt), and the running
/// GPT state (C10): guideline limits, cumulative necessary/unnecessary premium, and any
/// forceout produced by a specamt/option/rider change or an overpayment.
#[derive(Debug, Clone)]
pub struct GuidelinePremiumTest {
    guideline_single_premium: Currency,
    guideline_level_premium: Currency,
    cumulative_necessary_premium: Currency,
    cumulative_unnecessary_premium: Currency,
}

impl GuidelinePremiumTest {
    /// Derive GLP/GSP per $1 of specamt from monthly 7702-guideline mortality (`q` by
    /// remaining year) and the monthly guideline interest rate, then scale by `specamt`.
    pub fn new(specamt: Currency, monthly_q_7702: &[f64], monthly_guideline_rate: f64) -> GuidelinePremiumTest {
        let (nsp_factor, annuity_due_factor) = term_insurance_factor(monthly_q_7702, monthly_guideline_rate);
        let glp_factor = if annuity_due_factor > 0.0 { nsp_factor / annuity_due_factor } else { nsp_factor };
        GuidelinePremiumTest {
            guideline_single_premium: Currency::from_fraction(nsp_factor * specamt.value()).unwrap_or(Currency::ZERO),
            guideline_level_premium: Currency::from_fraction(glp_factor * 12.0 * specamt.value()).unwrap_or(Currency::ZERO),
            cumulative_necessary_premium: Currency::ZERO,
            cumulative_unnecessary_premium: Currency::ZERO,
        }
    }

    pub fn guideline_single_premium(&self) -> Currency {
        self.guideline_single_premium
    }

    pub fn guideline_level_premium(&self) -> Currency {
        self.guideline_level_premium
    }

    /// Recompute GLP/GSP after a specamt, death-benefit-option, or rider-set change (the three
    /// events section 7702 treats as a "material change" to guideline limits, distinct from
    /// section 7702A's own material-change trigger for the seven-pay test).
    pub fn recompute(&mut self, specamt: Currency, monthly_q_7702: &[f64], monthly_guideline_rate: f64) {
        let refreshed = GuidelinePremiumTest::new(specamt, monthly_q_7702, monthly_guideline_rate);
        self.guideline_single_premium = refreshed.guideline_single_premium;
        self.guideline_level_premium = refreshed.guideline_level_premium;
    }

    /// Recognize a payment against the guideline limits; returns the forceout amount (zero if
    /// none) by which cumulative premium paid to date exceeds the greater of GSP or the
    /// to-date sum of GLP. `cumulative_premium_to_date` includes this payment.
    pub fn recognize_payment(&mut self, payment: Currency, cumulative_premium_to_date: Currency, policy_year: usize) -> Currency {
        let glp_limit_to_date = self
            .guideline_level_premium
            .checked_mul_int(policy_year as i64 + 1)
            .unwrap_or(Currency::ZERO);
        let limit = self.guideline_single_premium.max(glp_limit_to_date);
        let excess = (cumulative_premium_to_date - limit).max(Currency::ZERO);
        let forceout = excess.min(payment);
        if forceout > Currency::ZERO {
            self.cumulative_unnecessary_premium += forceout;
        }
        self.cumulative_necessary_premium += payment - forceout;
        forceout
    }
}

/// Section 7702A seven-pay / MEC test state (C10). `deemed_cash_value` is a parallel
/// accumulation using the 7702A-prescribed (not the contract's current) interest and COI
/// rates, per spec's DCV rows; it floors at zero.
#[derive(Debug, Clone)]
pub struct SevenPayTest {
    seven_pay_annual_premium: Currency,
    test_start_year: usize,
    cumulative_premium_since_test_start: Currency,
    is_mec: bool,
    mec_year: Option<usize>,
    mec_month: Option<usize>,
    deemed_cash_value: Currency,
}

const SEVEN_PAY_WINDOW_YEARS: usize = 7;

impl SevenPayTest {
    pub fn new(seven_pay_annual_premium: Currency, test_start_year: usize) -> SevenPayTest {
        SevenPayTest {
            seven_pay_annual_premium,
            test_start_year,
            cumulative_premium_since_test_start: Currency::ZERO,
            is_mec: false,
            mec_year: None,
            mec_month: None,
            deemed_cash_value: Currency::ZERO,
        }
    }

    pub fn is_mec(&self) -> bool {
        self.is_mec
    }

    pub fn mec_year(&self) -> Option<usize> {
        self.mec_year
    }

    pub fn mec_month(&self) -> Option<usize> {
        self.mec_month
    }

    pub fn deemed_cash_value(&self) -> Currency {
        self.deemed_cash_value
    }

    /// A material change (specamt increase not attributable to guideline-rate dynamics, most
    /// commonly) restarts the seven-pay window and redefines the seven-pay premium; prior MEC
    /// status is never reversed (a contract, once a MEC, stays a MEC).
    pub fn material_change(&mut self, new_seven_pay_annual_premium: Currency, restart_year: usize) {
        self.seven_pay_annual_premium = new_seven_pay_annual_premium;
        self.test_start_year = restart_year;
        self.cumulative_premium_since_test_start = Currency::ZERO;
    }

    /// Recognize one month's *necessary* premium (7702-limited, not the raw requested amount)
    /// against the rolling seven-pay window; only within the first 7 years of the current
    /// test window can cumulative premium trip the MEC threshold.
    pub fn recognize_payment(&mut self, policy_year: usize, policy_month: usize, necessary_premium: Currency) {
        self.cumulative_premium_since_test_start += necessary_premium;
        if self.is_mec {
            return;
        }
        let years_into_window = policy_year.saturating_sub(self.test_start_year);
        if years_into_window >= SEVEN_PAY_WINDOW_YEARS {
            return;
        }
        let threshold = self
            .seven_pay_annual_premium
            .checked_mul_int(SEVEN_PAY_WINDOW_YEARS as i64)
            .unwrap_or(Currency::ZERO);
        if self.cumulative_premium_since_test_start > threshold {
            self.is_mec = true;
            self.mec_year = Some(policy_year);
            self.mec_month = Some(policy_month);
        }
    }

    pub fn credit_dcv_interest(&mut self, monthly_rate: f64) {
        self.deemed_cash_value =
            Currency::from_fraction(self.deemed_cash_value.value() * (1.0 + monthly_rate)).unwrap_or(self.deemed_cash_value);
    }

    pub fn add_dcv_premium(&mut self, premium: Currency) {
        self.deemed_cash_value += premium;
    }

    pub fn deduct_dcv_coi(&mut self, coi_charge: Currency) {
        self.deemed_cash_value = (self.deemed_cash_value - coi_charge).max(Currency::ZERO);
    }
}
