//! Ledger sinks (C15): the output-only record a basis-run writes into and a census driver
//! accumulates across cells. `LedgerInvariant` holds the one basis-independent time series per
//! cell (payments, specamt, dates); `LedgerVariant` holds one basis-dependent time series per
//! (cell, basis) pair. Neither type computes anything; both are write targets for
//! [`crate::account_value`] and read targets for a caller that wants to format or print a run.
//! `PlusEq` accumulates a cell's ledger into a census-wide composite the way the teacher's
//! `ProjectionResult` accumulates per-policy rows into `AggregatedRow` (see `bin/run_block.rs`).

use crate::basis::GenBasis;
use crate::currency::Currency;

fn sum_vecs(a: &mut [Currency], b: &[Currency]) {
    for (x, y) in a.iter_mut().zip(b.iter()) {
        *x += *y;
    }
}

/// Basis-independent per-year output (C15, §6 "LedgerInvariant"). One instance per cell,
/// shared by every basis that cell is run on.
#[derive(Debug, Clone)]
pub struct LedgerInvariant {
    pub issue_age: u32,
    pub issue_date_jdn: i64,
    pub is_mec: bool,
    pub mec_year: Option<usize>,
    pub mec_month: Option<usize>,

    pub specamt: Vec<Currency>,
    pub term_specamt: Vec<Currency>,
    pub ee_payment: Vec<Currency>,
    pub er_payment: Vec<Currency>,
    pub withdrawal: Vec<Currency>,
    pub loan: Vec<Currency>,
    pub outlay: Vec<Currency>,
    pub gpt_forceout: Vec<Currency>,
    pub producer_compensation: Vec<Currency>,
    /// Cumulative premium paid less nontaxable (basis-recovery) withdrawals, the proxy for
    /// "investment in the contract" a tax-basis solve target or 1099-R calculation needs.
    /// Basis-independent: it depends only on payments and withdrawals, never on interest.
    pub tax_basis: Vec<Currency>,

    pub product_name: String,
    pub insured_name: String,
}

impl LedgerInvariant {
    pub fn new(years: usize, issue_age: u32, issue_date_jdn: i64) -> LedgerInvariant {
        LedgerInvariant {
            issue_age,
            issue_date_jdn,
            is_mec: false,
            mec_year: None,
            mec_month: None,
            specamt: vec![Currency::ZERO; years],
            term_specamt: vec![Currency::ZERO; years],
            ee_payment: vec![Currency::ZERO; years],
            er_payment: vec![Currency::ZERO; years],
            withdrawal: vec![Currency::ZERO; years],
            loan: vec![Currency::ZERO; years],
            outlay: vec![Currency::ZERO; years],
            gpt_forceout: vec![Currency::ZERO; years],
            producer_compensation: vec![Currency::ZERO; years],
            tax_basis: vec![Currency::ZERO; years],
            product_name: String::new(),
            insured_name: String::new(),
        }
    }

    pub fn years(&self) -> usize {
        self.specamt.len()
    }

    /// Accumulate `addend` into `self`, the way a census composite absorbs one more cell.
    /// Scalars that don't make sense to sum across lives (issue age, MEC status) are left as
    /// the receiver's own value; `is_mec` becomes true if any life in the composite is a MEC.
    pub fn plus_eq(&mut self, addend: &LedgerInvariant) {
        sum_vecs(&mut self.specamt, &addend.specamt);
        sum_vecs(&mut self.term_specamt, &addend.term_specamt);
        sum_vecs(&mut self.ee_payment, &addend.ee_payment);
        sum_vecs(&mut self.er_payment, &addend.er_payment);
        sum_vecs(&mut self.withdrawal, &addend.withdrawal);
        sum_vecs(&mut self.loan, &addend.loan);
        sum_vecs(&mut self.outlay, &addend.outlay);
        sum_vecs(&mut self.gpt_forceout, &addend.gpt_forceout);
        sum_vecs(&mut self.producer_compensation, &addend.producer_compensation);
        sum_vecs(&mut self.tax_basis, &addend.tax_basis);
        self.is_mec = self.is_mec || addend.is_mec;
    }
}

/// Basis-dependent per-year output (C15, §6 "LedgerVariant"). One instance per (cell, basis).
#[derive(Debug, Clone)]
pub struct LedgerVariant {
    pub basis: GenBasis,

    // BOY vectors.
    pub coi_charge: Vec<Currency>,
    pub rider_charge: Vec<Currency>,
    pub policy_fee: Vec<Currency>,
    pub sales_load: Vec<Currency>,
    pub premium_load: Vec<Currency>,
    pub dac_tax_load: Vec<Currency>,
    pub sep_acct_load: Vec<Currency>,
    pub interest_credited_net: Vec<Currency>,
    pub interest_credited_gross: Vec<Currency>,
    pub loan_interest_accrued: Vec<Currency>,
    pub claims: Vec<Currency>,

    // EOY vectors.
    /// Total account value: `av_gen + av_sep + av_reg_ln + av_prf_ln`.
    pub account_value: Vec<Currency>,
    pub av_gen: Vec<Currency>,
    pub av_sep: Vec<Currency>,
    /// Account value backing a regular loan, credited at `regular_loan_credited_monthly`.
    pub av_reg_ln: Vec<Currency>,
    /// Account value backing a preferred loan, credited at `preferred_loan_credited_monthly`.
    pub av_prf_ln: Vec<Currency>,
    pub csv: Vec<Currency>,
    pub cv_7702: Vec<Currency>,
    pub death_benefit: Vec<Currency>,
    /// Regular loan principal, accruing at `regular_loan_due_monthly`.
    pub reg_loan_balance: Vec<Currency>,
    /// Preferred loan principal, accruing at `preferred_loan_due_monthly`.
    pub prf_loan_balance: Vec<Currency>,
    pub term_purchased: Vec<Currency>,
    pub base_death_benefit: Vec<Currency>,
    /// Any positive excess of loan requested over loan actually available this year, the
    /// solver's "greatest loan ullage" input (see `account_value::MonthlyEngine::run`).
    pub loan_ullage: Vec<Currency>,
    /// As `loan_ullage`, for withdrawals.
    pub withdrawal_ullage: Vec<Currency>,

    // Annual rate vectors.
    pub general_account_rate: Vec<f64>,
    pub separate_account_net_rate: Vec<f64>,

    pub lapse_year: Option<usize>,
    pub lapse_month: Option<usize>,
    pub init_ann_loan_cred_rate: f64,
    pub init_ann_gen_acct_int: f64,
    pub init_ann_sep_acct_gross_int: f64,
    pub init_ann_sep_acct_net_int: f64,
    pub init_tgt_prem_hi_load_rate: f64,
    pub init_mly_pol_fee: Currency,
}

impl LedgerVariant {
    pub fn new(years: usize, basis: GenBasis) -> LedgerVariant {
        LedgerVariant {
            basis,
            coi_charge: vec![Currency::ZERO; years],
            rider_charge: vec![Currency::ZERO; years],
            policy_fee: vec![Currency::ZERO; years],
            sales_load: vec![Currency::ZERO; years],
            premium_load: vec![Currency::ZERO; years],
            dac_tax_load: vec![Currency::ZERO; years],
            sep_acct_load: vec![Currency::ZERO; years],
            interest_credited_net: vec![Currency::ZERO; years],
            interest_credited_gross: vec![Currency::ZERO; years],
            loan_interest_accrued: vec![Currency::ZERO; years],
            claims: vec![Currency::ZERO; years],
            account_value: vec![Currency::ZERO; years],
            av_gen: vec![Currency::ZERO; years],
            av_sep: vec![Currency::ZERO; years],
            av_reg_ln: vec![Currency::ZERO; years],
            av_prf_ln: vec![Currency::ZERO; years],
            csv: vec![Currency::ZERO; years],
            cv_7702: vec![Currency::ZERO; years],
            death_benefit: vec![Currency::ZERO; years],
            reg_loan_balance: vec![Currency::ZERO; years],
            prf_loan_balance: vec![Currency::ZERO; years],
            term_purchased: vec![Currency::ZERO; years],
            base_death_benefit: vec![Currency::ZERO; years],
            loan_ullage: vec![Currency::ZERO; years],
            withdrawal_ullage: vec![Currency::ZERO; years],
            general_account_rate: vec![0.0; years],
            separate_account_net_rate: vec![0.0; years],
            lapse_year: None,
            lapse_month: None,
            init_ann_loan_cred_rate: 0.0,
            init_ann_gen_acct_int: 0.0,
            init_ann_sep_acct_gross_int: 0.0,
            init_ann_sep_acct_net_int: 0.0,
            init_tgt_prem_hi_load_rate: 0.0,
            init_mly_pol_fee: Currency::ZERO,
        }
    }

    pub fn years(&self) -> usize {
        self.account_value.len()
    }

    pub fn plus_eq(&mut self, addend: &LedgerVariant) {
        sum_vecs(&mut self.coi_charge, &addend.coi_charge);
        sum_vecs(&mut self.rider_charge, &addend.rider_charge);
        sum_vecs(&mut self.policy_fee, &addend.policy_fee);
        sum_vecs(&mut self.sales_load, &addend.sales_load);
        sum_vecs(&mut self.premium_load, &addend.premium_load);
        sum_vecs(&mut self.dac_tax_load, &addend.dac_tax_load);
        sum_vecs(&mut self.sep_acct_load, &addend.sep_acct_load);
        sum_vecs(&mut self.interest_credited_net, &addend.interest_credited_net);
        sum_vecs(&mut self.interest_credited_gross, &addend.interest_credited_gross);
        sum_vecs(&mut self.loan_interest_accrued, &addend.loan_interest_accrued);
        sum_vecs(&mut self.claims, &addend.claims);
        sum_vecs(&mut self.account_value, &addend.account_value);
        sum_vecs(&mut self.av_gen, &addend.av_gen);
        sum_vecs(&mut self.av_sep, &addend.av_sep);
        sum_vecs(&mut self.av_reg_ln, &addend.av_reg_ln);
        sum_vecs(&mut self.av_prf_ln, &addend.av_prf_ln);
        sum_vecs(&mut self.csv, &addend.csv);
        sum_vecs(&mut self.cv_7702, &addend.cv_7702);
        sum_vecs(&mut self.death_benefit, &addend.death_benefit);
        sum_vecs(&mut self.reg_loan_balance, &addend.reg_loan_balance);
        sum_vecs(&mut self.prf_loan_balance, &addend.prf_loan_balance);
        sum_vecs(&mut self.term_purchased, &addend.term_purchased);
        sum_vecs(&mut self.base_death_benefit, &addend.base_death_benefit);
        sum_vecs(&mut self.loan_ullage, &addend.loan_ullage);
        sum_vecs(&mut self.withdrawal_ullage, &addend.withdrawal_ullage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_eq_sums_elementwise() {
        let mut composite = LedgerInvariant::new(3, 0, 0);
        let mut cell = LedgerInvariant::new(3, 35, 0);
        cell.specamt = vec![Currency::from_fraction(100.0).unwrap(); 3];
        composite.plus_eq(&cell);
        composite.plus_eq(&cell);
        assert_eq!(composite.specamt[0], Currency::from_fraction(200.0).unwrap());
    }

    #[test]
    fn is_mec_propagates_as_true_once_any_addend_is_a_mec() {
        let mut composite = LedgerInvariant::new(1, 0, 0);
        let mut cell = LedgerInvariant::new(1, 0, 0);
        cell.is_mec = true;
        composite.plus_eq(&cell);
        assert!(composite.is_mec);
    }

    #[test]
    fn variant_plus_eq_sums_account_value() {
        let mut composite = LedgerVariant::new(2, GenBasis::Current);
        let mut cell = LedgerVariant::new(2, GenBasis::Current);
        cell.account_value = vec![Currency::from_fraction(1000.0).unwrap(); 2];
        composite.plus_eq(&cell);
        assert_eq!(composite.account_value[0], Currency::from_fraction(1000.0).unwrap());
    }
}
