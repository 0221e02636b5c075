//! The monthiversary account-value engine (C11): the monthly transaction sequence that turns
//! an [`Input`] and a [`ProductDatabase`] into a year-by-year [`LedgerInvariant`]/
//! [`LedgerVariant`] pair, for one interest [`Basis`].
//!
//! The transaction order below follows `AccountValue`'s monthly loop in `account_value.hpp`/
//! `ihs_avmly.cpp`: exchange/1035 credit, specified-amount and option changes, GPT testing and
//! payment recognition, accepting the payment, snapshotting BOM account value, setting the
//! term amount and death benefit, charging COI and rider deductions, crediting interest,
//! taking any separate-account load, accruing loan interest, processing withdrawals and new
//! loans, and finally testing for lapse. Several steps the original splits into their own
//! named `Tx*` method are folded together here where no caller needs to observe the
//! intermediate state (`TxLoanRepay`/`TxCapitalizeLoan` are folded into the loan-interest step
//! below: this crate's `Input` has no scheduled-repayment or annual-capitalization election,
//! so accrued loan interest simply stays capitalized onto principal every month rather than
//! once a year).
//!
//! Loans split into a regular and a preferred bucket (`AV_regLn`/`RegLnBal` and
//! `AV_prfLn`/`PrfLnBal`), each with its own credited/due rate pair (see
//! `tables::interest::InterestRates`); [`Input::loan_is_preferred`] elects which bucket a
//! cell's loan draws land in for its whole duration.

use crate::basis::{GenBasis, SepBasis};
use crate::currency::Currency;
use crate::death_benefit::{death_benefit, DeathBenefits};
use crate::error::LmiError;
use crate::input::{Input, SolveTarget, SolveType};
use crate::ledger::{LedgerInvariant, LedgerVariant};
use crate::outlay::Outlay;
use crate::rounding::RoundingRule;
use crate::stratified::progressively_reduce;
use crate::strategy::{
    self, gpt_factors_per_dollar_specamt, resolve_payment, resolve_specamt, PaymentStrategyContext,
    SpecAmtStrategyContext,
};
use crate::tables::interest::InterestRates;
use crate::tables::mortality::MortalityRates;
use crate::tables::premium_tax::PremiumTaxEngine;
use crate::tables::product::ProductDatabase;
use crate::tax_qualification::{DefinitionOfLifeInsurance, GuidelinePremiumTest, SevenPayTest};
use std::ops::Range;
use std::sync::Arc;

/// The pair of rate assumptions a single projection run is computed under: a general-account
/// basis and, independently, a separate-account basis (see `basis.rs`).
#[derive(Debug, Clone, Copy)]
pub struct Basis {
    pub gen: GenBasis,
    pub sep: SepBasis,
}

/// The monthly account-value engine for one cell and one [`Basis`] (C11). Built once per
/// (cell, basis) pair; [`MonthlyEngine::run`] consumes it and produces the ledger pair.
pub struct MonthlyEngine {
    input: Input,
    db: Arc<ProductDatabase>,
    basis: Basis,
    interest: InterestRates,
    mortality: MortalityRates,
    loads: crate::tables::loads::Loads,
    premium_tax: PremiumTaxEngine,
    death_benefits: DeathBenefits,
    outlay: Outlay,
    /// A candidate value the solver (C13) substitutes for the quantity named by
    /// `Input::solve_type`, across `Input::solve_begin_year..solve_end_year`. `None` means this
    /// is a plain illustration, not a solve iteration.
    override_value: Option<Currency>,
    /// One already-monthly separate-account net rate per policy year, supplied by the census
    /// driver (C14) after its asset-tiered M&E re-pricing pass. `None` uses this basis's static
    /// database rate every month, the plain single-cell behavior.
    dynamic_sep_acct_monthly_rate: Option<Vec<f64>>,
}

impl MonthlyEngine {
    pub fn new(input: &Input, db: Arc<ProductDatabase>, basis: Basis) -> Result<MonthlyEngine, LmiError> {
        let years = input.years_to_maturity;
        let interest = InterestRates::new(&db.interest_inputs, db.round_rate());
        let mortality = MortalityRates::new(
            years,
            db.coi_bands,
            &db.coi_current,
            &db.coi_guaranteed,
            db.riders_current.clone(),
            db.riders_guaranteed.clone(),
            db.guideline_q_7702.clone(),
            db.cvat_corridor_factor.clone(),
            db.cvat_nsp.clone(),
            db.seven_pay_rate.clone(),
            db.round_coi(),
        );
        let loads = crate::tables::loads::Loads::new(&db.load_inputs, db.rounding.round_net_premium);

        let tax_state_facts = db.states.get(&input.tax_state).copied().ok_or_else(|| {
            LmiError::Configuration(format!("no premium-tax facts configured for state {}", input.tax_state))
        })?;
        let domiciliary_facts = db.states.get(&input.domicile).copied().ok_or_else(|| {
            LmiError::Configuration(format!("no premium-tax facts configured for state {}", input.domicile))
        })?;
        let premium_tax = PremiumTaxEngine::new(
            input.tax_state,
            input.domicile,
            db.amortize_premium_tax_load,
            db.premium_tax_load_varies_by_state,
            db.premium_tax_load_is_levy_rate,
            tax_state_facts,
            domiciliary_facts,
            &db.tiered_charges,
        )?;

        let death_benefits = DeathBenefits::new(years, input.initial_specamt, input.initial_death_benefit_option);

        let mut outlay = Outlay::new(years);
        outlay.employee.set_modal_premium_range(0, years, input.initial_employee_premium)?;
        outlay.employee.set_mode_range(0, years, input.payment_mode)?;
        outlay.employer.set_modal_premium_range(0, years, input.initial_employer_premium)?;
        outlay.employer.set_mode_range(0, years, input.payment_mode)?;
        outlay.set_withdrawal_range(input.withdrawal_begin_year.min(years), years, input.annual_withdrawal)?;
        outlay.set_loan_range(input.loan_begin_year.min(years), years, input.annual_loan)?;

        Ok(MonthlyEngine {
            input: input.clone(),
            db,
            basis,
            interest,
            mortality,
            loads,
            premium_tax,
            death_benefits,
            outlay,
            override_value: None,
            dynamic_sep_acct_monthly_rate: None,
        })
    }

    /// Install a candidate value for this cell's solved-for quantity (C13's `SolveSetSpecAmt`/
    /// `SolveSetEePrem`/.../`SolveSetWD`, collapsed to one setter since `Input::solve_type`
    /// already names which quantity it replaces).
    pub fn set_override(&mut self, value: Currency) {
        self.override_value = Some(value);
    }

    pub fn clear_override(&mut self) {
        self.override_value = None;
    }

    /// Install the census driver's asset-tiered monthly net separate-account rate, one entry
    /// per policy year (see `MAndESchedule::dynamic_rate`). Overrides this basis's static
    /// database rate for every month of the run that follows.
    pub fn set_dynamic_separate_account_rates(&mut self, monthly_net_rates: Vec<f64>) {
        self.dynamic_sep_acct_monthly_rate = Some(monthly_net_rates);
    }

    fn solve_range(&self) -> Range<usize> {
        let solve = self.input.solve();
        let end = solve.end_year.max(solve.begin_year + 1);
        solve.begin_year..end
    }

    fn overridden(&self, solve_type: SolveType, year: usize, base: Currency) -> Currency {
        let solve = self.input.solve();
        if solve.solve_type == Some(solve_type) && self.solve_range().contains(&year) {
            self.override_value.unwrap_or(base)
        } else {
            base
        }
    }

    /// Monthly guideline-interest q vector for the years remaining from `start_year`, one entry
    /// repeated twelve times per remaining policy year -- what [`GuidelinePremiumTest::new`] and
    /// [`strategy::gpt_factors_per_dollar_specamt`] need as their `monthly_q_7702` argument.
    fn remaining_monthly_q(&self, start_year: usize) -> Vec<f64> {
        self.db.guideline_q_7702[start_year..]
            .iter()
            .flat_map(|&q| std::iter::repeat(q).take(12))
            .collect()
    }

    fn attained_age(&self, year: usize) -> usize {
        self.input.issue_age as usize + year
    }

    /// Cash surrender value (C11, grounded on `ihs_avmly.cpp`'s cash-value documentation
    /// table): total account value, less the surrender charge, plus the refundable share of
    /// cumulative sales load, less any outstanding loan, floored by the honeymoon value (net of
    /// loan) while a honeymoon is active.
    fn compute_csv(
        &self,
        total_av: Currency,
        specamt: Currency,
        year: usize,
        cumulative_sales_load: Currency,
        loan_balance: Currency,
        honeymoon_active: bool,
        honeymoon_value: Currency,
    ) -> Currency {
        let surrender_charge =
            Currency::from_fraction(self.db.surrender_charges.rate(year) * specamt.value()).unwrap_or(Currency::ZERO);
        let refund = Currency::from_fraction(
            cumulative_sales_load.value() * self.loads.refundable_sales_load_proportion().get(year).copied().unwrap_or(0.0),
        )
        .unwrap_or(Currency::ZERO);
        let csv = (total_av - surrender_charge + refund - loan_balance).max(Currency::ZERO);
        if honeymoon_active {
            csv.max((honeymoon_value - loan_balance).max(Currency::ZERO))
        } else {
            csv
        }
    }

    fn round(&self, rule: RoundingRule, value: f64) -> Currency {
        Currency::from_fraction(rule.round(value)).unwrap_or(Currency::ZERO)
    }

    /// Run the full monthiversary projection (C11). Produces the basis-independent and
    /// basis-dependent ledger halves a single cell's run contributes to a census.
    pub fn run(&mut self) -> Result<(LedgerInvariant, LedgerVariant), LmiError> {
        let years = self.input.years_to_maturity;
        let rounding = self.db.rounding;
        let mut inv = LedgerInvariant::new(years, self.input.issue_age, self.input.effective_date.julian_day_number());
        let mut var = LedgerVariant::new(years, self.basis.gen);

        let mut av_gen = Currency::ZERO;
        let mut av_sep = Currency::ZERO;
        let mut av_reg_ln = Currency::ZERO;
        let mut av_prf_ln = Currency::ZERO;
        let mut reg_loan_balance = Currency::ZERO;
        let mut prf_loan_balance = Currency::ZERO;
        let mut cumulative_payments = Currency::ZERO;
        let mut cumulative_payments_less_wd = Currency::ZERO;
        let mut cumulative_sales_load = Currency::ZERO;
        let mut cumulative_premium_to_date = Currency::ZERO;

        let honeymoon_rate = self.interest.honeymoon_value_monthly(self.basis.gen);
        let mut honeymoon_active = honeymoon_rate > 0.0;
        let mut honeymoon_value = Currency::ZERO;

        let mut lapsed = false;
        let mut lapse_year: Option<usize> = None;
        let mut lapse_month: Option<usize> = None;

        let mut gpt = if self.input.definition_of_life_insurance == DefinitionOfLifeInsurance::Gpt {
            Some(GuidelinePremiumTest::new(
                self.death_benefits.specamt(0),
                &self.remaining_monthly_q(0),
                self.interest.guideline_rate_7702_monthly(),
            ))
        } else {
            None
        };
        let mut seven_pay_annual = self.round(
            rounding.round_gross_premium,
            self.death_benefits.specamt(0).value() * self.mortality.seven_pay_rate(0),
        );
        let mut seven_pay = SevenPayTest::new(seven_pay_annual, 0);

        let mut prior_specamt = self.death_benefits.specamt(0);

        'years: for year in 0..years {
            if year > 0 {
                self.premium_tax.start_new_year();
            }

            let attained_age = self.attained_age(year);
            let gpt_factors = gpt_factors_per_dollar_specamt(&self.remaining_monthly_q(year), self.interest.guideline_rate_7702_monthly());
            let seven_pay_per_dollar = self.mortality.seven_pay_rate(year);
            let cvat_nsp_per_dollar = self.mortality.cvat_nsp(attained_age);

            let annualized_premium = self.outlay.employee.annualized(year) + self.outlay.employer.annualized(year);
            let specamt_ctx = SpecAmtStrategyContext {
                annualized_premium,
                salary: self.input.salary,
                salary_multiplier: self.input.salary_multiplier,
                salary_offset: self.input.salary_offset,
                gpt: gpt_factors,
                seven_pay_rate_per_dollar: seven_pay_per_dollar,
                cvat_nsp_per_dollar,
            };
            let resolved_specamt = resolve_specamt(
                self.input.specamt_strategy,
                self.input.initial_specamt,
                &specamt_ctx,
                rounding.round_specamt,
            )?;
            let specamt = self.overridden(SolveType::SpecAmt, year, resolved_specamt).max(Currency::ZERO);
            self.death_benefits.set_specamt_range(year, year + 1, specamt)?;

            let coi_rate_estimate = self.mortality.coi_monthly_rate(self.basis.gen, year, specamt.value());
            let anticipated_monthly_deduction = self.round(
                rounding.round_coi_charge,
                specamt.value() * coi_rate_estimate
                    + self.loads.monthly_policy_fee(self.basis.gen)[year].value()
                    + specamt.value() * self.loads.specified_amount_load(self.basis.gen)[year] / 12.0,
            );
            let payment_ctx = PaymentStrategyContext {
                specamt,
                mode: self.outlay.employee.mode(year),
                anticipated_monthly_deduction,
                gpt: gpt_factors,
                seven_pay_rate_per_dollar: seven_pay_per_dollar,
                cvat_nsp_per_dollar,
                table_multiplier: self.input.payment_table_multiplier,
            };
            let resolved_ee = resolve_payment(
                self.input.payment_strategy,
                self.outlay.employee.modal_premium(year),
                &payment_ctx,
                rounding.round_gross_premium,
            );
            let resolved_er = resolve_payment(
                self.input.payment_strategy,
                self.outlay.employer.modal_premium(year),
                &payment_ctx,
                rounding.round_gross_premium,
            );
            let ee_payment = self.overridden(SolveType::EePrem, year, resolved_ee);
            let er_payment = self.overridden(SolveType::ErPrem, year, resolved_er);
            self.outlay.employee.set_modal_premium_range(year, year + 1, ee_payment)?;
            self.outlay.employer.set_modal_premium_range(year, year + 1, er_payment)?;

            if let Some(g) = gpt.as_mut() {
                if specamt != prior_specamt {
                    g.recompute(specamt, &self.remaining_monthly_q(year), self.interest.guideline_rate_7702_monthly());
                }
            }
            if specamt != prior_specamt {
                seven_pay_annual = self.round(rounding.round_gross_premium, specamt.value() * seven_pay_per_dollar);
                seven_pay.material_change(seven_pay_annual, year);
            }
            prior_specamt = specamt;

            let target_premium_annual = if gpt_factors.glp_per_dollar > 0.0 {
                self.round(rounding.round_gross_premium, specamt.value() * gpt_factors.glp_per_dollar)
            } else {
                self.round(rounding.round_gross_premium, specamt.value() * cvat_nsp_per_dollar * 12.0)
            };
            let mut ytd_target_remaining = target_premium_annual;

            let mut year_coi = Currency::ZERO;
            let mut year_rider = Currency::ZERO;
            let mut year_fee = Currency::ZERO;
            let mut year_sales_load = Currency::ZERO;
            let mut year_premium_load = Currency::ZERO;
            let mut year_dac = Currency::ZERO;
            let mut year_sep_load = Currency::ZERO;
            let mut year_int_net = Currency::ZERO;
            let mut year_int_gross = Currency::ZERO;
            let mut year_loan_int = Currency::ZERO;
            let mut last_death_benefit = Currency::ZERO;

            for month in 0..12 {
                if year == 0 && month == 0 {
                    let dump_in = self.outlay.dump_in + self.outlay.total_1035_amount();
                    if dump_in > Currency::ZERO {
                        let sep_share = self.round(rounding.round_net_premium, dump_in.value() * self.input.separate_account_allocation);
                        av_sep += sep_share;
                        av_gen += dump_in - sep_share;
                        cumulative_payments += dump_in;
                        cumulative_payments_less_wd += dump_in;
                        if honeymoon_active {
                            honeymoon_value += dump_in;
                        }
                    }
                }

                let mut gross_payment = Currency::ZERO;
                if self.outlay.employee.mode(year).pays_in_month(month) {
                    gross_payment += self.outlay.employee.modal_premium(year);
                }
                if self.outlay.employer.mode(year).pays_in_month(month) {
                    gross_payment += self.outlay.employer.modal_premium(year);
                }

                if gross_payment > Currency::ZERO {
                    let target_portion = gross_payment.min(ytd_target_remaining);
                    let excess_portion = gross_payment - target_portion;
                    ytd_target_remaining = (ytd_target_remaining - target_portion).max(Currency::ZERO);

                    let premium_load = self.round(
                        rounding.round_net_premium,
                        target_portion.value() * self.loads.target_premium_load(self.basis.gen)[year]
                            + excess_portion.value() * self.loads.excess_premium_load(self.basis.gen)[year],
                    );
                    let sales_load = self.round(
                        rounding.round_net_premium,
                        target_portion.value() * self.loads.target_sales_load(self.basis.gen)[year]
                            + excess_portion.value() * self.loads.excess_sales_load(self.basis.gen)[year],
                    );
                    let dac_load = self.round(rounding.round_net_premium, gross_payment.value() * self.loads.dac_tax_load()[year]);
                    let tax_load = self.premium_tax.calculate_load(gross_payment, &self.db.tiered_charges);

                    year_premium_load += premium_load;
                    year_sales_load += sales_load;
                    year_dac += dac_load;
                    cumulative_sales_load += sales_load;

                    cumulative_payments += gross_payment;
                    cumulative_payments_less_wd += gross_payment;
                    cumulative_premium_to_date += gross_payment;

                    let mut net_payment = gross_payment - premium_load - sales_load - dac_load - tax_load;
                    if let Some(g) = gpt.as_mut() {
                        let forceout = g.recognize_payment(gross_payment, cumulative_premium_to_date, year);
                        net_payment = (net_payment - forceout).max(Currency::ZERO);
                        inv.gpt_forceout[year] += forceout;
                    }
                    seven_pay.recognize_payment(year, month, net_payment);

                    let sep_share = self.round(rounding.round_net_premium, net_payment.value() * self.input.separate_account_allocation);
                    av_sep += sep_share;
                    av_gen += net_payment - sep_share;
                    if honeymoon_active {
                        honeymoon_value += net_payment;
                    }
                }

                if honeymoon_active {
                    let csv_now = self.compute_csv(
                        av_gen + av_sep + av_reg_ln + av_prf_ln,
                        specamt,
                        year,
                        cumulative_sales_load,
                        reg_loan_balance + prf_loan_balance,
                        false,
                        Currency::ZERO,
                    );
                    if csv_now >= honeymoon_value {
                        honeymoon_active = false;
                    }
                }

                let corridor_factor = if self.input.definition_of_life_insurance == DefinitionOfLifeInsurance::Cvat {
                    self.round(rounding.round_corridor_factor, self.mortality.cvat_corridor_factor(attained_age)).value()
                } else {
                    1.0
                };
                let total_av = av_gen + av_sep + av_reg_ln + av_prf_ln;
                let supplamt = self.death_benefits.supplamt(year);
                let db_amount = death_benefit(
                    self.death_benefits.option(year),
                    specamt,
                    supplamt,
                    total_av,
                    cumulative_payments_less_wd,
                    corridor_factor,
                );
                last_death_benefit = db_amount;
                let naar = (db_amount - total_av).max(Currency::ZERO);

                let coi_rate = self.mortality.coi_monthly_rate(self.basis.gen, year, specamt.value());
                let coi_charge = self.round(rounding.round_coi_charge, naar.value() * coi_rate);
                year_coi += coi_charge;

                let riders = self.mortality.riders(self.basis.gen);
                let rider_base = specamt.value() / 1000.0;
                let mut rider_charge = 0.0;
                let election = self.input.riders();
                if election.adb {
                    rider_charge += rider_base * riders.adb.get(year).copied().unwrap_or(0.0);
                }
                if election.waiver_of_premium {
                    rider_charge += rider_base * riders.waiver_of_premium.get(year).copied().unwrap_or(0.0);
                }
                if election.children_term {
                    rider_charge += rider_base * riders.children_term.get(year).copied().unwrap_or(0.0);
                }
                if election.spouse_term {
                    rider_charge += rider_base * riders.spouse_term.get(year).copied().unwrap_or(0.0);
                }
                let rider_charge = self.round(rounding.round_coi_charge, rider_charge);
                year_rider += rider_charge;

                let policy_fee = self.loads.monthly_policy_fee(self.basis.gen)[year];
                year_fee += policy_fee;
                let specamt_load = self.round(
                    rounding.round_coi_charge,
                    specamt.value() * self.loads.specified_amount_load(self.basis.gen)[year] / 12.0,
                );

                let mly_ded = coi_charge + rider_charge + policy_fee + specamt_load;
                let mut gen_f = av_gen.value();
                let mut sep_f = av_sep.value();
                progressively_reduce(&mut gen_f, &mut sep_f, mly_ded.value());
                av_gen = Currency::from_fraction(gen_f).unwrap_or(Currency::ZERO);
                av_sep = Currency::from_fraction(sep_f).unwrap_or(Currency::ZERO);
                if honeymoon_active {
                    honeymoon_value = (honeymoon_value - mly_ded).max(Currency::ZERO);
                }

                let sep_load_rate = self.loads.separate_account_load(self.basis.gen)[year] / 12.0;
                let sep_load_charge = self.round(rounding.round_coi_charge, av_sep.value() * sep_load_rate);
                av_sep = (av_sep - sep_load_charge).max(Currency::ZERO);
                year_sep_load += sep_load_charge;

                let gen_rate = if honeymoon_active {
                    honeymoon_rate
                } else {
                    self.interest.general_account_monthly(self.basis.gen)
                };
                let gen_interest = self.round(rounding.round_interest_credit, av_gen.value() * gen_rate);
                av_gen += gen_interest;
                let sep_rate = match &self.dynamic_sep_acct_monthly_rate {
                    Some(rates) => rates.get(year).copied().unwrap_or(0.0),
                    None => self.interest.separate_account_net_monthly(self.basis.gen, self.basis.sep),
                };
                let sep_interest = self.round(rounding.round_interest_credit, av_sep.value() * sep_rate);
                av_sep += sep_interest;
                year_int_net += gen_interest + sep_interest;
                year_int_gross += gen_interest
                    + self.round(
                        rounding.round_interest_credit,
                        av_sep.value() * self.interest.separate_account_gross_monthly(self.basis.gen, self.basis.sep),
                    );

                if honeymoon_active {
                    let hv_interest = self.round(rounding.round_interest_credit, honeymoon_value.value() * honeymoon_rate);
                    honeymoon_value += hv_interest;
                }

                let reg_loan_due = self.round(rounding.round_interest_credit, reg_loan_balance.value() * self.interest.regular_loan_due_monthly());
                reg_loan_balance += reg_loan_due;
                let prf_loan_due = self.round(rounding.round_interest_credit, prf_loan_balance.value() * self.interest.preferred_loan_due_monthly());
                prf_loan_balance += prf_loan_due;
                year_loan_int += reg_loan_due + prf_loan_due;

                let reg_loan_credited = self.round(rounding.round_interest_credit, av_reg_ln.value() * self.interest.regular_loan_credited_monthly());
                av_reg_ln += reg_loan_credited;
                let prf_loan_credited = self.round(rounding.round_interest_credit, av_prf_ln.value() * self.interest.preferred_loan_credited_monthly());
                av_prf_ln += prf_loan_credited;
                year_int_net += reg_loan_credited + prf_loan_credited;

                if month == 0 && year >= self.input.withdrawal_begin_year {
                    let requested = self.overridden(SolveType::Wd, year, self.outlay.withdrawal(year));
                    let available = av_gen + av_sep;
                    let allowed = requested.min(available).max(Currency::ZERO);
                    let ullage = (requested - allowed).max(Currency::ZERO);
                    let mut gen_f = av_gen.value();
                    let mut sep_f = av_sep.value();
                    progressively_reduce(&mut gen_f, &mut sep_f, allowed.value());
                    av_gen = Currency::from_fraction(gen_f).unwrap_or(Currency::ZERO);
                    av_sep = Currency::from_fraction(sep_f).unwrap_or(Currency::ZERO);
                    cumulative_payments_less_wd -= allowed.min(cumulative_payments_less_wd);

                    match self.death_benefits.option(year) {
                        crate::death_benefit::DeathBenefitOption::Level
                        | crate::death_benefit::DeathBenefitOption::ReturnOfPremium => {
                            let reduced = (specamt - allowed).max(Currency::ZERO);
                            self.death_benefits.set_specamt_range(year, years, reduced)?;
                        }
                        crate::death_benefit::DeathBenefitOption::Increasing
                        | crate::death_benefit::DeathBenefitOption::MinimumDeathBenefit => {}
                    }

                    inv.withdrawal[year] += allowed;
                    var.withdrawal_ullage[year] = var.withdrawal_ullage[year].max(ullage);
                }

                if month == 0 && year >= self.input.loan_begin_year {
                    let requested = self.overridden(SolveType::Loan, year, self.outlay.loan(year));
                    let collateral = (av_gen + av_sep).max(Currency::ZERO);
                    let allowed = requested.min(collateral).max(Currency::ZERO);
                    let ullage = (requested - allowed).max(Currency::ZERO);
                    let mut gen_f = av_gen.value();
                    let mut sep_f = av_sep.value();
                    progressively_reduce(&mut gen_f, &mut sep_f, allowed.value());
                    av_gen = Currency::from_fraction(gen_f).unwrap_or(Currency::ZERO);
                    av_sep = Currency::from_fraction(sep_f).unwrap_or(Currency::ZERO);
                    if self.input.loan_is_preferred {
                        av_prf_ln += allowed;
                        prf_loan_balance += allowed;
                    } else {
                        av_reg_ln += allowed;
                        reg_loan_balance += allowed;
                    }
                    inv.loan[year] += allowed;
                    var.loan_ullage[year] = var.loan_ullage[year].max(ullage);
                }

                let solving = self.override_value.is_some();
                let net_cash_value =
                    (av_gen + av_sep + av_reg_ln + av_prf_ln - reg_loan_balance - prf_loan_balance).max(Currency::ZERO);
                if net_cash_value <= Currency::ZERO && !honeymoon_active && !solving {
                    lapsed = true;
                    lapse_year = Some(year);
                    lapse_month = Some(month);
                }

                if month == 11 || lapsed {
                    break;
                }
            }

            inv.specamt[year] = self.death_benefits.specamt(year);
            inv.term_specamt[year] = self.death_benefits.supplamt(year);
            inv.ee_payment[year] = self.outlay.employee.annualized(year);
            inv.er_payment[year] = self.outlay.employer.annualized(year);
            inv.outlay[year] = inv.ee_payment[year] + inv.er_payment[year] + inv.loan[year] - inv.withdrawal[year];
            inv.tax_basis[year] = cumulative_payments_less_wd;

            var.coi_charge[year] = year_coi;
            var.rider_charge[year] = year_rider;
            var.policy_fee[year] = year_fee;
            var.sales_load[year] = year_sales_load;
            var.premium_load[year] = year_premium_load;
            var.dac_tax_load[year] = year_dac;
            var.sep_acct_load[year] = year_sep_load;
            var.interest_credited_net[year] = year_int_net;
            var.interest_credited_gross[year] = year_int_gross;
            var.loan_interest_accrued[year] = year_loan_int;
            var.account_value[year] = av_gen + av_sep + av_reg_ln + av_prf_ln;
            var.av_gen[year] = av_gen;
            var.av_sep[year] = av_sep;
            var.av_reg_ln[year] = av_reg_ln;
            var.av_prf_ln[year] = av_prf_ln;
            var.reg_loan_balance[year] = reg_loan_balance;
            var.prf_loan_balance[year] = prf_loan_balance;
            var.death_benefit[year] = last_death_benefit;
            var.base_death_benefit[year] = specamt;
            var.csv[year] = self.compute_csv(
                av_gen + av_sep + av_reg_ln + av_prf_ln,
                specamt,
                year,
                cumulative_sales_load,
                reg_loan_balance + prf_loan_balance,
                honeymoon_active,
                honeymoon_value,
            );
            var.general_account_rate[year] = self.interest.general_account_annual(self.basis.gen);
            var.separate_account_net_rate[year] = self.interest.separate_account_net_annual(self.basis.gen, self.basis.sep);

            inv.is_mec = seven_pay.is_mec();
            inv.mec_year = seven_pay.mec_year();
            inv.mec_month = seven_pay.mec_month();

            if lapsed {
                var.lapse_year = lapse_year;
                var.lapse_month = lapse_month;
                break 'years;
            }
        }

        Ok((inv, var))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{GenBasis, SepBasis};
    use crate::death_benefit::DeathBenefitOption;
    use crate::input::{PaymentStrategy, SolveTarget as ST, SolveType as SType, Sex, SpecAmtStrategy, UnderwritingClass};
    use crate::outlay::Mode;
    use crate::tables::state::State;

    fn sample_input(annual_premium: f64) -> Input {
        Input {
            issue_age: 45,
            sex: Sex::Male,
            underwriting_class: UnderwritingClass::Standard,
            tax_state: State::CA,
            domicile: State::CA,
            birthdate: crate::calendar::CalendarDate::from_ymd(1980, 1, 1).unwrap(),
            effective_date: crate::calendar::CalendarDate::from_ymd(2025, 1, 1).unwrap(),
            inforce_as_of_date: None,
            years_to_maturity: 30,
            initial_specamt: Currency::from_fraction(500_000.0).unwrap(),
            initial_death_benefit_option: DeathBenefitOption::Level,
            specamt_strategy: SpecAmtStrategy::InputScalar,
            salary: Currency::ZERO,
            salary_multiplier: 0.0,
            salary_offset: Currency::ZERO,
            payment_strategy: PaymentStrategy::InputScalar,
            payment_mode: Mode::Annual,
            initial_employee_premium: Currency::from_fraction(annual_premium).unwrap(),
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
            separate_basis: SepBasis::Zero,
            separate_account_allocation: 0.0,
            solve_type: None,
            solve_begin_year: 0,
            solve_end_year: 0,
            solve_target: ST::Endowment,
            solve_target_year: 0,
            solve_target_csv: Currency::ZERO,
        }
    }

    fn engine(input: &Input) -> MonthlyEngine {
        let db = Arc::new(ProductDatabase::sample(input.years_to_maturity));
        MonthlyEngine::new(input, db, Basis { gen: GenBasis::Current, sep: SepBasis::Zero }).unwrap()
    }

    #[test]
    fn a_well_funded_policy_survives_without_lapsing() {
        let input = sample_input(10_000.0);
        let mut e = engine(&input);
        let (inv, var) = e.run().unwrap();
        assert!(var.lapse_year.is_none());
        assert!(var.account_value[5] > Currency::ZERO);
        assert!(!inv.is_mec);
    }

    #[test]
    fn an_underfunded_policy_eventually_lapses() {
        let input = sample_input(10.0);
        let mut e = engine(&input);
        let (_inv, var) = e.run().unwrap();
        assert!(var.lapse_year.is_some());
        assert_eq!(var.account_value[var.lapse_year.unwrap()], Currency::ZERO);
    }

    #[test]
    fn a_single_huge_premium_becomes_a_mec() {
        let mut input = sample_input(0.0);
        input.initial_employee_premium = Currency::from_fraction(400_000.0).unwrap();
        let mut e = engine(&input);
        let (inv, _var) = e.run().unwrap();
        assert!(inv.is_mec);
        assert_eq!(inv.mec_year, Some(0));
    }

    #[test]
    fn gpt_definition_forces_out_premium_above_the_guideline_limit() {
        let mut input = sample_input(0.0);
        input.definition_of_life_insurance = DefinitionOfLifeInsurance::Gpt;
        input.initial_employee_premium = Currency::from_fraction(900_000.0).unwrap();
        let mut e = engine(&input);
        let (inv, _var) = e.run().unwrap();
        assert!(inv.gpt_forceout[0] > Currency::ZERO);
    }

    #[test]
    fn solver_override_replaces_the_strategy_resolved_specamt() {
        let mut input = sample_input(10_000.0);
        input.specamt_strategy = SpecAmtStrategy::InputScalar;
        input.solve_type = Some(SType::SpecAmt);
        input.solve_begin_year = 0;
        input.solve_end_year = 30;
        let mut e = engine(&input);
        e.set_override(Currency::from_fraction(750_000.0).unwrap());
        let (inv, _var) = e.run().unwrap();
        assert_eq!(inv.specamt[0], Currency::from_fraction(750_000.0).unwrap());
    }

    #[test]
    fn taking_a_loan_moves_av_into_the_loan_bucket_and_credits_it_separately() {
        let mut input = sample_input(20_000.0);
        input.loan_begin_year = 1;
        input.annual_loan = Currency::from_fraction(10_000.0).unwrap();
        let mut e = engine(&input);
        let (_inv, var) = e.run().unwrap();
        assert_eq!(var.reg_loan_balance[1], Currency::from_fraction(10_000.0).unwrap());
        assert!(var.av_reg_ln[1] > Currency::ZERO);
        assert!(var.av_prf_ln[1] == Currency::ZERO);
    }

    #[test]
    fn a_preferred_loan_election_routes_draws_to_the_preferred_bucket() {
        let mut input = sample_input(20_000.0);
        input.loan_begin_year = 1;
        input.annual_loan = Currency::from_fraction(10_000.0).unwrap();
        input.loan_is_preferred = true;
        let mut e = engine(&input);
        let (_inv, var) = e.run().unwrap();
        assert_eq!(var.prf_loan_balance[1], Currency::from_fraction(10_000.0).unwrap());
        assert!(var.av_prf_ln[1] > Currency::ZERO);
        assert!(var.reg_loan_balance[1] == Currency::ZERO);
    }

    #[test]
    fn a_withdrawal_reduces_specamt_under_the_level_option() {
        let mut input = sample_input(20_000.0);
        input.withdrawal_begin_year = 1;
        input.annual_withdrawal = Currency::from_fraction(5_000.0).unwrap();
        let mut e = engine(&input);
        let (inv, _var) = e.run().unwrap();
        assert_eq!(inv.specamt[1], Currency::from_fraction(495_000.0).unwrap());
    }

    #[test]
    fn csv_is_never_negative() {
        let input = sample_input(10.0);
        let mut e = engine(&input);
        let (_inv, var) = e.run().unwrap();
        for csv in &var.csv {
            assert!(*csv >= Currency::ZERO);
        }
    }
}
