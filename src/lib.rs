//! lmi - universal-life monthiversary illustration engine.
//!
//! This library provides:
//! - A monthiversary-by-monthiversary account value projection (C11) for universal life with
//!   flexible premiums, four account buckets, and an optional honeymoon value
//! - IRC 7702/7702A tax qualification testing: the guideline premium test, the cash value
//!   accumulation test, and the seven-pay (MEC) test (C8-C10)
//! - A payment/specified-amount strategy resolver (C12) and a bracketed-root-finder solve loop
//!   (C13) for the five standard solve axes
//! - A census driver (C14) that runs a block of cells serially or on the rayon thread pool,
//!   with asset-tiered M&E re-pricing across the block

pub mod account_value;
pub mod basis;
pub mod calendar;
pub mod census;
pub mod currency;
pub mod death_benefit;
pub mod error;
pub mod input;
pub mod ledger;
pub mod outlay;
pub mod rounding;
pub mod solver;
pub mod strategy;
pub mod stratified;
pub mod tables;
pub mod tax_qualification;

pub use account_value::{Basis, MonthlyEngine};
pub use census::{run_census_parallel, run_census_serial, CellOutcome, CensusResult};
pub use currency::Currency;
pub use error::LmiError;
pub use input::{load_census, Input};
pub use ledger::{LedgerInvariant, LedgerVariant};
pub use solver::solve_cell;
