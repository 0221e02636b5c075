//! Tiered and banded rate algebra, and the two-account progressive apportionment helpers
//! the monthly engine uses to split deductions between the general and separate accounts.
//!
//! "Tiered": a succession of rates applies incrementally to a progressive series of slices
//! that partition the full amount -- the function is continuous.
//! "Banded": a single scalar rate, selected by which bracket the total amount falls in,
//! applies to the whole amount -- the function is a step function, not continuous.
//! These two are easy to conflate and must not be.

use crate::error::LmiError;

fn check_limits(limits: &[f64], rates: &[f64]) -> Result<(), LmiError> {
    if limits.is_empty() {
        return Err(LmiError::Invariant("stratified limits must not be empty".into()));
    }
    if limits.len() != rates.len() {
        return Err(LmiError::Invariant(
            "stratified rates must have the same length as limits".into(),
        ));
    }
    let min = limits.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = limits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if min < 0.0 {
        return Err(LmiError::Invariant("stratified limits must be nonnegative".into()));
    }
    if max <= 0.0 {
        return Err(LmiError::Invariant(
            "stratified limits must include a positive (ultimately infinite) top".into(),
        ));
    }
    Ok(())
}

/// Amount times tiered rates, given incremental (not cumulative) limits. The last limit is
/// expected to be `f64::INFINITY` so any excess over the penultimate limit is captured.
pub fn tiered_product(
    new_incremental_amount: f64,
    prior_total_amount: f64,
    incremental_limits: &[f64],
    rates: &[f64],
) -> Result<f64, LmiError> {
    if new_incremental_amount < 0.0 || prior_total_amount < 0.0 {
        return Err(LmiError::Invariant("tiered_product amounts must be nonnegative".into()));
    }
    check_limits(incremental_limits, rates)?;

    let mut result = 0.0;
    let mut remaining_amount = new_incremental_amount;
    let mut unused_prior_amount = prior_total_amount;
    for (limit, rate) in incremental_limits.iter().zip(rates.iter()) {
        let unfilled_band_increment = limit - unused_prior_amount;
        unused_prior_amount = (unused_prior_amount - limit).max(0.0);
        if unfilled_band_increment <= 0.0 {
            continue;
        }
        if remaining_amount <= 0.0 {
            break;
        }
        if remaining_amount <= unfilled_band_increment {
            result += rate * remaining_amount;
            break;
        } else {
            result += rate * unfilled_band_increment;
            remaining_amount -= unfilled_band_increment;
        }
    }
    Ok(result)
}

/// Aggregate rate equivalent to [`tiered_product`] (product divided by amount).
pub fn tiered_rate(amount: f64, incremental_limits: &[f64], rates: &[f64]) -> Result<f64, LmiError> {
    let product = tiered_product(amount, 0.0, incremental_limits, rates)?;
    if amount == 0.0 {
        Ok(rates[0])
    } else {
        Ok(product / amount)
    }
}

/// Select a rate by which cumulative-limit bracket `total_amount` falls in.
pub fn banded_rate(total_amount: f64, cumulative_limits: &[f64], rates: &[f64]) -> Result<f64, LmiError> {
    if total_amount < 0.0 {
        return Err(LmiError::Invariant("banded_rate amount must be nonnegative".into()));
    }
    check_limits(cumulative_limits, rates)?;
    if !cumulative_limits.windows(2).all(|w| w[0] <= w[1]) {
        return Err(LmiError::Invariant("banded cumulative limits must be nondecreasing".into()));
    }
    // Ignore the last limit -- it's asserted to be infinity above.
    let band = cumulative_limits[..cumulative_limits.len() - 1]
        .partition_point(|&limit| limit <= total_amount);
    Ok(rates[band])
}

/// Amount times the banded rate.
pub fn banded_product(total_amount: f64, cumulative_limits: &[f64], rates: &[f64]) -> Result<f64, LmiError> {
    Ok(total_amount * banded_rate(total_amount, cumulative_limits, rates)?)
}

/// Reduce `a` and/or `b` so their sum does not exceed `limit`, taking any required
/// reduction from `a` first, never driving either below zero.
pub fn progressively_limit(a: &mut f64, b: &mut f64, limit: f64) {
    debug_assert!(limit >= 0.0);
    if *a <= 0.0 && *b <= 0.0 {
        return;
    } else if *a <= 0.0 {
        *b = b.min(limit - *a);
    } else if *b <= 0.0 {
        *a = a.min(limit - *b);
    } else {
        *b = b.min(limit);
        *a = a.min(limit - *b);
    }
}

/// Move a decrement `delta` across two preference-ordered account balances `a` (preferred)
/// and `b`, first using a negative `delta` to bring negative accounts up to zero (`a` before
/// `b`), then absorbing any positive remainder against positive balances (again `a` before
/// `b`). Returns the unabsorbed residual, always `>= 0`.
///
/// Exact-equality branches (`a == r`) avoid the catastrophic cancellation a naive
/// `a -= max(a, r); r -= max(a, r)` would produce when `a` and `r` nearly cancel.
pub fn progressively_reduce(a: &mut f64, b: &mut f64, delta: f64) -> f64 {
    let mut r = delta;
    if r == 0.0 {
        return r;
    }

    if *a < 0.0 && r < 0.0 {
        if *a == r {
            *a = 0.0;
            r = 0.0;
        } else if *a < r {
            *a -= r;
            r = 0.0;
        } else {
            r -= *a;
            *a = 0.0;
        }
    }
    if *b < 0.0 && r < 0.0 {
        if *b == r {
            *b = 0.0;
            r = 0.0;
        } else if *b < r {
            *b -= r;
            r = 0.0;
        } else {
            r -= *b;
            *b = 0.0;
        }
    }

    if r < 0.0 {
        *a -= r;
        r = 0.0;
    }

    if *a > 0.0 && r > 0.0 {
        if *a == r {
            *a = 0.0;
            r = 0.0;
        } else if r < *a {
            *a -= r;
            r = 0.0;
        } else {
            r -= *a;
            *a = 0.0;
        }
    }
    if *b > 0.0 && r > 0.0 {
        if *b == r {
            *b = 0.0;
            r = 0.0;
        } else if r < *b {
            *b -= r;
            r = 0.0;
        } else {
            r -= *b;
            *b = 0.0;
        }
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn schedule() -> (Vec<f64>, Vec<f64>) {
        (vec![1000.0, 4000.0, f64::INFINITY], vec![0.05, 0.02, 0.01])
    }

    #[test]
    fn tiered_product_matches_worked_examples() {
        let (limits, rates) = schedule();
        assert_relative_eq!(tiered_product(900.0, 0.0, &limits, &rates).unwrap(), 45.0);
        assert_relative_eq!(tiered_product(1500.0, 0.0, &limits, &rates).unwrap(), 60.0);
        assert_relative_eq!(tiered_product(10000.0, 0.0, &limits, &rates).unwrap(), 180.0);
    }

    #[test]
    fn tiered_rate_is_product_over_amount() {
        let (limits, rates) = schedule();
        let x = 1500.0;
        let product = tiered_product(x, 0.0, &limits, &rates).unwrap();
        let rate = tiered_rate(x, &limits, &rates).unwrap();
        assert_relative_eq!(product, x * rate, epsilon = 1e-9);
    }

    #[test]
    fn banded_product_matches_worked_examples() {
        let cumulative = vec![1000.0, 5000.0, f64::INFINITY];
        let rates = vec![0.05, 0.02, 0.01];
        assert_relative_eq!(banded_product(900.0, &cumulative, &rates).unwrap(), 45.0);
        assert_relative_eq!(banded_product(1500.0, &cumulative, &rates).unwrap(), 30.0);
        assert_relative_eq!(banded_product(10000.0, &cumulative, &rates).unwrap(), 100.0);
    }

    #[test]
    fn progressively_reduce_noop_on_zero_delta() {
        let mut a = 10.0;
        let mut b = -3.0;
        assert_eq!(progressively_reduce(&mut a, &mut b, 0.0), 0.0);
        assert_eq!(a, 10.0);
        assert_eq!(b, -3.0);
    }

    #[test]
    fn progressively_reduce_boundary_cases() {
        let mut a = 0.0;
        let mut b = 0.0;
        assert_eq!(progressively_reduce(&mut a, &mut b, 5.0), 5.0);
        assert_eq!((a, b), (0.0, 0.0));

        let mut a = -10.0;
        let mut b = 0.0;
        assert_eq!(progressively_reduce(&mut a, &mut b, -30.0), 0.0);
        assert_eq!((a, b), (20.0, 0.0));

        let mut a = -20.0;
        let mut b = -10.0;
        assert_eq!(progressively_reduce(&mut a, &mut b, -25.0), 0.0);
        assert_eq!((a, b), (0.0, -5.0));
    }

    #[test]
    fn progressively_reduce_exact_cancellation() {
        let mut a = 50.0;
        let mut b = 20.0;
        assert_eq!(progressively_reduce(&mut a, &mut b, 50.0), 0.0);
        assert_eq!((a, b), (0.0, 20.0));
    }

    #[test]
    fn progressively_limit_takes_from_a_first() {
        let mut a = 100.0;
        let mut b = 50.0;
        progressively_limit(&mut a, &mut b, 80.0);
        assert_eq!(a, 30.0);
        assert_eq!(b, 50.0);
    }
}
