//! Decimal rounding rules.
//!
//! Every value that crosses from the real-number domain (rate tables, interest, solver
//! minutiae) into a published, policy-visible number goes through a [`RoundingRule`] first.
//! The rule names a number of decimal places and a bias; it is configuration, not a
//! calculation, and is cheap to copy.

use serde::{Deserialize, Serialize};

/// Which way a value exactly halfway between two representable decimals breaks, and what
/// happens to values that are not exactly halfway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingStyle {
    /// Truncate toward negative infinity.
    Down,
    /// Truncate toward positive infinity.
    Up,
    /// Truncate toward zero.
    Truncate,
    /// Round half away from zero.
    ToNearest,
    /// Value is used as given; no rounding is applied. Used for rules that are present in
    /// the configuration schema but not exercised by a particular product.
    NotAtAll,
}

/// A named number of decimal places plus a bias, e.g. "round rates to 6 decimals, to nearest".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundingRule {
    pub decimals: i32,
    pub style: RoundingStyle,
}

impl RoundingRule {
    pub const fn new(decimals: i32, style: RoundingStyle) -> RoundingRule {
        RoundingRule { decimals, style }
    }

    pub fn round(&self, value: f64) -> f64 {
        if self.style == RoundingStyle::NotAtAll {
            return value;
        }
        let scale = 10f64.powi(self.decimals);
        let scaled = value * scale;
        let rounded = match self.style {
            RoundingStyle::Down => scaled.floor(),
            RoundingStyle::Up => scaled.ceil(),
            RoundingStyle::Truncate => scaled.trunc(),
            RoundingStyle::ToNearest => {
                if scaled >= 0.0 {
                    (scaled + 0.5).floor()
                } else {
                    (scaled - 0.5).ceil()
                }
            }
            RoundingStyle::NotAtAll => unreachable!(),
        };
        rounded / scale
    }
}

/// The complete set of named rounding rules a product configuration carries. Every monetary
/// and rate quantity that is ever written into a ledger passes through exactly one of these
/// before it leaves the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundingSpec {
    pub round_specamt: RoundingRule,
    pub round_death_benefit: RoundingRule,
    pub round_gross_premium: RoundingRule,
    pub round_net_premium: RoundingRule,
    pub round_withdrawal: RoundingRule,
    pub round_loan: RoundingRule,
    pub round_interest_rate: RoundingRule,
    pub round_interest_credit: RoundingRule,
    pub round_coi_rate: RoundingRule,
    pub round_coi_charge: RoundingRule,
    pub round_corridor_factor: RoundingRule,
    pub round_nsp_rate: RoundingRule,
    pub round_7702_rate: RoundingRule,
    pub round_surrender_charge: RoundingRule,
    /// Used only within the solver's internal iteration; one decimal finer than the
    /// currency subunit so bisection does not stall on currency's own rounding.
    pub round_minutiae: RoundingRule,
}

impl RoundingSpec {
    /// A reasonable default set, consistent with the constants every product database
    /// fixture in this workspace uses unless it overrides a rule explicitly.
    pub fn sample() -> RoundingSpec {
        RoundingSpec {
            round_specamt: RoundingRule::new(0, RoundingStyle::ToNearest),
            round_death_benefit: RoundingRule::new(0, RoundingStyle::ToNearest),
            round_gross_premium: RoundingRule::new(2, RoundingStyle::ToNearest),
            round_net_premium: RoundingRule::new(2, RoundingStyle::ToNearest),
            round_withdrawal: RoundingRule::new(2, RoundingStyle::ToNearest),
            round_loan: RoundingRule::new(2, RoundingStyle::ToNearest),
            round_interest_rate: RoundingRule::new(10, RoundingStyle::ToNearest),
            round_interest_credit: RoundingRule::new(2, RoundingStyle::ToNearest),
            round_coi_rate: RoundingRule::new(10, RoundingStyle::ToNearest),
            round_coi_charge: RoundingRule::new(2, RoundingStyle::ToNearest),
            round_corridor_factor: RoundingRule::new(2, RoundingStyle::ToNearest),
            round_nsp_rate: RoundingRule::new(10, RoundingStyle::ToNearest),
            round_7702_rate: RoundingRule::new(10, RoundingStyle::ToNearest),
            round_surrender_charge: RoundingRule::new(2, RoundingStyle::ToNearest),
            round_minutiae: RoundingRule::new(3, RoundingStyle::ToNearest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_nearest_breaks_away_from_zero() {
        let r = RoundingRule::new(2, RoundingStyle::ToNearest);
        assert_eq!(r.round(1.005), 1.01);
        assert_eq!(r.round(-1.005), -1.01);
    }

    #[test]
    fn down_always_truncates_toward_negative_infinity() {
        let r = RoundingRule::new(0, RoundingStyle::Down);
        assert_eq!(r.round(1.9), 1.0);
        assert_eq!(r.round(-1.1), -2.0);
    }

    #[test]
    fn up_always_truncates_toward_positive_infinity() {
        let r = RoundingRule::new(0, RoundingStyle::Up);
        assert_eq!(r.round(1.1), 2.0);
        assert_eq!(r.round(-1.9), -1.0);
    }

    #[test]
    fn not_at_all_passes_through_unchanged() {
        let r = RoundingRule::new(0, RoundingStyle::NotAtAll);
        assert_eq!(r.round(1.23456), 1.23456);
    }

    #[test]
    fn decimal_places_are_honored() {
        let r = RoundingRule::new(6, RoundingStyle::ToNearest);
        let rate = 0.0123456789;
        assert_eq!(r.round(rate), 0.012346);
    }
}
