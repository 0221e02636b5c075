//! Exact-cents monetary scalar.
//!
//! A [`Currency`] stores an integer number of subunits (cents) in an `i64`, so addition,
//! subtraction, negation, and multiplication by an integer are exact -- no floating-point
//! drift ever enters a running account-value balance. Converting to or from a real fraction
//! is explicit and always rounds half-away-from-zero at the subunit.

use crate::error::LmiError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

pub const SUBUNITS_PER_UNIT: i64 = 100;

/// An exact number of cents, represented as total subunits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency {
    subunits: i64,
}

impl Currency {
    pub const ZERO: Currency = Currency { subunits: 0 };

    pub fn max_units() -> i64 {
        i64::MAX / SUBUNITS_PER_UNIT
    }

    /// Construct from a non-negative number of units and a normalized subunit in `[0, 100)`.
    pub fn from_units(units: i64, subunits: i32) -> Result<Currency, LmiError> {
        if units < 0 || units >= Self::max_units() {
            return Err(LmiError::Invariant(format!(
                "currency amount out of range: {units} units"
            )));
        }
        if !(0..SUBUNITS_PER_UNIT as i32).contains(&subunits) {
            return Err(LmiError::Invariant(format!(
                "invalid currency subunits: {subunits}"
            )));
        }
        Ok(Currency {
            subunits: SUBUNITS_PER_UNIT * units + subunits as i64,
        })
    }

    /// Construct by rounding a real amount of units half-away-from-zero at the subunit.
    pub fn from_fraction(value: f64) -> Result<Currency, LmiError> {
        if value.trunc().abs() >= Self::max_units() as f64 {
            return Err(LmiError::Invariant(format!(
                "currency amount out of range: {value}"
            )));
        }
        let scaled = (SUBUNITS_PER_UNIT as f64) * value;
        let rounded = if scaled >= 0.0 {
            (scaled + 0.5).floor()
        } else {
            (scaled - 0.5).ceil()
        };
        Ok(Currency {
            subunits: rounded as i64,
        })
    }

    pub fn from_subunits(subunits: i64) -> Currency {
        Currency { subunits }
    }

    /// Whole units; may be negative. Truncates toward the subunits' sign, matching the
    /// source: -12.34 is -12 units and -34 subunits, not -13 units and +66 subunits.
    pub fn units(self) -> i64 {
        self.subunits / SUBUNITS_PER_UNIT
    }

    pub fn subunits(self) -> i32 {
        (self.subunits % SUBUNITS_PER_UNIT) as i32
    }

    pub fn total_subunits(self) -> i64 {
        self.subunits
    }

    /// Convert to a floating-point amount of units, for use in calculations this type does
    /// not itself provide (interest, rate multiplication). Callers must round the result
    /// back through [`Currency::from_fraction`] explicitly.
    pub fn value(self) -> f64 {
        self.subunits as f64 / SUBUNITS_PER_UNIT as f64
    }

    pub fn is_negative(self) -> bool {
        self.subunits < 0
    }

    pub fn checked_mul_int(self, factor: i64) -> Result<Currency, LmiError> {
        self.subunits
            .checked_mul(factor)
            .map(Currency::from_subunits)
            .ok_or_else(|| LmiError::Invariant(format!("currency overflow: {self} * {factor}")))
    }

    pub fn max(self, other: Currency) -> Currency {
        if self >= other {
            self
        } else {
            other
        }
    }

    pub fn min(self, other: Currency) -> Currency {
        if self <= other {
            self
        } else {
            other
        }
    }
}

impl Neg for Currency {
    type Output = Currency;
    fn neg(self) -> Currency {
        Currency::from_subunits(-self.subunits)
    }
}

impl Add for Currency {
    type Output = Currency;
    fn add(self, rhs: Currency) -> Currency {
        Currency::from_subunits(self.subunits + rhs.subunits)
    }
}

impl AddAssign for Currency {
    fn add_assign(&mut self, rhs: Currency) {
        self.subunits += rhs.subunits;
    }
}

impl Sub for Currency {
    type Output = Currency;
    fn sub(self, rhs: Currency) -> Currency {
        Currency::from_subunits(self.subunits - rhs.subunits)
    }
}

impl SubAssign for Currency {
    fn sub_assign(&mut self, rhs: Currency) {
        self.subunits -= rhs.subunits;
    }
}

impl Mul<i64> for Currency {
    type Output = Currency;
    fn mul(self, rhs: i64) -> Currency {
        Currency::from_subunits(self.subunits * rhs)
    }
}

impl MulAssign<i64> for Currency {
    fn mul_assign(&mut self, rhs: i64) {
        self.subunits *= rhs;
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subunits < 0 {
            write!(f, "-")?;
        }
        write!(f, "{}.{:02}", self.units().abs(), self.subunits().abs())
    }
}

impl FromStr for Currency {
    type Err = LmiError;

    fn from_str(s: &str) -> Result<Currency, LmiError> {
        let bad = || LmiError::Invariant(format!("malformed currency text: {s:?}"));
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (units_str, subunits_str) = rest.split_once('.').ok_or_else(bad)?;
        if subunits_str.len() != 2 {
            return Err(bad());
        }
        let units: i64 = units_str.parse().map_err(|_| bad())?;
        let subunits: i32 = subunits_str.parse().map_err(|_| bad())?;
        if !(0..100).contains(&subunits) {
            return Err(bad());
        }
        let c = Currency::from_units(units, subunits)?;
        Ok(if negative { -c } else { c })
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Currency, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_then_subtraction_is_exact() {
        let a = Currency::from_fraction(123.45).unwrap();
        let b = Currency::from_fraction(0.01).unwrap();
        assert_eq!((a + b) - b, a);
    }

    #[test]
    fn multiply_by_integer_is_exact() {
        let c = Currency::from_fraction(10.00).unwrap();
        assert_eq!(c.checked_mul_int(3).unwrap(), Currency::from_fraction(30.00).unwrap());
    }

    #[test]
    fn half_away_from_zero_rounding() {
        assert_eq!(Currency::from_fraction(0.005).unwrap().to_string(), "0.01");
        assert_eq!(Currency::from_fraction(-0.005).unwrap().to_string(), "-0.01");
    }

    #[test]
    fn text_round_trip() {
        let c = Currency::from_fraction(-42.07).unwrap();
        let text = c.to_string();
        assert_eq!(text, "-42.07");
        assert_eq!(text.parse::<Currency>().unwrap(), c);
    }

    #[test]
    fn rejects_malformed_subunits() {
        assert!("1.234".parse::<Currency>().is_err());
        assert!("1.2".parse::<Currency>().is_err());
        assert!("abc".parse::<Currency>().is_err());
    }

    #[test]
    fn from_units_rejects_bad_subunits() {
        assert!(Currency::from_units(1, 100).is_err());
        assert!(Currency::from_units(1, -1).is_err());
    }

    #[test]
    fn negative_units_and_subunits_share_sign() {
        let c = Currency::from_fraction(-12.34).unwrap();
        assert_eq!(c.units(), -12);
        assert_eq!(c.subunits(), -34);
    }

    #[test]
    fn checked_mul_int_detects_overflow() {
        let c = Currency::from_subunits(i64::MAX / 2 + 1);
        assert!(c.checked_mul_int(3).is_err());
    }
}
