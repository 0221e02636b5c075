//! Proleptic-Gregorian calendar dates stored as Julian Day Numbers.
//!
//! Conversions use ACM Algorithm 199, the same integer-only scheme the spec calls for: no
//! floating point, no external date library touches the JDN<->Gregorian boundary. `chrono`
//! is still used at the edges (CSV/JSON field parsing, "today") since that's the ambient
//! date crate the rest of this workspace already depends on.

use crate::error::LmiError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const JDN_0001_03_01: i64 = 1_721_119;
const DAYS_IN_FOUR_CENTURIES: i64 = 146_097;
const DAYS_IN_FOUR_YEARS: i64 = 1_461;

pub const GREGORIAN_EPOCH_JDN: i64 = 2_361_222; // 1752-09-14
pub const LAST_YYYY_DATE_JDN: i64 = 5_373_484; // 9999-12-31
pub const MIN_VERIFIED_JDN: i64 = 1_721_120;
pub const MAX_VERIFIED_JDN: i64 = 9_999_999;

/// Tie-breaking convention for "age nearest birthday"; see [`attained_age`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBasis {
    LastBirthday,
    NearestTiesOlder,
    NearestTiesYounger,
}

pub fn is_leap_year(year: i64) -> bool {
    let div4 = year % 4 == 0;
    let div100 = year % 100 == 0;
    let div400 = year % 400 == 0;
    div400 || (div4 && !div100)
}

fn days_in_month_raw(month: i64, leap: bool) -> i64 {
    const LENGTHS: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut n = LENGTHS[(month - 1) as usize];
    if leap && month == 2 {
        n += 1;
    }
    n
}

fn gregorian_to_jdn(year: i64, month: i64, day: i64) -> i64 {
    let (mut year, month) = if month > 2 {
        (year, month - 3)
    } else {
        (year - 1, month + 9)
    };
    let c = year.div_euclid(100);
    year -= 100 * c;
    JDN_0001_03_01
        + day
        + (2 + 153 * month) / 5
        + ((DAYS_IN_FOUR_YEARS * year) >> 2)
        + ((DAYS_IN_FOUR_CENTURIES * c) >> 2)
}

fn jdn_to_gregorian(jdn: i64) -> (i64, i64, i64) {
    let mut j = jdn - JDN_0001_03_01;
    let year_cent = ((j << 2) - 1) / DAYS_IN_FOUR_CENTURIES;
    j = ((j << 2) - 1) - DAYS_IN_FOUR_CENTURIES * year_cent;
    let mut day = j >> 2;
    let year_four = ((day << 2) + 3) / DAYS_IN_FOUR_YEARS;
    day = ((day << 2) + 3) - DAYS_IN_FOUR_YEARS * year_four;
    day = (day + 4) >> 2;
    let mut month = (5 * day - 3) / 153;
    day = (5 * day - 3) - 153 * month;
    day = (day + 5) / 5;
    let mut year = 100 * year_cent + year_four;
    if month < 10 {
        month += 3;
    } else {
        month -= 9;
        year += 1;
    }
    (year, month, day)
}

fn checked_gregorian_to_jdn(year: i64, month: i64, day: i64) -> Result<i64, LmiError> {
    let jdn = gregorian_to_jdn(year, month, day);
    if jdn_to_gregorian(jdn) != (year, month, day) {
        return Err(LmiError::Invariant(format!(
            "date {year:04}-{month:02}-{day:02} is invalid"
        )));
    }
    Ok(jdn)
}

/// A calendar date in `[1752-09-14, 9999-12-31]`, stored as a Julian Day Number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate {
    jdn: i64,
}

impl CalendarDate {
    pub fn from_jdn(jdn: i64) -> CalendarDate {
        CalendarDate { jdn }
    }

    pub fn from_ymd(year: i64, month: i64, day: i64) -> Result<CalendarDate, LmiError> {
        Ok(CalendarDate {
            jdn: checked_gregorian_to_jdn(year, month, day)?,
        })
    }

    pub fn julian_day_number(self) -> i64 {
        self.jdn
    }

    fn ymd(self) -> (i64, i64, i64) {
        jdn_to_gregorian(self.jdn)
    }

    pub fn year(self) -> i64 {
        self.ymd().0
    }

    pub fn month(self) -> i64 {
        self.ymd().1
    }

    pub fn day(self) -> i64 {
        self.ymd().2
    }

    pub fn is_leap_year(self) -> bool {
        is_leap_year(self.year())
    }

    pub fn days_in_month(self) -> i64 {
        days_in_month_raw(self.month(), self.is_leap_year())
    }

    pub fn days_in_year(self) -> i64 {
        365 + if self.is_leap_year() { 1 } else { 0 }
    }

    pub fn succ(self) -> CalendarDate {
        CalendarDate::from_jdn(self.jdn + 1)
    }

    pub fn add_days(self, days: i64) -> CalendarDate {
        CalendarDate::from_jdn(self.jdn + days)
    }

    pub fn is_verified(jdn: i64) -> bool {
        (MIN_VERIFIED_JDN..=MAX_VERIFIED_JDN).contains(&jdn)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (y, m, d) = self.ymd();
        write!(f, "{y:04}-{m:02}-{d:02}")
    }
}

impl std::ops::Sub for CalendarDate {
    type Output = i64;
    fn sub(self, rhs: CalendarDate) -> i64 {
        self.jdn - rhs.jdn
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<CalendarDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut parts = s.splitn(3, '-');
        let (y, m, d) = (|| -> Option<(i64, i64, i64)> {
            Some((
                parts.next()?.parse().ok()?,
                parts.next()?.parse().ok()?,
                parts.next()?.parse().ok()?,
            ))
        })()
        .ok_or_else(|| de::Error::custom(format!("malformed date: {s:?}")))?;
        CalendarDate::from_ymd(y, m, d).map_err(de::Error::custom)
    }
}

/// Add years (curtate or not). Equivalent to `add_years_and_months(date, n, 0, curtate)`.
pub fn add_years(date: CalendarDate, n_years: i64, is_curtate: bool) -> CalendarDate {
    add_years_and_months(date, n_years, 0, is_curtate)
}

/// Add a number of years and months, per two conventions for a nonexistent target day:
/// curtate clamps to the last day of the target month; anniversary rolls to the first of
/// the next month instead.
pub fn add_years_and_months(
    date: CalendarDate,
    n_years: i64,
    n_months: i64,
    is_curtate: bool,
) -> CalendarDate {
    let mut year = date.year() + n_years;
    let month = date.month() + n_months;
    let day = date.day();

    let mut origin_zero_month = month - 1;
    year += origin_zero_month.div_euclid(12);
    origin_zero_month = origin_zero_month.rem_euclid(12);
    let month = origin_zero_month + 1;

    let last_day_of_month = days_in_month_raw(month, is_leap_year(year));
    let no_such_day = last_day_of_month < day;
    let day = if no_such_day { last_day_of_month } else { day };

    let result = CalendarDate::from_ymd(year, month, day).expect("clamped day is always valid");
    if no_such_day && !is_curtate {
        result.succ()
    } else {
        result
    }
}

/// Successive anniversaries of `base_date` that bracket `other_date`: `other_date` lies in
/// `[anniversary0, anniversary1)`. If `other_date` falls exactly on an anniversary, the
/// bracket starts there.
pub fn bracketing_anniversaries(
    base_date: CalendarDate,
    other_date: CalendarDate,
) -> (CalendarDate, CalendarDate) {
    let offset = other_date.year() - base_date.year();
    let adjacent = add_years(base_date, offset, false);
    if other_date < adjacent {
        (add_years(base_date, offset - 1, false), adjacent)
    } else {
        (adjacent, add_years(base_date, offset + 1, false))
    }
}

fn notional_age(birthdate: CalendarDate, as_of_date: CalendarDate, basis: AgeBasis) -> i64 {
    let (last_birthday, next_birthday) = bracketing_anniversaries(birthdate, as_of_date);
    let days_since_last = as_of_date.julian_day_number() - last_birthday.julian_day_number();
    let days_until_next = next_birthday.julian_day_number() - as_of_date.julian_day_number();
    let age_last_birthday = last_birthday.year() - birthdate.year();
    let delta = match basis {
        AgeBasis::LastBirthday => 0,
        AgeBasis::NearestTiesOlder => (days_until_next <= days_since_last) as i64,
        AgeBasis::NearestTiesYounger => (days_until_next < days_since_last) as i64,
    };
    age_last_birthday + delta
}

/// Attained age on `as_of_date` if born on `birthdate`. Fails if `as_of_date` precedes
/// `birthdate`.
pub fn attained_age(
    birthdate: CalendarDate,
    as_of_date: CalendarDate,
    basis: AgeBasis,
) -> Result<i64, LmiError> {
    if as_of_date < birthdate {
        return Err(LmiError::Invariant(format!(
            "as-of date ({as_of_date}) precedes birthdate ({birthdate})"
        )));
    }
    Ok(notional_age(birthdate, as_of_date, basis))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i64, m: i64, d: i64) -> CalendarDate {
        CalendarDate::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn jdn_round_trip() {
        for jdn in [MIN_VERIFIED_JDN, GREGORIAN_EPOCH_JDN, 2_451_545, MAX_VERIFIED_JDN] {
            let d = CalendarDate::from_jdn(jdn);
            assert_eq!(CalendarDate::from_ymd(d.year(), d.month(), d.day()).unwrap().jdn, jdn);
        }
    }

    #[test]
    fn leap_year_rule() {
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2023));
    }

    #[test]
    fn add_years_equals_add_years_and_months_zero() {
        let d = ymd(1990, 2, 15);
        assert_eq!(add_years(d, 10, true), add_years_and_months(d, 10, 0, true));
    }

    #[test]
    fn curtate_vs_anniversary_on_month_end() {
        let jan31 = ymd(2001, 1, 31);
        let curtate = add_years_and_months(jan31, 0, 1, true);
        let anniversary = add_years_and_months(jan31, 0, 1, false);
        assert_eq!(curtate, ymd(2001, 2, 28));
        assert_eq!(anniversary, ymd(2001, 3, 1));
    }

    #[test]
    fn leap_day_birthday_majority() {
        let leap_birthday = ymd(2000, 2, 29);
        assert_eq!(add_years(leap_birthday, 18, false), ymd(2018, 3, 1));
        assert_eq!(add_years(leap_birthday, 18, true), ymd(2018, 2, 28));
    }

    #[test]
    fn attained_age_zero_on_birthdate() {
        let b = ymd(1980, 6, 15);
        assert_eq!(attained_age(b, b, AgeBasis::LastBirthday).unwrap(), 0);
    }

    #[test]
    fn attained_age_fails_before_birthdate() {
        let b = ymd(1980, 6, 15);
        assert!(attained_age(b, b.add_days(-1), AgeBasis::LastBirthday).is_err());
    }

    #[test]
    fn attained_age_nearest_birthday_ties() {
        // Born 2000-01-01; as-of 2000-07-01 is exactly halfway (leap year, 366 days).
        let b = ymd(2000, 1, 1);
        let midpoint = ymd(2000, 7, 1);
        assert_eq!(attained_age(b, midpoint, AgeBasis::NearestTiesOlder).unwrap(), 1);
        assert_eq!(attained_age(b, midpoint, AgeBasis::NearestTiesYounger).unwrap(), 0);
    }

    #[test]
    fn currency_like_text_round_trip() {
        let d = ymd(2023, 11, 4);
        assert_eq!(d.to_string(), "2023-11-04");
    }
}
