//! Fixed-point numbers with two decimal places.
//!
//! The server stores every amount, quantity and tax rate as a two-place
//! decimal and emits them as strings (`"1180.00"`). Keeping them as a count
//! of hundredths avoids float drift when totals are recomputed locally.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal2(i64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid decimal value: {0:?}")]
pub struct ParseDecimalError(String);

/// Divide rounding half away from zero.
fn div_round(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

/// Clamp to the representable range.
fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

impl Decimal2 {
    pub const ZERO: Decimal2 = Decimal2(0);

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    pub const fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Product of two two-place values, rounded half-up back to two places.
    /// Saturates instead of overflowing, as do `+` and `-`.
    pub fn times(self, other: Decimal2) -> Decimal2 {
        let raw = i128::from(self.0) * i128::from(other.0);
        Decimal2(saturate(div_round(raw, 100)))
    }

    /// `self × percent / 100`, rounded half-up to two places.
    pub fn percent(self, percent: Decimal2) -> Decimal2 {
        let raw = i128::from(self.0) * i128::from(percent.0);
        Decimal2(saturate(div_round(raw, 10_000)))
    }

    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * 100.0).round();
        if scaled.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }
}

impl FromStr for Decimal2 {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(err());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };

        // Two places kept; a third digit rounds half-up, the rest is ignored.
        let mut places = fraction.bytes().map(|b| i64::from(b - b'0'));
        let tenths = places.next().unwrap_or(0);
        let hundredths = places.next().unwrap_or(0);
        let round_up = places.next().map(|d| d >= 5).unwrap_or(false);

        let mut value = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(tenths * 10 + hundredths))
            .ok_or_else(err)?;
        if round_up {
            value = value.checked_add(1).ok_or_else(err)?;
        }
        Ok(Self(if negative { -value } else { value }))
    }
}

impl fmt::Display for Decimal2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Decimal2 {
    type Output = Decimal2;

    fn add(self, rhs: Decimal2) -> Decimal2 {
        Decimal2(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Decimal2 {
    fn add_assign(&mut self, rhs: Decimal2) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Decimal2 {
    type Output = Decimal2;

    fn sub(self, rhs: Decimal2) -> Decimal2 {
        Decimal2(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Decimal2 {
    fn sum<I: Iterator<Item = Decimal2>>(iter: I) -> Decimal2 {
        iter.fold(Decimal2::ZERO, Add::add)
    }
}

impl Serialize for Decimal2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// The server sends decimal strings; hand-written fixtures and some older
// endpoints send bare numbers.
impl<'de> Deserialize<'de> for Decimal2 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DecimalVisitor;

        impl<'de> de::Visitor<'de> for DecimalVisitor {
            type Value = Decimal2;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a decimal string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                v.checked_mul(100)
                    .map(Decimal2)
                    .ok_or_else(|| E::custom("decimal out of range"))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v)
                    .ok()
                    .and_then(|v| v.checked_mul(100))
                    .map(Decimal2)
                    .ok_or_else(|| E::custom("decimal out of range"))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Decimal2::from_f64(v).ok_or_else(|| E::custom("decimal out of range"))
            }
        }

        deserializer.deserialize_any(DecimalVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal2 {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(d("1180.00").hundredths(), 118_000);
        assert_eq!(d("18").hundredths(), 1_800);
        assert_eq!(d("0.5").hundredths(), 50);
        assert_eq!(d(".25").hundredths(), 25);
        assert_eq!(d("-3.10").hundredths(), -310);
        assert_eq!(d("2.345").hundredths(), 235);
        assert_eq!(d("2.344").hundredths(), 234);
        assert!("".parse::<Decimal2>().is_err());
        assert!("abc".parse::<Decimal2>().is_err());
        assert!("1.2.3".parse::<Decimal2>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Decimal2::from_hundredths(118_000).to_string(), "1180.00");
        assert_eq!(Decimal2::from_hundredths(5).to_string(), "0.05");
        assert_eq!(Decimal2::from_hundredths(-310).to_string(), "-3.10");
    }

    #[test]
    fn test_mul_and_percent_round_half_up() {
        // 3 × 33.33 = 99.99
        assert_eq!(d("3").times(d("33.33")), d("99.99"));
        // 1.5 × 0.33 = 0.495 → 0.50
        assert_eq!(d("1.5").times(d("0.33")), d("0.50"));
        // 18% of 599.99 = 107.9982 → 108.00
        assert_eq!(d("599.99").percent(d("18")), d("108.00"));
        // 18% of 0.25 = 0.045 → 0.05
        assert_eq!(d("0.25").percent(d("18")), d("0.05"));
    }

    #[test]
    fn test_huge_amounts_saturate() {
        let max = Decimal2::from_hundredths(i64::MAX);
        assert_eq!(max + d("1"), max);
        assert_eq!(max.times(d("1000")), max);
        assert_eq!(max.percent(d("-500")), Decimal2::from_hundredths(i64::MIN));
        assert_eq!(Decimal2::from_hundredths(i64::MIN) - d("1"), Decimal2::from_hundredths(i64::MIN));

        let total: Decimal2 = [max, max, d("5")].into_iter().sum();
        assert_eq!(total, max);

        let mut running = max;
        running += d("0.01");
        assert_eq!(running, max);
    }

    #[test]
    fn test_deserialize_string_or_number() {
        let values: Vec<Decimal2> = serde_json::from_str(r#"["12.50", 7, 0.1, "0"]"#).unwrap();
        assert_eq!(values, vec![d("12.50"), d("7"), d("0.10"), Decimal2::ZERO]);
    }

    #[test]
    fn test_serialize_as_string() {
        let json = serde_json::to_string(&d("18")).unwrap();
        assert_eq!(json, r#""18.00""#);
    }
}
