//! Dollar amounts for reports.
//!
//! Amounts travel through the codec as integer cents. `Dollars` is the
//! display side: a `rust_decimal` value held at exactly two places.

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign};

/// A dollar amount with exactly 2 decimal places.
///
/// # Examples
///
/// ```
/// use spr_file::Dollars;
///
/// assert_eq!(Dollars::from_cents(150_000).to_string(), "1500.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Dollars(Decimal);

impl Dollars {
    pub const SCALE: u32 = 2;

    pub fn from_cents(cents: i64) -> Self {
        Dollars(Decimal::new(cents, Self::SCALE))
    }
}

impl fmt::Display for Dollars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Dollars {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for Dollars {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Serialize for Dollars {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents_keeps_two_places() {
        assert_eq!(Dollars::from_cents(0).to_string(), "0.00");
        assert_eq!(Dollars::from_cents(5).to_string(), "0.05");
        assert_eq!(Dollars::from_cents(100_000_000).to_string(), "1000000.00");
        assert_eq!(Dollars::from_cents(-250).to_string(), "-2.50");
    }

    #[test]
    fn test_serializes_as_string() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize((Dollars::from_cents(1250),)).unwrap();
        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(output, "12.50\n");
    }

    #[test]
    fn test_sum_preserves_scale() {
        let mut total = Dollars::default();
        total += Dollars::from_cents(150);
        total += Dollars::from_cents(250);
        assert_eq!(total, Dollars::from_cents(400));
        assert_eq!((total + Dollars::from_cents(1)).to_string(), "4.01");
    }
}
