use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-point money value with 2 decimal places, stored in centavos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 100;

    pub const ZERO: Amount = Amount(0);

    /// Largest magnitude accepted from outside: one trillion.
    pub const MAX: Amount = Amount(1_000_000_000_000 * Self::SCALE);

    /// Nearest centavo, clamped to `[-MAX, MAX]`; NaN maps to zero.
    pub fn from_float(value: f64) -> Self {
        let scaled = (value * Self::SCALE as f64).round();
        if scaled.is_nan() {
            return Self::ZERO;
        }
        let max = Self::MAX.0 as f64;
        Amount(scaled.clamp(-max, max) as i64)
    }

    pub fn from_scaled(value: i64) -> Self {
        Amount(value)
    }

    pub fn to_float(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// Parse a user-typed amount. Accepts `,` as decimal separator.
    /// Anything that does not parse to a finite number reads as zero, and
    /// negative values are clamped to zero.
    pub fn parse_input(input: &str) -> Self {
        let normalized = input.trim().replace(',', ".");
        match normalized.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::from_float(value).non_negative(),
            _ => Self::ZERO,
        }
    }

    pub fn non_negative(self) -> Self {
        self.max(Self::ZERO)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Amount(self.0.saturating_sub(rhs.0))
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// `self * percent / 100`, rounded half away from zero to the centavo.
    pub fn percent_of(self, percent: Percent) -> Self {
        let product = self.0 as i128 * percent.0 as i128;
        let rounded = (product.abs() + Percent::SCALE / 2) / Percent::SCALE;
        let signed = if product < 0 { -rounded } else { rounded };
        Amount(signed as i64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / Self::SCALE;
        let frac = abs % Self::SCALE;
        write!(f, "{sign}{whole}.{frac:02}")
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

// Amounts travel as plain JSON numbers (`140.0`), like the persistence boundary stores them.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_float())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Amount::from_float)
    }
}

/// A percentage stored in basis points (`5%` is `500`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Percent(i64);

impl Percent {
    /// Basis points per whole (100%).
    const SCALE: i128 = 10_000;

    /// Rates are clamped to `0%..=100%`; NaN maps to zero.
    pub fn from_float(value: f64) -> Self {
        let points = (value * 100.0).round();
        if points.is_nan() {
            return Percent(0);
        }
        Percent(points.clamp(0.0, Self::SCALE as f64) as i64)
    }

    pub fn from_basis_points(value: i64) -> Self {
        Percent(value.clamp(0, Self::SCALE as i64))
    }

    pub fn basis_points(self) -> i64 {
        self.0
    }

    pub fn to_float(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = (self.0 % 100).abs();
        if frac == 0 {
            write!(f, "{whole}%")
        } else if frac % 10 == 0 {
            write!(f, "{whole}.{}%", frac / 10)
        } else {
            write!(f, "{whole}.{frac:02}%")
        }
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_float())
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Percent::from_float)
    }
}
