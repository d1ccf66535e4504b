use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const SCALE: u32 = 100;
const MAX_HUNDREDTHS: u16 = 100 * 100;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum PercentageError {
    #[error("percentage must be a finite value between 0 and 100, got {0}")]
    OutOfRange(f64),
}

/// A percentage between 0.00 and 100.00, kept as whole hundredths of a percent.
///
/// Both enrollment progress and quiz scores are two-decimal percentages. Storing
/// hundredths keeps recorded values exact, and every conversion from a ratio
/// rounds half up (half away from zero), so the same inputs always produce the
/// same stored value.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct Percentage(u16);

impl Percentage {
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(MAX_HUNDREDTHS);

    /// `numerator / denominator * 100`, rounded half up to two decimals and
    /// clamped to 100.
    ///
    /// Returns `None` when `denominator` is zero; callers decide what an empty
    /// ratio means.
    #[must_use]
    pub fn from_ratio(numerator: usize, denominator: usize) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let num = numerator as u128 * u128::from(MAX_HUNDREDTHS);
        let den = denominator as u128;
        let rounded = (2 * num + den) / (2 * den);
        let clamped = rounded.min(u128::from(MAX_HUNDREDTHS));
        // clamped <= 10_000 always fits
        Some(Self(u16::try_from(clamped).unwrap_or(MAX_HUNDREDTHS)))
    }

    /// Builds a percentage from hundredths (`6667` is 66.67%).
    #[must_use]
    pub fn from_hundredths(hundredths: u16) -> Option<Self> {
        (hundredths <= MAX_HUNDREDTHS).then_some(Self(hundredths))
    }

    /// Arithmetic mean of the given percentages, rounded half up.
    ///
    /// Returns `Percentage::ZERO` for an empty input.
    #[must_use]
    pub fn mean<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Percentage>,
    {
        let (sum, count) = values
            .into_iter()
            .fold((0_u128, 0_u128), |(s, c), p| (s + u128::from(p.0), c + 1));
        if count == 0 {
            return Self::ZERO;
        }
        let rounded = (2 * sum + count) / (2 * count);
        Self(u16::try_from(rounded).unwrap_or(MAX_HUNDREDTHS))
    }

    #[must_use]
    pub fn hundredths(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / f64::from(SCALE)
    }

    #[must_use]
    pub fn is_full(self) -> bool {
        self.0 >= MAX_HUNDREDTHS
    }
}

impl From<Percentage> for f64 {
    fn from(value: Percentage) -> Self {
        value.as_f64()
    }
}

impl TryFrom<f64> for Percentage {
    type Error = PercentageError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(PercentageError::OutOfRange(value));
        }
        let hundredths = (value * f64::from(SCALE)).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let hundredths = hundredths as u16;
        Ok(Self(hundredths.min(MAX_HUNDREDTHS)))
    }
}

impl fmt::Debug for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Percentage({self})")
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_rounds_to_two_decimals() {
        assert_eq!(Percentage::from_ratio(2, 3).unwrap().hundredths(), 6667);
        assert_eq!(Percentage::from_ratio(1, 3).unwrap().hundredths(), 3333);
        assert_eq!(Percentage::from_ratio(2, 4).unwrap().as_f64(), 50.0);
    }

    #[test]
    fn ratio_rounds_half_up() {
        // 1/16 = 6.25% exactly; 1/32 = 3.125% -> 3.13
        assert_eq!(Percentage::from_ratio(1, 16).unwrap().hundredths(), 625);
        assert_eq!(Percentage::from_ratio(1, 32).unwrap().hundredths(), 313);
        // 1/20000 = 0.005% -> 0.01
        assert_eq!(Percentage::from_ratio(1, 20_000).unwrap().hundredths(), 1);
    }

    #[test]
    fn ratio_clamps_above_full() {
        assert_eq!(Percentage::from_ratio(5, 4), Some(Percentage::FULL));
        assert!(Percentage::from_ratio(4, 4).unwrap().is_full());
    }

    #[test]
    fn empty_ratio_is_none() {
        assert_eq!(Percentage::from_ratio(0, 0), None);
    }

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(Percentage::from_ratio(2, 3).unwrap().to_string(), "66.67");
        assert_eq!(Percentage::FULL.to_string(), "100.00");
        assert_eq!(Percentage::ZERO.to_string(), "0.00");
    }

    #[test]
    fn mean_rounds_half_up() {
        let values = [
            Percentage::from_hundredths(5000).unwrap(),
            Percentage::from_hundredths(10_000).unwrap(),
            Percentage::from_hundredths(0).unwrap(),
        ];
        assert_eq!(Percentage::mean(values).hundredths(), 5000);
        let values = [
            Percentage::from_hundredths(1).unwrap(),
            Percentage::from_hundredths(2).unwrap(),
        ];
        assert_eq!(Percentage::mean(values).hundredths(), 2);
        assert_eq!(Percentage::mean([]), Percentage::ZERO);
    }

    #[test]
    fn float_conversion_rejects_out_of_range() {
        assert!(Percentage::try_from(100.5).is_err());
        assert!(Percentage::try_from(f64::NAN).is_err());
        assert_eq!(Percentage::try_from(66.67).unwrap().hundredths(), 6667);
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&Percentage::from_ratio(2, 3).unwrap()).unwrap();
        assert_eq!(json, "66.67");
        let back: Percentage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hundredths(), 6667);
    }
}
