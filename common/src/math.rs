use std::ops::{Add, AddAssign, Mul, MulAssign, Sub, SubAssign};

use serde::Deserialize;

/// A probability in the range 0-1
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Deserialize)]
#[serde(try_from = "f64")]
pub struct Probability(f64);

impl Mul<Probability> for Probability {
    type Output = Probability;

    fn mul(self, rhs: Probability) -> Self::Output {
        Probability(self.0 * rhs.0)
    }
}

impl Probability {
    pub const UNKNOWN: Probability = Probability(0.5);

    pub const fn new_unchecked(value: f64) -> Probability {
        Probability(value)
    }

    pub fn new(value: f64) -> Probability {
        assert!(
            (0.0..=1.0).contains(&value),
            "A probability needs to be in the interval [0.0, 1.0], got: {value}"
        );
        Probability(value)
    }

    pub fn log_odds(&self) -> LogOdds {
        LogOdds((self.0 / (1.0 - self.0)).ln())
    }

    pub fn log(&self) -> LogProbability {
        LogProbability::new_unchecked(self.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// The complementary probability `1 - p`.
    pub fn inverse(&self) -> Probability {
        Probability(1.0 - self.0)
    }
}

impl TryFrom<f64> for Probability {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if (0.0..=1.0).contains(&value) {
            Ok(Probability(value))
        } else {
            Err(format!("{value} is not a probability"))
        }
    }
}

impl From<LogOdds> for Probability {
    fn from(value: LogOdds) -> Self {
        value.probability()
    }
}

/// A probability represented in the log space. When many probabilities are multiplied together, this improves performance and numerical stability.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LogProbability(f64);

impl Mul<LogProbability> for LogProbability {
    type Output = LogProbability;

    fn mul(self, rhs: LogProbability) -> Self::Output {
        LogProbability(self.0 + rhs.0)
    }
}

impl MulAssign<LogProbability> for LogProbability {
    fn mul_assign(&mut self, rhs: LogProbability) {
        self.0 += rhs.0;
    }
}

impl Add<LogProbability> for LogProbability {
    type Output = LogProbability;

    fn add(self, rhs: LogProbability) -> Self::Output {
        // More involved, see https://en.wikipedia.org/wiki/Log_probability

        let (x, y) = if self.0 > rhs.0 {
            (self.0, rhs.0)
        } else {
            (rhs.0, self.0)
        };

        if y == f64::NEG_INFINITY {
            return LogProbability(x);
        }

        LogProbability(x + (y - x).exp().ln_1p())
    }
}

impl LogProbability {
    /// The certain event, `ln(1) = 0`.
    pub const ONE: LogProbability = LogProbability(0.0);

    pub fn new_unchecked(value: f64) -> LogProbability {
        LogProbability(value.ln())
    }

    pub fn new(value: f64) -> LogProbability {
        assert!(
            (0.0..=1.0).contains(&value),
            "A probability needs to be in the interval [0.0, 1.0], got: {value}"
        );
        Self::new_unchecked(value)
    }

    /// Wraps a value that is already in log space.
    pub const fn from_ln(ln: f64) -> LogProbability {
        LogProbability(ln)
    }

    pub fn ln(&self) -> f64 {
        self.0
    }

    pub fn prob(&self) -> Probability {
        Probability(self.0.exp())
    }
}

impl MulAssign<f64> for LogProbability {
    fn mul_assign(&mut self, rhs: f64) {
        self.0 += rhs.ln();
    }
}

/// A probability in log-odds representation. Range +/- infinity.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LogOdds(f64);

impl Add<LogOdds> for LogOdds {
    type Output = LogOdds;

    fn add(self, rhs: LogOdds) -> Self::Output {
        LogOdds(self.0 + rhs.0)
    }
}

impl AddAssign<LogOdds> for LogOdds {
    fn add_assign(&mut self, rhs: LogOdds) {
        self.0 += rhs.0
    }
}

impl Sub<LogOdds> for LogOdds {
    type Output = LogOdds;

    fn sub(self, rhs: LogOdds) -> Self::Output {
        LogOdds(self.0 - rhs.0)
    }
}

impl SubAssign<LogOdds> for LogOdds {
    fn sub_assign(&mut self, rhs: LogOdds) {
        self.0 -= rhs.0
    }
}

impl LogOdds {
    pub const fn new(value: f64) -> LogOdds {
        LogOdds(value)
    }

    pub fn probability(&self) -> Probability {
        Probability(1.0 - 1.0 / (1.0 + self.0.exp()))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Limits the magnitude so a cell can still change its mind after many observations.
    pub fn clamp(self, limit: f64) -> LogOdds {
        LogOdds(self.0.clamp(-limit, limit))
    }
}

impl From<Probability> for LogOdds {
    fn from(value: Probability) -> Self {
        value.log_odds()
    }
}

/// Wraps an angle into the range (-PI, PI].
pub fn normalize_angle(angle: f64) -> f64 {
    f64::atan2(angle.sin(), angle.cos())
}

#[cfg(test)]
mod test {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn inverse() {
        for v in 1..100 {
            let value = v as f64 / 100.0;

            assert_relative_eq!(
                Probability(value).log_odds().probability().0,
                Probability(value).0,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn zero_is_half() {
        assert_relative_eq!(Probability(0.5).log_odds().0, 0.0);
        assert_relative_eq!(LogOdds::new(0.0).probability().value(), 0.5);
    }

    #[test]
    fn log_probability_add_is_sum_of_probabilities() {
        let sum = LogProbability::new(0.25) + LogProbability::new(0.5);
        assert_relative_eq!(sum.prob().value(), 0.75, epsilon = 1e-12);

        let sum = LogProbability::from_ln(f64::NEG_INFINITY) + LogProbability::new(0.5);
        assert_relative_eq!(sum.prob().value(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn log_probability_mul_is_product() {
        let mut product = LogProbability::ONE;
        product *= 0.5;
        product *= LogProbability::new(0.5);
        assert_relative_eq!(product.prob().value(), 0.25, epsilon = 1e-12);
        assert!(LogProbability::new(0.1) < LogProbability::new(0.2));
    }

    #[test]
    fn probability_rejects_out_of_range() {
        assert!(Probability::try_from(1.5).is_err());
        assert_eq!(Probability::try_from(0.25), Ok(Probability(0.25)));
    }

    #[test]
    fn test_normalize_angle() {
        assert_relative_eq!(normalize_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(-PI / 4.0), -PI / 4.0, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(4.0 * PI + 0.5), 0.5, epsilon = 1e-12);
    }
}
