/*!
    Rational numbers and timestamp rescaling.
*/

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::code::NOPTS_VALUE;

/**
    A rational number, used for time bases and frame rates.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Microsecond time base, used for container level durations.
    pub const MICROS: Self = Self::new(1, 1_000_000);

    /**
        Returns true if both terms are positive.
    */
    pub const fn is_valid(self) -> bool {
        self.num > 0 && self.den > 0
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub const fn invert(self) -> Self {
        Self::new(self.den, self.num)
    }

    /**
        Convert a timestamp in this time base into a [`Duration`].

        Returns `None` for negative timestamps and invalid time bases.
    */
    pub fn to_duration(self, ts: i64) -> Option<Duration> {
        if ts < 0 || !self.is_valid() {
            return None;
        }
        let micros = rescale(ts, self, Self::MICROS);
        u64::try_from(micros).ok().map(Duration::from_micros)
    }

    /**
        Convert a [`Duration`] into a timestamp in this time base.
    */
    pub fn from_duration(self, d: Duration) -> i64 {
        let micros = i64::try_from(d.as_micros()).unwrap_or(i64::MAX);
        rescale(micros, Self::MICROS, self)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/**
    Rescale `value` from time base `from` to time base `to`, rounding to the
    nearest integer with halfway cases away from zero.

    The "no timestamp" value passes through unchanged, and a zero term in
    either time base leaves the value as is.
*/
pub fn rescale(value: i64, from: Rational, to: Rational) -> i64 {
    if value == NOPTS_VALUE || from == to {
        return value;
    }
    if from.den == 0 || to.num == 0 || from.num == 0 || to.den == 0 {
        return value;
    }

    let mut num = value as i128 * from.num as i128 * to.den as i128;
    let mut den = from.den as i128 * to.num as i128;
    if den < 0 {
        num = -num;
        den = -den;
    }

    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    rounded.clamp(i64::MIN as i128 + 1, i64::MAX as i128) as i64
}
