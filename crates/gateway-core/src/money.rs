//! Fixed-point USD amounts.
//!
//! Costs are accumulated as integer micro-dollars to avoid float drift
//! across many additions (design §9, "Float cost"); only the wire
//! representation is a decimal number.

use serde::{Serialize, Serializer};
use std::ops::Add;

/// A monetary amount stored as whole micro-dollars (1e-6 USD).
///
/// `Cost` rounds to 6 decimal places half-to-even on construction from a
/// float, matching the design's cost-rounding rule, and serializes as a
/// plain decimal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Cost {
    micros: i64,
}

impl Cost {
    /// The zero amount.
    pub const ZERO: Cost = Cost { micros: 0 };

    /// Constructs a `Cost` directly from a micro-dollar integer.
    pub const fn from_micros(micros: i64) -> Self {
        Cost { micros }
    }

    /// Rounds `value` (in whole dollars) to 6 decimals, half-to-even, and
    /// stores it as micro-dollars.
    pub fn from_f64_rounded(value: f64) -> Self {
        let scaled = value * 1_000_000.0;
        Cost {
            micros: round_half_to_even(scaled) as i64,
        }
    }

    /// The amount as whole micro-dollars.
    pub fn as_micros(self) -> i64 {
        self.micros
    }

    /// The amount as a dollar-denominated float, for JSON output or display.
    pub fn as_f64(self) -> f64 {
        self.micros as f64 / 1_000_000.0
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost {
            micros: self.micros + rhs.micros,
        }
    }
}

impl Serialize for Cost {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Round-half-to-even ("banker's rounding") to the nearest integer.
fn round_half_to_even(x: f64) -> f64 {
    let floor = x.floor();
    let diff = x - floor;
    if diff < 0.5 {
        floor
    } else if diff > 0.5 {
        floor + 1.0
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_to_even() {
        // 0.0000005 -> midpoint between 0 and 1 micro-unit at the 6th decimal;
        // exercised directly against the micro-scaled halves.
        assert_eq!(round_half_to_even(2.5), 2.0);
        assert_eq!(round_half_to_even(3.5), 4.0);
        assert_eq!(round_half_to_even(2.4), 2.0);
        assert_eq!(round_half_to_even(2.6), 3.0);
    }

    #[test]
    fn from_f64_matches_spec_example() {
        // S1: total_tokens=2, price=0.000002 -> cost_usd=0.000004
        let cost = Cost::from_f64_rounded(2.0 * 0.000002);
        assert_eq!(cost.as_micros(), 4);
        assert!((cost.as_f64() - 0.000004).abs() < 1e-9);
    }

    #[test]
    fn addition_is_exact() {
        let a = Cost::from_micros(1);
        let b = Cost::from_micros(2);
        assert_eq!((a + b).as_micros(), 3);
    }
}
