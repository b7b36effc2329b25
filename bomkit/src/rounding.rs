//! Order quantity rounding.
//!
//! A policy `(digit, exponent)` rounds up to a multiple of `digit * 10^exponent`,
//! so `(2, 3)` rounds up to the next multiple of 2000. This is not mathematical
//! rounding: the result is never smaller than the input, and an exact multiple
//! maps to itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoundingError {
    #[error("rounding digit must be 1, 2 or 5, got {0}")]
    InvalidDigit(u8),
    #[error("rounding exponent {0} is too large")]
    ExponentTooLarge(u32),
    #[error("cannot parse rounding policy '{0}', expected <digit>,<exponent>")]
    Syntax(String),
}

/// Rounding policy. The default `(1, 0)` leaves quantities untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy", into = "RawPolicy")]
pub struct RoundingPolicy {
    digit: u8,
    exponent: u32,
    base: u64,
}

#[derive(Serialize, Deserialize)]
struct RawPolicy {
    digit: u8,
    exponent: u32,
}

impl TryFrom<RawPolicy> for RoundingPolicy {
    type Error = RoundingError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        RoundingPolicy::new(raw.digit, raw.exponent)
    }
}

impl From<RoundingPolicy> for RawPolicy {
    fn from(policy: RoundingPolicy) -> Self {
        RawPolicy {
            digit: policy.digit,
            exponent: policy.exponent,
        }
    }
}

impl RoundingPolicy {
    pub fn new(digit: u8, exponent: u32) -> Result<Self, RoundingError> {
        if !matches!(digit, 1 | 2 | 5) {
            return Err(RoundingError::InvalidDigit(digit));
        }
        let base = 10u64
            .checked_pow(exponent)
            .and_then(|p| p.checked_mul(digit as u64))
            .ok_or(RoundingError::ExponentTooLarge(exponent))?;
        Ok(Self {
            digit,
            exponent,
            base,
        })
    }

    pub fn digit(&self) -> u8 {
        self.digit
    }

    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    /// `digit * 10^exponent`
    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn apply(&self, quantity: u64) -> u64 {
        round_up(quantity, self.base)
    }
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self {
            digit: 1,
            exponent: 0,
            base: 1,
        }
    }
}

impl fmt::Display for RoundingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.digit, self.exponent)
    }
}

impl FromStr for RoundingPolicy {
    type Err = RoundingError;

    /// Parses `digit,exponent`, e.g. `5,2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digit, exponent) = s
            .split_once(',')
            .ok_or_else(|| RoundingError::Syntax(s.to_string()))?;
        let digit = digit
            .trim()
            .parse::<u8>()
            .map_err(|_| RoundingError::Syntax(s.to_string()))?;
        let exponent = exponent
            .trim()
            .parse::<u32>()
            .map_err(|_| RoundingError::Syntax(s.to_string()))?;
        Self::new(digit, exponent)
    }
}

/// Round `x` up to the next multiple of `base`. Multiples map to themselves.
pub fn round_up(x: u64, base: u64) -> u64 {
    if base <= 1 {
        return x;
    }
    match x % base {
        0 => x,
        m => x.saturating_add(base - m),
    }
}
