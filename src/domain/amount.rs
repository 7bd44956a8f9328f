//! Credit amount type
//!
//! Validated transfer amount. The credits column is a 32-bit integer, so an
//! amount is a positive value that fits in it.

use serde::Serialize;
use std::fmt;

/// Amount of credits moved by a transfer.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Value fits in the `integer` credits column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "i64")]
pub struct Amount(i32);

/// Errors that can occur when creating an Amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount must be a positive integer (got {0})")]
    NotPositive(i64),

    #[error("amount exceeds the credits range (got {0})")]
    Overflow(i64),

    #[error("amount must be an integer (got {0})")]
    NotInteger(String),
}

impl Amount {
    pub fn new(value: i64) -> Result<Self, AmountError> {
        if value <= 0 {
            return Err(AmountError::NotPositive(value));
        }
        let value = i32::try_from(value).map_err(|_| AmountError::Overflow(value))?;
        Ok(Self(value))
    }

    /// Parse an amount from a JSON number, rejecting fractions
    pub fn from_json(value: &serde_json::Number) -> Result<Self, AmountError> {
        match value.as_i64() {
            Some(v) => Self::new(v),
            None if value.as_u64().is_some() => Err(AmountError::Overflow(i64::MAX)),
            None => Err(AmountError::NotInteger(value.to_string())),
        }
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    /// Check if a balance covers this amount
    pub fn is_covered_by(&self, balance: i32) -> bool {
        balance >= self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        i64::from(amount.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(100).unwrap();
        assert_eq!(amount.value(), 100);
    }

    #[test]
    fn test_amount_zero_rejected() {
        assert_eq!(Amount::new(0), Err(AmountError::NotPositive(0)));
    }

    #[test]
    fn test_amount_negative_rejected() {
        assert_eq!(Amount::new(-5), Err(AmountError::NotPositive(-5)));
    }

    #[test]
    fn test_amount_overflow() {
        let too_big = i64::from(i32::MAX) + 1;
        assert_eq!(Amount::new(too_big), Err(AmountError::Overflow(too_big)));
        assert!(Amount::new(i64::from(i32::MAX)).is_ok());
    }

    #[test]
    fn test_amount_from_json() {
        let number: serde_json::Number = serde_json::from_str("50").unwrap();
        assert_eq!(Amount::from_json(&number).unwrap().value(), 50);

        let fraction: serde_json::Number = serde_json::from_str("12.5").unwrap();
        assert!(matches!(
            Amount::from_json(&fraction),
            Err(AmountError::NotInteger(_))
        ));

        let negative: serde_json::Number = serde_json::from_str("-3").unwrap();
        assert_eq!(Amount::from_json(&negative), Err(AmountError::NotPositive(-3)));

        let huge: serde_json::Number = serde_json::from_str("18446744073709551615").unwrap();
        assert!(matches!(Amount::from_json(&huge), Err(AmountError::Overflow(_))));
    }

    #[test]
    fn test_is_covered_by() {
        let amount = Amount::new(50).unwrap();
        assert!(amount.is_covered_by(50));
        assert!(amount.is_covered_by(100));
        assert!(!amount.is_covered_by(49));
    }
}
