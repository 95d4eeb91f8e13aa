//! Human-readable USDC amounts and their raw on-chain integers.
//!
//! Servers quote prices as decimal numbers (`0.05`), while the token contract
//! moves integers scaled by the token's decimals (`50000` for six decimals).
//! [`Amount`] keeps the exact decimal value and converts it without going
//! through binary floating point.
//!
//! ```rust
//! use p402::amount::{Amount, USDC_DECIMALS};
//!
//! let amount = Amount::parse("0.05").unwrap();
//! let raw = amount.to_raw(USDC_DECIMALS).unwrap();
//! assert_eq!(raw.to_string(), "50000");
//! assert_eq!(p402::amount::Amount::from_raw(raw, USDC_DECIMALS).unwrap(), amount);
//! ```

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Decimals of the USDC token on every supported chain.
pub const USDC_DECIMALS: u8 = 6;

/// A strictly positive decimal amount of a token, in whole-token units.
///
/// The value is stored normalized (no trailing zeros), so `"0.050"` and
/// `"0.05"` compare equal and have the same [`scale`](Amount::scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(Decimal);

/// Errors produced when parsing or scaling an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The input is not a decimal number.
    #[error("invalid amount format: {0:?}")]
    InvalidFormat(String),
    /// Zero and negative amounts are never payable.
    #[error("amount must be greater than zero")]
    NotPositive,
    /// The amount has more fractional digits than the token can represent.
    #[error("amount has {scale} decimal places but the token supports {decimals}")]
    PrecisionLoss {
        /// Fractional digits in the amount.
        scale: u32,
        /// Decimals of the token.
        decimals: u8,
    },
    /// The scaled amount does not fit the token's integer range.
    #[error("amount overflows the token's integer range")]
    Overflow,
}

impl Amount {
    /// Parses a decimal string such as `"0.05"`, `"12"` or `"5e-2"`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::InvalidFormat`] for non-numeric input and
    /// [`AmountError::NotPositive`] for zero or negative values.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        let parsed = if trimmed.contains(['e', 'E']) {
            Decimal::from_scientific(trimmed)
        } else {
            Decimal::from_str_exact(trimmed)
        }
        .map_err(|_| AmountError::InvalidFormat(trimmed.to_owned()))?;
        Self::try_from(parsed)
    }

    /// Builds an amount from a raw token integer, e.g. `50000` at six
    /// decimals is `0.05`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::NotPositive`] for zero and
    /// [`AmountError::Overflow`] when the integer exceeds the decimal range.
    pub fn from_raw(raw: U256, decimals: u8) -> Result<Self, AmountError> {
        let raw = u128::try_from(raw).map_err(|_| AmountError::Overflow)?;
        let raw = i128::try_from(raw).map_err(|_| AmountError::Overflow)?;
        let value = Decimal::try_from_i128_with_scale(raw, u32::from(decimals))
            .map_err(|_| AmountError::Overflow)?;
        Self::try_from(value)
    }

    /// Scales the amount into the token's smallest unit.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::PrecisionLoss`] when the amount has more
    /// fractional digits than `decimals`, and [`AmountError::Overflow`] when
    /// the scaled value does not fit.
    pub fn to_raw(&self, decimals: u8) -> Result<U256, AmountError> {
        let scale = self.0.scale();
        let decimals_u32 = u32::from(decimals);
        if scale > decimals_u32 {
            return Err(AmountError::PrecisionLoss { scale, decimals });
        }
        let mantissa = u128::try_from(self.0.mantissa()).map_err(|_| AmountError::Overflow)?;
        let factor = 10u128
            .checked_pow(decimals_u32 - scale)
            .ok_or(AmountError::Overflow)?;
        let raw = mantissa.checked_mul(factor).ok_or(AmountError::Overflow)?;
        Ok(U256::from(raw))
    }

    /// Number of fractional digits after normalization.
    #[must_use]
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive);
        }
        Ok(Self(value.normalize()))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Accepts JSON numbers as well as strings.
///
/// Floats are read through their shortest round-trip text form, so `0.05`
/// on the wire becomes exactly `0.05` rather than the nearest binary value.
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a positive decimal number or numeric string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                Amount::parse(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Amount::try_from(Decimal::from(v)).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                Amount::try_from(Decimal::from(v)).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                if !v.is_finite() {
                    return Err(E::custom(AmountError::InvalidFormat(v.to_string())));
                }
                Amount::parse(&v.to_string()).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_cents_scale_to_fifty_thousand() {
        let amount = Amount::parse("0.05").unwrap();
        assert_eq!(amount.to_raw(USDC_DECIMALS).unwrap(), U256::from(50_000u64));
    }

    #[test]
    fn raw_round_trip_is_lossless_up_to_six_places() {
        for input in ["0.000001", "0.02", "1", "12.5", "999999.999999", "0.123456"] {
            let amount = Amount::parse(input).unwrap();
            let raw = amount.to_raw(USDC_DECIMALS).unwrap();
            assert_eq!(Amount::from_raw(raw, USDC_DECIMALS).unwrap(), amount, "{input}");
        }
    }

    #[test]
    fn too_many_decimals_is_precision_loss() {
        let amount = Amount::parse("0.0000001").unwrap();
        assert_eq!(
            amount.to_raw(USDC_DECIMALS),
            Err(AmountError::PrecisionLoss {
                scale: 7,
                decimals: 6
            })
        );
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        let amount = Amount::parse("0.0500000000").unwrap();
        assert_eq!(amount.scale(), 2);
        assert_eq!(amount, Amount::parse("0.05").unwrap());
    }

    #[test]
    fn rejects_zero_negative_and_garbage() {
        assert_eq!(Amount::parse("0"), Err(AmountError::NotPositive));
        assert_eq!(Amount::parse("-1.5"), Err(AmountError::NotPositive));
        assert!(matches!(
            Amount::parse("five"),
            Err(AmountError::InvalidFormat(_))
        ));
        assert_eq!(
            Amount::from_raw(U256::ZERO, USDC_DECIMALS),
            Err(AmountError::NotPositive)
        );
    }

    #[test]
    fn scientific_notation_is_accepted() {
        assert_eq!(Amount::parse("5e-2").unwrap(), Amount::parse("0.05").unwrap());
    }

    #[test]
    fn huge_raw_value_overflows() {
        assert_eq!(
            Amount::from_raw(U256::MAX, USDC_DECIMALS),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        let from_float: Amount = serde_json::from_str("0.05").unwrap();
        let from_string: Amount = serde_json::from_str("\"0.05\"").unwrap();
        let from_int: Amount = serde_json::from_str("3").unwrap();
        assert_eq!(from_float, from_string);
        assert_eq!(from_int.to_raw(USDC_DECIMALS).unwrap(), U256::from(3_000_000u64));
        assert!(serde_json::from_str::<Amount>("0").is_err());
    }
}
