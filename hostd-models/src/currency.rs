// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::ModelsError;
use hostd_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use rust_decimal::prelude::*;
use serde::de::Unexpected;
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

/// Conversion factor between the raw `u64` representation and whole coins
const CURRENCY_DECIMAL_FACTOR: u64 = 1_000_000_000;

/// A structure representing a decimal amount of coins with safe operations.
/// This allows ensuring that there is never an uncontrolled overflow or
/// precision loss while providing a convenient decimal interface for users.
/// The underlying `u64` raw representation is a fixed-point value with
/// factor `CURRENCY_DECIMAL_FACTOR`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, Default, Hash)]
pub struct Currency(u64);

impl Currency {
    /// the minimal amount
    pub const MIN: Currency = Currency(u64::MIN);

    /// the maximal amount
    pub const MAX: Currency = Currency(u64::MAX);

    /// Create a zero amount
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Obtains the underlying raw `u64` representation.
    /// Warning: the raw value does not take `CURRENCY_DECIMAL_FACTOR` into account.
    pub const fn to_raw(&self) -> u64 {
        self.0
    }

    /// Constructs a `Currency` from the underlying raw `u64` representation.
    /// Warning: the raw value does not take `CURRENCY_DECIMAL_FACTOR` into account.
    /// In most cases you should be using `Currency::from_str("11.23")`.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// returns true if the amount is zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// safely add self to another amount, saturating the result on overflow
    #[must_use]
    pub fn saturating_add(self, amount: Currency) -> Self {
        Currency(self.0.saturating_add(amount.0))
    }

    /// safely subtract another amount from self, saturating the result on underflow
    #[must_use]
    pub fn saturating_sub(self, amount: Currency) -> Self {
        Currency(self.0.saturating_sub(amount.0))
    }

    /// safely add self to another amount, returning None on overflow
    /// ```
    /// # use hostd_models::currency::Currency;
    /// # use std::str::FromStr;
    /// let amount_1: Currency = Currency::from_str("42").unwrap();
    /// let amount_2: Currency = Currency::from_str("7").unwrap();
    /// let res: Currency = amount_1.checked_add(amount_2).unwrap();
    /// assert_eq!(res, Currency::from_str("49").unwrap())
    /// ```
    pub fn checked_add(self, amount: Currency) -> Option<Self> {
        self.0.checked_add(amount.0).map(Currency)
    }

    /// safely subtract another amount from self, returning None on underflow
    /// ```
    /// # use hostd_models::currency::Currency;
    /// # use std::str::FromStr;
    /// let amount_1: Currency = Currency::from_str("42").unwrap();
    /// let amount_2: Currency = Currency::from_str("7").unwrap();
    /// let res: Currency = amount_1.checked_sub(amount_2).unwrap();
    /// assert_eq!(res, Currency::from_str("35").unwrap())
    /// ```
    pub fn checked_sub(self, amount: Currency) -> Option<Self> {
        self.0.checked_sub(amount.0).map(Currency)
    }

    /// safely multiply self with a `u64`, returning None on overflow
    pub fn checked_mul_u64(self, factor: u64) -> Option<Self> {
        self.0.checked_mul(factor).map(Currency)
    }

    /// safely divide self by a `u64`, returning None if the divisor is zero
    pub fn checked_div_u64(self, divisor: u64) -> Option<Self> {
        self.0.checked_div(divisor).map(Currency)
    }
}

/// display a `Currency` in decimal string form (like "10.33")
///
/// ```
/// # use hostd_models::currency::Currency;
/// # use std::str::FromStr;
/// let value = Currency::from_str("11.111").unwrap();
/// assert_eq!(format!("{}", value), "11.111")
/// ```
impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let res_string = Decimal::from_u64(self.0)
            .unwrap() // will never panic
            .checked_div(CURRENCY_DECIMAL_FACTOR.into()) // will never panic
            .unwrap() // will never panic
            .to_string();
        write!(f, "{}", res_string)
    }
}

/// build a `Currency` from a decimal string form (like "10.33").
/// Fails on invalid format, overflow, underflow or precision loss.
///
/// ```
/// # use hostd_models::currency::Currency;
/// # use std::str::FromStr;
/// assert!(Currency::from_str("11.1").is_ok());
/// assert!(Currency::from_str("11.1111111111111111111111").is_err());
/// assert!(Currency::from_str("1111111111111111111111").is_err());
/// assert!(Currency::from_str("-11.1").is_err());
/// assert!(Currency::from_str("abc").is_err());
/// ```
impl FromStr for Currency {
    type Err = ModelsError;

    fn from_str(str_amount: &str) -> Result<Self, Self::Err> {
        let res = Decimal::from_str(str_amount)
            .map_err(|err| ModelsError::AmountParseError(err.to_string()))?
            .checked_mul(CURRENCY_DECIMAL_FACTOR.into())
            .ok_or_else(|| {
                ModelsError::AmountParseError("amount is too large".to_string())
            })?;
        if res.is_sign_negative() {
            return Err(ModelsError::AmountParseError(
                "amounts cannot be negative".to_string(),
            ));
        }
        if !res.fract().is_zero() {
            return Err(ModelsError::AmountParseError(
                "amount exceeds the supported precision".to_string(),
            ));
        }
        let res = res.to_u64().ok_or_else(|| {
            ModelsError::AmountParseError("amount is too large".to_string())
        })?;
        Ok(Currency(res))
    }
}

impl ::serde::Serialize for Currency {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(&self.to_string())
        } else {
            s.serialize_u64(self.0)
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for Currency {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<Currency, D::Error> {
        if d.is_human_readable() {
            struct CurrencyVisitor;

            impl<'de> ::serde::de::Visitor<'de> for CurrencyVisitor {
                type Value = Currency;

                fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                    formatter.write_str("a decimal amount string")
                }

                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    Currency::from_str(v).map_err(|_| {
                        E::invalid_value(Unexpected::Str(v), &self)
                    })
                }
            }
            d.deserialize_str(CurrencyVisitor)
        } else {
            struct RawVisitor;

            impl<'de> ::serde::de::Visitor<'de> for RawVisitor {
                type Value = Currency;

                fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                    formatter.write_str("a raw u64 amount")
                }

                fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    Ok(Currency::from_raw(v))
                }
            }
            d.deserialize_u64(RawVisitor)
        }
    }
}

/// Serializer for `Currency`
#[derive(Clone, Default)]
pub struct CurrencySerializer {
    u64_serializer: U64VarIntSerializer,
}

impl CurrencySerializer {
    /// Creates a serializer for `Currency`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<Currency> for CurrencySerializer {
    fn serialize(&self, value: &Currency, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u64_serializer.serialize(&value.0, buffer)
    }
}

/// Deserializer for `Currency`
#[derive(Clone)]
pub struct CurrencyDeserializer {
    u64_deserializer: U64VarIntDeserializer,
}

impl CurrencyDeserializer {
    /// Creates a deserializer for `Currency`
    pub const fn new() -> Self {
        Self {
            u64_deserializer: U64VarIntDeserializer::new(
                Bound::Included(u64::MIN),
                Bound::Included(u64::MAX),
            ),
        }
    }
}

impl Default for CurrencyDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Currency> for CurrencyDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Currency, E> {
        context("Failed Currency deserialization", |input| {
            let (rest, raw) = self.u64_deserializer.deserialize(input)?;
            Ok((rest, Currency(raw)))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trip() {
        for text in ["0", "1", "11.111", "18446744073.709551615"] {
            let amount = Currency::from_str(text).unwrap();
            assert_eq!(amount.to_string(), text);
        }
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Currency::from_str("10").unwrap();
        let b = Currency::from_str("20").unwrap();
        assert_eq!(a.checked_add(b).unwrap(), Currency::from_str("30").unwrap());
        assert_eq!(b.checked_sub(a).unwrap(), Currency::from_str("10").unwrap());
        assert!(a.checked_sub(b).is_none());
        assert!(Currency::MAX.checked_add(Currency::from_raw(1)).is_none());
    }
}
