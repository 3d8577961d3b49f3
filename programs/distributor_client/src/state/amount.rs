use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DistributorClientError;

/**
 * Raw token magnitude
 *
 * An amount expressed in the asset's smallest unit. Every comparison between
 * an allowance and a required amount happens on this type, so formatted and
 * raw magnitudes can never be mixed.
 *
 * Serialized as a decimal string; deserialized from a decimal string, a
 * `0x`-prefixed hex string or a JSON integer.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawAmount(u128);

impl RawAmount {
    pub const ZERO: RawAmount = RawAmount(0);

    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u128 {
        self.0
    }

    /// Parses an unscaled integer, decimal or `0x`-prefixed hex.
    pub fn parse_raw(input: &str) -> Result<Self, DistributorClientError> {
        let trimmed = input.trim();
        if trimmed.starts_with('-') {
            return Err(DistributorClientError::NegativeAmount);
        }
        if let Some(hex_digits) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            if hex_digits.is_empty() || !hex_digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(DistributorClientError::InvalidAmount(input.to_string()));
            }
            return u128::from_str_radix(hex_digits, 16)
                .map(Self)
                .map_err(|err| int_error(input, err.kind()));
        }
        parse_digits(input, trimmed).map(Self)
    }

    /// Scales a human-readable decimal (`"1.5"`) by an explicit number of
    /// decimals. Fractional digits beyond `decimals` are rejected rather than
    /// rounded.
    pub fn from_formatted(input: &str, decimals: u8) -> Result<Self, DistributorClientError> {
        let trimmed = input.trim();
        if trimmed.starts_with('-') {
            return Err(DistributorClientError::NegativeAmount);
        }
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        if whole.is_empty() {
            return Err(DistributorClientError::InvalidAmount(input.to_string()));
        }
        if fraction.len() > usize::from(decimals) {
            return Err(DistributorClientError::InvalidAmount(format!(
                "{input} has more than {decimals} fractional digits"
            )));
        }

        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DistributorClientError::InvalidAmount(input.to_string()));
        }

        // Shift the decimal point by padding the fraction; only the scaled
        // value itself can overflow.
        let mut digits = String::with_capacity(whole.len() + usize::from(decimals));
        digits.push_str(whole);
        digits.push_str(fraction);
        digits.extend(std::iter::repeat('0').take(usize::from(decimals) - fraction.len()));
        parse_digits(input, &digits).map(Self)
    }
}

fn parse_digits(input: &str, digits: &str) -> Result<u128, DistributorClientError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DistributorClientError::InvalidAmount(input.to_string()));
    }
    digits.parse::<u128>().map_err(|err| int_error(input, err.kind()))
}

fn int_error(input: &str, kind: &IntErrorKind) -> DistributorClientError {
    match kind {
        IntErrorKind::PosOverflow => DistributorClientError::AmountOverflow,
        _ => DistributorClientError::InvalidAmount(input.to_string()),
    }
}

impl From<u128> for RawAmount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<u64> for RawAmount {
    fn from(value: u64) -> Self {
        Self(u128::from(value))
    }
}

impl FromStr for RawAmount {
    type Err = DistributorClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_raw(s)
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for RawAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RawAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(Self::from(value)),
            Repr::Text(text) => Self::parse_raw(&text).map_err(serde::de::Error::custom),
        }
    }
}

/// The amount an action needs authorized, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredAmount {
    /// Already in the asset's smallest unit.
    Raw(RawAmount),
    /// Human-readable decimal plus the asset decimals to scale it by.
    Formatted { value: String, decimals: u8 },
}

impl RequiredAmount {
    pub fn formatted(value: impl Into<String>, decimals: u8) -> Self {
        Self::Formatted {
            value: value.into(),
            decimals,
        }
    }

    pub fn normalize(&self) -> Result<RawAmount, DistributorClientError> {
        match self {
            Self::Raw(amount) => Ok(*amount),
            Self::Formatted { value, decimals } => RawAmount::from_formatted(value, *decimals),
        }
    }
}

impl From<RawAmount> for RequiredAmount {
    fn from(value: RawAmount) -> Self {
        Self::Raw(value)
    }
}

impl From<u128> for RequiredAmount {
    fn from(value: u128) -> Self {
        Self::Raw(RawAmount(value))
    }
}
