//! Token ID conversions.
//!
//! On-chain token IDs arrive as integers and are stored as canonical decimal
//! text so that the column type does not constrain their width. IDs up to
//! 96 bits are representable.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// An ERC-721 token ID (vehicle, aftermarket device or manufacturer).
///
/// Always integral, non-negative and normalized, so equality and hashing
/// agree with the canonical text form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(Decimal);

impl TokenId {
    pub fn new(id: u64) -> Self {
        Self(Decimal::from(id))
    }

    pub const fn to_decimal(self) -> Decimal {
        self.0
    }

    /// Convert a decimal into a token ID. Fractional and negative values are
    /// rejected.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if !value.fract().is_zero() {
            return Err(Error::TokenId(format!("{value} is not an integer")));
        }
        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::TokenId(format!("{value} is negative")));
        }
        Ok(Self(value.trunc().normalize()))
    }

    /// Canonical text form used as the storage key.
    pub fn to_db(self) -> String {
        self.0.to_string()
    }

    /// Parse the stored text form.
    pub fn from_db(value: &str) -> Result<Self> {
        let dec = Decimal::from_str(value).map_err(|e| Error::TokenId(format!("{value}: {e}")))?;
        Self::from_decimal(dec)
    }
}

impl From<u64> for TokenId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl TryFrom<u128> for TokenId {
    type Error = Error;

    fn try_from(id: u128) -> Result<Self> {
        Self::from_db(&id.to_string())
    }
}

impl FromStr for TokenId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_db(s.trim())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Serialized as a decimal string so JSON consumers never lose precision.
impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Accepts either a decimal string or a JSON integer.
impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TokenIdVisitor;

        impl Visitor<'_> for TokenIdVisitor {
            type Value = TokenId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer token id")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<TokenId, E> {
                Ok(TokenId::new(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<TokenId, E> {
                u64::try_from(v).map(TokenId::new).map_err(E::custom)
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> std::result::Result<TokenId, E> {
                TokenId::try_from(v).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<TokenId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(TokenIdVisitor)
    }
}
