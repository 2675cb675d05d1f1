// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

pub const CHAMA_ID_MAX_LEN: usize = 64;
const ADDRESS_HEX_LEN: usize = 40;
const TX_HASH_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChamaId(String);

/// EVM account or contract address, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EvmAddress(String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl ChamaId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError("chama_id must not be empty".to_string()));
        }
        if value.len() > CHAMA_ID_MAX_LEN {
            return Err(ValidationError(format!(
                "chama_id exceeds max length {CHAMA_ID_MAX_LEN}"
            )));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ValidationError(
                "chama_id must contain only [a-z0-9_-]".to_string(),
            ));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl EvmAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let hex = parse_prefixed_hex("address", value.trim(), ADDRESS_HEX_LEN)?;
        Ok(Self(format!("0x{hex}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digits without the `0x` prefix.
    #[must_use]
    pub fn hex_digits(&self) -> &str {
        &self.0[2..]
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.hex_digits().chars().all(|c| c == '0')
    }
}

impl TxHash {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let hex = parse_prefixed_hex("tx hash", value.trim(), TX_HASH_HEX_LEN)?;
        Ok(Self(format!("0x{hex}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn parse_prefixed_hex(
    kind: &'static str,
    value: &str,
    expected_len: usize,
) -> Result<String, ValidationError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| ValidationError(format!("{kind} must start with 0x")))?;
    if digits.len() != expected_len {
        return Err(ValidationError(format!(
            "{kind} must have {expected_len} hex digits after 0x"
        )));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError(format!(
            "{kind} contains non-hex characters"
        )));
    }
    Ok(digits.to_ascii_lowercase())
}

macro_rules! impl_id_traits {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, ValidationError> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, ValidationError> {
                Self::new(value)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, ValidationError> {
                Self::new(s)
            }
        }
    };
}

impl_id_traits!(ChamaId);
impl_id_traits!(EvmAddress);
impl_id_traits!(TxHash);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_normalized_to_lowercase() {
        let addr = EvmAddress::new("0xABCDEFabcdef0123456789ABCDEF0123456789ab").expect("address");
        assert_eq!(addr.as_str(), "0xabcdefabcdef0123456789abcdef0123456789ab");
        assert_eq!(addr.hex_digits().len(), 40);
    }

    #[test]
    fn address_rejects_bad_shapes() {
        assert!(EvmAddress::new("abcdef").is_err());
        assert!(EvmAddress::new("0x1234").is_err());
        assert!(EvmAddress::new(format!("0x{}", "g".repeat(40))).is_err());
    }

    #[test]
    fn chama_id_rejects_uppercase_and_spaces() {
        assert!(ChamaId::new("savers-2026").is_ok());
        assert!(ChamaId::new("Savers").is_err());
        assert!(ChamaId::new("sav ers").is_err());
        assert!(ChamaId::new("").is_err());
        assert!(ChamaId::new("a".repeat(CHAMA_ID_MAX_LEN + 1)).is_err());
    }
}
