//! Decimal representation of WAD amounts at the store boundary.
//!
//! In memory every amount is a U256 WAD integer. When the store is written
//! out, amounts become decimal strings with 18 fractional digits
//! (`"1.500000000000000000"`), and are parsed back the same way.

use std::str::FromStr;

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};

/// WAD integer to an 18-scale decimal.
pub fn to_decimal(value: U256) -> BigDecimal {
    let digits = BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>());
    BigDecimal::new(digits, 18)
}

/// 18-scale decimal back to a WAD integer. Digits past 18 places are truncated.
pub fn from_decimal(value: &BigDecimal) -> Result<U256, String> {
    let (digits, _) = value.with_scale(18).into_bigint_and_exponent();
    let (sign, bytes) = digits.to_bytes_be();
    if sign == Sign::Minus {
        return Err(format!("negative amount {value}"));
    }
    U256::try_from_be_slice(&bytes).ok_or_else(|| format!("amount {value} overflows U256"))
}

/// `#[serde(with = "wad")]` for U256 amount fields.
pub mod wad {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_decimal(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        let dec = BigDecimal::from_str(&s).map_err(de::Error::custom)?;
        from_decimal(&dec).map_err(de::Error::custom)
    }
}
