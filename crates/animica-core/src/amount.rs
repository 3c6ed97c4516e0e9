use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Non-negative, unbounded chain value (transfer amounts, fees, stakes,
/// payouts). Rendered as a decimal string in every JSON view and in the
/// canonical signable projection.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Amount(BigUint);

impl Amount {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn from_u64(n: u64) -> Self {
        Self(BigUint::from(n))
    }

    pub fn from_u128(n: u128) -> Self {
        Self(BigUint::from(n))
    }

    pub fn from_biguint(n: BigUint) -> Self {
        Self(n)
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn from_dec_str(s: &str) -> Result<Self, AmountParseError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountParseError(s.to_string()));
        }
        // Canonical form: no leading zeros (except "0" itself).
        if s.len() > 1 && s.starts_with('0') {
            return Err(AmountParseError(s.to_string()));
        }
        Ok(Self(BigUint::from_str(s).map_err(|_| AmountParseError(s.to_string()))?))
    }

    pub fn to_dec_string(&self) -> String {
        self.0.to_str_radix(10)
    }

    /// Minimal big-endian magnitude bytes; empty for zero.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        if self.0.is_zero() {
            Vec::new()
        } else {
            self.0.to_bytes_be()
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.0 >= other.0 {
            Some(Amount(&self.0 - &other.0))
        } else {
            None
        }
    }

    pub fn saturating_sub(&self, other: &Amount) -> Amount {
        self.checked_sub(other).unwrap_or_else(Amount::zero)
    }

    /// Multiply by an integer factor.
    pub fn mul_u64(&self, factor: u64) -> Amount {
        Amount(&self.0 * BigUint::from(factor))
    }

    /// Floor division by an integer divisor. Divisor must be non-zero.
    pub fn div_u64(&self, divisor: u64) -> Amount {
        Amount(&self.0 / BigUint::from(divisor))
    }

    pub fn min(self, other: Amount) -> Amount {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    pub fn to_u128(&self) -> Option<u128> {
        u128::try_from(&self.0).ok()
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        self.0 += &rhs.0;
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dec_string())
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.to_dec_string())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_dec_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::from_dec_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid decimal amount: {0:?}")]
pub struct AmountParseError(String);
