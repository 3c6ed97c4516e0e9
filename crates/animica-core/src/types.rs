use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain identifier, pinned in network params.
pub type ChainId = u64;

/// Block height.
pub type BlockHeight = u64;

/// Per-account transaction sequence number (strictly increasing).
pub type Nonce = u64;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Gas units.
pub type Gas = u64;

/// Human-readable part of bech32m-rendered addresses.
pub const ADDRESS_HRP: &str = "anim";

// ── Hash32 ───────────────────────────────────────────────────────────────────

/// 32-byte SHA3-256 digest (tx hashes, block hashes, DA roots, task ids).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({}…)", &self.to_hex()[..16])
    }
}

// ── Address ──────────────────────────────────────────────────────────────────

/// Opaque 33-byte account address: `alg_id (1) || sha3_256(pubkey) (32)`.
///
/// Equality is bytewise. Rendered bech32m (`anim1…`) at every boundary.
/// Serde is hand-written (serde's array impls stop at 32 elements): the
/// address serializes as a 33-byte string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 33]);

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;
        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = Address;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("33 address bytes")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Address, E> {
                let arr: [u8; 33] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(Address(arr))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(self, mut seq: A) -> Result<Address, A::Error> {
                let mut arr = [0u8; 33];
                for (i, slot) in arr.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(Address(arr))
            }
        }
        deserializer.deserialize_bytes(Visitor)
    }
}

impl Address {
    pub fn from_bytes(b: [u8; 33]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// The signature algorithm id this address is bound to
    /// (`0` marks contract addresses).
    pub fn alg_id(&self) -> u8 {
        self.0[0]
    }

    pub fn pubkey_hash(&self) -> &[u8] {
        &self.0[1..]
    }

    pub fn to_bech32m(&self) -> String {
        bech32::encode(ADDRESS_HRP, self.0.to_base32(), Variant::Bech32m)
            .expect("encoding a fixed 33-byte payload cannot fail")
    }

    pub fn from_bech32m(s: &str) -> Result<Self, AddressParseError> {
        let (hrp, data, variant) = bech32::decode(s)?;
        if hrp != ADDRESS_HRP {
            return Err(AddressParseError::WrongHrp(hrp));
        }
        if variant != Variant::Bech32m {
            return Err(AddressParseError::WrongVariant);
        }
        let bytes = Vec::<u8>::from_base32(&data)?;
        if bytes.len() != 33 {
            return Err(AddressParseError::WrongLength(bytes.len()));
        }
        let mut arr = [0u8; 33];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bech32m())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_bech32m();
        write!(f, "Address({}…)", &b[..12.min(b.len())])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressParseError {
    #[error("bech32 decode failed: {0}")]
    Bech32(#[from] bech32::Error),
    #[error("wrong human-readable part: {0}")]
    WrongHrp(String),
    #[error("address must use bech32m")]
    WrongVariant,
    #[error("address payload must be 33 bytes, got {0}")]
    WrongLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_bech32m_roundtrip() {
        let mut raw = [0u8; 33];
        raw[0] = 1;
        raw[1..].copy_from_slice(&[0xab; 32]);
        let addr = Address::from_bytes(raw);
        let s = addr.to_bech32m();
        assert!(s.starts_with("anim1"));
        assert_eq!(Address::from_bech32m(&s).unwrap(), addr);
    }

    #[test]
    fn address_rejects_wrong_hrp() {
        let enc = bech32::encode("chrx", [0u8; 33].to_base32(), Variant::Bech32m).unwrap();
        assert!(matches!(
            Address::from_bech32m(&enc),
            Err(AddressParseError::WrongHrp(_))
        ));
    }

    #[test]
    fn hash_hex_roundtrip() {
        let h = Hash32::from_bytes([7u8; 32]);
        assert_eq!(Hash32::from_hex(&h.to_hex()).unwrap(), h);
        assert_eq!(Hash32::from_hex(&format!("0x{}", h.to_hex())).unwrap(), h);
    }
}
