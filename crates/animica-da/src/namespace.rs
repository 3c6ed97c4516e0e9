use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DaError;

/// A fixed-width namespace tag. Ordering is byte-lexicographic, which is
/// exactly the order NMT leaves sort by.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Namespace(Vec<u8>);

impl Namespace {
    /// Build a namespace, checking the pinned width.
    pub fn new(bytes: Vec<u8>, ns_size: usize) -> Result<Self, DaError> {
        if bytes.len() != ns_size {
            return Err(DaError::BadNamespace {
                expected: ns_size,
                got: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    /// Convenience: the integer `id` big-endian padded to `ns_size` bytes.
    pub fn from_id(id: u64, ns_size: usize) -> Self {
        let mut bytes = vec![0u8; ns_size];
        let be = id.to_be_bytes();
        let off = ns_size.saturating_sub(8);
        let take = be.len().min(ns_size);
        bytes[off..].copy_from_slice(&be[8 - take..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str, ns_size: usize) -> Result<Self, DaError> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|e| DaError::Serialization(e.to_string()))?;
        Self::new(bytes, ns_size)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", self.to_hex())
    }
}
