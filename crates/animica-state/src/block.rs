use animica_codec::{encode, Value};
use animica_core::types::{ChainId, Hash32, Timestamp};
use animica_crypto::hash::sha3_256;
use animica_tx::SignedTx;
use serde::{Deserialize, Serialize};

use crate::bloom::Bloom;

/// Sealed block header. The hash commits to every root, so receipts,
/// logs bloom, state, and DA availability all ride under one id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: ChainId,
    pub height: u64,
    pub parent_hash: Hash32,
    pub timestamp: Timestamp,
    pub tx_root: Hash32,
    pub state_root: Hash32,
    pub receipts_root: Hash32,
    pub da_root: Hash32,
    pub logs_bloom: Bloom,
    /// Randomness beacon round that was final when this block sealed.
    pub beacon_round: u64,
}

impl BlockHeader {
    /// Canonical CBOR projection (lowercase enumerated keys, like the
    /// transaction signable form).
    fn signable(&self) -> Value {
        Value::Map(vec![
            (text("chain_id"), Value::Uint(self.chain_id)),
            (text("height"), Value::Uint(self.height)),
            (
                text("parent_hash"),
                Value::Bytes(self.parent_hash.as_bytes().to_vec()),
            ),
            (text("timestamp"), Value::Uint(self.timestamp.max(0) as u64)),
            (text("tx_root"), Value::Bytes(self.tx_root.as_bytes().to_vec())),
            (
                text("state_root"),
                Value::Bytes(self.state_root.as_bytes().to_vec()),
            ),
            (
                text("receipts_root"),
                Value::Bytes(self.receipts_root.as_bytes().to_vec()),
            ),
            (text("da_root"), Value::Bytes(self.da_root.as_bytes().to_vec())),
            (text("logs_bloom"), Value::Bytes(self.logs_bloom.0.to_vec())),
            (text("beacon_round"), Value::Uint(self.beacon_round)),
        ])
    }

    pub fn hash(&self) -> Hash32 {
        let wrapped = Value::Array(vec![text("animica:block:v1"), self.signable()]);
        let bytes = encode(&wrapped).expect("header keys are unique");
        Hash32::from_bytes(sha3_256(&bytes))
    }
}

/// A sealed block: header plus ordered transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<SignedTx>,
}

impl Block {
    pub fn hash(&self) -> Hash32 {
        self.header.hash()
    }
}

/// Root over ordered transaction hashes.
pub fn tx_root(txs: &[SignedTx]) -> Hash32 {
    let mut preimage = Vec::with_capacity(32 * txs.len() + 16);
    preimage.extend_from_slice(b"animica:txroot:v1");
    for tx in txs {
        preimage.extend_from_slice(tx.tx_hash.as_bytes());
    }
    Hash32::from_bytes(sha3_256(&preimage))
}

/// Root over ordered receipt digests.
pub fn receipts_root(digests: &[Hash32]) -> Hash32 {
    let mut preimage = Vec::with_capacity(32 * digests.len() + 16);
    preimage.extend_from_slice(b"animica:receiptsroot:v1");
    for d in digests {
        preimage.extend_from_slice(d.as_bytes());
    }
    Hash32::from_bytes(sha3_256(&preimage))
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> BlockHeader {
        BlockHeader {
            chain_id: 1,
            height: 5,
            parent_hash: Hash32::from_bytes([1; 32]),
            timestamp: 1_700_000_000,
            tx_root: Hash32::from_bytes([2; 32]),
            state_root: Hash32::from_bytes([3; 32]),
            receipts_root: Hash32::from_bytes([4; 32]),
            da_root: Hash32::from_bytes([5; 32]),
            logs_bloom: Bloom::default(),
            beacon_round: 2,
        }
    }

    #[test]
    fn header_hash_is_stable_and_field_sensitive() {
        let h = header();
        assert_eq!(h.hash(), header().hash());
        let mut other = header();
        other.da_root = Hash32::from_bytes([6; 32]);
        assert_ne!(h.hash(), other.hash());
    }

    #[test]
    fn empty_tx_root_differs_from_nonempty() {
        assert_ne!(tx_root(&[]), receipts_root(&[]));
    }
}
