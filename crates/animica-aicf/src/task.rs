//! Deterministic task-id derivation.
//!
//! `task_id = SHA3-256("AICF_TASK_ID" || uvarint(chain_id) ||
//! uvarint(enqueue_height) || tx_hash || caller || payload)` where the
//! payload is already canonical CBOR. Equal inputs on every node produce
//! equal ids; anything else breaks result binding.

use animica_codec::varint::write_uvarint;
use animica_core::constants::TASK_ID_DOMAIN;
use animica_core::types::{Address, Hash32};
use animica_crypto::hash::sha3_256;

pub fn task_id(
    chain_id: u64,
    enqueue_height: u64,
    tx_hash: &Hash32,
    caller: &Address,
    payload: &[u8],
) -> Hash32 {
    let mut preimage = Vec::with_capacity(64 + payload.len());
    preimage.extend_from_slice(TASK_ID_DOMAIN);
    write_uvarint(chain_id, &mut preimage);
    write_uvarint(enqueue_height, &mut preimage);
    preimage.extend_from_slice(tx_hash.as_bytes());
    preimage.extend_from_slice(caller.as_bytes());
    preimage.extend_from_slice(payload);
    Hash32::from_bytes(sha3_256(&preimage))
}
