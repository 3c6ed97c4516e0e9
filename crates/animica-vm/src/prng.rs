//! Per-call deterministic PRNG.
//!
//! Seeded from `(tx_hash, call_index)` under a fixed domain, reseeded for
//! every call. Suitable for contract-level randomness only; consensus
//! randomness comes from the beacon.

use animica_core::constants::VM_PRNG_DOMAIN;
use animica_core::types::Hash32;
use animica_crypto::hash::sha3_256_concat;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Build the call PRNG for `(tx_hash, call_index)`.
pub fn call_rng(tx_hash: &Hash32, call_index: u32) -> ChaCha20Rng {
    let seed = sha3_256_concat(&[
        VM_PRNG_DOMAIN,
        tx_hash.as_bytes(),
        &call_index.to_le_bytes(),
    ]);
    ChaCha20Rng::from_seed(seed)
}

/// Draw the next u64 (the `RAND` instruction).
pub fn next_u64(rng: &mut ChaCha20Rng) -> u64 {
    rng.next_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let h = Hash32::from_bytes([3; 32]);
        let mut a = call_rng(&h, 0);
        let mut b = call_rng(&h, 0);
        for _ in 0..16 {
            assert_eq!(next_u64(&mut a), next_u64(&mut b));
        }
    }

    #[test]
    fn call_index_reseeds() {
        let h = Hash32::from_bytes([3; 32]);
        let mut a = call_rng(&h, 0);
        let mut b = call_rng(&h, 1);
        assert_ne!(next_u64(&mut a), next_u64(&mut b));
    }
}
