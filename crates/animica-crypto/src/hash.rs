use animica_core::types::{Address, Hash32};
use sha3::{Digest, Keccak256, Sha3_256, Sha3_512};

/// SHA3-256 of arbitrary bytes → 32-byte array.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha3_256::new();
    h.update(data);
    h.finalize().into()
}

/// SHA3-256 over several segments without intermediate concatenation.
pub fn sha3_256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Sha3_256::new();
    for p in parts {
        h.update(p);
    }
    h.finalize().into()
}

/// SHA3-512 of arbitrary bytes → 64-byte array (artifact hashes).
pub fn sha3_512(data: &[u8]) -> [u8; 64] {
    let mut h = Sha3_512::new();
    h.update(data);
    h.finalize().into()
}

/// Keccak-256 (logs bloom positions).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut h = Keccak256::new();
    h.update(data);
    h.finalize().into()
}

/// Derive an Address from a public key: `alg_id || sha3_256(pubkey)`.
pub fn address_from_pubkey(alg_id: u8, pubkey: &[u8]) -> Address {
    let mut raw = [0u8; 33];
    raw[0] = alg_id;
    raw[1..].copy_from_slice(&sha3_256(pubkey));
    Address::from_bytes(raw)
}

/// `Hash32` view of a SHA3-256 digest.
pub fn hash32(data: &[u8]) -> Hash32 {
    Hash32::from_bytes(sha3_256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha3_256_empty_vector() {
        // NIST FIPS 202 test vector for SHA3-256("").
        assert_eq!(
            hex::encode(sha3_256(b"")),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn keccak_differs_from_sha3() {
        assert_ne!(sha3_256(b"animica"), keccak256(b"animica"));
    }

    #[test]
    fn concat_matches_single_shot() {
        assert_eq!(sha3_256_concat(&[b"ab", b"cd"]), sha3_256(b"abcd"));
    }
}
