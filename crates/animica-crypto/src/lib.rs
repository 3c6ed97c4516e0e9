//! animica-crypto — hashing and post-quantum signatures.
//!
//! All chain-visible digests are SHA3-256 unless a surface explicitly
//! calls for Keccak-256 (contract event blooms) or SHA3-512 (artifact
//! hashes). Signatures come in two pinned schemes: Dilithium3 and
//! SPHINCS+-SHAKE-128s (simple). The envelope layer treats both as an
//! abstract `(sign, verify)` pair with fixed key/signature widths.

pub mod hash;
pub mod keypair;
pub mod scheme;

pub use keypair::KeyPair;
pub use scheme::{SigScheme, SignatureError};
