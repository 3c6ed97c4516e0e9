use animica_core::types::Address;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::hash::address_from_pubkey;
use crate::scheme::{SigScheme, SignatureError};

/// An Animica keypair: scheme, public key, derived address, and the secret
/// key held in memory that is wiped on drop.
#[derive(Serialize, Deserialize)]
pub struct KeyPair {
    pub scheme: SigScheme,
    pub address: Address,
    pub public_key: Vec<u8>,
    secret_key: Vec<u8>,
}

impl KeyPair {
    /// Generate a fresh keypair for `scheme`.
    pub fn generate(scheme: SigScheme) -> Self {
        let (pk, sk) = scheme.keypair();
        let address = address_from_pubkey(scheme.alg_id(), &pk);
        Self {
            scheme,
            address,
            public_key: pk,
            secret_key: sk,
        }
    }

    /// Restore a keypair from raw bytes (e.g. loaded from a key file).
    pub fn from_raw(scheme: SigScheme, pk_bytes: Vec<u8>, sk_bytes: Vec<u8>) -> Self {
        let address = address_from_pubkey(scheme.alg_id(), &pk_bytes);
        Self {
            scheme,
            address,
            public_key: pk_bytes,
            secret_key: sk_bytes,
        }
    }

    /// Sign `message` with this keypair's secret key.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let sk = Zeroizing::new(self.secret_key.clone());
        self.scheme.sign(&sk, message)
    }

    pub fn secret_key_bytes(&self) -> &[u8] {
        &self.secret_key
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.secret_key.zeroize();
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ scheme: {:?}, address: {:?} }}", self.scheme, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_binds_scheme_alg_id() {
        let kp = KeyPair::generate(SigScheme::Dilithium3);
        assert_eq!(kp.address.alg_id(), 1);
        assert_eq!(
            kp.address,
            address_from_pubkey(kp.scheme.alg_id(), &kp.public_key)
        );
    }

    #[test]
    fn sign_verifies_under_own_pubkey() {
        let kp = KeyPair::generate(SigScheme::Dilithium3);
        let sig = kp.sign(b"hello").unwrap();
        assert!(kp.scheme.verify(&kp.public_key, b"hello", &sig).is_ok());
    }
}
