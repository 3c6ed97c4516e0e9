use pqcrypto_dilithium::dilithium3;
use pqcrypto_sphincsplus::sphincsshake128ssimple as sphincs128s;
use pqcrypto_traits::sign::{DetachedSignature, PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key length: expected {expected}, got {got}")]
    InvalidPublicKeyLength { expected: usize, got: usize },

    #[error("invalid signature length: expected {expected}, got {got}")]
    InvalidSignatureLength { expected: usize, got: usize },

    #[error("invalid secret key")]
    InvalidSecretKey,

    #[error("unknown signature scheme: {0}")]
    UnknownScheme(String),
}

/// The two post-quantum signature schemes the envelope accepts.
///
/// Key and signature widths are fixed per scheme and pinned again in the
/// network parameters; envelope decode rejects anything off-size before
/// the (much more expensive) verify runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigScheme {
    Dilithium3,
    SphincsShake128s,
}

impl SigScheme {
    /// Wire name used in envelopes and RPC views.
    pub fn name(&self) -> &'static str {
        match self {
            SigScheme::Dilithium3 => "dilithium3",
            SigScheme::SphincsShake128s => "sphincs_shake_128s",
        }
    }

    pub fn from_name(s: &str) -> Result<Self, SignatureError> {
        match s {
            "dilithium3" => Ok(SigScheme::Dilithium3),
            "sphincs_shake_128s" => Ok(SigScheme::SphincsShake128s),
            other => Err(SignatureError::UnknownScheme(other.to_string())),
        }
    }

    /// First byte of every address bound to this scheme.
    pub fn alg_id(&self) -> u8 {
        match self {
            SigScheme::Dilithium3 => 1,
            SigScheme::SphincsShake128s => 2,
        }
    }

    pub fn from_alg_id(id: u8) -> Result<Self, SignatureError> {
        match id {
            1 => Ok(SigScheme::Dilithium3),
            2 => Ok(SigScheme::SphincsShake128s),
            other => Err(SignatureError::UnknownScheme(format!("alg_id {other}"))),
        }
    }

    pub fn public_key_bytes(&self) -> usize {
        match self {
            SigScheme::Dilithium3 => dilithium3::public_key_bytes(),
            SigScheme::SphincsShake128s => sphincs128s::public_key_bytes(),
        }
    }

    pub fn signature_bytes(&self) -> usize {
        match self {
            SigScheme::Dilithium3 => dilithium3::signature_bytes(),
            SigScheme::SphincsShake128s => sphincs128s::signature_bytes(),
        }
    }

    pub fn secret_key_bytes(&self) -> usize {
        match self {
            SigScheme::Dilithium3 => dilithium3::secret_key_bytes(),
            SigScheme::SphincsShake128s => sphincs128s::secret_key_bytes(),
        }
    }

    /// Generate a fresh keypair: `(public, secret)` raw bytes.
    pub fn keypair(&self) -> (Vec<u8>, Vec<u8>) {
        match self {
            SigScheme::Dilithium3 => {
                let (pk, sk) = dilithium3::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            SigScheme::SphincsShake128s => {
                let (pk, sk) = sphincs128s::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
        }
    }

    /// Produce a detached signature over `message`.
    pub fn sign(&self, secret_key: &[u8], message: &[u8]) -> Result<Vec<u8>, SignatureError> {
        match self {
            SigScheme::Dilithium3 => {
                let sk = dilithium3::SecretKey::from_bytes(secret_key)
                    .map_err(|_| SignatureError::InvalidSecretKey)?;
                Ok(dilithium3::detached_sign(message, &sk).as_bytes().to_vec())
            }
            SigScheme::SphincsShake128s => {
                let sk = sphincs128s::SecretKey::from_bytes(secret_key)
                    .map_err(|_| SignatureError::InvalidSecretKey)?;
                Ok(sphincs128s::detached_sign(message, &sk).as_bytes().to_vec())
            }
        }
    }

    /// Verify a detached signature. Pure pass/fail.
    pub fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureError> {
        if public_key.len() != self.public_key_bytes() {
            return Err(SignatureError::InvalidPublicKeyLength {
                expected: self.public_key_bytes(),
                got: public_key.len(),
            });
        }
        if signature.len() != self.signature_bytes() {
            return Err(SignatureError::InvalidSignatureLength {
                expected: self.signature_bytes(),
                got: signature.len(),
            });
        }
        match self {
            SigScheme::Dilithium3 => {
                let pk = dilithium3::PublicKey::from_bytes(public_key)
                    .map_err(|_| SignatureError::InvalidSignature)?;
                let sig = dilithium3::DetachedSignature::from_bytes(signature)
                    .map_err(|_| SignatureError::InvalidSignature)?;
                dilithium3::verify_detached_signature(&sig, message, &pk)
                    .map_err(|_| SignatureError::InvalidSignature)
            }
            SigScheme::SphincsShake128s => {
                let pk = sphincs128s::PublicKey::from_bytes(public_key)
                    .map_err(|_| SignatureError::InvalidSignature)?;
                let sig = sphincs128s::DetachedSignature::from_bytes(signature)
                    .map_err(|_| SignatureError::InvalidSignature)?;
                sphincs128s::verify_detached_signature(&sig, message, &pk)
                    .map_err(|_| SignatureError::InvalidSignature)
            }
        }
    }
}
