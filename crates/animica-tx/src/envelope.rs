use animica_codec::{decode, encode, CodecError, Value};
use animica_core::constants::{MAX_MEMO_BYTES, MAX_TX_BYTES, TX_ENVELOPE_TAG};
use animica_core::error::AdmissionError;
use animica_core::types::Hash32;
use animica_crypto::hash::address_from_pubkey;
use animica_crypto::scheme::SigScheme;
use serde::{Deserialize, Serialize};

use crate::body::TxBody;
use crate::signable::{body_from_signable, sign_bytes, signable, tx_hash};

/// Scheme-tagged signature material carried by the envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    pub scheme: SigScheme,
    pub pubkey: Vec<u8>,
    pub sig: Vec<u8>,
}

/// A fully-formed signed transaction, created once and reused everywhere.
///
/// `tx_hash` covers the body only: re-signing never changes the id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub body: TxBody,
    pub signature: TxSignature,
    pub tx_hash: Hash32,
}

impl SignedTx {
    /// Sign `body` and assemble the envelope in one step.
    pub fn create(
        body: TxBody,
        scheme: SigScheme,
        pubkey: Vec<u8>,
        sign: impl FnOnce(&[u8]) -> Vec<u8>,
    ) -> Self {
        let hash = tx_hash(&body);
        let sig = sign(&sign_bytes(&body));
        Self {
            body,
            signature: TxSignature {
                scheme,
                pubkey,
                sig,
            },
            tx_hash: hash,
        }
    }

    /// Verify the signature over the body's sign-bytes. Pure pass/fail; the
    /// address binding is a separate admission check.
    pub fn verify_signature(&self) -> Result<(), AdmissionError> {
        self.signature
            .scheme
            .verify(
                &self.signature.pubkey,
                &sign_bytes(&self.body),
                &self.signature.sig,
            )
            .map_err(|_| AdmissionError::SignatureInvalid)
    }

    /// Check `address(pubkey) == body.from` (admission-time binding).
    pub fn verify_address_binding(&self) -> Result<(), AdmissionError> {
        let derived = address_from_pubkey(self.signature.scheme.alg_id(), &self.signature.pubkey);
        if derived != self.body.from {
            return Err(AdmissionError::PubkeyMismatch);
        }
        Ok(())
    }
}

/// Encode the submission payload:
/// `CBOR_canonical(["animica:tx:v1", signable(body), {pubkey, scheme, sig}])`.
pub fn encode_envelope(tx: &SignedTx) -> Vec<u8> {
    let sig_map = Value::Map(vec![
        (
            Value::Text("scheme".into()),
            Value::Text(tx.signature.scheme.name().into()),
        ),
        (
            Value::Text("pubkey".into()),
            Value::Bytes(tx.signature.pubkey.clone()),
        ),
        (Value::Text("sig".into()), Value::Bytes(tx.signature.sig.clone())),
    ]);
    let wrapped = Value::Array(vec![
        Value::Text(TX_ENVELOPE_TAG.into()),
        signable(&tx.body),
        sig_map,
    ]);
    encode(&wrapped).expect("envelope map keys are unique")
}

/// Decode and structurally validate a submission envelope.
///
/// Rejects: invalid or non-canonical CBOR, unknown tags, oversize
/// payloads, off-size keys/signatures for the named scheme, and oversized
/// memos. Signature verification is left to the caller (admission).
pub fn decode_envelope(raw: &[u8]) -> Result<SignedTx, AdmissionError> {
    if raw.len() > MAX_TX_BYTES {
        return Err(AdmissionError::Oversize {
            max: MAX_TX_BYTES,
            got: raw.len(),
        });
    }
    let value = decode(raw).map_err(codec_err)?;
    let items = value
        .as_array()
        .ok_or_else(|| AdmissionError::NonCanonical("envelope must be an array".into()))?;
    if items.len() != 3 {
        return Err(AdmissionError::NonCanonical(
            "envelope must have 3 elements".into(),
        ));
    }

    let tag = items[0]
        .as_text()
        .ok_or_else(|| AdmissionError::NonCanonical("envelope tag must be text".into()))?;
    if tag != TX_ENVELOPE_TAG {
        return Err(AdmissionError::UnknownTag(tag.to_string()));
    }

    let body = body_from_signable(&items[1])?;
    if let Some(memo) = &body.memo {
        if memo.len() > MAX_MEMO_BYTES {
            return Err(AdmissionError::Oversize {
                max: MAX_MEMO_BYTES,
                got: memo.len(),
            });
        }
    }

    let sig_map = items[2]
        .as_map()
        .ok_or_else(|| AdmissionError::NonCanonical("signature must be a map".into()))?;
    if sig_map.len() != 3 {
        return Err(AdmissionError::NonCanonical(
            "signature map must have exactly scheme/pubkey/sig".into(),
        ));
    }
    let scheme_name = items[2]
        .get("scheme")
        .and_then(|v| v.as_text())
        .ok_or_else(|| AdmissionError::NonCanonical("missing scheme".into()))?;
    let scheme = SigScheme::from_name(scheme_name)
        .map_err(|_| AdmissionError::UnknownScheme(scheme_name.to_string()))?;
    let pubkey = items[2]
        .get("pubkey")
        .and_then(|v| v.as_bytes())
        .ok_or_else(|| AdmissionError::NonCanonical("missing pubkey".into()))?
        .to_vec();
    let sig = items[2]
        .get("sig")
        .and_then(|v| v.as_bytes())
        .ok_or_else(|| AdmissionError::NonCanonical("missing sig".into()))?
        .to_vec();

    // Pinned per-scheme widths, checked before any verify runs.
    if pubkey.len() != scheme.public_key_bytes() || sig.len() != scheme.signature_bytes() {
        return Err(AdmissionError::SignatureInvalid);
    }

    let hash = tx_hash(&body);
    Ok(SignedTx {
        body,
        signature: TxSignature {
            scheme,
            pubkey,
            sig,
        },
        tx_hash: hash,
    })
}

fn codec_err(e: CodecError) -> AdmissionError {
    match e {
        CodecError::NonCanonical(m) => AdmissionError::NonCanonical(m),
        CodecError::DuplicateMapKey => AdmissionError::NonCanonical("duplicate map key".into()),
        other => AdmissionError::InvalidCbor(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animica_core::amount::Amount;
    use animica_core::types::Address;
    use animica_crypto::hash::sha3_256;
    use crate::body::TxKind;

    // A non-cryptographic signer: sig = sha3(msg) padded to scheme width.
    fn fake_sig(scheme: SigScheme, msg: &[u8]) -> Vec<u8> {
        let mut sig = vec![0u8; scheme.signature_bytes()];
        sig[..32].copy_from_slice(&sha3_256(msg));
        sig
    }

    fn sample_tx() -> SignedTx {
        let scheme = SigScheme::Dilithium3;
        let pubkey = vec![0x42; scheme.public_key_bytes()];
        let from = address_from_pubkey(scheme.alg_id(), &pubkey);
        let mut to_raw = [0x33; 33];
        to_raw[0] = 1;
        let body = TxBody {
            chain_id: 1,
            from,
            nonce: 0,
            gas_limit: 21_000,
            max_fee: Amount::from_dec_str("1000").unwrap(),
            memo: None,
            kind: TxKind::Transfer {
                to: Address::from_bytes(to_raw),
                value: Amount::from_dec_str("1000").unwrap(),
            },
        };
        SignedTx::create(body, scheme, pubkey, |msg| fake_sig(scheme, msg))
    }

    #[test]
    fn envelope_roundtrip() {
        let tx = sample_tx();
        let raw = encode_envelope(&tx);
        let back = decode_envelope(&raw).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn tx_hash_ignores_signature_bytes() {
        let tx = sample_tx();
        let mut tampered = tx.clone();
        tampered.signature.sig[0] ^= 0xff;
        let back = decode_envelope(&encode_envelope(&tampered)).unwrap();
        assert_eq!(back.tx_hash, tx.tx_hash);
    }

    #[test]
    fn unknown_tag_rejected() {
        let tx = sample_tx();
        let mut raw = encode_envelope(&tx);
        // The tag "animica:tx:v1" begins right after the array head; flip a
        // byte inside it.
        raw[3] ^= 0x01;
        assert!(matches!(
            decode_envelope(&raw),
            Err(AdmissionError::UnknownTag(_)) | Err(AdmissionError::InvalidCbor(_))
                | Err(AdmissionError::NonCanonical(_))
        ));
    }

    #[test]
    fn off_size_signature_rejected() {
        let tx = sample_tx();
        let mut short = tx.clone();
        short.signature.sig.truncate(10);
        let raw = encode_envelope(&short);
        assert_eq!(
            decode_envelope(&raw),
            Err(AdmissionError::SignatureInvalid)
        );
    }

    #[test]
    fn address_binding_detects_foreign_pubkey() {
        let mut tx = sample_tx();
        tx.signature.pubkey = vec![0x43; tx.signature.scheme.public_key_bytes()];
        assert_eq!(
            tx.verify_address_binding(),
            Err(AdmissionError::PubkeyMismatch)
        );
    }
}
