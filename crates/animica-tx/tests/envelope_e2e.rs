//! Envelope tests with real PQ signatures: the reference transfer from
//! the test plan, signed under both supported schemes.

use animica_core::amount::Amount;
use animica_core::error::AdmissionError;
use animica_core::types::Address;
use animica_crypto::{KeyPair, SigScheme};
use animica_tx::{decode_envelope, encode_envelope, sign_bytes, tx_hash, SignedTx, TxBody, TxKind};

fn reference_transfer(from: Address) -> TxBody {
    let mut to_raw = [0xB0; 33];
    to_raw[0] = 1;
    TxBody {
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
    }
}

#[test]
fn signed_envelope_roundtrips_and_verifies() {
    for scheme in [SigScheme::Dilithium3, SigScheme::SphincsShake128s] {
        let kp = KeyPair::generate(scheme);
        let body = reference_transfer(kp.address);
        let tx = SignedTx::create(body, scheme, kp.public_key.clone(), |msg| {
            kp.sign(msg).expect("sign")
        });

        let raw = encode_envelope(&tx);
        let decoded = decode_envelope(&raw).expect("decode");
        assert_eq!(decoded, tx);

        decoded.verify_signature().expect("valid signature");
        decoded.verify_address_binding().expect("address binds pubkey");
    }
}

#[test]
fn sign_bytes_are_stable_and_signature_free() {
    let kp = KeyPair::generate(SigScheme::Dilithium3);
    let body = reference_transfer(kp.address);

    // Two independent encodings agree byte for byte.
    assert_eq!(sign_bytes(&body), sign_bytes(&body));
    let h = tx_hash(&body);

    // Signing twice (Dilithium is randomized) never moves the tx hash.
    let tx1 = SignedTx::create(body.clone(), kp.scheme, kp.public_key.clone(), |m| {
        kp.sign(m).unwrap()
    });
    let tx2 = SignedTx::create(body, kp.scheme, kp.public_key.clone(), |m| {
        kp.sign(m).unwrap()
    });
    assert_eq!(tx1.tx_hash, h);
    assert_eq!(tx2.tx_hash, h);
}

#[test]
fn foreign_pubkey_fails_address_binding() {
    let kp = KeyPair::generate(SigScheme::Dilithium3);
    let intruder = KeyPair::generate(SigScheme::Dilithium3);
    let body = reference_transfer(kp.address);

    // Signed correctly, but under a key that does not hash to `from`.
    let tx = SignedTx::create(body, intruder.scheme, intruder.public_key.clone(), |m| {
        intruder.sign(m).unwrap()
    });
    tx.verify_signature().expect("signature itself is fine");
    assert_eq!(
        tx.verify_address_binding(),
        Err(AdmissionError::PubkeyMismatch)
    );
}

#[test]
fn tampered_body_fails_verification() {
    let kp = KeyPair::generate(SigScheme::Dilithium3);
    let body = reference_transfer(kp.address);
    let tx = SignedTx::create(body, kp.scheme, kp.public_key.clone(), |m| kp.sign(m).unwrap());

    let mut tampered = tx.clone();
    tampered.body.nonce = 1;
    assert_eq!(
        tampered.verify_signature(),
        Err(AdmissionError::SignatureInvalid)
    );
}

#[test]
fn cross_scheme_sizes_are_rejected() {
    let kp = KeyPair::generate(SigScheme::Dilithium3);
    let body = reference_transfer(kp.address);
    let mut tx = SignedTx::create(body, kp.scheme, kp.public_key.clone(), |m| kp.sign(m).unwrap());
    // Claim the other scheme without resizing key/signature.
    tx.signature.scheme = SigScheme::SphincsShake128s;
    let raw = encode_envelope(&tx);
    assert_eq!(decode_envelope(&raw), Err(AdmissionError::SignatureInvalid));
}
