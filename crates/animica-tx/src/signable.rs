//! The signable projection: `TxBody` → canonical CBOR map.
//!
//! Keys are lowercase snake_case and enumerated below; absent optionals
//! are omitted entirely (never encoded as null). The projection is
//! bijective: `body_from_signable` reverses it exactly and rejects
//! unknown or missing keys, so a decoded envelope always re-hashes to the
//! submitted `tx_hash`.

use animica_codec::{encode, Value};
use animica_core::amount::Amount;
use animica_core::constants::TX_SIGN_DOMAIN;
use animica_core::error::AdmissionError;
use animica_core::types::{Address, Hash32};
use animica_crypto::hash::sha3_256;

use crate::body::{TxBody, TxKind};

/// Project a body into its canonical signable `Value`.
pub fn signable(body: &TxBody) -> Value {
    let mut entries: Vec<(Value, Value)> = vec![
        (text("chain_id"), Value::Uint(body.chain_id)),
        (text("from"), Value::Bytes(body.from.as_bytes().to_vec())),
        (text("nonce"), Value::Uint(body.nonce)),
        (text("gas_limit"), Value::Uint(body.gas_limit)),
        (text("max_fee"), Value::Text(body.max_fee.to_dec_string())),
        (text("kind"), text(body.kind.name())),
    ];
    if let Some(memo) = &body.memo {
        entries.push((text("memo"), Value::Text(memo.clone())));
    }
    match &body.kind {
        TxKind::Transfer { to, value } => {
            entries.push((text("to"), Value::Bytes(to.as_bytes().to_vec())));
            entries.push((text("value"), Value::Text(value.to_dec_string())));
        }
        TxKind::Call { to, data, value } => {
            entries.push((text("to"), Value::Bytes(to.as_bytes().to_vec())));
            entries.push((text("data"), Value::Bytes(data.clone())));
            entries.push((text("value"), Value::Text(value.to_dec_string())));
        }
        TxKind::Deploy { code, init } => {
            entries.push((text("code"), Value::Bytes(code.clone())));
            if let Some(init) = init {
                entries.push((text("init"), Value::Bytes(init.clone())));
            }
        }
    }
    Value::Map(entries)
}

/// `CBOR_canonical(["animica:tx:sign/v1", signable(body)])`.
pub fn sign_bytes(body: &TxBody) -> Vec<u8> {
    let wrapped = Value::Array(vec![text(TX_SIGN_DOMAIN), signable(body)]);
    encode(&wrapped).expect("signable projection has unique keys")
}

/// Content-addressed transaction id: `SHA3-256(SignBytes(body))`.
pub fn tx_hash(body: &TxBody) -> Hash32 {
    Hash32::from_bytes(sha3_256(&sign_bytes(body)))
}

/// Rebuild a `TxBody` from its signable map, rejecting unknown keys.
pub fn body_from_signable(v: &Value) -> Result<TxBody, AdmissionError> {
    let entries = v
        .as_map()
        .ok_or_else(|| bad("signable body must be a map"))?;

    // Every key must be one we enumerate; collect them first.
    let mut known = std::collections::BTreeMap::new();
    for (k, val) in entries {
        let key = k
            .as_text()
            .ok_or_else(|| bad("signable keys must be text"))?;
        if known.insert(key.to_string(), val).is_some() {
            return Err(bad("duplicate signable key"));
        }
    }

    let kind_name = known
        .get("kind")
        .and_then(|v| v.as_text())
        .ok_or_else(|| bad("missing kind"))?
        .to_string();

    let expected: &[&str] = match kind_name.as_str() {
        "transfer" => &["chain_id", "from", "nonce", "gas_limit", "max_fee", "kind", "memo", "to", "value"],
        "call" => &["chain_id", "from", "nonce", "gas_limit", "max_fee", "kind", "memo", "to", "data", "value"],
        "deploy" => &["chain_id", "from", "nonce", "gas_limit", "max_fee", "kind", "memo", "code", "init"],
        other => return Err(bad(&format!("unknown kind {other:?}"))),
    };
    for key in known.keys() {
        if !expected.contains(&key.as_str()) {
            return Err(bad(&format!("unexpected key {key:?} for kind {kind_name}")));
        }
    }

    let chain_id = req_uint(&known, "chain_id")?;
    let from = req_address(&known, "from")?;
    let nonce = req_uint(&known, "nonce")?;
    let gas_limit = req_uint(&known, "gas_limit")?;
    let max_fee = req_amount(&known, "max_fee")?;
    let memo = match known.get("memo") {
        Some(v) => Some(
            v.as_text()
                .ok_or_else(|| bad("memo must be text"))?
                .to_string(),
        ),
        None => None,
    };

    let kind = match kind_name.as_str() {
        "transfer" => TxKind::Transfer {
            to: req_address(&known, "to")?,
            value: req_amount(&known, "value")?,
        },
        "call" => TxKind::Call {
            to: req_address(&known, "to")?,
            data: req_bytes(&known, "data")?,
            value: req_amount(&known, "value")?,
        },
        "deploy" => TxKind::Deploy {
            code: req_bytes(&known, "code")?,
            init: match known.get("init") {
                Some(v) => Some(
                    v.as_bytes()
                        .ok_or_else(|| bad("init must be bytes"))?
                        .to_vec(),
                ),
                None => None,
            },
        },
        _ => unreachable!("kind validated above"),
    };

    Ok(TxBody {
        chain_id,
        from,
        nonce,
        gas_limit,
        max_fee,
        memo,
        kind,
    })
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn bad(msg: &str) -> AdmissionError {
    AdmissionError::NonCanonical(msg.to_string())
}

type Known<'a> = std::collections::BTreeMap<String, &'a Value>;

fn req_uint(m: &Known<'_>, key: &str) -> Result<u64, AdmissionError> {
    m.get(key)
        .and_then(|v| v.as_uint())
        .ok_or_else(|| bad(&format!("missing or non-integer {key:?}")))
}

fn req_bytes(m: &Known<'_>, key: &str) -> Result<Vec<u8>, AdmissionError> {
    Ok(m.get(key)
        .and_then(|v| v.as_bytes())
        .ok_or_else(|| bad(&format!("missing or non-bytes {key:?}")))?
        .to_vec())
}

fn req_address(m: &Known<'_>, key: &str) -> Result<Address, AdmissionError> {
    let raw = req_bytes(m, key)?;
    let arr: [u8; 33] = raw
        .as_slice()
        .try_into()
        .map_err(|_| bad(&format!("{key:?} must be 33 bytes")))?;
    Ok(Address::from_bytes(arr))
}

fn req_amount(m: &Known<'_>, key: &str) -> Result<Amount, AdmissionError> {
    let s = m
        .get(key)
        .and_then(|v| v.as_text())
        .ok_or_else(|| bad(&format!("missing or non-text {key:?}")))?;
    Amount::from_dec_str(s).map_err(|_| bad(&format!("{key:?} is not a canonical decimal")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(alg: u8, fill: u8) -> Address {
        let mut raw = [fill; 33];
        raw[0] = alg;
        Address::from_bytes(raw)
    }

    fn transfer_body() -> TxBody {
        TxBody {
            chain_id: 1,
            from: addr(1, 0xaa),
            nonce: 0,
            gas_limit: 21_000,
            max_fee: Amount::from_dec_str("1000").unwrap(),
            memo: None,
            kind: TxKind::Transfer {
                to: addr(1, 0xbb),
                value: Amount::from_dec_str("1000").unwrap(),
            },
        }
    }

    #[test]
    fn tx_hash_is_stable_across_runs() {
        let h1 = tx_hash(&transfer_body());
        let h2 = tx_hash(&transfer_body());
        assert_eq!(h1, h2);
    }

    #[test]
    fn tx_hash_changes_with_body() {
        let mut b = transfer_body();
        let h1 = tx_hash(&b);
        b.nonce = 1;
        assert_ne!(h1, tx_hash(&b));
    }

    #[test]
    fn signable_roundtrips_through_projection() {
        for body in [
            transfer_body(),
            TxBody {
                memo: Some("hi".into()),
                kind: TxKind::Call {
                    to: addr(1, 0xcc),
                    data: vec![1, 2, 3],
                    value: Amount::zero(),
                },
                ..transfer_body()
            },
            TxBody {
                kind: TxKind::Deploy {
                    code: vec![9; 16],
                    init: None,
                },
                ..transfer_body()
            },
        ] {
            let back = body_from_signable(&signable(&body)).unwrap();
            assert_eq!(back, body);
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut v = signable(&transfer_body());
        if let Value::Map(entries) = &mut v {
            entries.push((Value::Text("extra".into()), Value::Uint(1)));
        }
        assert!(body_from_signable(&v).is_err());
    }

    #[test]
    fn sign_bytes_starts_with_domain_array() {
        let bytes = sign_bytes(&transfer_body());
        // 0x82 = 2-element array, 0x72 = 18-char text string.
        assert_eq!(bytes[0], 0x82);
        assert_eq!(bytes[1], 0x60 | TX_SIGN_DOMAIN.len() as u8);
        assert_eq!(&bytes[2..2 + TX_SIGN_DOMAIN.len()], TX_SIGN_DOMAIN.as_bytes());
    }
}
