//! The Animica contract ABI.
//!
//! Selector: first 8 bytes of `SHA3-256("fn:" || signature)`, where the
//! signature covers argument and return types (`"inc()->"`,
//! `"add(int,int)->int"`).
//!
//! Call data: `selector(8) || args_tuple` with
//! `args_tuple = uvarint(n) || encode(v0) … encode(v_{n-1})`.
//!
//! Scalars: `int` is `uvarint(L) || big-endian magnitude` (zero is `L=0`,
//! no leading zero byte; negative ints are not ABI-expressible), `bool`
//! is one byte, `bytes` is length-prefixed, `address` is exactly 33
//! bytes.
//!
//! Event bytes: `uvarint(n_pairs)` then, per key in bytewise-ascending
//! order, `uvarint(len(key)) || key || encode(value)`. `topic[0] =
//! SHA3-256("event:" || name)`, `topic[1] = SHA3-256(canonical_bytes)`,
//! and the payload is the same canonical bytes.

use animica_codec::varint::{read_uvarint, write_uvarint};
use animica_core::constants::{ABI_EVENT_DOMAIN, ABI_FN_DOMAIN, MAX_ABI_VALUE_BYTES};
use animica_core::error::ExecError;
use animica_core::types::{Address, Hash32};
use animica_crypto::hash::sha3_256;
use num_bigint::{BigInt, Sign};
use num_traits::Zero;

use crate::value::{TypeTag, VmValue};

/// `selector("inc()->")`: first 8 bytes of `SHA3-256("fn:inc()->")`.
pub fn selector(signature: &str) -> [u8; 8] {
    let mut preimage = Vec::with_capacity(ABI_FN_DOMAIN.len() + signature.len());
    preimage.extend_from_slice(ABI_FN_DOMAIN.as_bytes());
    preimage.extend_from_slice(signature.as_bytes());
    let digest = sha3_256(&preimage);
    digest[..8].try_into().unwrap()
}

/// Encode a single ABI value.
pub fn encode_value(v: &VmValue, out: &mut Vec<u8>) -> Result<(), ExecError> {
    match v {
        VmValue::Int(i) => {
            if i.sign() == Sign::Minus {
                return Err(ExecError::TypeMismatch(
                    "negative int is not ABI-encodable".into(),
                ));
            }
            if i.is_zero() {
                write_uvarint(0, out);
            } else {
                let (_, mag) = i.to_bytes_be();
                write_uvarint(mag.len() as u64, out);
                out.extend_from_slice(&mag);
            }
        }
        VmValue::Bool(b) => out.push(*b as u8),
        VmValue::Bytes(b) => {
            if b.len() > MAX_ABI_VALUE_BYTES {
                return Err(ExecError::CapExceeded(format!(
                    "ABI value {} bytes exceeds {}",
                    b.len(),
                    MAX_ABI_VALUE_BYTES
                )));
            }
            write_uvarint(b.len() as u64, out);
            out.extend_from_slice(b);
        }
        VmValue::Addr(a) => out.extend_from_slice(a.as_bytes()),
    }
    Ok(())
}

/// Decode one ABI value of known type from the front of `buf`; returns the
/// value and bytes consumed.
pub fn decode_value(tag: TypeTag, buf: &[u8]) -> Result<(VmValue, usize), ExecError> {
    match tag {
        TypeTag::Int => {
            let (len, used) = read_uvarint(buf).map_err(abi_err)?;
            let len = len as usize;
            if len > 32 {
                return Err(ExecError::TypeMismatch("int wider than 256 bits".into()));
            }
            let end = used + len;
            let mag = buf
                .get(used..end)
                .ok_or_else(|| ExecError::TypeMismatch("truncated int".into()))?;
            if len > 0 && mag[0] == 0 {
                return Err(ExecError::TypeMismatch("int has leading zero byte".into()));
            }
            let value = if len == 0 {
                BigInt::zero()
            } else {
                BigInt::from_bytes_be(Sign::Plus, mag)
            };
            Ok((VmValue::Int(value), end))
        }
        TypeTag::Bool => match buf.first() {
            Some(0x00) => Ok((VmValue::Bool(false), 1)),
            Some(0x01) => Ok((VmValue::Bool(true), 1)),
            Some(other) => Err(ExecError::TypeMismatch(format!("bad bool byte {other:#x}"))),
            None => Err(ExecError::TypeMismatch("truncated bool".into())),
        },
        TypeTag::Bytes => {
            let (len, used) = read_uvarint(buf).map_err(abi_err)?;
            let len = len as usize;
            if len > MAX_ABI_VALUE_BYTES {
                return Err(ExecError::CapExceeded("ABI bytes over cap".into()));
            }
            let end = used + len;
            let bytes = buf
                .get(used..end)
                .ok_or_else(|| ExecError::TypeMismatch("truncated bytes".into()))?;
            Ok((VmValue::Bytes(bytes.to_vec()), end))
        }
        TypeTag::Address => {
            let raw: [u8; 33] = buf
                .get(..33)
                .ok_or_else(|| ExecError::TypeMismatch("truncated address".into()))?
                .try_into()
                .unwrap();
            Ok((VmValue::Addr(Address::from_bytes(raw)), 33))
        }
    }
}

/// Encode an args tuple: `uvarint(n) || encode(v0) …`.
pub fn encode_args(args: &[VmValue]) -> Result<Vec<u8>, ExecError> {
    let mut out = Vec::new();
    write_uvarint(args.len() as u64, &mut out);
    for v in args {
        encode_value(v, &mut out)?;
    }
    Ok(out)
}

/// Decode an args tuple against the declared parameter types.
pub fn decode_args(types: &[TypeTag], buf: &[u8]) -> Result<Vec<VmValue>, ExecError> {
    let (n, mut pos) = read_uvarint(buf).map_err(abi_err)?;
    if n as usize != types.len() {
        return Err(ExecError::TypeMismatch(format!(
            "expected {} args, calldata carries {}",
            types.len(),
            n
        )));
    }
    let mut args = Vec::with_capacity(types.len());
    for tag in types {
        let (v, used) = decode_value(*tag, &buf[pos..])?;
        pos += used;
        args.push(v);
    }
    if pos != buf.len() {
        return Err(ExecError::TypeMismatch("trailing calldata bytes".into()));
    }
    Ok(args)
}

/// Assemble full calldata: `selector || args_tuple`.
pub fn encode_calldata(signature: &str, args: &[VmValue]) -> Result<Vec<u8>, ExecError> {
    let mut out = Vec::new();
    out.extend_from_slice(&selector(signature));
    out.extend_from_slice(&encode_args(args)?);
    Ok(out)
}

// ── Events ───────────────────────────────────────────────────────────────────

/// Canonical event-args bytes: sorted unique UTF-8 keys, each
/// `uvarint(len) || key || encode(value)`.
pub fn canonical_event_bytes(args: &[(String, VmValue)]) -> Result<Vec<u8>, ExecError> {
    let mut sorted: Vec<&(String, VmValue)> = args.iter().collect();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    for pair in sorted.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(ExecError::TypeMismatch(format!(
                "duplicate event key {:?}",
                pair[0].0
            )));
        }
    }
    let mut out = Vec::new();
    write_uvarint(sorted.len() as u64, &mut out);
    for (key, value) in sorted {
        write_uvarint(key.len() as u64, &mut out);
        out.extend_from_slice(key.as_bytes());
        encode_value(value, &mut out)?;
    }
    Ok(out)
}

/// `topic[0] = SHA3-256("event:" || name)`.
pub fn event_topic0(name: &str) -> Hash32 {
    let mut preimage = Vec::with_capacity(ABI_EVENT_DOMAIN.len() + name.len());
    preimage.extend_from_slice(ABI_EVENT_DOMAIN.as_bytes());
    preimage.extend_from_slice(name.as_bytes());
    Hash32::from_bytes(sha3_256(&preimage))
}

/// `topic[1] = SHA3-256(canonical_args_bytes)`.
pub fn event_topic1(canonical_bytes: &[u8]) -> Hash32 {
    Hash32::from_bytes(sha3_256(canonical_bytes))
}

fn abi_err(e: animica_codec::CodecError) -> ExecError {
    ExecError::TypeMismatch(e.to_string())
}
