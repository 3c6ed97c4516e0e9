use crate::error::CodecError;
use crate::value::Value;

// CBOR major types, shifted into the high bits of the initial byte.
const MAJOR_UINT: u8 = 0 << 5;
const MAJOR_NEG: u8 = 1 << 5;
const MAJOR_BYTES: u8 = 2 << 5;
const MAJOR_TEXT: u8 = 3 << 5;
const MAJOR_ARRAY: u8 = 4 << 5;
const MAJOR_MAP: u8 = 5 << 5;

const SIMPLE_FALSE: u8 = 0xf4;
const SIMPLE_TRUE: u8 = 0xf5;
const SIMPLE_NULL: u8 = 0xf6;

/// Encode `value` to canonical bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    encode_into(value, &mut out)?;
    Ok(out)
}

/// Encode `value`, appending to `out`.
pub fn encode_into(value: &Value, out: &mut Vec<u8>) -> Result<(), CodecError> {
    match value {
        Value::Uint(n) => write_head(MAJOR_UINT, *n, out),
        Value::Neg(n) => write_head(MAJOR_NEG, *n, out),
        Value::Bytes(b) => {
            write_head(MAJOR_BYTES, b.len() as u64, out);
            out.extend_from_slice(b);
        }
        Value::Text(s) => {
            write_head(MAJOR_TEXT, s.len() as u64, out);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            write_head(MAJOR_ARRAY, items.len() as u64, out);
            for item in items {
                encode_into(item, out)?;
            }
        }
        Value::Map(entries) => {
            // Sort entries by the byte-lex order of their encoded keys.
            let mut enc: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                enc.push((encode(k)?, encode(v)?));
            }
            enc.sort_by(|a, b| a.0.cmp(&b.0));
            for pair in enc.windows(2) {
                if pair[0].0 == pair[1].0 {
                    return Err(CodecError::DuplicateMapKey);
                }
            }
            write_head(MAJOR_MAP, enc.len() as u64, out);
            for (k, v) in enc {
                out.extend_from_slice(&k);
                out.extend_from_slice(&v);
            }
        }
        Value::Bool(true) => out.push(SIMPLE_TRUE),
        Value::Bool(false) => out.push(SIMPLE_FALSE),
        Value::Null => out.push(SIMPLE_NULL),
    }
    Ok(())
}

/// Write a major-type head with the minimal-width argument encoding.
fn write_head(major: u8, arg: u64, out: &mut Vec<u8>) {
    if arg < 24 {
        out.push(major | arg as u8);
    } else if arg <= u8::MAX as u64 {
        out.push(major | 24);
        out.push(arg as u8);
    } else if arg <= u16::MAX as u64 {
        out.push(major | 25);
        out.extend_from_slice(&(arg as u16).to_be_bytes());
    } else if arg <= u32::MAX as u64 {
        out.push(major | 26);
        out.extend_from_slice(&(arg as u32).to_be_bytes());
    } else {
        out.push(major | 27);
        out.extend_from_slice(&arg.to_be_bytes());
    }
}
