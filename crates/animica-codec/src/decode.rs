use crate::error::CodecError;
use crate::value::Value;

/// Decode a single canonical CBOR item, consuming the whole input.
///
/// Every deviation from the canonical form is an error: non-minimal heads,
/// indefinite lengths, unsorted or duplicate map keys, tags, floats, and
/// simple values other than `true`/`false`/`null`.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    let mut r = Reader { buf: bytes, pos: 0 };
    let v = r.item(0)?;
    if r.pos != bytes.len() {
        return Err(CodecError::TrailingBytes);
    }
    Ok(v)
}

// Recursion guard: canonical chain payloads are shallow; anything deeper is
// hostile input.
const MAX_DEPTH: usize = 32;

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, CodecError> {
        let b = *self.buf.get(self.pos).ok_or(CodecError::Eof)?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::Eof)?;
        if end > self.buf.len() {
            return Err(CodecError::Eof);
        }
        let s = &self.buf[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    /// Read a head, enforcing minimal-width argument encoding.
    fn head(&mut self) -> Result<(u8, u64), CodecError> {
        let initial = self.byte()?;
        let major = initial >> 5;
        let info = initial & 0x1f;
        let arg = match info {
            0..=23 => info as u64,
            24 => {
                let v = self.byte()? as u64;
                if v < 24 {
                    return Err(CodecError::NonCanonical("1-byte arg fits in head".into()));
                }
                v
            }
            25 => {
                let v = u16::from_be_bytes(self.take(2)?.try_into().unwrap()) as u64;
                if v <= u8::MAX as u64 {
                    return Err(CodecError::NonCanonical("2-byte arg fits in 1".into()));
                }
                v
            }
            26 => {
                let v = u32::from_be_bytes(self.take(4)?.try_into().unwrap()) as u64;
                if v <= u16::MAX as u64 {
                    return Err(CodecError::NonCanonical("4-byte arg fits in 2".into()));
                }
                v
            }
            27 => {
                let v = u64::from_be_bytes(self.take(8)?.try_into().unwrap());
                if v <= u32::MAX as u64 {
                    return Err(CodecError::NonCanonical("8-byte arg fits in 4".into()));
                }
                v
            }
            31 => return Err(CodecError::NonCanonical("indefinite length".into())),
            _ => return Err(CodecError::InvalidCbor(format!("reserved info {info}"))),
        };
        Ok((major, arg))
    }

    fn item(&mut self, depth: usize) -> Result<Value, CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::InvalidCbor("nesting too deep".into()));
        }
        // Peek the simple-value space before the generic head parse: major 7
        // carries bools/null/floats and its argument is not a length.
        let initial = *self.buf.get(self.pos).ok_or(CodecError::Eof)?;
        if initial >> 5 == 7 {
            self.pos += 1;
            return match initial {
                0xf4 => Ok(Value::Bool(false)),
                0xf5 => Ok(Value::Bool(true)),
                0xf6 => Ok(Value::Null),
                0xf9 | 0xfa | 0xfb => Err(CodecError::NonCanonical("float".into())),
                0xff => Err(CodecError::NonCanonical("stray break".into())),
                other => Err(CodecError::NonCanonical(format!("simple value {other:#x}"))),
            };
        }

        let (major, arg) = self.head()?;
        match major {
            0 => Ok(Value::Uint(arg)),
            1 => Ok(Value::Neg(arg)),
            2 => Ok(Value::Bytes(self.take(arg as usize)?.to_vec())),
            3 => {
                let raw = self.take(arg as usize)?;
                let s = std::str::from_utf8(raw)
                    .map_err(|_| CodecError::InvalidCbor("invalid utf-8 text".into()))?;
                Ok(Value::Text(s.to_string()))
            }
            4 => {
                let mut items = Vec::with_capacity((arg as usize).min(1024));
                for _ in 0..arg {
                    items.push(self.item(depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            5 => {
                let mut entries = Vec::with_capacity((arg as usize).min(1024));
                let mut prev_key: Option<Vec<u8>> = None;
                for _ in 0..arg {
                    let key_start = self.pos;
                    let key = self.item(depth + 1)?;
                    let key_bytes = self.buf[key_start..self.pos].to_vec();
                    if let Some(prev) = &prev_key {
                        match prev.as_slice().cmp(&key_bytes) {
                            std::cmp::Ordering::Less => {}
                            std::cmp::Ordering::Equal => return Err(CodecError::DuplicateMapKey),
                            std::cmp::Ordering::Greater => {
                                return Err(CodecError::NonCanonical("map keys unsorted".into()))
                            }
                        }
                    }
                    prev_key = Some(key_bytes);
                    let val = self.item(depth + 1)?;
                    entries.push((key, val));
                }
                Ok(Value::Map(entries))
            }
            6 => Err(CodecError::NonCanonical("tagged item".into())),
            _ => unreachable!("major 7 handled above"),
        }
    }
}
