use crate::error::CodecError;

/// The logical CBOR subset Animica commits to on-chain.
///
/// `Neg(n)` follows CBOR major type 1: the represented value is `-1 - n`,
/// so the full `i65` negative range is expressible without bignum tags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Uint(u64),
    /// Negative integer `-1 - n`.
    Neg(u64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Value>),
    /// Entries are sorted by encoded key bytes at encode time; the stored
    /// order is whatever the builder produced.
    Map(Vec<(Value, Value)>),
    Bool(bool),
    Null,
}

impl Value {
    /// Signed view of an integer value, if this is one.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Uint(n) => Some(*n as i128),
            Value::Neg(n) => Some(-1 - (*n as i128)),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Look up a map entry by text key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Return a copy with every map sorted into canonical key order.
    ///
    /// Useful for structural equality in tests; `encode` performs the same
    /// sort on the fly.
    pub fn canonicalized(&self) -> Result<Value, CodecError> {
        Ok(match self {
            Value::Array(items) => Value::Array(
                items.iter().map(|v| v.canonicalized()).collect::<Result<_, _>>()?,
            ),
            Value::Map(entries) => {
                let mut enc: Vec<(Vec<u8>, (Value, Value))> = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    enc.push((
                        crate::encode(k)?,
                        (k.canonicalized()?, v.canonicalized()?),
                    ));
                }
                enc.sort_by(|a, b| a.0.cmp(&b.0));
                for pair in enc.windows(2) {
                    if pair[0].0 == pair[1].0 {
                        return Err(CodecError::DuplicateMapKey);
                    }
                }
                Value::Map(enc.into_iter().map(|(_, kv)| kv).collect())
            }
            other => other.clone(),
        })
    }
}
