use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid CBOR: {0}")]
    InvalidCbor(String),

    #[error("non-canonical CBOR: {0}")]
    NonCanonical(String),

    #[error("duplicate map key")]
    DuplicateMapKey,

    #[error("trailing bytes after top-level item")]
    TrailingBytes,

    #[error("unexpected end of input")]
    Eof,

    #[error("varint overflows u64")]
    VarintOverflow,
}
