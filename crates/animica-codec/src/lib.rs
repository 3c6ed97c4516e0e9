//! animica-codec — canonical CBOR for every chain-visible byte string.
//!
//! Two nodes in two languages must produce bit-identical bytes for the same
//! logical value, and must reject anything that is not the one canonical
//! form. That rules out general-purpose CBOR crates: canonicity has to be
//! enforced at *decode* time (minimal integer widths, definite lengths,
//! byte-lex sorted map keys), so the byte grammar lives here in full.
//!
//! Supported subset: unsigned/negative integers, byte strings, text
//! strings, arrays, maps, `true`/`false`/`null`. Floats, tags, indefinite
//! lengths, and other simple values are rejected.

mod decode;
mod encode;
mod error;
pub mod varint;
mod value;

pub use decode::decode;
pub use encode::{encode, encode_into};
pub use error::CodecError;
pub use value::Value;
