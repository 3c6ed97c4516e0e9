//! animica-tx — canonical transaction encoding and the signed envelope.
//!
//! The transaction id is a pure function of the body: signing, re-signing,
//! or swapping schemes never changes `tx_hash`. Concretely:
//!
//! ```text
//! SignBytes(body) = CBOR_canonical(["animica:tx:sign/v1", signable(body)])
//! tx_hash         = SHA3-256(SignBytes(body))
//! envelope        = CBOR_canonical(["animica:tx:v1", signable(body),
//!                                   {pubkey, scheme, sig}])
//! ```
//!
//! `signable` projects the body into a lowercase, enumerated-key map with
//! absent optionals omitted, so independently written encoders agree byte
//! for byte.

pub mod body;
pub mod envelope;
pub mod signable;

pub use body::{TxBody, TxKind};
pub use envelope::{decode_envelope, encode_envelope, SignedTx, TxSignature};
pub use signable::{sign_bytes, signable, tx_hash};
