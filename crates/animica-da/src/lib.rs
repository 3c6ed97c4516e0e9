//! animica-da — the data-availability engine.
//!
//! A blob is sliced into fixed-size shares, striped `k` at a time, and
//! extended to `n` coded shares per stripe with a systematic Reed–Solomon
//! code over GF(2^8). Every coded share becomes a leaf of a Namespaced
//! Merkle Tree; the NMT root is the blob commitment, and the per-block
//! root commits to all blobs with leaves in global `(namespace,
//! blob_local_index)` order. Light clients sample leaves and verify
//! inclusion without downloading blobs.
//!
//! The erasure code is in-tree: the byte layout must be bit-identical
//! on every platform and vendor-agnostic, so no third-party codec sits
//! between consensus and the bytes.

pub mod engine;
pub mod error;
pub mod namespace;
pub mod nmt;
pub mod params;
pub mod rs;
pub mod sampling;
pub mod share;
pub mod store;

pub use engine::{Blob, BlobCommitment, ExtendedBlob};
pub use error::DaError;
pub use namespace::Namespace;
pub use nmt::{InclusionProof, NamespaceRangeProof, Nmt, NmtLeaf, NmtNode};
pub use params::DaParams;
pub use store::DaStore;
