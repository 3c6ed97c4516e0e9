//! Blob lifecycle: partition → RS-extend → NMT commit → reconstruct.

use animica_core::types::Hash32;
use serde::{Deserialize, Serialize};

use crate::error::DaError;
use crate::namespace::Namespace;
use crate::nmt::{Nmt, NmtLeaf, NmtNode};
use crate::params::DaParams;
use crate::rs::ReedSolomon;
use crate::share::{linear_index, partition};

/// An application blob as submitted: namespace, raw bytes, and the exact
/// length to trim back to after decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub namespace: Namespace,
    pub data: Vec<u8>,
}

/// Commitment metadata persisted per blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobCommitment {
    /// NMT root over this blob's extended leaves.
    pub commitment: Hash32,
    pub namespace: Namespace,
    pub original_len: u64,
    /// Extended leaf count (`stripes * n`).
    pub num_leaves: u64,
}

/// A blob after RS extension: `stripes * n` coded shares, row-major.
pub struct ExtendedBlob {
    pub namespace: Namespace,
    pub original_len: u64,
    pub shares: Vec<Vec<u8>>,
    pub stripes: usize,
}

impl ExtendedBlob {
    /// Extend `blob` per the network params. Deterministic: systematic
    /// RS(k, n) stripe by stripe, shares laid out `linear = r·n + c`.
    pub fn extend(blob: &Blob, params: &DaParams) -> Result<Self, DaError> {
        params.validate()?;
        if blob.namespace.len() != params.ns_size {
            return Err(DaError::BadNamespace {
                expected: params.ns_size,
                got: blob.namespace.len(),
            });
        }
        let data_shares = partition(&blob.data, params);
        let stripes = data_shares.len() / params.k;
        let rs = ReedSolomon::new(params.k, params.n)?;
        let mut shares = Vec::with_capacity(stripes * params.n);
        for stripe in data_shares.chunks(params.k) {
            shares.extend(rs.encode_stripe(stripe)?);
        }
        Ok(Self {
            namespace: blob.namespace.clone(),
            original_len: blob.data.len() as u64,
            shares,
            stripes,
        })
    }

    /// NMT leaves for this blob, in blob-local (row-major) order.
    pub fn leaves(&self) -> Vec<NmtLeaf> {
        self.shares
            .iter()
            .map(|share| NmtLeaf {
                namespace: self.namespace.clone(),
                share: share.clone(),
            })
            .collect()
    }

    /// Build the per-blob tree and commitment.
    pub fn commit(&self) -> Result<(Nmt, BlobCommitment), DaError> {
        let tree = Nmt::build(self.leaves())?;
        let root = tree.root();
        Ok((
            tree,
            BlobCommitment {
                commitment: root.digest,
                namespace: self.namespace.clone(),
                original_len: self.original_len,
                num_leaves: self.shares.len() as u64,
            },
        ))
    }
}

/// Build the block-level DA tree over every blob's leaves, globally
/// ordered by `(namespace, blob_local_index)`.
pub fn block_tree(extended: &[ExtendedBlob]) -> Result<(Nmt, NmtNode), DaError> {
    let mut order: Vec<usize> = (0..extended.len()).collect();
    order.sort_by(|&a, &b| extended[a].namespace.cmp(&extended[b].namespace));
    let mut leaves = Vec::new();
    for idx in order {
        leaves.extend(extended[idx].leaves());
    }
    let tree = Nmt::build(leaves)?;
    let root = tree.root();
    Ok((tree, root))
}

/// Reconstruct a blob's exact bytes from any `k` coded shares per stripe.
///
/// `available` holds `(linear_index, share_bytes)` pairs; indices beyond
/// the blob's extent or ragged share widths are rejected.
pub fn reconstruct(
    commitment: &BlobCommitment,
    available: &[(u64, Vec<u8>)],
    params: &DaParams,
) -> Result<Vec<u8>, DaError> {
    params.validate()?;
    let stripes = (commitment.num_leaves as usize) / params.n;
    let rs = ReedSolomon::new(params.k, params.n)?;

    let mut per_stripe: Vec<Vec<(usize, Vec<u8>)>> = vec![Vec::new(); stripes];
    for (linear, bytes) in available {
        let linear = *linear as usize;
        if linear >= commitment.num_leaves as usize {
            return Err(DaError::ReconstructFailed(format!(
                "linear index {linear} out of range"
            )));
        }
        if bytes.len() != params.share_size {
            return Err(DaError::BadShareSize {
                expected: params.share_size,
                got: bytes.len(),
            });
        }
        let stripe = linear / params.n;
        let column = linear % params.n;
        per_stripe[stripe].push((column, bytes.clone()));
    }

    let mut data = Vec::with_capacity(stripes * params.k * params.share_size);
    for (stripe_idx, shares) in per_stripe.iter().enumerate() {
        if shares.len() < params.k {
            return Err(DaError::InsufficientShares {
                stripe: stripe_idx,
                need: params.k,
                got: shares.len(),
            });
        }
        let recovered = rs.decode_stripe(shares)?;
        for share in recovered {
            data.extend_from_slice(&share);
        }
    }
    data.truncate(commitment.original_len as usize);
    Ok(data)
}

/// Convenience for provers: the linear index of `(stripe, column)`.
pub fn share_linear(stripe: usize, column: usize, params: &DaParams) -> u64 {
    linear_index(stripe, column, params) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DaParams {
        DaParams {
            share_size: 1024,
            k: 8,
            n: 12,
            ns_size: 8,
        }
    }

    fn blob(ns_id: u64, len: usize) -> Blob {
        Blob {
            namespace: Namespace::from_id(ns_id, 8),
            data: (0..len).map(|i| (i % 251) as u8).collect(),
        }
    }

    #[test]
    fn reference_scenario_layout() {
        // 10,000-byte blob → 10 data shares → pad to 16 → 2 stripes → 24
        // extended leaves.
        let ext = ExtendedBlob::extend(&blob(24, 10_000), &params()).unwrap();
        assert_eq!(ext.stripes, 2);
        assert_eq!(ext.shares.len(), 24);
        let (_, commitment) = ext.commit().unwrap();
        assert_eq!(commitment.num_leaves, 24);
        assert_eq!(commitment.original_len, 10_000);
    }

    #[test]
    fn decode_from_any_k_per_stripe() {
        let p = params();
        let b = blob(24, 10_000);
        let ext = ExtendedBlob::extend(&b, &p).unwrap();
        let (_, commitment) = ext.commit().unwrap();

        // Take a scattered k=8 of n=12 from each stripe, parity included.
        let picks = [0usize, 2, 3, 5, 8, 9, 10, 11];
        let mut available = Vec::new();
        for stripe in 0..ext.stripes {
            for &col in &picks {
                let linear = share_linear(stripe, col, &p);
                available.push((linear, ext.shares[linear as usize].clone()));
            }
        }
        let decoded = reconstruct(&commitment, &available, &p).unwrap();
        assert_eq!(decoded, b.data);
    }

    #[test]
    fn decode_fails_below_k() {
        let p = params();
        let ext = ExtendedBlob::extend(&blob(1, 4_000), &p).unwrap();
        let (_, commitment) = ext.commit().unwrap();
        let available: Vec<(u64, Vec<u8>)> = (0..7u64)
            .map(|i| (i, ext.shares[i as usize].clone()))
            .collect();
        assert!(matches!(
            reconstruct(&commitment, &available, &p),
            Err(DaError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn block_tree_sorts_blobs_by_namespace() {
        let p = params();
        let ext_hi = ExtendedBlob::extend(&blob(9, 100), &p).unwrap();
        let ext_lo = ExtendedBlob::extend(&blob(2, 100), &p).unwrap();
        // Submission order is hi, lo; the tree must still be sorted.
        let (tree, root) = block_tree(&[ext_hi, ext_lo]).unwrap();
        assert_eq!(tree.leaves()[0].namespace, Namespace::from_id(2, 8));
        assert_eq!(root.min_ns, Namespace::from_id(2, 8));
        assert_eq!(root.max_ns, Namespace::from_id(9, 8));
    }

    #[test]
    fn inclusion_proofs_verify_against_blob_commitment() {
        let p = params();
        let ext = ExtendedBlob::extend(&blob(3, 5_000), &p).unwrap();
        let (tree, commitment) = ext.commit().unwrap();
        let root = tree.root();
        assert_eq!(root.digest, commitment.commitment);
        for i in [0usize, 5, 11, 12, 23] {
            let proof = tree.prove_inclusion(i).unwrap();
            proof.verify(&root, &tree.leaves()[i]).unwrap();
        }
    }
}
