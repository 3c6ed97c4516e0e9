//! Sampling-based light verification.
//!
//! A light client draws `S` leaf indices per blob, requests each leaf
//! with its inclusion proof, and accepts availability only if every
//! challenged share verifies. An adversary withholding enough shares to
//! block reconstruction (more than `n - k` per stripe) leaves at most
//! `k - 1` of `n` columns retrievable, so each independent sample escapes
//! detection with probability at most `(k-1)/n`.

use animica_core::types::Hash32;
use animica_crypto::hash::sha3_256_concat;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::DaError;
use crate::nmt::{InclusionProof, NmtLeaf, NmtNode};

const SAMPLE_DOMAIN: &[u8] = b"animica:da:sample";

/// Derive the `s` challenged leaf indices for a blob.
///
/// Deterministic in `(root, seed)` so audits are replayable; live light
/// clients pass beacon output as the seed.
pub fn sample_indices(root: &Hash32, num_leaves: u64, seed: &[u8], s: usize) -> Vec<u64> {
    let digest = sha3_256_concat(&[SAMPLE_DOMAIN, root.as_bytes(), seed]);
    let mut rng = ChaCha20Rng::from_seed(digest);
    (0..s).map(|_| rng.gen_range(0..num_leaves)).collect()
}

/// One challenged leaf with its proof.
pub struct SampleResponse {
    pub index: u64,
    pub leaf: NmtLeaf,
    pub proof: InclusionProof,
}

/// Verify a full round of sample responses against `root`.
///
/// Every challenged index must be answered; a missing or invalid share
/// invalidates availability outright.
pub fn verify_samples(
    root: &NmtNode,
    challenged: &[u64],
    responses: &[SampleResponse],
) -> Result<(), DaError> {
    for &index in challenged {
        let response = responses
            .iter()
            .find(|r| r.index == index)
            .ok_or(DaError::ShareUnavailable {
                root: root.digest.to_hex(),
                index,
            })?;
        if response.proof.index != index {
            return Err(DaError::ProofInvalid(format!(
                "response for index {index} carries proof for {}",
                response.proof.index
            )));
        }
        response.proof.verify(root, &response.leaf)?;
    }
    Ok(())
}

/// Probability that `s` independent samples detect unavailability when an
/// adversary withholds enough shares to block a stripe: `1 - ((k-1)/n)^s`.
pub fn detection_probability(k: usize, n: usize, s: usize) -> f64 {
    let escape = (k.saturating_sub(1)) as f64 / n as f64;
    1.0 - escape.powi(s as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExtendedBlob;
    use crate::namespace::Namespace;
    use crate::params::DaParams;
    use crate::Blob;

    fn setup() -> (crate::nmt::Nmt, NmtNode) {
        let params = DaParams::default();
        let blob = Blob {
            namespace: Namespace::from_id(7, 8),
            data: vec![0x5Au8; 6_000],
        };
        let ext = ExtendedBlob::extend(&blob, &params).unwrap();
        let (tree, _) = ext.commit().unwrap();
        let root = tree.root();
        (tree, root)
    }

    #[test]
    fn indices_are_deterministic_per_seed() {
        let root = Hash32::from_bytes([1; 32]);
        let a = sample_indices(&root, 24, b"round-9", 16);
        let b = sample_indices(&root, 24, b"round-9", 16);
        let c = sample_indices(&root, 24, b"round-10", 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|&i| i < 24));
    }

    #[test]
    fn honest_responses_verify() {
        let (tree, root) = setup();
        let challenged = sample_indices(&root.digest, tree.len() as u64, b"seed", 8);
        let responses: Vec<SampleResponse> = challenged
            .iter()
            .map(|&i| SampleResponse {
                index: i,
                leaf: tree.leaves()[i as usize].clone(),
                proof: tree.prove_inclusion(i as usize).unwrap(),
            })
            .collect();
        verify_samples(&root, &challenged, &responses).unwrap();
    }

    #[test]
    fn missing_response_invalidates_availability() {
        let (tree, root) = setup();
        let challenged = sample_indices(&root.digest, tree.len() as u64, b"seed", 8);
        let withheld = challenged[0];
        let responses: Vec<SampleResponse> = challenged
            .iter()
            .filter(|&&i| i != withheld)
            .map(|&i| SampleResponse {
                index: i,
                leaf: tree.leaves()[i as usize].clone(),
                proof: tree.prove_inclusion(i as usize).unwrap(),
            })
            .collect();
        assert!(matches!(
            verify_samples(&root, &challenged, &responses),
            Err(DaError::ShareUnavailable { .. })
        ));
    }

    #[test]
    fn detection_probability_grows_with_samples() {
        let p1 = detection_probability(8, 12, 1);
        let p16 = detection_probability(8, 12, 16);
        assert!(p1 > 0.0 && p1 < p16 && p16 < 1.0);
        assert!((detection_probability(8, 12, 1) - (1.0 - 7.0 / 12.0)).abs() < 1e-12);
    }
}
