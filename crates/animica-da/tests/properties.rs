//! DA property tests: round-trip through arbitrary share subsets, and the
//! sort-order requirement on NMT leaves.

use animica_da::engine::{reconstruct, ExtendedBlob};
use animica_da::{Blob, DaParams, Namespace, Nmt, NmtLeaf};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::subsequence;

fn params() -> DaParams {
    DaParams {
        share_size: 512,
        k: 4,
        n: 6,
        ns_size: 8,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any k-or-more columns per stripe reconstruct the exact bytes.
    #[test]
    fn any_k_columns_reconstruct(
        len in 0usize..6_000,
        seed in any::<u64>(),
        cols in subsequence((0usize..6).collect::<Vec<_>>(), 4..=6),
    ) {
        let p = params();
        let data: Vec<u8> = (0..len).map(|i| ((i as u64).wrapping_mul(seed | 1) >> 3) as u8).collect();
        let blob = Blob { namespace: Namespace::from_id(1, 8), data: data.clone() };
        let ext = ExtendedBlob::extend(&blob, &p).unwrap();
        let (_, commitment) = ext.commit().unwrap();

        let mut available = Vec::new();
        for stripe in 0..ext.stripes {
            for &c in &cols {
                let linear = (stripe * p.n + c) as u64;
                available.push((linear, ext.shares[linear as usize].clone()));
            }
        }
        let decoded = reconstruct(&commitment, &available, &p).unwrap();
        prop_assert_eq!(decoded, data);
    }

    /// Shuffling leaves out of namespace order must fail the build, and a
    /// tree built over re-sorted leaves commits to a different root than
    /// any unsorted arrangement could verify against.
    #[test]
    fn shuffled_leaves_are_rejected(ids in vec(0u64..8, 2..24)) {
        prop_assume!(ids.windows(2).any(|w| w[0] > w[1])); // actually unsorted
        let leaves: Vec<NmtLeaf> = ids
            .iter()
            .map(|&id| NmtLeaf {
                namespace: Namespace::from_id(id, 8),
                share: vec![id as u8; 16],
            })
            .collect();
        prop_assert!(Nmt::build(leaves).is_err());
    }

    /// Namespace range proofs stay sound for every namespace present.
    #[test]
    fn range_proofs_verify_per_namespace(mut ids in vec(0u64..5, 1..16)) {
        ids.sort_unstable();
        let leaves: Vec<NmtLeaf> = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| NmtLeaf {
                namespace: Namespace::from_id(id, 8),
                share: vec![i as u8; 16],
            })
            .collect();
        let tree = Nmt::build(leaves.clone()).unwrap();
        let root = tree.root();
        for id in 0u64..5 {
            let ns = Namespace::from_id(id, 8);
            let in_range: Vec<NmtLeaf> =
                leaves.iter().filter(|l| l.namespace == ns).cloned().collect();
            let proof = tree.prove_namespace(&ns);
            prop_assert!(proof.verify(&root, &ns, &in_range).is_ok());
        }
    }
}
