//! Namespaced Merkle Tree.
//!
//! Leaves are `encode_namespace(ns) || uvarint(share_size) || share_bytes`
//! in global `(namespace, blob_local_index)` order. Every node carries
//! `(min_ns, max_ns)` tags; an internal digest is
//! `SHA3-256(left.digest || right.digest || left.min_ns || right.max_ns)`
//! and a leaf digest is `SHA3-256(0x00 || leaf_bytes)`. Trees split at the
//! largest power of two below the leaf count, so every verifier rebuilds
//! the same shape.
//!
//! Both proof forms re-check the namespace sort while folding: a
//! shuffled tree fails verification even when the digests line up.

use animica_codec::varint::uvarint;
use animica_core::types::Hash32;
use animica_crypto::hash::sha3_256_concat;
use serde::{Deserialize, Serialize};

use crate::error::DaError;
use crate::namespace::Namespace;

const LEAF_PREFIX: &[u8] = &[0x00];

/// A tree node: digest plus the namespace interval it covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NmtNode {
    pub digest: Hash32,
    pub min_ns: Namespace,
    pub max_ns: Namespace,
}

/// One leaf: a namespace tag and its raw share bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NmtLeaf {
    pub namespace: Namespace,
    pub share: Vec<u8>,
}

impl NmtLeaf {
    /// The committed leaf byte string.
    pub fn encoded(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(self.namespace.len() + 10 + self.share.len());
        out.extend_from_slice(self.namespace.as_bytes());
        out.extend_from_slice(&uvarint(self.share.len() as u64));
        out.extend_from_slice(&self.share);
        out
    }

    pub fn node(&self) -> NmtNode {
        let encoded = self.encoded();
        NmtNode {
            digest: Hash32::from_bytes(sha3_256_concat(&[LEAF_PREFIX, &encoded])),
            min_ns: self.namespace.clone(),
            max_ns: self.namespace.clone(),
        }
    }
}

/// Combine two child nodes. Callers must have checked the sort order.
fn combine(left: &NmtNode, right: &NmtNode) -> NmtNode {
    let digest = sha3_256_concat(&[
        left.digest.as_bytes(),
        right.digest.as_bytes(),
        left.min_ns.as_bytes(),
        right.max_ns.as_bytes(),
    ]);
    NmtNode {
        digest: Hash32::from_bytes(digest),
        min_ns: left.min_ns.clone(),
        max_ns: right.max_ns.clone(),
    }
}

/// Check the invariant a parent may rely on: everything under `left`
/// namespaces at or below everything under `right`.
fn check_sorted(left: &NmtNode, right: &NmtNode) -> Result<(), DaError> {
    if left.max_ns > right.min_ns {
        return Err(DaError::NamespaceOrder);
    }
    Ok(())
}

/// Largest power of two strictly less than `n` (`n >= 2`).
fn split_point(n: usize) -> usize {
    let mut k = 1usize;
    while k * 2 < n {
        k *= 2;
    }
    k
}

// ── Tree ─────────────────────────────────────────────────────────────────────

/// An in-memory NMT over a fixed leaf sequence.
pub struct Nmt {
    leaves: Vec<NmtLeaf>,
    leaf_nodes: Vec<NmtNode>,
}

impl Nmt {
    /// Build over `leaves`, rejecting namespace order violations.
    pub fn build(leaves: Vec<NmtLeaf>) -> Result<Self, DaError> {
        if leaves.is_empty() {
            return Err(DaError::EmptyTree);
        }
        for pair in leaves.windows(2) {
            if pair[0].namespace > pair[1].namespace {
                return Err(DaError::NamespaceOrder);
            }
        }
        let leaf_nodes = leaves.iter().map(NmtLeaf::node).collect();
        Ok(Self { leaves, leaf_nodes })
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaves(&self) -> &[NmtLeaf] {
        &self.leaves
    }

    pub fn root(&self) -> NmtNode {
        self.subtree(0, self.leaf_nodes.len())
    }

    fn subtree(&self, lo: usize, hi: usize) -> NmtNode {
        if hi - lo == 1 {
            return self.leaf_nodes[lo].clone();
        }
        let k = split_point(hi - lo);
        let left = self.subtree(lo, lo + k);
        let right = self.subtree(lo + k, hi);
        combine(&left, &right)
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn prove_inclusion(&self, index: usize) -> Result<InclusionProof, DaError> {
        if index >= self.leaves.len() {
            return Err(DaError::ProofInvalid(format!("leaf index {index} out of range")));
        }
        let mut steps = Vec::new();
        self.collect_path(0, self.leaf_nodes.len(), index, &mut steps);
        steps.reverse(); // leaf-to-root order
        Ok(InclusionProof {
            index: index as u64,
            steps,
        })
    }

    fn collect_path(&self, lo: usize, hi: usize, index: usize, steps: &mut Vec<ProofStep>) {
        if hi - lo == 1 {
            return;
        }
        let k = split_point(hi - lo);
        if index < lo + k {
            steps.push(ProofStep {
                node: self.subtree(lo + k, hi),
                on_left: false,
            });
            self.collect_path(lo, lo + k, index, steps);
        } else {
            steps.push(ProofStep {
                node: self.subtree(lo, lo + k),
                on_left: true,
            });
            self.collect_path(lo + k, hi, index, steps);
        }
        // Steps accumulate root-first; `prove_inclusion` reverses once.
    }

    /// Range proof for every leaf carrying `ns` (absence proof when none
    /// do).
    pub fn prove_namespace(&self, ns: &Namespace) -> NamespaceRangeProof {
        let start = self
            .leaves
            .partition_point(|l| l.namespace < *ns);
        let end = self
            .leaves
            .partition_point(|l| l.namespace <= *ns);
        let mut left = Vec::new();
        let mut right = Vec::new();
        self.collect_context(0, self.leaf_nodes.len(), start, end, &mut left, &mut right);
        NamespaceRangeProof {
            total_leaves: self.leaves.len() as u64,
            left,
            right,
        }
    }

    fn collect_context(
        &self,
        lo: usize,
        hi: usize,
        start: usize,
        end: usize,
        left: &mut Vec<SpanNode>,
        right: &mut Vec<SpanNode>,
    ) {
        if hi <= start {
            left.push(SpanNode {
                node: self.subtree(lo, hi),
                span: (hi - lo) as u64,
            });
            return;
        }
        if lo >= end {
            right.push(SpanNode {
                node: self.subtree(lo, hi),
                span: (hi - lo) as u64,
            });
            return;
        }
        if lo >= start && hi <= end {
            // Entirely inside the range: the verifier recomputes these
            // from the raw leaves.
            return;
        }
        let k = split_point(hi - lo);
        self.collect_context(lo, lo + k, start, end, left, right);
        self.collect_context(lo + k, hi, start, end, left, right);
    }
}

// ── Inclusion proof ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub node: NmtNode,
    /// True when this sibling sits to the left of the folded path.
    pub on_left: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub index: u64,
    pub steps: Vec<ProofStep>,
}

impl InclusionProof {
    /// Verify that `leaf` is committed under `root` at this proof's
    /// position.
    pub fn verify(&self, root: &NmtNode, leaf: &NmtLeaf) -> Result<(), DaError> {
        let mut cur = leaf.node();
        for step in &self.steps {
            if step.on_left {
                check_sorted(&step.node, &cur)?;
                cur = combine(&step.node, &cur);
            } else {
                check_sorted(&cur, &step.node)?;
                cur = combine(&cur, &step.node);
            }
        }
        if cur != *root {
            return Err(DaError::ProofInvalid("root mismatch".into()));
        }
        Ok(())
    }
}

// ── Namespace range proof ────────────────────────────────────────────────────

/// A context subtree with the number of leaves it covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanNode {
    pub node: NmtNode,
    pub span: u64,
}

/// Proves that a set of leaves is the *complete* contiguous run for one
/// namespace, and, when the set is empty, that the namespace is absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRangeProof {
    pub total_leaves: u64,
    /// Subtrees covering everything left of the range, in leaf order.
    pub left: Vec<SpanNode>,
    /// Subtrees covering everything right of the range, in leaf order.
    pub right: Vec<SpanNode>,
}

impl NamespaceRangeProof {
    /// Verify `leaves` is the complete run for `ns` under `root`.
    pub fn verify(
        &self,
        root: &NmtNode,
        ns: &Namespace,
        leaves: &[NmtLeaf],
    ) -> Result<(), DaError> {
        // Completeness: nothing to the left may reach ns, nothing to the
        // right may start at or below it.
        for span in &self.left {
            if span.node.max_ns >= *ns {
                return Err(DaError::ProofInvalid(
                    "left context overlaps namespace".into(),
                ));
            }
        }
        for span in &self.right {
            if span.node.min_ns <= *ns {
                return Err(DaError::ProofInvalid(
                    "right context overlaps namespace".into(),
                ));
            }
        }
        for leaf in leaves {
            if leaf.namespace != *ns {
                return Err(DaError::ProofInvalid("foreign leaf in range".into()));
            }
        }

        let mut items: Vec<SpanNode> = Vec::new();
        items.extend(self.left.iter().cloned());
        items.extend(leaves.iter().map(|l| SpanNode {
            node: l.node(),
            span: 1,
        }));
        items.extend(self.right.iter().cloned());

        let total: u64 = items.iter().map(|s| s.span).sum();
        if total != self.total_leaves || total == 0 {
            return Err(DaError::ProofInvalid("span total mismatch".into()));
        }
        let rebuilt = fold_spans(&items)?;
        if rebuilt != *root {
            return Err(DaError::ProofInvalid("root mismatch".into()));
        }
        Ok(())
    }
}

/// Rebuild the root from ordered `(node, span)` items following the same
/// power-of-two split recursion as the builder.
fn fold_spans(items: &[SpanNode]) -> Result<NmtNode, DaError> {
    if items.len() == 1 {
        return Ok(items[0].node.clone());
    }
    let total: u64 = items.iter().map(|s| s.span).sum();
    let k = split_point(total as usize) as u64;
    // Locate the item boundary matching the split; a boundary inside a
    // context node means the prover packaged the wrong subtrees.
    let mut acc = 0u64;
    let mut cut = None;
    for (i, item) in items.iter().enumerate() {
        if acc == k {
            cut = Some(i);
            break;
        }
        if acc > k {
            break;
        }
        acc += item.span;
    }
    let Some(cut) = cut else {
        return Err(DaError::ProofInvalid("context node straddles split".into()));
    };
    if cut == 0 || cut == items.len() {
        return Err(DaError::ProofInvalid("degenerate split".into()));
    }
    let left = fold_spans(&items[..cut])?;
    let right = fold_spans(&items[cut..])?;
    check_sorted(&left, &right)?;
    Ok(combine(&left, &right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(id: u64) -> Namespace {
        Namespace::from_id(id, 8)
    }

    fn leaf(id: u64, fill: u8) -> NmtLeaf {
        NmtLeaf {
            namespace: ns(id),
            share: vec![fill; 32],
        }
    }

    fn sample_tree() -> Nmt {
        Nmt::build(vec![
            leaf(1, 0x11),
            leaf(1, 0x12),
            leaf(2, 0x21),
            leaf(2, 0x22),
            leaf(2, 0x23),
            leaf(5, 0x51),
            leaf(9, 0x91),
        ])
        .unwrap()
    }

    #[test]
    fn build_rejects_unsorted_leaves() {
        let err = Nmt::build(vec![leaf(2, 0), leaf(1, 0)]);
        assert!(matches!(err, Err(DaError::NamespaceOrder)));
    }

    #[test]
    fn inclusion_proofs_verify_for_every_leaf() {
        let tree = sample_tree();
        let root = tree.root();
        for i in 0..tree.len() {
            let proof = tree.prove_inclusion(i).unwrap();
            proof.verify(&root, &tree.leaves()[i]).unwrap();
        }
    }

    #[test]
    fn inclusion_proof_rejects_wrong_leaf() {
        let tree = sample_tree();
        let root = tree.root();
        let proof = tree.prove_inclusion(2).unwrap();
        assert!(proof.verify(&root, &leaf(2, 0xFF)).is_err());
    }

    #[test]
    fn range_proof_covers_full_namespace() {
        let tree = sample_tree();
        let root = tree.root();
        let proof = tree.prove_namespace(&ns(2));
        let in_range: Vec<NmtLeaf> = tree
            .leaves()
            .iter()
            .filter(|l| l.namespace == ns(2))
            .cloned()
            .collect();
        assert_eq!(in_range.len(), 3);
        proof.verify(&root, &ns(2), &in_range).unwrap();
    }

    #[test]
    fn range_proof_rejects_omission() {
        let tree = sample_tree();
        let root = tree.root();
        let proof = tree.prove_namespace(&ns(2));
        let partial: Vec<NmtLeaf> = tree
            .leaves()
            .iter()
            .filter(|l| l.namespace == ns(2))
            .take(2)
            .cloned()
            .collect();
        assert!(proof.verify(&root, &ns(2), &partial).is_err());
    }

    #[test]
    fn range_proof_rejects_injected_foreign_leaf() {
        let tree = sample_tree();
        let root = tree.root();
        let proof = tree.prove_namespace(&ns(2));
        let mut leaves: Vec<NmtLeaf> = tree
            .leaves()
            .iter()
            .filter(|l| l.namespace == ns(2))
            .cloned()
            .collect();
        leaves.push(leaf(3, 0x33));
        assert!(proof.verify(&root, &ns(2), &leaves).is_err());
    }

    #[test]
    fn absence_proof_for_missing_namespace() {
        let tree = sample_tree();
        let root = tree.root();
        let proof = tree.prove_namespace(&ns(4));
        proof.verify(&root, &ns(4), &[]).unwrap();
        // The same proof cannot claim leaves exist.
        assert!(proof.verify(&root, &ns(4), &[leaf(4, 0)]).is_err());
    }

    #[test]
    fn single_leaf_tree_roundtrips() {
        let tree = Nmt::build(vec![leaf(7, 0x70)]).unwrap();
        let root = tree.root();
        let proof = tree.prove_inclusion(0).unwrap();
        proof.verify(&root, &tree.leaves()[0]).unwrap();
        assert!(proof.steps.is_empty());
    }
}
