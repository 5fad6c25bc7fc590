//! In-memory Verkle tree over fixed 32-byte paths.
//!
//! The tree is a radix-256 trie: internal nodes branch on one path byte,
//! stem nodes hold every present leaf sharing the first 31 path bytes,
//! indexed by the final byte. Each node is committed with a Pedersen
//! commitment over a 256-wide Lagrange polynomial; the root commitment is
//! the compressed group element of the top node.
//!
//! The representation depends only on the set of (path, leaf) pairs, never
//! on insertion order, so rebuilding a tree from its backing buckets
//! reproduces the commitment bit-exactly.

use crate::hash::hash2;
use crate::types::{Stem, TreeLeaf, TreePath, STEM_LEN, ZERO_LEAF};
use banderwagon::{trait_defs::*, Element, Fr};
use ipa_multipoint::{
    crs::CRS,
    lagrange_basis::{LagrangeBasis, PrecomputedWeights},
};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod proof;

/// Branch factor of the tree; also the degree of the committed polynomials.
pub const TREE_WIDTH: usize = 256;

/// Shared commitment key for all tree nodes.
pub(crate) static TREE_CRS: Lazy<CRS> = Lazy::new(|| CRS::new(TREE_WIDTH, b"eth_verkle_oct_2021"));

/// Barycentric weights shared by proof opening and checking.
pub(crate) static PRECOMPUTED_WEIGHTS: Lazy<PrecomputedWeights> =
    Lazy::new(|| PrecomputedWeights::new(TREE_WIDTH));

/// Error type for tree mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// Deleting a path that has no entry.
    #[error("path not present in tree")]
    NotPresent,
}

#[derive(Clone, Debug)]
enum Node {
    /// Branches on one path byte.
    Internal(BTreeMap<u8, Node>),
    /// Holds every present leaf sharing one 31-byte stem, keyed by the
    /// final path byte.
    Stem {
        stem: Stem,
        values: BTreeMap<u8, TreeLeaf>,
    },
}

/// An authenticated mapping from 32-byte paths to 32-byte leaves.
#[derive(Clone, Debug, Default)]
pub struct VerkleTree {
    /// Children of the implicit root internal node.
    root: BTreeMap<u8, Node>,
}

impl VerkleTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the leaf at `path`. A deleted path reports [`ZERO_LEAF`].
    pub fn get(&self, path: &TreePath) -> Option<TreeLeaf> {
        let mut children = &self.root;
        let mut depth = 0usize;
        loop {
            match children.get(&path[depth])? {
                Node::Internal(next) => {
                    children = next;
                    depth += 1;
                }
                Node::Stem { stem, values } => {
                    return if stem[..] == path[..STEM_LEN] {
                        values.get(&path[STEM_LEN]).copied()
                    } else {
                        None
                    };
                }
            }
        }
    }

    /// Insert or overwrite the leaf at `path`.
    pub fn insert(&mut self, path: TreePath, leaf: TreeLeaf) {
        let stem: Stem = path[..STEM_LEN].try_into().expect("path is 32 bytes");
        Self::insert_at(&mut self.root, 0, stem, path[STEM_LEN], leaf);
    }

    fn insert_at(
        children: &mut BTreeMap<u8, Node>,
        depth: usize,
        stem: Stem,
        suffix: u8,
        leaf: TreeLeaf,
    ) {
        match children.remove(&stem[depth]) {
            None => {
                children.insert(
                    stem[depth],
                    Node::Stem {
                        stem,
                        values: BTreeMap::from([(suffix, leaf)]),
                    },
                );
            }
            Some(Node::Internal(mut next)) => {
                Self::insert_at(&mut next, depth + 1, stem, suffix, leaf);
                children.insert(stem[depth], Node::Internal(next));
            }
            Some(Node::Stem {
                stem: other,
                mut values,
            }) if other == stem => {
                values.insert(suffix, leaf);
                children.insert(stem[depth], Node::Stem { stem: other, values });
            }
            Some(Node::Stem {
                stem: other,
                values: other_values,
            }) => {
                // Two stems collide at this byte: fork one level down and
                // retry. The recursion bottoms out at the first divergent
                // stem byte.
                let mut fork = BTreeMap::from([(
                    other[depth + 1],
                    Node::Stem {
                        stem: other,
                        values: other_values,
                    },
                )]);
                Self::insert_at(&mut fork, depth + 1, stem, suffix, leaf);
                children.insert(stem[depth], Node::Internal(fork));
            }
        }
    }

    /// Delete the entry at `path` by pinning its leaf to [`ZERO_LEAF`].
    ///
    /// The entry is never removed from the tree: the zero leaf keeps the
    /// deletion visible in the commitment, which light clients depend on.
    pub fn delete(&mut self, path: &TreePath) -> Result<(), TreeError> {
        if self.get(path).is_none() {
            return Err(TreeError::NotPresent);
        }
        self.insert(*path, ZERO_LEAF);
        Ok(())
    }

    /// All (path, leaf) entries in byte-lexicographic path order.
    pub fn entries(&self) -> Vec<(TreePath, TreeLeaf)> {
        let mut out = Vec::new();
        Self::collect(&self.root, &mut out);
        out
    }

    fn collect(children: &BTreeMap<u8, Node>, out: &mut Vec<(TreePath, TreeLeaf)>) {
        for child in children.values() {
            match child {
                Node::Internal(next) => Self::collect(next, out),
                Node::Stem { stem, values } => {
                    for (&suffix, leaf) in values {
                        let mut path = [0u8; 32];
                        path[..STEM_LEN].copy_from_slice(stem);
                        path[STEM_LEN] = suffix;
                        out.push((path, *leaf));
                    }
                }
            }
        }
    }

    /// Number of leaves (tombstoned entries included).
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check whether the tree holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The root commitment as a compressed 32-byte group element.
    pub fn root_commitment(&self) -> TreeLeaf {
        self.root_element().to_bytes()
    }

    /// The root commitment as a group element.
    pub fn root_element(&self) -> Element {
        self.commitments().root_element()
    }

    /// Commit every node bottom-up. One pass per proof or root computation;
    /// nothing is cached across mutations.
    pub(crate) fn commitments(&self) -> NodeCommitments {
        let mut nodes = FxHashMap::default();
        let mut prefix = Vec::with_capacity(STEM_LEN);
        Self::commit_node(&self.root, &mut prefix, &mut nodes);
        NodeCommitments { nodes }
    }

    fn commit_node(
        children: &BTreeMap<u8, Node>,
        prefix: &mut Vec<u8>,
        out: &mut FxHashMap<Vec<u8>, (Element, Vec<Fr>)>,
    ) -> Element {
        let mut poly = vec![Fr::zero(); TREE_WIDTH];
        for (&byte, child) in children {
            prefix.push(byte);
            let commitment = match child {
                Node::Internal(next) => Self::commit_node(next, prefix, out),
                Node::Stem { stem, values } => {
                    let stem_poly = stem_poly(stem, values);
                    let commitment =
                        TREE_CRS.commit_lagrange_poly(&LagrangeBasis::new(stem_poly.clone()));
                    out.insert(prefix.clone(), (commitment, stem_poly));
                    commitment
                }
            };
            poly[byte as usize] = commitment.map_to_scalar_field();
            prefix.pop();
        }
        let commitment = TREE_CRS.commit_lagrange_poly(&LagrangeBasis::new(poly.clone()));
        out.insert(prefix.clone(), (commitment, poly));
        commitment
    }
}

/// Per-node commitments and polynomials of one tree, keyed by the node's
/// position prefix (the path bytes leading to it; the root is the empty
/// prefix).
pub(crate) struct NodeCommitments {
    nodes: FxHashMap<Vec<u8>, (Element, Vec<Fr>)>,
}

impl NodeCommitments {
    pub(crate) fn root_element(&self) -> Element {
        self.node(&[]).0
    }

    pub(crate) fn node(&self, prefix: &[u8]) -> &(Element, Vec<Fr>) {
        self.nodes
            .get(prefix)
            .expect("commitment pass covers every node position")
    }
}

/// Map a leaf into the scalar field, binding the full stem so that trees
/// holding different stems at the same position cannot commit equally.
pub(crate) fn leaf_scalar(stem: &Stem, leaf: &TreeLeaf) -> Fr {
    Fr::from_le_bytes_mod_order(&hash2(stem, leaf))
}

fn stem_poly(stem: &Stem, values: &BTreeMap<u8, TreeLeaf>) -> Vec<Fr> {
    let mut poly = vec![Fr::zero(); TREE_WIDTH];
    for (&suffix, leaf) in values {
        poly[suffix as usize] = leaf_scalar(stem, leaf);
    }
    poly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn path(n: u8) -> TreePath {
        hash(&[n])
    }

    #[test]
    fn test_insert_get_roundtrip() {
        let mut tree = VerkleTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.get(&path(1)), None);

        tree.insert(path(1), [7u8; 32]);
        assert_eq!(tree.get(&path(1)), Some([7u8; 32]));
        assert_eq!(tree.get(&path(2)), None);

        // Overwrite keeps a single entry.
        tree.insert(path(1), [8u8; 32]);
        assert_eq!(tree.get(&path(1)), Some([8u8; 32]));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_stem_fork_on_shared_prefix() {
        // Two paths sharing a long prefix force a chain of internal nodes
        // down to the first divergent byte.
        let mut a = [3u8; 32];
        let mut b = [3u8; 32];
        a[29] = 1;
        b[29] = 2;
        // A third path diverging at the final stem byte.
        let mut c = [3u8; 32];
        c[30] = 9;

        let mut tree = VerkleTree::new();
        tree.insert(a, [1u8; 32]);
        tree.insert(b, [2u8; 32]);
        tree.insert(c, [3u8; 32]);

        assert_eq!(tree.get(&a), Some([1u8; 32]));
        assert_eq!(tree.get(&b), Some([2u8; 32]));
        assert_eq!(tree.get(&c), Some([3u8; 32]));
        assert_eq!(tree.len(), 3);

        // Suffix-only differences land in the same stem node.
        let mut d = a;
        d[31] = 0xFF;
        tree.insert(d, [4u8; 32]);
        assert_eq!(tree.get(&d), Some([4u8; 32]));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_delete_pins_zero_leaf() {
        let mut tree = VerkleTree::new();
        assert_eq!(tree.delete(&path(1)), Err(TreeError::NotPresent));

        tree.insert(path(1), [7u8; 32]);
        tree.delete(&path(1)).unwrap();
        assert_eq!(tree.get(&path(1)), Some(ZERO_LEAF));
        // The entry survives as a tombstone.
        assert_eq!(tree.len(), 1);
        // Deleting a tombstone again is allowed: the leaf is already zero.
        tree.delete(&path(1)).unwrap();
        assert_eq!(tree.get(&path(1)), Some(ZERO_LEAF));
    }

    #[test]
    fn test_entries_sorted_by_path() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = VerkleTree::new();
        for _ in 0..64 {
            tree.insert(rng.gen(), rng.gen());
        }
        let entries = tree.entries();
        assert_eq!(entries.len(), 64);
        assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_commitment_is_order_independent() {
        let mut rng = StdRng::seed_from_u64(42);
        let kvs: Vec<(TreePath, TreeLeaf)> = (0..16).map(|_| (rng.gen(), rng.gen())).collect();

        let mut forward = VerkleTree::new();
        for (path, leaf) in &kvs {
            forward.insert(*path, *leaf);
        }
        let mut backward = VerkleTree::new();
        for (path, leaf) in kvs.iter().rev() {
            backward.insert(*path, *leaf);
        }
        assert_eq!(forward.root_commitment(), backward.root_commitment());
    }

    #[test]
    fn test_commitment_tracks_mutations() {
        let mut tree = VerkleTree::new();
        let empty_root = tree.root_commitment();

        tree.insert(path(1), hash(b"MYVALUE"));
        let set_root = tree.root_commitment();
        assert_ne!(set_root, empty_root);

        // The tombstone leaf commits differently from both the empty tree
        // and the live entry.
        tree.delete(&path(1)).unwrap();
        let deleted_root = tree.root_commitment();
        assert_ne!(deleted_root, empty_root);
        assert_ne!(deleted_root, set_root);
    }

    #[test]
    fn test_different_stems_commit_differently() {
        // Same suffix, same leaf, stems differing only in a byte that is
        // not a branch point: the stem binding must still separate them.
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[5] = 1;
        b[5] = 2;

        let mut left = VerkleTree::new();
        left.insert(a, [9u8; 32]);
        let mut right = VerkleTree::new();
        right.insert(b, [9u8; 32]);
        assert_ne!(left.root_commitment(), right.root_commitment());
    }
}
