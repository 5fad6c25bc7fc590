//! Simple merkle commitment over the sorted `{substore name -> root}` map.
//!
//! Entries are sorted byte-lexicographically by name, each leaf is
//! `hash(name || root)`, and the leaves are folded with a standard balanced
//! binary tree: inner node `hash(0x01 || left || right)`, split at the
//! largest power of two strictly below the count. The empty map commits to
//! `hash("")`.

use crate::hash::{hash, hash2};
use crate::types::Digest;
use sha3::{Digest as _, Sha3_256};
use std::collections::BTreeMap;

/// Commit a `{name -> root}` map to a single multistore root.
pub fn root_of_map(roots: &BTreeMap<Vec<u8>, Digest>) -> Digest {
    let leaves: Vec<Digest> = roots
        .iter()
        .map(|(name, root)| hash2(name, root))
        .collect();
    simple_root(&leaves)
}

fn simple_root(leaves: &[Digest]) -> Digest {
    match leaves.len() {
        0 => hash(&[]),
        1 => leaves[0],
        n => {
            let split = n.next_power_of_two() / 2;
            inner_hash(&simple_root(&leaves[..split]), &simple_root(&leaves[split..]))
        }
    }
}

fn inner_hash(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha3_256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&[u8], u8)]) -> BTreeMap<Vec<u8>, Digest> {
        entries
            .iter()
            .map(|(name, fill)| (name.to_vec(), [*fill; 32]))
            .collect()
    }

    #[test]
    fn test_empty_map_commits_to_empty_hash() {
        assert_eq!(root_of_map(&BTreeMap::new()), hash(&[]));
    }

    #[test]
    fn test_single_entry_root_is_its_leaf() {
        let roots = map(&[(b"store1", 7)]);
        assert_eq!(root_of_map(&roots), hash2(b"store1", &[7u8; 32]));
    }

    #[test]
    fn test_root_is_insertion_order_independent() {
        // BTreeMap sorts by name, so maps built in any order agree.
        let forward = map(&[(b"a", 1), (b"b", 2), (b"c", 3)]);
        let backward = map(&[(b"c", 3), (b"b", 2), (b"a", 1)]);
        assert_eq!(root_of_map(&forward), root_of_map(&backward));
    }

    #[test]
    fn test_root_depends_on_every_entry() {
        let base = map(&[(b"store1", 1), (b"store2", 2), (b"store3", 3)]);
        let renamed = map(&[(b"store1", 1), (b"store2", 2), (b"store9", 3)]);
        let changed = map(&[(b"store1", 1), (b"store2", 2), (b"store3", 9)]);
        let shrunk = map(&[(b"store1", 1), (b"store2", 2)]);

        assert_ne!(root_of_map(&base), root_of_map(&renamed));
        assert_ne!(root_of_map(&base), root_of_map(&changed));
        assert_ne!(root_of_map(&base), root_of_map(&shrunk));
    }

    #[test]
    fn test_split_point_is_balanced() {
        // Four leaves must fold as ((1,2),(3,4)), not ((1),(2,3,4)).
        let roots = map(&[(b"a", 1), (b"b", 2), (b"c", 3), (b"d", 4)]);
        let leaves: Vec<Digest> = roots.iter().map(|(n, r)| hash2(n, r)).collect();
        let expect = inner_hash(
            &inner_hash(&leaves[0], &leaves[1]),
            &inner_hash(&leaves[2], &leaves[3]),
        );
        assert_eq!(root_of_map(&roots), expect);
    }
}
