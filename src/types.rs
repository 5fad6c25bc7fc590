//! Byte-level types shared by the store, proof, and multistore layers.

use serde::{Deserialize, Serialize};

/// A 32-byte digest produced by the hash discipline in [`crate::hash`].
pub type Digest = [u8; 32];

/// A position in the Verkle tree. Always the digest of an original key.
pub type TreePath = Digest;

/// A tree leaf. Always the digest of an original value, or [`ZERO_LEAF`].
pub type TreeLeaf = Digest;

/// Reserved tombstone leaf. A deleted key keeps its tree entry, pinned to
/// this value, so that reloading a store from its backing buckets reproduces
/// the same commitment the live tree had.
pub const ZERO_LEAF: TreeLeaf = [0u8; 32];

/// Length of a stem: every path byte except the final suffix byte.
pub const STEM_LEN: usize = 31;

/// The leading path bytes shared by up to 256 leaves of one stem node.
pub type Stem = [u8; STEM_LEN];

/// Bucket prefix for `0x01 || key -> value` entries in a substore's backing
/// byte store. An empty value encodes a tombstone.
pub const VALUES_PREFIX: u8 = 0x01;

/// Bucket prefix for `0x02 || hash(key) -> key` preimage entries. The entry
/// is removed when the key is deleted.
pub const PREIMAGES_PREFIX: u8 = 0x02;

/// Identity of one sealed multistore state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitId {
    /// Height of the commit.
    pub version: i64,
    /// Multistore root at this version.
    pub hash: Digest,
}

impl CommitId {
    /// Create a commit identity from a sealed version and root.
    pub fn new(version: i64, hash: Digest) -> Self {
        Self { version, hash }
    }

    /// True for the sentinel identity of a store that has never committed.
    pub fn is_zero(&self) -> bool {
        self.version == 0 && self.hash == [0u8; 32]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_commit_id() {
        assert!(CommitId::default().is_zero());
        assert!(!CommitId::new(1, [0u8; 32]).is_zero());
        assert!(!CommitId::new(0, [1u8; 32]).is_zero());
    }
}
