//! A single authenticated substore: one in-memory Verkle tree plus two
//! persistent byte buckets.
//!
//! The values bucket (`0x01 || key -> value`) is the complete set of live
//! key-value pairs; an empty value is a tombstone. The preimages bucket
//! (`0x02 || hash(key) -> key`) maps tree paths back to original keys so
//! the hashed domain can be inspected without rescanning. The tree commits
//! `hash(key) -> hash(value)` for every live pair and `hash(key) -> 0` for
//! every tombstone.
//!
//! Between exported operations the tree and the buckets agree; the buckets
//! are the durable truth and [`Substore::load`] rebuilds the tree from
//! them. Writes persist to the buckets first and touch the tree last, so a
//! failed bucket write never leaves the commitment ahead of durable state.

use crate::hash::hash;
use crate::proof::{CommitmentProof, VerkleProof};
use crate::store::{KvDb, StoreError};
use crate::types::{Digest, TreePath, PREIMAGES_PREFIX, VALUES_PREFIX, ZERO_LEAF};
use crate::verkle::{proof::make_multiproof, VerkleTree};

fn values_key(key: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(1 + key.len());
    full.push(VALUES_PREFIX);
    full.extend_from_slice(key);
    full
}

fn preimages_key(path: &TreePath) -> Vec<u8> {
    let mut full = Vec::with_capacity(1 + path.len());
    full.push(PREIMAGES_PREFIX);
    full.extend_from_slice(path);
    full
}

/// An authenticated key-value substore backed by a Verkle tree.
#[derive(Debug)]
pub struct Substore<D> {
    tree: VerkleTree,
    db: D,
}

impl<D: KvDb> Substore<D> {
    /// Create an empty substore over `db`.
    pub fn new(db: D) -> Self {
        Self {
            tree: VerkleTree::new(),
            db,
        }
    }

    /// Rebuild a substore from its backing buckets.
    ///
    /// Iterates the values bucket (order is irrelevant: the tree
    /// representation depends only on the entry set) and re-inserts
    /// `hash(key) -> hash(value)` for live pairs and the zero leaf for
    /// tombstones, reproducing the pre-restart commitment bit-exactly.
    pub fn load(db: D) -> Result<Self, StoreError> {
        let mut tree = VerkleTree::new();
        let entries = db.scan_prefix(&[VALUES_PREFIX]).map_err(StoreError::backing)?;
        for (bucket_key, value) in entries {
            let key = &bucket_key[1..];
            let leaf = if value.is_empty() {
                ZERO_LEAF
            } else {
                hash(&value)
            };
            tree.insert(hash(key), leaf);
        }
        tracing::debug!(entries = tree.len(), "rebuilt substore tree from values bucket");
        Ok(Self { tree, db })
    }

    /// Get the value stored under `key`, or `None` if absent or deleted.
    ///
    /// Cross-checks the stored bytes against the committed leaf; a mismatch
    /// poisons the substore with [`StoreError::Corruption`].
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        let Some(value) = self.db.get(&values_key(key)).map_err(StoreError::backing)? else {
            return Ok(None);
        };
        if value.is_empty() {
            // Tombstone.
            return Ok(None);
        }
        match self.tree.get(&hash(key)) {
            Some(leaf) if leaf == hash(&value) => Ok(Some(value)),
            _ => Err(StoreError::corruption(format!(
                "value digest mismatch for key {}",
                hex::encode(key)
            ))),
        }
    }

    /// Check whether `key` holds a live value.
    pub fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        Ok(matches!(self.tree.get(&hash(key)), Some(leaf) if leaf != ZERO_LEAF))
    }

    /// Store `value` under `key`.
    ///
    /// Both bucket writes must succeed before the tree is touched; if the
    /// second write fails the first is restored and the operation fails
    /// without mutating the commitment.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        if value.is_empty() {
            return Err(StoreError::EmptyValue);
        }
        let path = hash(key);
        let prior = self.db.get(&values_key(key)).map_err(StoreError::backing)?;
        self.db
            .put(&values_key(key), value)
            .map_err(StoreError::backing)?;
        if let Err(err) = self.db.put(&preimages_key(&path), key) {
            self.restore_values_entry(key, prior)?;
            return Err(StoreError::backing(err));
        }
        self.tree.insert(path, hash(value));
        Ok(())
    }

    /// Delete `key`. Deleting an absent key is a no-op.
    ///
    /// The values bucket keeps an empty-value tombstone and the tree leaf
    /// is pinned to zero, so the deletion stays visible in the commitment
    /// across reloads. The preimage entry is removed.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        let path = hash(key);
        if self.tree.get(&path).is_none() {
            return Ok(());
        }
        let prior = self.db.get(&values_key(key)).map_err(StoreError::backing)?;
        self.db
            .put(&values_key(key), &[])
            .map_err(StoreError::backing)?;
        if let Err(err) = self.db.delete(&preimages_key(&path)) {
            self.restore_values_entry(key, prior)?;
            return Err(StoreError::backing(err));
        }
        self.tree
            .delete(&path)
            .map_err(|e| StoreError::corruption(format!("tree delete after presence check: {e}")))?;
        Ok(())
    }

    fn restore_values_entry(&self, key: &[u8], prior: Option<Vec<u8>>) -> Result<(), StoreError> {
        let restore = match &prior {
            Some(value) => self.db.put(&values_key(key), value),
            None => self.db.delete(&values_key(key)),
        };
        restore.map_err(|e| {
            StoreError::corruption(format!(
                "failed to restore values bucket after write fault: {e:?}"
            ))
        })
    }

    /// The original key bytes stored for a tree path, if the path is live.
    pub fn preimage(&self, path: &TreePath) -> Result<Option<Vec<u8>>, StoreError> {
        self.db
            .get(&preimages_key(path))
            .map_err(StoreError::backing)
    }

    /// The substore's current root commitment.
    pub fn root_commitment(&self) -> Digest {
        self.tree.root_commitment()
    }

    /// Build a batch commitment proof covering all requested keys, mixing
    /// membership and absence freely.
    ///
    /// The witness carried by the proof is the full tree contents; the
    /// verifier rebuilds the tree from it. Until the proof primitive
    /// supports stateless reconstruction this is the contract the wire
    /// format commits to.
    pub fn proof_ics23(&self, keys: &[Vec<u8>]) -> Result<CommitmentProof, StoreError> {
        let paths = keys
            .iter()
            .map(|key| {
                if key.is_empty() {
                    Err(StoreError::EmptyKey)
                } else {
                    Ok(hash(key))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let proof = make_multiproof(&self.tree, &paths)?;
        let (witness_keys, witness_values): (Vec<_>, Vec<_>) =
            self.tree.entries().into_iter().unzip();
        Ok(CommitmentProof::Verkle(VerkleProof::new(
            witness_keys,
            witness_values,
            proof,
        )?))
    }

    /// All (key, value) pairs in the values bucket, tombstones included as
    /// empty values. Order follows the raw bucket layout, not original-key
    /// order.
    pub fn bucket_entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let entries = self
            .db
            .scan_prefix(&[VALUES_PREFIX])
            .map_err(StoreError::backing)?;
        Ok(entries
            .into_iter()
            .map(|(bucket_key, value)| (bucket_key[1..].to_vec(), value))
            .collect())
    }

    /// Replay one streamed bucket entry during restore. An empty value
    /// recreates the tombstone state of a deleted key.
    pub(crate) fn restore_entry(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        let path = hash(key);
        self.db
            .put(&values_key(key), value)
            .map_err(StoreError::backing)?;
        if value.is_empty() {
            self.tree.insert(path, ZERO_LEAF);
        } else {
            self.db
                .put(&preimages_key(&path), key)
                .map_err(StoreError::backing)?;
            self.tree.insert(path, hash(value));
        }
        Ok(())
    }

    /// The in-memory tree, e.g. for attaching to a decoded proof operator.
    pub fn tree(&self) -> &VerkleTree {
        &self.tree
    }
}

impl<D: KvDb> crate::store::KvStore for Substore<D> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Substore::get(self, key)
    }

    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Substore::has(self, key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        Substore::set(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        Substore::delete(self, key)
    }
}

impl<D: KvDb> crate::store::ProvableStore for Substore<D> {
    fn root_commitment(&self) -> Digest {
        Substore::root_commitment(self)
    }

    fn proof_ics23(&self, keys: &[Vec<u8>]) -> Result<CommitmentProof, StoreError> {
        Substore::proof_ics23(self, keys)
    }
}
