//! The Verkle substore and its storage backends.

use crate::proof::{CommitmentProof, ProofError};
use crate::types::Digest;
use std::fmt::Debug;
use thiserror::Error;

pub mod db;
pub mod substore;

pub use db::{KvDb, MemDb, PrefixDb};
pub use substore::Substore;

/// Byte-level capabilities shared by every key-value store kind.
///
/// Ordered iteration is deliberately not part of this set: store kinds that
/// support it expose it separately, and Verkle substores never do (keys are
/// hashed onto tree paths, destroying original-key order).
pub trait KvStore {
    /// Get the value stored under `key`, or `None` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    /// Check whether `key` holds a live value.
    fn has(&self, key: &[u8]) -> Result<bool, StoreError>;
    /// Store `value` under `key`.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    /// Delete `key`.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;
}

/// A [`KvStore`] whose contents are bound by a root commitment and provable
/// against it.
pub trait ProvableStore: KvStore {
    /// The store's current root commitment.
    fn root_commitment(&self) -> Digest;
    /// Build a batch commitment proof over the requested keys.
    fn proof_ics23(&self, keys: &[Vec<u8>]) -> Result<CommitmentProof, StoreError>;
}

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The caller passed an empty key. Keys must be non-empty.
    #[error("key is empty")]
    EmptyKey,
    /// The caller passed an empty value. The empty byte string is reserved
    /// as the tombstone encoding in the values bucket.
    #[error("value is empty")]
    EmptyValue,
    /// The tree and the backing buckets disagree. The substore is poisoned
    /// for the remainder of its lifetime.
    #[error("corrupted substore: {reason}")]
    Corruption { reason: String },
    /// A backing store read or write failed.
    #[error("backing store failure: {reason}")]
    Backing { reason: String },
    /// The named substore is not registered.
    #[error("unknown substore: {0}")]
    UnknownSubstore(String),
    /// A substore was registered under an empty name or one containing a
    /// path separator.
    #[error("invalid substore name: {0:?}")]
    InvalidName(String),
    /// A query path did not parse as `/<substore-name>/key`.
    #[error("invalid query path: {0}")]
    InvalidQuery(String),
    /// Snapshot requested at height 0 or a height that is not sealed.
    #[error("invalid snapshot version")]
    InvalidSnapshotVersion,
    /// Restore stream carries an unknown format marker.
    #[error("unknown snapshot format {0}")]
    UnknownFormat(u32),
    /// A proof could not be built or did not verify.
    #[error(transparent)]
    Proof(#[from] ProofError),
}

impl StoreError {
    pub(crate) fn backing(err: impl Debug) -> Self {
        StoreError::Backing {
            reason: format!("{err:?}"),
        }
    }

    pub(crate) fn corruption(reason: impl Into<String>) -> Self {
        StoreError::Corruption {
            reason: reason.into(),
        }
    }
}
