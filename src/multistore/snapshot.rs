//! Streaming snapshot and restore of substore contents.
//!
//! A snapshot streams one substore at a time as raw values-bucket entries.
//! Tombstones travel as empty values so a restored store reproduces the
//! source commitment bit-exactly, deleted keys included.

use crate::multistore::MultiStore;
use crate::store::{KvDb, StoreError};
use crate::types::{CommitId, Digest};
use serde::{Deserialize, Serialize};

/// Current snapshot stream format.
pub const SNAPSHOT_FORMAT: u32 = 1;

/// One streamed key-value item. Substores stream one at a time, so items
/// arrive grouped by store name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItem {
    /// Name of the substore the entry belongs to.
    pub store: String,
    /// Original key bytes.
    pub key: Vec<u8>,
    /// Original value bytes; empty marks a tombstone.
    pub value: Vec<u8>,
}

impl<D: KvDb> MultiStore<D> {
    /// Stream the contents of every substore at `height`.
    ///
    /// Only the latest sealed version can be snapshotted; prior roots are
    /// not retained. Height 0 is always invalid.
    pub fn snapshot(&self, height: i64) -> Result<Vec<SnapshotItem>, StoreError> {
        if height == 0 {
            return Err(StoreError::InvalidSnapshotVersion);
        }
        let inner = self.read();
        if height != inner.last_commit.version {
            return Err(StoreError::InvalidSnapshotVersion);
        }
        let mut items = Vec::new();
        for (name, sub) in &inner.substores {
            for (key, value) in sub.bucket_entries()? {
                items.push(SnapshotItem {
                    store: name.clone(),
                    key,
                    value,
                });
            }
        }
        tracing::debug!(height, items = items.len(), "snapshot stream assembled");
        Ok(items)
    }

    /// Apply a snapshot stream and reseal at the restored version.
    ///
    /// The exclusive lock is held for the whole restore, so no reader
    /// observes a partially applied state. Restoring into a multistore that
    /// already holds state overwrites entry by entry.
    pub fn restore(
        &self,
        height: i64,
        format: u32,
        items: impl IntoIterator<Item = SnapshotItem>,
    ) -> Result<CommitId, StoreError> {
        if height == 0 {
            return Err(StoreError::InvalidSnapshotVersion);
        }
        if format != SNAPSHOT_FORMAT {
            return Err(StoreError::UnknownFormat(format));
        }
        let mut inner = self.write();
        for item in items {
            inner
                .substore_mut(&item.store)?
                .restore_entry(&item.key, &item.value)?;
        }
        let store_roots: Vec<(String, Digest)> = inner
            .substores
            .iter()
            .map(|(name, sub)| (name.clone(), sub.root_commitment()))
            .collect();
        inner.seal(height, store_roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemDb;
    use std::sync::Arc;

    fn populated_store() -> (MultiStore<MemDb>, CommitId) {
        let store = MultiStore::new(Arc::new(MemDb::new()), &["store1", "store2"]).unwrap();
        store.set("store1", b"MYKEY0", b"MYVALUE0").unwrap();
        store.set("store1", b"MYKEY1", b"MYVALUE1").unwrap();
        store.set("store2", b"OTHER", b"VALUE").unwrap();
        // A tombstone must survive the stream.
        store.delete("store1", b"MYKEY1").unwrap();
        let cid = store.commit().unwrap();
        (store, cid)
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let (source, cid) = populated_store();
        let items = source.snapshot(cid.version).unwrap();

        let target = MultiStore::new(Arc::new(MemDb::new()), &["store1", "store2"]).unwrap();
        let restored = target.restore(cid.version, SNAPSHOT_FORMAT, items).unwrap();

        assert_eq!(restored, cid);
        assert_eq!(target.last_commit_id(), cid);
        assert_eq!(
            target.get("store1", b"MYKEY0").unwrap(),
            Some(b"MYVALUE0".to_vec())
        );
        // The deleted key stays deleted, and its tombstone is part of the
        // matching commitment.
        assert_eq!(target.get("store1", b"MYKEY1").unwrap(), None);
        assert!(!target.has("store1", b"MYKEY1").unwrap());
    }

    #[test]
    fn test_snapshot_invalid_heights() {
        let (source, cid) = populated_store();
        assert!(matches!(
            source.snapshot(0),
            Err(StoreError::InvalidSnapshotVersion)
        ));
        assert!(matches!(
            source.snapshot(cid.version + 1),
            Err(StoreError::InvalidSnapshotVersion)
        ));
    }

    #[test]
    fn test_restore_rejects_bad_format_and_height() {
        let (source, cid) = populated_store();
        let items = source.snapshot(cid.version).unwrap();
        let target = MultiStore::new(Arc::new(MemDb::new()), &["store1", "store2"]).unwrap();

        assert!(matches!(
            target.restore(0, SNAPSHOT_FORMAT, items.clone()),
            Err(StoreError::InvalidSnapshotVersion)
        ));
        assert!(matches!(
            target.restore(cid.version, 0, items.clone()),
            Err(StoreError::UnknownFormat(0))
        ));
        assert!(matches!(
            target.restore(cid.version, 9, items),
            Err(StoreError::UnknownFormat(9))
        ));
    }

    #[test]
    fn test_restore_rejects_unknown_store_in_stream() {
        let (source, cid) = populated_store();
        let mut items = source.snapshot(cid.version).unwrap();
        items[0].store = "store9".to_string();

        let target = MultiStore::new(Arc::new(MemDb::new()), &["store1", "store2"]).unwrap();
        assert!(matches!(
            target.restore(cid.version, SNAPSHOT_FORMAT, items),
            Err(StoreError::UnknownSubstore(_))
        ));
    }
}
