//! Byte-store backends.
//!
//! [`KvDb`] is the contract a substore needs from its durable storage:
//! atomic per-key put/get/delete plus a prefix scan used when rebuilding the
//! in-memory tree. [`MemDb`] is the in-memory reference backend, intended
//! for tests and development; [`PrefixDb`] carves a namespace out of a
//! shared backend so several substores can live in one database.

use std::{collections::BTreeMap, fmt::Debug, sync::Arc, sync::RwLock};

/// Read/write access to a byte-keyed store.
pub trait KvDb: Debug + Send + Sync {
    /// Custom trait's error type.
    type Error: Debug + Send;

    /// Get the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Store `value` under `key`, overwriting any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;

    /// Remove the entry under `key`. Removing an absent key is a no-op.
    fn delete(&self, key: &[u8]) -> Result<(), Self::Error>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Self::Error>;
}

/// In-memory storage backend.
///
/// All access is protected by an [`RwLock`], allowing concurrent readers or
/// a single writer.
#[derive(Debug, Default)]
pub struct MemDb {
    kvs: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemDb {
    /// Creates a new empty `MemDb`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.kvs.read().expect("db lock poisoned").len()
    }

    /// Check whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for MemDb {
    fn clone(&self) -> Self {
        Self {
            kvs: RwLock::new(self.kvs.read().expect("db lock poisoned").clone()),
        }
    }
}

impl KvDb for MemDb {
    type Error = &'static str;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.kvs.read().expect("db lock poisoned").get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        self.kvs
            .write()
            .expect("db lock poisoned")
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), Self::Error> {
        self.kvs.write().expect("db lock poisoned").remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Self::Error> {
        Ok(self
            .kvs
            .read()
            .expect("db lock poisoned")
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// A namespaced view over a shared backend.
///
/// Keys are transparently prepended with the namespace prefix on writes and
/// stripped on scans, so a `PrefixDb` behaves like a private [`KvDb`].
#[derive(Debug)]
pub struct PrefixDb<D> {
    db: Arc<D>,
    prefix: Vec<u8>,
}

impl<D> Clone for PrefixDb<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            prefix: self.prefix.clone(),
        }
    }
}

impl<D: KvDb> PrefixDb<D> {
    /// Create a view of `db` under `prefix`.
    pub fn new(db: Arc<D>, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            db,
            prefix: prefix.into(),
        }
    }

    fn prefixed(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl<D: KvDb> KvDb for PrefixDb<D> {
    type Error = D::Error;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        self.db.get(&self.prefixed(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        self.db.put(&self.prefixed(key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), Self::Error> {
        self.db.delete(&self.prefixed(key))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Self::Error> {
        let entries = self.db.scan_prefix(&self.prefixed(prefix))?;
        Ok(entries
            .into_iter()
            .map(|(k, v)| (k[self.prefix.len()..].to_vec(), v))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_db_basic_ops() {
        let db = MemDb::new();
        assert!(db.is_empty());
        assert_eq!(db.get(b"a").unwrap(), None);

        db.put(b"a", b"1").unwrap();
        db.put(b"ab", b"2").unwrap();
        db.put(b"b", b"3").unwrap();
        assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(db.len(), 3);

        db.delete(b"a").unwrap();
        assert_eq!(db.get(b"a").unwrap(), None);
        // Deleting twice stays a no-op.
        db.delete(b"a").unwrap();
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn test_mem_db_scan_prefix() {
        let db = MemDb::new();
        db.put(b"x/1", b"1").unwrap();
        db.put(b"x/2", b"2").unwrap();
        db.put(b"y/1", b"3").unwrap();

        let hits = db.scan_prefix(b"x/").unwrap();
        assert_eq!(
            hits,
            vec![
                (b"x/1".to_vec(), b"1".to_vec()),
                (b"x/2".to_vec(), b"2".to_vec()),
            ]
        );
        assert!(db.scan_prefix(b"z/").unwrap().is_empty());
    }

    #[test]
    fn test_prefix_db_isolation() {
        let shared = Arc::new(MemDb::new());
        let left = PrefixDb::new(Arc::clone(&shared), b"s/left/".to_vec());
        let right = PrefixDb::new(Arc::clone(&shared), b"s/right/".to_vec());

        left.put(b"k", b"L").unwrap();
        right.put(b"k", b"R").unwrap();

        assert_eq!(left.get(b"k").unwrap(), Some(b"L".to_vec()));
        assert_eq!(right.get(b"k").unwrap(), Some(b"R".to_vec()));

        // Scans strip the namespace and never leak across it.
        assert_eq!(
            left.scan_prefix(&[]).unwrap(),
            vec![(b"k".to_vec(), b"L".to_vec())]
        );

        left.delete(b"k").unwrap();
        assert_eq!(left.get(b"k").unwrap(), None);
        assert_eq!(right.get(b"k").unwrap(), Some(b"R".to_vec()));
    }
}
