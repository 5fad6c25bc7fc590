//! The fixed digest function mapping arbitrary bytes to tree paths and
//! value digests.
//!
//! Every path inserted into the Verkle tree is `hash(key)` and every leaf is
//! `hash(value)`. Hashing destroys original-key ordering, so hashed
//! substores are never range-iterable; callers that need ordered iteration
//! must use a different store kind.

use crate::types::Digest;
use sha3::{Digest as _, Sha3_256};

/// Hash arbitrary bytes (including empty) to a 32-byte digest.
pub fn hash(bytes: &[u8]) -> Digest {
    let mut hasher = Sha3_256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Hash the concatenation of two byte strings.
pub fn hash2(a: &[u8], b: &[u8]) -> Digest {
    let mut hasher = Sha3_256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}
