//! A multi-level extendible radix tree (MERT): an in-memory index over
//! variable-length byte-string keys that combines radix path compression
//! with extendible hashing.
//!
//! Keys are stored as owned byte strings ([`Vec<u8>`]); values are opaque
//! owned byte strings too. A [`Mert`] descends through a chain of nodes,
//! each holding up to six bytes of shared key prefix, and routes any
//! continuation through a directory of extendible-hash segments whose
//! buckets hold either leaves or a handle to the next node.
//!
//! ```
//! use mert::Mert;
//!
//! let index = Mert::new();
//! index.insert(b"hello", b"world").unwrap();
//! assert_eq!(index.search(b"hello"), Some(b"world".to_vec()));
//! assert_eq!(index.search(b"goodbye"), None);
//! ```
//!
//! # Concurrency
//!
//! [`Mert::new`] and [`Mert::new_concurrent`] build the same underlying
//! structure — a hierarchy of [`std::sync::RwLock`]s acquired strictly
//! top-down (node, then directory, then segment, then bucket). `new`
//! documents that the caller drives it from a single thread;
//! `new_concurrent` is the identical structure used from many threads at
//! once. There is no cheaper single-threaded representation to fall back
//! to, so both constructors exist only to make the intended usage mode
//! explicit at the call site.

mod bucket;
mod config;
mod directory;
mod error;
mod node;
mod promote;
mod root;
mod segment;
mod stats;

pub use error::{MertError, MertResult};
pub use stats::MertStats;

use root::MertRootNode;

/// A multi-level extendible radix tree.
///
/// Cloning a [`Mert`] is not supported; share one across threads behind
/// an [`std::sync::Arc`] instead, the same way a caller would share any
/// other structure built for concurrent access.
pub struct Mert {
    root: MertRootNode,
}

impl Default for Mert {
    fn default() -> Self {
        Self::new()
    }
}

impl Mert {
    /// Build an empty tree intended for single-threaded use.
    pub fn new() -> Self {
        log::trace!("mert: new tree (single-threaded usage)");
        Mert {
            root: MertRootNode::new(),
        }
    }

    /// Alias for [`Mert::new`], spelled out for call sites that want to
    /// document the single-writer usage mode explicitly.
    pub fn new_single_writer() -> Self {
        Self::new()
    }

    /// Build an empty tree intended for concurrent use from multiple
    /// threads. Structurally identical to [`Mert::new`]: the hierarchical
    /// locking is always present, this constructor only documents the
    /// intended usage mode.
    pub fn new_concurrent() -> Self {
        log::trace!("mert: new tree (concurrent usage)");
        Mert {
            root: MertRootNode::new(),
        }
    }

    /// Insert `key` with `value`, overwriting any existing value stored
    /// under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MertError::EmptyKey`] if `key` is empty; MERT has no
    /// representation for a zero-length key, so an empty key is rejected
    /// rather than treated as a silent no-op.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> MertResult<()> {
        if key.is_empty() {
            return Err(MertError::EmptyKey);
        }
        log::trace!("mert: insert {} byte key", key.len());
        self.root.insert(key, value);
        Ok(())
    }

    /// Look up `key`, returning a clone of its stored value if present.
    pub fn search(&self, key: &[u8]) -> Option<Vec<u8>> {
        if key.is_empty() {
            return None;
        }
        self.root.search(key)
    }

    /// Remove `key`, returning whether it was present.
    ///
    /// This is a tombstone removal: the leaf slot (or exact-terminal
    /// value) is cleared but no compaction of now-empty nodes, segments,
    /// or buckets is attempted. A later insert can reuse the freed slot.
    pub fn remove(&self, key: &[u8]) -> bool {
        if key.is_empty() {
            return false;
        }
        log::trace!("mert: remove {} byte key", key.len());
        self.root.remove(key)
    }

    /// A point-in-time snapshot of the tree's shape (node/segment/leaf
    /// counts), computed by walking the tree.
    pub fn stats(&self) -> MertStats {
        stats::compute(&self.root)
    }
}
