//! The segment level of the node -> directory -> segment -> bucket lock
//! hierarchy: a local-depth-tagged array of buckets, and the unit of
//! extendible-hash splitting.

use std::ops::Range;
use std::sync::{Arc, RwLock};

use crate::bucket::{Bucket, Slot};
use crate::config::{GLOBAL_DEPTH, SEGMENT_SIZE};

/// A segment materializes on first use: `local_depth` starts at 1 the
/// moment a [`crate::directory::PrefixDirectory`] slot first points at
/// it, never 0. "Uninitialized" is represented as `None` in the
/// directory slot itself rather than a placeholder `Segment` with
/// `local_depth == 0`, so a live `Segment` is always already populated.
pub(crate) struct Segment {
    pub(crate) local_depth: u8,
    /// Segment-level lock: held for the duration of a split, across all
    /// of this segment's buckets, so that a concurrent insert that has
    /// already looked up this `Arc<Segment>` (and is about to take a
    /// bucket lock) can't race a split that's draining the same buckets.
    pub(crate) seg_lock: RwLock<()>,
    buckets: Vec<RwLock<Bucket>>,
}

impl Segment {
    fn empty(local_depth: u8) -> Self {
        debug_assert!(local_depth >= 1 && local_depth <= GLOBAL_DEPTH);
        Segment {
            local_depth,
            seg_lock: RwLock::new(()),
            buckets: (0..SEGMENT_SIZE).map(|_| RwLock::new(Bucket::new())).collect(),
        }
    }

    pub(crate) fn bucket(&self, idx: usize) -> &RwLock<Bucket> {
        &self.buckets[idx]
    }
}

/// Low nibble of the routing byte: the index used to look up a directory
/// slot (always the full 4-bit low nibble, regardless of the segment's
/// own local depth).
pub(crate) fn directory_slot_index(routing_byte: u8) -> usize {
    (routing_byte & 0x0F) as usize
}

/// Full routing byte: the bucket a key lands in within its segment.
pub(crate) fn bucket_index(routing_byte: u8) -> usize {
    routing_byte as usize
}

/// The contiguous power-of-two-aligned span of directory slots that alias
/// a segment with the given logical index at the given local depth.
pub(crate) fn aliased_range(logical_index: usize, local_depth: u8) -> Range<usize> {
    let shift = (GLOBAL_DEPTH - local_depth) as usize;
    let span = 1usize << shift;
    let start = logical_index << shift;
    start..(start + span)
}

/// Materialize a brand-new segment holding a single leaf, and return it
/// along with the directory span it should alias.
pub(crate) fn materialize(
    dir_slot_index: usize,
    leaf_key: Vec<u8>,
    leaf_value: Vec<u8>,
    routing_byte: u8,
) -> (Arc<Segment>, Range<usize>) {
    let seg = Segment::empty(1);
    let buk_idx = bucket_index(routing_byte);
    {
        let mut bucket = seg.bucket(buk_idx).write().unwrap();
        bucket.set(0, Slot::Leaf(leaf_key, leaf_value));
    }
    // dir_slot_index is the low-nibble value that triggered materialization;
    // its logical index at local_depth == 1 is its single top bit.
    let logical = dir_slot_index >> (GLOBAL_DEPTH as usize - 1);
    (Arc::new(seg), aliased_range(logical, 1))
}

/// Split an overflowing segment into two, each with `local_depth + 1`.
///
/// `prior_logical_index` is the segment's own logical index at its
/// current local depth, derived directly from the directory slot used to
/// reach it (`dir_slot_index >> (GLOBAL_DEPTH - local_depth)`) rather
/// than recomputed per-entry while scanning buckets, which would leave
/// the repoint depending on whichever entry a loop happened to visit
/// last.
///
/// `routing_byte_of` extracts the routing byte for a slot's key: for a
/// `Leaf` it's the key byte at `start_pos`; for a `Child` it's the
/// child node's own first prefix byte.
pub(crate) fn split_segment(
    old: &Segment,
    prior_logical_index: usize,
    mut routing_byte_of: impl FnMut(&Slot) -> Option<u8>,
) -> (Arc<Segment>, Range<usize>, Arc<Segment>, Range<usize>) {
    debug_assert!(old.local_depth < GLOBAL_DEPTH);
    let new_depth = old.local_depth + 1;
    let seg0 = Segment::empty(new_depth);
    let seg1 = Segment::empty(new_depth);

    let left_logical = prior_logical_index * 2;
    let right_logical = prior_logical_index * 2 + 1;

    for (buk_idx, bucket_lock) in old.buckets.iter().enumerate() {
        let bucket = bucket_lock.read().unwrap();
        for (slot_idx, slot) in bucket.slots().iter().enumerate() {
            if slot.is_empty() {
                continue;
            }
            let Some(routing_byte) = routing_byte_of(slot) else {
                continue;
            };
            let new_logical = directory_slot_index(routing_byte) >> (GLOBAL_DEPTH - new_depth);
            let target = if new_logical == left_logical {
                &seg0
            } else if new_logical == right_logical {
                &seg1
            } else {
                debug_assert!(
                    false,
                    "split_segment: entry routed outside its parent's span"
                );
                continue;
            };
            // Bucket position is stable across a split.
            target
                .bucket(buk_idx)
                .write()
                .unwrap()
                .set(slot_idx, slot.clone());
        }
    }

    let range0 = aliased_range(left_logical, new_depth);
    let range1 = aliased_range(right_logical, new_depth);
    (Arc::new(seg0), range0, Arc::new(seg1), range1)
}
