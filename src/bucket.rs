//! The bottom of the node -> directory -> segment -> bucket lock hierarchy.
//!
//! A [`Bucket`] is a small fixed-capacity slot array. Each slot is either
//! empty, a full `(key, value)` leaf, or a handle to a deeper [`MertNode`](
//! crate::node::MertNode): `Empty | Leaf(K,V) | Child(NodeId)`.

use std::sync::Arc;

use crate::config::BUCKET_CAPACITY;
use crate::node::MertNode;

/// One occupied-or-empty slot in a [`Bucket`].
#[derive(Clone)]
pub(crate) enum Slot {
    Empty,
    Leaf(Vec<u8>, Vec<u8>),
    Child(Arc<MertNode>),
}

impl Slot {
    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

/// Fixed-capacity slot array. `bucket_index = key[start_pos]` (full byte)
/// selects which `Bucket` within a [`crate::segment::Segment`] a key
/// routes to; within the bucket, slots are probed linearly, and at most
/// one `Leaf` slot ever holds a given distinct key.
pub(crate) struct Bucket {
    slots: [Slot; BUCKET_CAPACITY],
}

impl Bucket {
    pub(crate) fn new() -> Self {
        Bucket {
            slots: std::array::from_fn(|_| Slot::Empty),
        }
    }

    pub(crate) fn slots(&self) -> &[Slot; BUCKET_CAPACITY] {
        &self.slots
    }

    /// First empty slot, if any.
    pub(crate) fn first_empty(&self) -> Option<usize> {
        self.slots.iter().position(Slot::is_empty)
    }

    pub(crate) fn is_full(&self) -> bool {
        self.first_empty().is_none()
    }

    pub(crate) fn set(&mut self, idx: usize, slot: Slot) {
        self.slots[idx] = slot;
    }

    pub(crate) fn clear(&mut self, idx: usize) {
        self.slots[idx] = Slot::Empty;
    }
}
