//! The directory level of the node -> directory -> segment -> bucket lock
//! hierarchy: a 2^G array of segment handles for one prefix byte
//! position, where `G = GLOBAL_DEPTH`. Multiple directory slots may
//! share the same segment (extendible-hash directory/segment aliasing).

use std::sync::{Arc, RwLock};

use crate::config::DIRECTORY_WIDTH;
use crate::segment::Segment;

/// `segments[i]` is `None` until the first key routes through logical
/// slot `i`; once materialized, it (and its aliased siblings) hold
/// `Some(Arc<Segment>)`.
type SlotTable = [Option<Arc<Segment>>; DIRECTORY_WIDTH];

pub(crate) struct PrefixDirectory {
    /// Which of the node's up-to-6 prefix byte positions this directory
    /// routes beyond (0..PREFIX_BYTES).
    pub(crate) prefix_index: u8,
    /// Directory-level lock: read for ordinary segment lookups, write
    /// only for materializing a fresh segment or swapping in the two
    /// halves of a split. Always acquired after the owning node's
    /// lock and before any segment/bucket lock.
    slots: RwLock<SlotTable>,
}

impl PrefixDirectory {
    pub(crate) fn new(prefix_index: u8) -> Self {
        PrefixDirectory {
            prefix_index,
            slots: RwLock::new(std::array::from_fn(|_| None)),
        }
    }

    pub(crate) fn segment_at(&self, idx: usize) -> Option<Arc<Segment>> {
        self.slots.read().unwrap()[idx].clone()
    }

    /// Install a freshly materialized segment across its aliased span,
    /// unless another writer materialized one for this slot first (in
    /// which case the existing segment is returned instead and the
    /// caller's segment is dropped).
    pub(crate) fn materialize_or_get(
        &self,
        idx: usize,
        create: impl FnOnce() -> (Arc<Segment>, std::ops::Range<usize>),
    ) -> Arc<Segment> {
        let mut slots = self.slots.write().unwrap();
        if let Some(existing) = &slots[idx] {
            return Arc::clone(existing);
        }
        let (segment, span) = create();
        for i in span {
            slots[i] = Some(Arc::clone(&segment));
        }
        segment
    }

    /// Replace the aliased span of an old segment with two new ones,
    /// verifying the old segment is still installed at `idx` (guards
    /// against a concurrent split having already run).
    pub(crate) fn apply_split(
        &self,
        idx: usize,
        old: &Arc<Segment>,
        seg0: Arc<Segment>,
        span0: std::ops::Range<usize>,
        seg1: Arc<Segment>,
        span1: std::ops::Range<usize>,
    ) -> bool {
        let mut slots = self.slots.write().unwrap();
        match &slots[idx] {
            Some(current) if Arc::ptr_eq(current, old) => {}
            _ => return false,
        }
        for i in span0 {
            slots[i] = Some(Arc::clone(&seg0));
        }
        for i in span1 {
            slots[i] = Some(Arc::clone(&seg1));
        }
        true
    }

    /// Every distinct segment this directory currently points at, with
    /// aliasing collapsed (a segment shared by several slots is returned
    /// once). Used for stats-gathering, not on any insert/search path.
    pub(crate) fn distinct_segments(&self) -> Vec<Arc<Segment>> {
        let slots = self.slots.read().unwrap();
        let mut out: Vec<Arc<Segment>> = Vec::new();
        for slot in slots.iter().flatten() {
            if !out.iter().any(|s| Arc::ptr_eq(s, slot)) {
                out.push(Arc::clone(slot));
            }
        }
        out
    }
}
