//------------ Types for Statistics -----------------------------------------
//
// Counters describing the shape of a live tree. Computed on demand by
// walking the root array and recursing through directories/segments/
// buckets; not maintained incrementally, so calling `Mert::stats` has a
// cost proportional to tree size.

use crate::bucket::Slot;
use crate::node::MertNode;
use crate::root::MertRootNode;

/// Point-in-time snapshot of a tree's shape, returned by [`crate::Mert::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MertStats {
    pub root_slots_used: u64,
    pub nodes: u64,
    pub segments: u64,
    pub leaves: u64,
}

pub(crate) fn compute(root: &MertRootNode) -> MertStats {
    let mut stats = MertStats::default();
    for node in root.root_nodes() {
        stats.root_slots_used += 1;
        walk_node(&node, &mut stats);
    }
    stats
}

fn walk_node(node: &MertNode, stats: &mut MertStats) {
    stats.nodes += 1;
    for directory in node.directories.iter() {
        for segment in directory.distinct_segments() {
            stats.segments += 1;
            for bucket_idx in 0..crate::config::SEGMENT_SIZE {
                let bucket = segment.bucket(bucket_idx).read().unwrap();
                for slot in bucket.slots() {
                    match slot {
                        Slot::Empty => {}
                        Slot::Leaf(_, _) => stats.leaves += 1,
                        Slot::Child(child) => walk_node(child, stats),
                    }
                }
            }
        }
    }
}
