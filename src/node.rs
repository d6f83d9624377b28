//! The node level of the node -> directory -> segment -> bucket lock
//! hierarchy, and the prefix-matching decision matrix that drives
//! descent through shared prefixes, directories, segments and buckets.

use std::sync::{Arc, RwLock};

use crate::bucket::Slot;
use crate::config::PREFIX_BYTES;
use crate::directory::PrefixDirectory;
use crate::promote;
use crate::segment;

/// Typed routing outcome for a node-level insert/search/remove attempt,
/// in place of an out-parameter.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InsertOutcome {
    Inserted,
    NotThisNode,
}

#[derive(Debug)]
pub(crate) enum SearchOutcome {
    Found(Vec<u8>),
    NotFound,
    NotThisNode,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RemoveOutcome {
    Removed,
    NotFound,
    NotThisNode,
}

/// Mutable node header: the shared key prefix and the exact-terminal
/// values for keys that end exactly at a given prefix length. Guarded by
/// a single node-level lock — prefix extension and the `total_value`
/// slots are always touched together by the same decision-matrix
/// branch, so splitting them further would only add lock-acquisition
/// overhead without a corresponding concurrency benefit.
struct NodeState {
    prefix: [u8; PREFIX_BYTES],
    prefix_len: u8,
    total_value: [Option<Vec<u8>>; PREFIX_BYTES],
}

impl NodeState {
    fn empty() -> Self {
        NodeState {
            prefix: [0; PREFIX_BYTES],
            prefix_len: 0,
            total_value: std::array::from_fn(|_| None),
        }
    }
}

pub(crate) struct MertNode {
    state: RwLock<NodeState>,
    pub(crate) directories: [PrefixDirectory; PREFIX_BYTES],
}

impl MertNode {
    pub(crate) fn new() -> Self {
        MertNode {
            state: RwLock::new(NodeState::empty()),
            directories: std::array::from_fn(|i| PrefixDirectory::new(i as u8)),
        }
    }

    /// The node's first prefix byte, used by a parent segment split to
    /// route a `Child` slot by its owning node's leading prefix byte.
    /// Returns 0 for a node with no prefix yet (shouldn't happen for a
    /// node already linked into a bucket, but avoids panicking on a
    /// not-yet-populated node).
    pub(crate) fn first_prefix_byte(&self) -> u8 {
        let state = self.state.read().unwrap();
        if state.prefix_len == 0 {
            0
        } else {
            state.prefix[0]
        }
    }

    /// Seed a freshly created, still-empty node's shared prefix directly
    /// from the bytes child promotion has already chosen (spec §4.6 step
    /// 3: "copy up to 6 bytes of that substring into `new_child.prefix[]`"
    /// before any key is inserted). Bypasses the insert decision matrix's
    /// own case-A (empty-node) branch, which would instead derive the
    /// prefix from whichever key happens to be processed first.
    pub(crate) fn seed_prefix(&self, bytes: &[u8]) {
        let mut state = self.state.write().unwrap();
        debug_assert_eq!(
            state.prefix_len, 0,
            "seed_prefix called on a node that already has a prefix"
        );
        let len = bytes.len().min(PREFIX_BYTES);
        state.prefix[..len].copy_from_slice(&bytes[..len]);
        state.prefix_len = len as u8;
    }
}

/// `directory_index` for a match of length `m` against a node whose
/// prefix is saturated at `PREFIX_BYTES`: the last directory (index
/// `PREFIX_BYTES - 1`) doubles as the "prefix fully consumed, continue
/// beyond it" overflow directory.
fn saturated_dir_index() -> usize {
    PREFIX_BYTES - 1
}

/// Drive the node-level insert decision matrix for one key, descending
/// into segments/buckets as needed.
pub(crate) fn insert_to_new_node(
    node: &MertNode,
    key: &[u8],
    value: &[u8],
    start_pos: usize,
) -> InsertOutcome {
    enum Action {
        Done(InsertOutcome),
        Descend { dir_index: usize, from: usize },
    }

    let action = {
        let mut state = node.state.write().unwrap();
        let plen = state.prefix_len as usize;

        let mut m = 0;
        while m < plen
            && start_pos + m < key.len()
            && key[start_pos + m] == state.prefix[m]
        {
            m += 1;
        }
        let remaining = key.len() - (start_pos + m);

        if plen == 0 {
            // Empty node: absorb as much of the key as fits in the prefix.
            let room = key.len() - start_pos;
            let will_len = room.min(PREFIX_BYTES);
            state.prefix[..will_len]
                .copy_from_slice(&key[start_pos..start_pos + will_len]);
            state.prefix_len = will_len as u8;
            if will_len == room {
                state.total_value[will_len - 1] = Some(value.to_vec());
                Action::Done(InsertOutcome::Inserted)
            } else {
                Action::Descend {
                    dir_index: saturated_dir_index(),
                    from: start_pos + PREFIX_BYTES,
                }
            }
        } else if m == 0 {
            // Complete mismatch: this key does not belong under this node.
            Action::Done(InsertOutcome::NotThisNode)
        } else if m < plen {
            // Partial prefix match: the key diverges before the prefix ends.
            if remaining == 0 {
                state.total_value[m - 1] = Some(value.to_vec());
                Action::Done(InsertOutcome::Inserted)
            } else {
                Action::Descend {
                    dir_index: m,
                    from: start_pos + m,
                }
            }
        } else if remaining == 0 {
            // The key ends exactly at the node's current prefix.
            state.total_value[plen - 1] = Some(value.to_vec());
            Action::Done(InsertOutcome::Inserted)
        } else if plen < PREFIX_BYTES {
            // Prefix has room left: extend it greedily, then re-dispatch.
            let extra = remaining.min(PREFIX_BYTES - plen);
            state.prefix[plen..plen + extra]
                .copy_from_slice(&key[start_pos + plen..start_pos + plen + extra]);
            let new_len = plen + extra;
            state.prefix_len = new_len as u8;
            let remaining_after = key.len() - (start_pos + new_len);
            if remaining_after == 0 {
                state.total_value[new_len - 1] = Some(value.to_vec());
                Action::Done(InsertOutcome::Inserted)
            } else {
                Action::Descend {
                    dir_index: saturated_dir_index(),
                    from: start_pos + new_len,
                }
            }
        } else {
            // Prefix is saturated at PREFIX_BYTES and the key continues.
            Action::Descend {
                dir_index: saturated_dir_index(),
                from: start_pos + plen,
            }
        }
    };

    match action {
        Action::Done(outcome) => outcome,
        Action::Descend { dir_index, from } => {
            insert_to_segment_bucket(node, key, value, from, dir_index);
            InsertOutcome::Inserted
        }
    }
}

/// Route `key` into the segment/bucket named by `dir_index` at `from`,
/// materializing segments and splitting/promoting as needed. Always
/// terminates in the key being stored somewhere reachable from `node`.
fn insert_to_segment_bucket(
    node: &MertNode,
    key: &[u8],
    value: &[u8],
    start_pos: usize,
    dir_index: usize,
) {
    loop {
        let directory = &node.directories[dir_index];
        let routing_byte = key[start_pos];
        let dir_slot = segment::directory_slot_index(routing_byte);
        let buk_idx = segment::bucket_index(routing_byte);

        let (seg, fresh) = match directory.segment_at(dir_slot) {
            Some(s) => (s, false),
            None => directory.materialize_or_get(dir_slot, || {
                segment::materialize(dir_slot, key.to_vec(), value.to_vec(), routing_byte)
            }),
        };
        if fresh {
            log::debug!(
                "mert: materialized segment at directory[{dir_index}] slot {dir_slot}"
            );
            return;
        }

        enum Outcome {
            Done,
            NeedSplit(u8),
            NeedPromote,
        }

        let outcome = {
            // Shared segment-level lock: blocks only while a split is
            // actively draining this segment's buckets (held exclusive
            // below), so an ordinary probe never reads a half-drained
            // bucket.
            let _seg_guard = seg.seg_lock.read().unwrap();
            let mut bucket = seg.bucket(buk_idx).write().unwrap();

            let mut overwrite_idx = None;
            let mut empty_idx = None;
            let mut children: Vec<(usize, Arc<MertNode>)> = Vec::new();
            for (i, slot) in bucket.slots().iter().enumerate() {
                match slot {
                    Slot::Empty => {
                        if empty_idx.is_none() {
                            empty_idx = Some(i);
                        }
                    }
                    Slot::Leaf(k, _) => {
                        if k.as_slice() == key {
                            overwrite_idx = Some(i);
                        }
                    }
                    Slot::Child(c) => children.push((i, Arc::clone(c))),
                }
            }

            if let Some(i) = overwrite_idx {
                bucket.set(i, Slot::Leaf(key.to_vec(), value.to_vec()));
                Outcome::Done
            } else {
                let mut recursed = false;
                for (_, child) in &children {
                    if insert_to_new_node(child, key, value, start_pos)
                        == InsertOutcome::Inserted
                    {
                        recursed = true;
                        break;
                    }
                }
                if recursed {
                    Outcome::Done
                } else if let Some(i) = empty_idx {
                    bucket.set(i, Slot::Leaf(key.to_vec(), value.to_vec()));
                    Outcome::Done
                } else if seg.local_depth < crate::config::GLOBAL_DEPTH {
                    Outcome::NeedSplit(seg.local_depth)
                } else {
                    Outcome::NeedPromote
                }
            }
        };

        match outcome {
            Outcome::Done => return,
            Outcome::NeedSplit(local_depth) => {
                let prior_logical =
                    dir_slot >> (crate::config::GLOBAL_DEPTH - local_depth) as usize;
                let (seg0, span0, seg1, span1) = {
                    // Exclusive segment lock for the whole drain: any
                    // thread already holding `seg` mid-probe (shared lock
                    // above) finishes first; any new probe blocks until
                    // this scope ends. Released before the directory
                    // swap below, preserving the top-down node ->
                    // directory -> segment -> bucket acquisition order.
                    let _seg_guard = seg.seg_lock.write().unwrap();
                    segment::split_segment(&seg, prior_logical, |slot| {
                        routing_byte_of(slot, start_pos)
                    })
                };
                log::debug!(
                    "mert: splitting segment at directory[{dir_index}] slot {dir_slot} (local_depth {local_depth} -> {})",
                    local_depth + 1
                );
                directory.apply_split(dir_slot, &seg, seg0, span0, seg1, span1);
                // Retry regardless of whether we won the split race: the
                // directory now points at a segment with room either way.
            }
            Outcome::NeedPromote => {
                let new_child = Arc::new(MertNode::new());
                {
                    let mut bucket = seg.bucket(buk_idx).write().unwrap();
                    promote::add_child_node(&new_child, &mut bucket, start_pos);
                    match bucket.first_empty() {
                        Some(i) => bucket.set(i, Slot::Child(Arc::clone(&new_child))),
                        None => panic!(
                            "mert: bucket overflow could not be resolved by child promotion \
                             (invariant violation: the chosen child prefix absorbed no leaves)"
                        ),
                    }
                }
                log::debug!(
                    "mert: promoted overflowing bucket at directory[{dir_index}] slot {dir_slot}/{buk_idx} to a child node"
                );
                // Retry: the freshly linked child (or a freed slot) will
                // now accept this insert.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_a_fills_empty_node_with_short_key() {
        let node = MertNode::new();
        let outcome = insert_to_new_node(&node, b"abcd", b"v", 0);
        assert_eq!(outcome, InsertOutcome::Inserted);
        match search_in_node(&node, b"abcd", 0) {
            SearchOutcome::Found(v) => assert_eq!(v, b"v"),
            other => panic!("expected Found, got {other:?}"),
        }
        assert!(matches!(
            search_in_node(&node, b"abce", 0),
            SearchOutcome::NotThisNode | SearchOutcome::NotFound
        ));
    }

    #[test]
    fn overwrite_replaces_value_without_growing_the_tree() {
        let node = MertNode::new();
        insert_to_new_node(&node, b"1234", b"v1", 0);
        insert_to_new_node(&node, b"1234", b"v2", 0);
        match search_in_node(&node, b"1234", 0) {
            SearchOutcome::Found(v) => assert_eq!(v, b"v2"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn prefix_extends_across_successive_inserts() {
        let node = MertNode::new();
        insert_to_new_node(&node, b"aa", b"x", 0);
        insert_to_new_node(&node, b"aab", b"y", 0);
        insert_to_new_node(&node, b"aac", b"z", 0);
        for (k, v) in [(&b"aa"[..], &b"x"[..]), (b"aab", b"y"), (b"aac", b"z")] {
            match search_in_node(&node, k, 0) {
                SearchOutcome::Found(found) => assert_eq!(found, v),
                other => panic!("key {k:?}: expected Found, got {other:?}"),
            }
        }
    }

    #[test]
    fn complete_mismatch_signals_not_this_node() {
        let node = MertNode::new();
        insert_to_new_node(&node, b"abcdef", b"v", 0);
        assert_eq!(
            insert_to_new_node(&node, b"zzzzzz", b"other", 0),
            InsertOutcome::NotThisNode
        );
    }

    #[test]
    fn prefix_saturates_past_six_bytes_and_descends() {
        let node = MertNode::new();
        insert_to_new_node(&node, b"abcdefgh", b"long", 0);
        match search_in_node(&node, b"abcdefgh", 0) {
            SearchOutcome::Found(v) => assert_eq!(v, b"long"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn remove_leaves_a_tombstone_reusable_by_a_later_insert() {
        let node = MertNode::new();
        insert_to_new_node(&node, b"abcdefgh", b"v1", 0);
        assert_eq!(remove_from_node(&node, b"abcdefgh", 0), RemoveOutcome::Removed);
        assert!(matches!(
            search_in_node(&node, b"abcdefgh", 0),
            SearchOutcome::NotFound
        ));
        insert_to_new_node(&node, b"abcdefzz", b"v2", 0);
        match search_in_node(&node, b"abcdefzz", 0) {
            SearchOutcome::Found(v) => assert_eq!(v, b"v2"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn many_keys_sharing_a_first_byte_force_a_segment_split() {
        let node = MertNode::new();
        let keys: Vec<Vec<u8>> = (0..17)
            .map(|i| format!("1{:03}", i).into_bytes())
            .collect();
        for (i, k) in keys.iter().enumerate() {
            insert_to_new_node(&node, k, format!("v{i}").as_bytes(), 0);
        }
        for (i, k) in keys.iter().enumerate() {
            match search_in_node(&node, k, 0) {
                SearchOutcome::Found(v) => assert_eq!(v, format!("v{i}").as_bytes()),
                other => panic!("key {k:?}: expected Found, got {other:?}"),
            }
        }
    }
}

fn routing_byte_of(slot: &Slot, start_pos: usize) -> Option<u8> {
    match slot {
        Slot::Empty => None,
        Slot::Leaf(k, _) => k.get(start_pos).copied(),
        Slot::Child(c) => Some(c.first_prefix_byte()),
    }
}

/// Read-only counterpart to [`insert_to_new_node`]. Never mutates.
pub(crate) fn search_in_node(node: &MertNode, key: &[u8], start_pos: usize) -> SearchOutcome {
    let (m, consumed_to) = {
        let state = node.state.read().unwrap();
        let plen = state.prefix_len as usize;
        let mut m = 0;
        while m < plen
            && start_pos + m < key.len()
            && key[start_pos + m] == state.prefix[m]
        {
            m += 1;
        }
        if plen == 0 {
            return SearchOutcome::NotFound;
        }
        if m == 0 {
            return SearchOutcome::NotThisNode;
        }
        let consumed_to = start_pos + m;
        if consumed_to == key.len() {
            return match &state.total_value[m - 1] {
                Some(v) => SearchOutcome::Found(v.clone()),
                None => SearchOutcome::NotFound,
            };
        }
        (m, consumed_to)
    };
    let dir_index = if m >= PREFIX_BYTES { PREFIX_BYTES - 1 } else { m };
    search_segment_bucket(node, key, consumed_to, dir_index)
}

fn search_segment_bucket(
    node: &MertNode,
    key: &[u8],
    start_pos: usize,
    dir_index: usize,
) -> SearchOutcome {
    let directory = &node.directories[dir_index];
    let routing_byte = key[start_pos];
    let dir_slot = segment::directory_slot_index(routing_byte);
    let buk_idx = segment::bucket_index(routing_byte);

    let Some(seg) = directory.segment_at(dir_slot) else {
        return SearchOutcome::NotFound;
    };
    let bucket = seg.bucket(buk_idx).read().unwrap();
    for slot in bucket.slots() {
        match slot {
            Slot::Empty => {}
            Slot::Leaf(k, v) => {
                if k.as_slice() == key {
                    return SearchOutcome::Found(v.clone());
                }
            }
            Slot::Child(c) => match search_in_node(c, key, start_pos) {
                SearchOutcome::NotThisNode => continue,
                other => return other,
            },
        }
    }
    SearchOutcome::NotFound
}

/// Read-modify counterpart for logical (tombstone) removal.
pub(crate) fn remove_from_node(node: &MertNode, key: &[u8], start_pos: usize) -> RemoveOutcome {
    let (m, consumed_to) = {
        let mut state = node.state.write().unwrap();
        let plen = state.prefix_len as usize;
        let mut m = 0;
        while m < plen
            && start_pos + m < key.len()
            && key[start_pos + m] == state.prefix[m]
        {
            m += 1;
        }
        if plen == 0 {
            return RemoveOutcome::NotFound;
        }
        if m == 0 {
            return RemoveOutcome::NotThisNode;
        }
        let consumed_to = start_pos + m;
        if consumed_to == key.len() {
            return match state.total_value[m - 1].take() {
                Some(_) => RemoveOutcome::Removed,
                None => RemoveOutcome::NotFound,
            };
        }
        (m, consumed_to)
    };
    let dir_index = if m >= PREFIX_BYTES { PREFIX_BYTES - 1 } else { m };
    remove_segment_bucket(node, key, consumed_to, dir_index)
}

fn remove_segment_bucket(
    node: &MertNode,
    key: &[u8],
    start_pos: usize,
    dir_index: usize,
) -> RemoveOutcome {
    let directory = &node.directories[dir_index];
    let routing_byte = key[start_pos];
    let dir_slot = segment::directory_slot_index(routing_byte);
    let buk_idx = segment::bucket_index(routing_byte);

    let Some(seg) = directory.segment_at(dir_slot) else {
        return RemoveOutcome::NotFound;
    };
    let mut bucket = seg.bucket(buk_idx).write().unwrap();
    let mut leaf_at = None;
    let mut child_at = None;
    for (i, slot) in bucket.slots().iter().enumerate() {
        match slot {
            Slot::Empty => {}
            Slot::Leaf(k, _) => {
                if k.as_slice() == key {
                    leaf_at = Some(i);
                    break;
                }
            }
            Slot::Child(c) => {
                if child_at.is_none() {
                    child_at = Some((i, Arc::clone(c)));
                }
            }
        }
    }
    if let Some(i) = leaf_at {
        bucket.clear(i);
        return RemoveOutcome::Removed;
    }
    if let Some((_, child)) = child_at {
        drop(bucket);
        return match remove_from_node(&child, key, start_pos) {
            RemoveOutcome::NotThisNode => {
                // Try remaining slots (other Leaf/Child entries) the slow
                // way: re-scan, skipping the child we already tried.
                remove_segment_bucket_skip(node, key, start_pos, dir_index, &child)
            }
            other => other,
        };
    }
    RemoveOutcome::NotFound
}

fn remove_segment_bucket_skip(
    node: &MertNode,
    key: &[u8],
    start_pos: usize,
    dir_index: usize,
    skip: &Arc<MertNode>,
) -> RemoveOutcome {
    let directory = &node.directories[dir_index];
    let routing_byte = key[start_pos];
    let dir_slot = segment::directory_slot_index(routing_byte);
    let buk_idx = segment::bucket_index(routing_byte);

    let Some(seg) = directory.segment_at(dir_slot) else {
        return RemoveOutcome::NotFound;
    };
    let bucket = seg.bucket(buk_idx).read().unwrap();
    let found_leaf = bucket
        .slots()
        .iter()
        .any(|slot| matches!(slot, Slot::Leaf(k, _) if k.as_slice() == key));
    drop(bucket);
    if found_leaf {
        let mut bucket = seg.bucket(buk_idx).write().unwrap();
        let idx = bucket
            .slots()
            .iter()
            .position(|slot| matches!(slot, Slot::Leaf(k, _) if k.as_slice() == key));
        return match idx {
            Some(i) => {
                bucket.clear(i);
                RemoveOutcome::Removed
            }
            None => RemoveOutcome::NotFound,
        };
    }
    let bucket = seg.bucket(buk_idx).read().unwrap();
    for slot in bucket.slots() {
        match slot {
            Slot::Empty | Slot::Leaf(_, _) => {}
            Slot::Child(c) => {
                if Arc::ptr_eq(c, skip) {
                    continue;
                }
                match remove_from_node(c, key, start_pos) {
                    RemoveOutcome::NotThisNode => continue,
                    other => return other,
                }
            }
        }
    }
    RemoveOutcome::NotFound
}
