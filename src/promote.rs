//! Child-node promotion: when a bucket overflows at `GLOBAL_DEPTH` (no
//! further segment split is possible), a new [`MertNode`] is carved out to
//! absorb a subset of the bucket's leaves, keyed by the longest common
//! substring found among any *pair* of those leaves (searched only from
//! `start_pos` onward), not the common prefix shared by all of them. That
//! substring is not guaranteed to sit at the very start of every leaf it
//! was drawn from — so after it is copied into the new node's prefix, a
//! leaf may fail to match there even though it contributed to finding the
//! substring in the first place. Such leaves are left behind in the
//! original bucket rather than silently dropped.

use crate::bucket::{Bucket, Slot};
use crate::node::{insert_to_new_node, InsertOutcome, MertNode};

/// Longest common substring of two byte slices, classic O(nm) DP. Ties
/// are broken by preferring the earliest-ending match in `a`.
fn longest_common_substring(a: &[u8], b: &[u8]) -> Vec<u8> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    let mut best_len = 0;
    let mut best_end = 0; // end index in `a`, exclusive
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                dp[i][j] = dp[i - 1][j - 1] + 1;
                if dp[i][j] > best_len {
                    best_len = dp[i][j];
                    best_end = i;
                }
            }
        }
    }
    a[best_end - best_len..best_end].to_vec()
}

/// Longest common substring found among any pair of `keys`, per
/// `MERT.cc::longestCommonSubstringAmongTwo`: a full scan over every
/// `(i, j)` pair, not a shortcut over just the two longest keys — a short
/// pair can share a longer run than the two longest keys do. Ties are
/// broken by the first pair (in iteration order) to reach the
/// overall-longest length.
fn longest_common_substring_pairwise(keys: &[&[u8]]) -> Vec<u8> {
    let mut best: Vec<u8> = Vec::new();
    for i in 0..keys.len() {
        for j in (i + 1)..keys.len() {
            let candidate = longest_common_substring(keys[i], keys[j]);
            if candidate.len() > best.len() {
                best = candidate;
            }
        }
    }
    best
}

/// Drain the overflowing bucket's leaves into `new_child`: compute the
/// longest pairwise common substring among all of them (restricted to
/// each key's bytes from `start_pos` onward, per spec §4.6), seed
/// `new_child`'s prefix from it, then replay every collected leaf through
/// the ordinary insert dispatch. A leaf that the dispatch rejects
/// (`InsertOutcome::NotThisNode` — it doesn't actually begin with the
/// chosen prefix at `start_pos`) is left in place in the original bucket;
/// only leaves the dispatch accepts are cleared from it.
pub(crate) fn add_child_node(new_child: &MertNode, bucket: &mut Bucket, start_pos: usize) {
    let leaves: Vec<(usize, Vec<u8>, Vec<u8>)> = bucket
        .slots()
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| match slot {
            Slot::Leaf(k, v) => Some((i, k.clone(), v.clone())),
            _ => None,
        })
        .collect();

    if leaves.len() >= 2 {
        let slices: Vec<&[u8]> = leaves.iter().map(|(_, k, _)| &k[start_pos..]).collect();
        let substring = longest_common_substring_pairwise(&slices);
        if !substring.is_empty() {
            new_child.seed_prefix(&substring);
        }
    }

    for (i, k, v) in leaves {
        if insert_to_new_node(new_child, &k, &v, start_pos) == InsertOutcome::Inserted {
            bucket.clear(i);
        }
    }
}
