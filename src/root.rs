//! The top of the tree: a 256-wide array keyed by `key[0]`, each slot
//! optionally owning the root [`MertNode`] for that first byte. This
//! mirrors [`crate::directory::PrefixDirectory`]'s lazy-materialize
//! pattern one level higher, since the first byte of a key is itself
//! just a routing decision before any node-level prefix exists.

use std::sync::{Arc, RwLock};

use crate::node::{
    insert_to_new_node, remove_from_node, search_in_node, MertNode, RemoveOutcome, SearchOutcome,
};

const ROOT_WIDTH: usize = 256;

pub(crate) struct MertRootNode {
    slots: Vec<RwLock<Option<Arc<MertNode>>>>,
}

impl MertRootNode {
    pub(crate) fn new() -> Self {
        MertRootNode {
            slots: (0..ROOT_WIDTH).map(|_| RwLock::new(None)).collect(),
        }
    }

    pub(crate) fn insert(&self, key: &[u8], value: &[u8]) {
        let idx = key[0] as usize;
        let existing = self.slots[idx].read().unwrap().clone();
        let node = match existing {
            Some(n) => n,
            None => {
                let mut slot = self.slots[idx].write().unwrap();
                match &*slot {
                    Some(n) => Arc::clone(n),
                    None => {
                        let n = Arc::new(MertNode::new());
                        *slot = Some(Arc::clone(&n));
                        n
                    }
                }
            }
        };
        insert_to_new_node(&node, key, value, 0);
    }

    pub(crate) fn search(&self, key: &[u8]) -> Option<Vec<u8>> {
        let idx = key[0] as usize;
        let node = self.slots[idx].read().unwrap().clone()?;
        match search_in_node(&node, key, 0) {
            SearchOutcome::Found(v) => Some(v),
            SearchOutcome::NotFound | SearchOutcome::NotThisNode => None,
        }
    }

    pub(crate) fn remove(&self, key: &[u8]) -> bool {
        let idx = key[0] as usize;
        let Some(node) = self.slots[idx].read().unwrap().clone() else {
            return false;
        };
        matches!(remove_from_node(&node, key, 0), RemoveOutcome::Removed)
    }

    /// Every populated root slot's node, for stats-gathering.
    pub(crate) fn root_nodes(&self) -> Vec<Arc<MertNode>> {
        self.slots
            .iter()
            .filter_map(|s| s.read().unwrap().clone())
            .collect()
    }
}
