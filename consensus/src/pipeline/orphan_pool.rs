//! Orphan block pool
//!
//! Blocks whose parents are not known yet wait here, keyed by hash in arrival
//! order. A full pool evicts its oldest entry; entries also expire after
//! [`ORPHAN_EXPIRATION_MS`].

use consensus_core::block::Block;
use consensus_core::constants::ORPHAN_EXPIRATION_MS;
use consensus_core::Hash;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

struct OrphanBlock {
    block: Arc<Block>,
    expiration_ms: u64,
}

pub struct OrphanPool {
    capacity: usize,
    orphans: IndexMap<Hash, OrphanBlock>,
    /// Missing parent to the orphans that wait for it
    waiting: HashMap<Hash, Vec<Hash>>,
}

impl OrphanPool {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), orphans: IndexMap::new(), waiting: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.orphans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.orphans.contains_key(hash)
    }

    /// Adds `block`, first dropping expired entries and, when still full, the
    /// oldest one.
    pub fn add(&mut self, block: Arc<Block>, now_ms: u64) {
        let hash = block.hash();
        if self.orphans.contains_key(&hash) {
            return;
        }
        self.expire(now_ms);
        while self.orphans.len() >= self.capacity {
            let Some(oldest) = self.orphans.keys().next().copied() else {
                break;
            };
            debug!("Orphan pool is full, evicting {}", oldest);
            self.remove(&oldest);
        }
        for parent in block.parents() {
            self.waiting.entry(*parent).or_default().push(hash);
        }
        self.orphans.insert(hash, OrphanBlock { block, expiration_ms: now_ms.saturating_add(ORPHAN_EXPIRATION_MS) });
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<Arc<Block>> {
        let orphan = self.orphans.shift_remove(hash)?;
        for parent in orphan.block.parents() {
            if let Some(children) = self.waiting.get_mut(parent) {
                children.retain(|h| h != hash);
                if children.is_empty() {
                    self.waiting.remove(parent);
                }
            }
        }
        Some(orphan.block)
    }

    /// Orphans waiting on `parent`, oldest first.
    pub fn children_of(&self, parent: &Hash) -> Vec<Arc<Block>> {
        let Some(children) = self.waiting.get(parent) else {
            return Vec::new();
        };
        children.iter().filter_map(|h| self.orphans.get(h)).map(|o| o.block.clone()).collect()
    }

    pub fn expire(&mut self, now_ms: u64) -> usize {
        let expired: Vec<Hash> =
            self.orphans.iter().filter(|(_, o)| o.expiration_ms <= now_ms).map(|(h, _)| *h).collect();
        for hash in &expired {
            self.remove(hash);
        }
        if !expired.is_empty() {
            debug!("Expired {} orphan blocks", expired.len());
        }
        expired.len()
    }
}
