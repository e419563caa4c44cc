//! In-memory GHOSTDAG provider
//!
//! Keeps the whole DAG in memory and recomputes it from the block index on
//! restart. Ordering follows the selected chain: the order of a chain block is
//! the order of its main parent, followed by its mergeset sorted by blue work,
//! followed by the block itself. Blocks outside the main tip's past stay
//! unordered until a chain block merges them.

use consensus_core::block_state::{BlockState, BlockStatus};
use consensus_core::constants::MAX_BLOCK_ORDER;
use consensus_core::pow::PowType;
use consensus_core::Hash;
use jio_math::{calc_work, U256};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::{BlockDag, BlockFilter, BlockNode, DagInsertion, IBlock};
use crate::consensus::types::GraphState;
use crate::errors::{ChainError, ChainResult};

pub struct DagBlock {
    hash: Hash,
    id: u64,
    parents: Vec<Hash>,
    main_parent: Option<Hash>,
    timestamp: u64,
    bits: u32,
    pow_type: PowType,
    height: u64,
    /// Longest parent path from genesis; strictly grows along every edge
    dag_height: u64,
    blue_score: u64,
    blue_work: U256,
    /// Past minus the main parent's past, main parent excluded, by ascending blue work
    mergeset: Vec<Hash>,
    mergeset_blues: Vec<Hash>,
    order: AtomicU64,
    state: RwLock<BlockState>,
}

impl DagBlock {
    fn sort_key(&self) -> (U256, Hash) {
        (self.blue_work, self.hash)
    }
}

impl IBlock for DagBlock {
    fn hash(&self) -> Hash {
        self.hash
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn order(&self) -> u64 {
        self.order.load(Ordering::Acquire)
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn blue_score(&self) -> u64 {
        self.blue_score
    }

    fn blue_work(&self) -> U256 {
        self.blue_work
    }

    fn main_parent(&self) -> Option<Hash> {
        self.main_parent
    }

    fn parents(&self) -> &[Hash] {
        &self.parents
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn bits(&self) -> u32 {
        self.bits
    }

    fn pow_type(&self) -> PowType {
        self.pow_type
    }

    fn state(&self) -> BlockState {
        self.state.read().clone()
    }

    fn set_state(&self, mut state: BlockState) {
        state.id = self.id;
        state.order = self.order();
        *self.state.write() = state;
    }
}

#[derive(Default)]
struct DagInner {
    blocks: HashMap<Hash, Arc<DagBlock>>,
    by_id: Vec<Hash>,
    order: Vec<Hash>,
    main_chain: HashSet<Hash>,
    /// Ordered non-chain block to the chain block whose mergeset holds it
    merged_by: HashMap<Hash, Hash>,
    tips: HashSet<Hash>,
    main_tip: Option<Hash>,
}

impl DagInner {
    fn block(&self, hash: &Hash) -> ChainResult<&Arc<DagBlock>> {
        self.blocks.get(hash).ok_or_else(|| ChainError::Dag(format!("unknown block {}", hash)))
    }

    /// Whether `a` is `b` or lies in the past of `b`.
    fn is_ancestor(&self, a: &Hash, b: &Hash) -> bool {
        if a == b {
            return true;
        }
        let (Some(target), Some(start)) = (self.blocks.get(a), self.blocks.get(b)) else {
            return false;
        };
        if start.dag_height <= target.dag_height {
            return false;
        }
        let mut visited = HashSet::new();
        let mut queue: VecDeque<&Hash> = start.parents.iter().collect();
        while let Some(h) = queue.pop_front() {
            if h == a {
                return true;
            }
            if !visited.insert(*h) {
                continue;
            }
            if let Some(block) = self.blocks.get(h) {
                if block.dag_height > target.dag_height {
                    queue.extend(block.parents.iter());
                }
            }
        }
        false
    }

    fn in_anticone(&self, a: &Hash, b: &Hash) -> bool {
        !self.is_ancestor(a, b) && !self.is_ancestor(b, a)
    }

    fn select_main_parent(&self, parents: &[Hash]) -> Option<Arc<DagBlock>> {
        parents.iter().filter_map(|p| self.blocks.get(p)).max_by_key(|b| b.sort_key()).cloned()
    }

    fn mergeset(&self, main_parent: &DagBlock, parents: &[Hash]) -> Vec<Hash> {
        let mut queue: VecDeque<Hash> = parents.iter().filter(|p| **p != main_parent.hash).copied().collect();
        let mut seen: HashSet<Hash> = queue.iter().copied().collect();
        let mut mergeset = Vec::new();
        while let Some(h) = queue.pop_front() {
            if self.is_ancestor(&h, &main_parent.hash) {
                continue;
            }
            mergeset.push(h);
            if let Some(block) = self.blocks.get(&h) {
                for p in &block.parents {
                    if seen.insert(*p) {
                        queue.push_back(*p);
                    }
                }
            }
        }
        mergeset.sort_by_key(|h| self.blocks.get(h).map(|b| b.sort_key()).unwrap_or_default());
        mergeset
    }

    /// K-cluster coloring of a mergeset against the main parent.
    fn color_mergeset(&self, main_parent: &Hash, mergeset: &[Hash], k: usize) -> Vec<Hash> {
        let mut blues = vec![*main_parent];
        let mut anticone_sizes: HashMap<Hash, usize> = HashMap::from([(*main_parent, 0)]);
        for candidate in mergeset {
            let anticone: Vec<Hash> = blues.iter().filter(|b| self.in_anticone(b, candidate)).copied().collect();
            if anticone.len() > k {
                continue;
            }
            if anticone.iter().any(|b| anticone_sizes.get(b).copied().unwrap_or(0) + 1 > k) {
                continue;
            }
            for b in &anticone {
                *anticone_sizes.entry(*b).or_default() += 1;
            }
            anticone_sizes.insert(*candidate, anticone.len());
            blues.push(*candidate);
        }
        blues.split_off(1)
    }

    /// Moves the main tip to `tip` and recomputes the affected suffix of the
    /// order. Returns the newly ordered and the withdrawn blocks.
    fn reorder(&mut self, tip: &Arc<DagBlock>) -> ChainResult<(Vec<Hash>, Vec<Hash>)> {
        let mut segment = Vec::new();
        let mut cursor = Some(tip.clone());
        let fork = loop {
            match cursor {
                None => break None,
                Some(b) if self.main_chain.contains(&b.hash) => break Some(b),
                Some(b) => {
                    cursor = match b.main_parent {
                        Some(mp) => Some(self.block(&mp)?.clone()),
                        None => None,
                    };
                    segment.push(b);
                }
            }
        };
        segment.reverse();

        let keep = fork.as_ref().map(|f| f.order() as usize + 1).unwrap_or(0);
        let mut suffix = Vec::new();
        for b in &segment {
            suffix.extend(b.mergeset.iter().copied());
            suffix.push(b.hash);
        }
        let old_suffix = &self.order[keep..];
        let common = old_suffix.iter().zip(&suffix).take_while(|(a, b)| a == b).count();
        let withdrawn: Vec<Hash> = old_suffix[common..].to_vec();
        let assigned: Vec<Hash> = suffix[common..].to_vec();

        let mut cursor = self.main_tip;
        while let Some(h) = cursor {
            if fork.as_ref().map(|f| f.hash) == Some(h) {
                break;
            }
            self.main_chain.remove(&h);
            cursor = self.block(&h)?.main_parent;
        }
        for b in &segment {
            self.main_chain.insert(b.hash);
        }

        for h in &withdrawn {
            self.block(h)?.order.store(MAX_BLOCK_ORDER, Ordering::Release);
            self.merged_by.remove(h);
        }
        self.order.truncate(keep + common);
        for h in &assigned {
            let position = self.order.len() as u64;
            self.block(h)?.order.store(position, Ordering::Release);
            self.order.push(*h);
        }
        for b in &segment {
            for m in &b.mergeset {
                self.merged_by.insert(*m, b.hash);
            }
        }
        self.main_tip = Some(tip.hash);
        Ok((assigned, withdrawn))
    }

    fn handles(&self, hashes: &[Hash]) -> ChainResult<Vec<Arc<dyn IBlock>>> {
        hashes.iter().map(|h| Ok(self.block(h)?.clone() as Arc<dyn IBlock>)).collect()
    }
}

/// Reference [`BlockDag`] implementation with GHOSTDAG coloring parameter `k`.
pub struct MemoryDag {
    k: usize,
    inner: RwLock<DagInner>,
}

impl MemoryDag {
    pub fn new(k: usize) -> Self {
        Self { k, inner: RwLock::new(DagInner::default()) }
    }

    /// Ordered blocks in ascending order
    pub fn ordered_hashes(&self) -> Vec<Hash> {
        self.inner.read().order.clone()
    }
}

impl BlockDag for MemoryDag {
    fn genesis(&self) -> Option<Arc<dyn IBlock>> {
        let inner = self.inner.read();
        inner.by_id.first().and_then(|h| inner.blocks.get(h)).map(|b| b.clone() as Arc<dyn IBlock>)
    }

    fn insert(&self, node: &BlockNode) -> ChainResult<DagInsertion> {
        let mut inner = self.inner.write();
        let hash = node.hash();
        if inner.blocks.contains_key(&hash) {
            return Err(ChainError::Dag(format!("block {} is already in the dag", hash)));
        }
        if node.parents().is_empty() && !inner.blocks.is_empty() {
            return Err(ChainError::Dag(format!("block {} has no parents but genesis exists", hash)));
        }
        for parent in node.parents() {
            inner.block(parent)?;
        }
        let main_parent = inner.select_main_parent(node.parents());
        if node.main_parent() != main_parent.as_ref().map(|b| b.hash) {
            return Err(ChainError::Dag(format!("block {} was built with a stale main parent", hash)));
        }

        let (mergeset, mergeset_blues, height, blue_score, blue_work) = match &main_parent {
            Some(mp) => {
                let mergeset = inner.mergeset(mp, node.parents());
                let blues = inner.color_mergeset(&mp.hash, &mergeset, self.k);
                let mut work = mp.blue_work + calc_work(mp.bits);
                for b in &blues {
                    work += calc_work(inner.block(b)?.bits);
                }
                let score = mp.blue_score + 1 + blues.len() as u64;
                (mergeset, blues, mp.height + 1, score, work)
            }
            None => (Vec::new(), Vec::new(), 0, 0, U256::zero()),
        };
        let dag_height =
            node.parents().iter().filter_map(|p| inner.blocks.get(p)).map(|b| b.dag_height + 1).max().unwrap_or(0);

        let id = inner.by_id.len() as u64;
        let block = Arc::new(DagBlock {
            hash,
            id,
            parents: node.parents().to_vec(),
            main_parent: main_parent.as_ref().map(|b| b.hash),
            timestamp: node.timestamp(),
            bits: node.bits(),
            pow_type: node.pow_type(),
            height,
            dag_height,
            blue_score,
            blue_work,
            mergeset,
            mergeset_blues,
            order: AtomicU64::new(MAX_BLOCK_ORDER),
            state: RwLock::new(BlockState::new(id)),
        });
        inner.blocks.insert(hash, block.clone());
        inner.by_id.push(hash);
        for parent in node.parents() {
            inner.tips.remove(parent);
        }
        inner.tips.insert(hash);

        let becomes_tip = match inner.main_tip {
            None => true,
            Some(tip) => block.sort_key() > inner.block(&tip)?.sort_key(),
        };
        if !becomes_tip {
            debug!("Block {} stays unordered (blue score {})", hash, blue_score);
            return Ok(DagInsertion {
                block: block.clone(),
                new_orders: vec![block as Arc<dyn IBlock>],
                old_orders: Vec::new(),
                main_tip_changed: false,
            });
        }

        let (assigned, withdrawn) = inner.reorder(&block)?;
        debug!("Block {} is the new main tip: {} ordered, {} withdrawn", hash, assigned.len(), withdrawn.len());
        Ok(DagInsertion {
            block: block as Arc<dyn IBlock>,
            new_orders: inner.handles(&assigned)?,
            old_orders: inner.handles(&withdrawn)?,
            main_tip_changed: true,
        })
    }

    fn get(&self, hash: &Hash) -> Option<Arc<dyn IBlock>> {
        self.inner.read().blocks.get(hash).map(|b| b.clone() as Arc<dyn IBlock>)
    }

    fn get_by_order(&self, order: u64) -> Option<Arc<dyn IBlock>> {
        let inner = self.inner.read();
        let hash = inner.order.get(usize::try_from(order).ok()?)?;
        inner.blocks.get(hash).map(|b| b.clone() as Arc<dyn IBlock>)
    }

    fn has(&self, hash: &Hash) -> bool {
        self.inner.read().blocks.contains_key(hash)
    }

    fn main_parent_of(&self, parents: &[Hash]) -> Option<Arc<dyn IBlock>> {
        self.inner.read().select_main_parent(parents).map(|b| b as Arc<dyn IBlock>)
    }

    fn main_tip(&self) -> Option<Arc<dyn IBlock>> {
        let inner = self.inner.read();
        inner.main_tip.and_then(|h| inner.blocks.get(&h)).map(|b| b.clone() as Arc<dyn IBlock>)
    }

    fn graph_state(&self) -> GraphState {
        let inner = self.inner.read();
        let mut tips: Vec<Hash> = inner.tips.iter().copied().collect();
        tips.sort();
        let main_height = inner.main_tip.and_then(|h| inner.blocks.get(&h)).map(|b| b.height).unwrap_or(0);
        GraphState {
            tips,
            main_height,
            main_order: inner.order.len().saturating_sub(1) as u64,
            block_count: inner.blocks.len() as u64,
        }
    }

    fn tips(&self) -> Vec<Hash> {
        self.graph_state().tips
    }

    fn block_count(&self) -> u64 {
        self.inner.read().blocks.len() as u64
    }

    fn is_blue(&self, hash: &Hash) -> bool {
        let inner = self.inner.read();
        if inner.main_chain.contains(hash) {
            return true;
        }
        inner
            .merged_by
            .get(hash)
            .and_then(|chain_block| inner.blocks.get(chain_block))
            .map(|chain_block| chain_block.mergeset_blues.contains(hash))
            .unwrap_or(false)
    }

    fn confirmations(&self, hash: &Hash) -> u64 {
        let inner = self.inner.read();
        let (Some(block), Some(tip)) = (inner.blocks.get(hash), inner.main_tip.and_then(|h| inner.blocks.get(&h))) else {
            return 0;
        };
        if !block.is_ordered() {
            return 0;
        }
        tip.blue_score.saturating_sub(block.blue_score) + 1
    }

    fn blue_window(&self, from: &Hash, size: usize, filter: BlockFilter<'_>) -> Vec<Arc<dyn IBlock>> {
        let inner = self.inner.read();
        let mut window: Vec<Arc<dyn IBlock>> = Vec::with_capacity(size.min(4096));
        let mut cursor = inner.blocks.get(from).cloned();
        while let Some(chain_block) = cursor {
            if window.len() >= size {
                break;
            }
            if filter(chain_block.as_ref()) {
                window.push(chain_block.clone());
            }
            for h in chain_block.mergeset_blues.iter().rev() {
                if window.len() >= size {
                    break;
                }
                if let Some(blue) = inner.blocks.get(h) {
                    if filter(blue.as_ref()) {
                        window.push(blue.clone());
                    }
                }
            }
            cursor = chain_block.main_parent.and_then(|mp| inner.blocks.get(&mp).cloned());
        }
        window
    }

    fn blue_diff_anticone(&self, hash: &Hash) -> Vec<Arc<dyn IBlock>> {
        let inner = self.inner.read();
        let Some(block) = inner.blocks.get(hash) else {
            return Vec::new();
        };
        block.mergeset_blues.iter().filter_map(|h| inner.blocks.get(h)).map(|b| b.clone() as Arc<dyn IBlock>).collect()
    }

    fn mark_invalid(&self, hash: &Hash) {
        if let Some(block) = self.inner.read().blocks.get(hash) {
            block.state.write().status.insert(BlockStatus::INVALID);
        }
    }

    fn mark_valid(&self, hash: &Hash) {
        if let Some(block) = self.inner.read().blocks.get(hash) {
            block.state.write().status.remove(BlockStatus::INVALID);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::block::Block;
    use consensus_core::header::Header;

    pub(crate) fn node(dag: &MemoryDag, parents: &[Hash], salt: u64) -> BlockNode {
        let header = Header {
            version: 1,
            parents: parents.to_vec(),
            tx_root: Hash::from_u64_word(salt),
            state_root: Hash::default(),
            timestamp: 1_000 * salt,
            bits: 0x207f_ffff,
            pow_type: PowType::Sha256d,
            nonce: salt,
        };
        let main_parent = dag.main_parent_of(parents).map(|b| b.hash());
        BlockNode::new(Arc::new(Block::new(header, Vec::new())), main_parent)
    }

    fn add(dag: &MemoryDag, parents: &[Hash], salt: u64) -> DagInsertion {
        dag.insert(&node(dag, parents, salt)).unwrap()
    }

    #[test]
    fn test_chain_extension_orders_each_block() {
        let dag = MemoryDag::new(3);
        let g = add(&dag, &[], 1);
        assert_eq!(g.block.order(), 0);
        assert!(g.main_tip_changed);
        let a = add(&dag, &[g.block.hash()], 2);
        assert_eq!(a.new_orders.len(), 1);
        assert!(a.old_orders.is_empty());
        assert_eq!(a.block.order(), 1);
        assert_eq!(a.block.blue_score(), 1);
        assert_eq!(dag.confirmations(&g.block.hash()), 2);
        assert_eq!(dag.graph_state().tips, vec![a.block.hash()]);
    }

    #[test]
    fn test_side_block_unordered_until_merged() {
        let dag = MemoryDag::new(3);
        let g = add(&dag, &[], 1).block.hash();
        let a = add(&dag, &[g], 2).block.hash();
        let side = add(&dag, &[g], 3);
        // same blue work as `a`; only the hash decides
        let side_hash = side.block.hash();
        if side.main_tip_changed {
            assert_eq!(side.old_orders.len(), 1);
            assert_eq!(side.old_orders[0].hash(), a);
        } else {
            assert!(!side.block.is_ordered());
            assert_eq!(dag.confirmations(&side_hash), 0);
        }

        let merge = add(&dag, &[a, side_hash], 4);
        assert!(merge.main_tip_changed);
        let tip = dag.main_tip().unwrap();
        assert_eq!(tip.hash(), merge.block.hash());
        assert_eq!(tip.blue_score(), 3);
        assert!(dag.is_blue(&a) && dag.is_blue(&side_hash));
        assert_eq!(dag.blue_diff_anticone(&tip.hash()).len(), 1);
        let orders: Vec<u64> = [g, a, side_hash, tip.hash()].iter().map(|h| dag.get(h).unwrap().order()).collect();
        let mut sorted = orders.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
        assert_eq!(orders[3], 3);
    }

    #[test]
    fn test_heavier_fork_withdraws_orders() {
        let dag = MemoryDag::new(3);
        let g = add(&dag, &[], 1).block.hash();
        let mut a = g;
        let mut a_hashes = Vec::new();
        for i in 0..3 {
            a = add(&dag, &[a], 10 + i).block.hash();
            a_hashes.push(a);
        }
        let mut b = g;
        let mut withdrawn = Vec::new();
        for i in 0..5 {
            let ins = add(&dag, &[b], 20 + i);
            withdrawn.extend(ins.old_orders.iter().map(|x| x.hash()));
            b = ins.block.hash();
        }
        assert_eq!(dag.main_tip().unwrap().hash(), b);
        assert_eq!(withdrawn, a_hashes);
        assert!(a_hashes.iter().all(|h| !dag.get(h).unwrap().is_ordered()));
        assert_eq!(dag.ordered_hashes().len(), 6);
        assert!(!dag.is_blue(&a_hashes[0]));
    }

    #[test]
    fn test_insert_rejects_bad_input() {
        let dag = MemoryDag::new(3);
        let g = add(&dag, &[], 1).block.hash();
        assert!(matches!(dag.insert(&node(&dag, &[], 2)), Err(ChainError::Dag(_))));
        assert!(matches!(dag.insert(&node(&dag, &[Hash::from_u64_word(99)], 3)), Err(ChainError::Dag(_))));
        let a = node(&dag, &[g], 4);
        dag.insert(&a).unwrap();
        assert!(matches!(dag.insert(&a), Err(ChainError::Dag(_))));
    }

    #[test]
    fn test_blue_window_filters_and_limits() {
        let dag = MemoryDag::new(3);
        let mut tip = add(&dag, &[], 1).block.hash();
        for i in 0..10 {
            tip = add(&dag, &[tip], 2 + i).block.hash();
        }
        let all = dag.blue_window(&tip, 100, &|_| true);
        assert_eq!(all.len(), 11);
        assert_eq!(all[0].hash(), tip);
        let limited = dag.blue_window(&tip, 4, &|_| true);
        assert_eq!(limited.len(), 4);
        let none = dag.blue_window(&tip, 4, &|b| b.pow_type() == PowType::Keccak256);
        assert!(none.is_empty());
    }

    #[test]
    fn test_mark_invalid_and_valid() {
        let dag = MemoryDag::new(3);
        let g = add(&dag, &[], 1).block;
        dag.mark_invalid(&g.hash());
        assert!(g.state().is_invalid());
        dag.mark_valid(&g.hash());
        assert!(!g.state().is_invalid());
    }
}
