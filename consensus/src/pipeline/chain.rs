//! Chain state engine
//!
//! [`BlockChain`] owns the persisted chain state and the collaborators that
//! feed it. Mutation goes through `process_block` and `rebuild`, which the
//! worker calls one at a time; everything else in this file is a read-side
//! accessor that may run from any thread.

use consensus_core::block::Block;
use consensus_core::chain_state::BestChainState;
use consensus_core::config::Params;
use consensus_core::pow::PowType;
use consensus_core::token::TokenState;
use consensus_core::tx::{Transaction, TransactionOutpoint};
use consensus_core::utxo::{SpentTxOut, UtxoEntry, UtxoKeyBuf};
use consensus_core::Hash;
use database::stores::{BlockIndexStore, BlockStore, ChainStateStore, SpendJournalStore, TokenStore, UtxoStore};
use database::Database;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::in_flight::InFlightMarker;
use super::notifications::{Notification, NotificationHub};
use super::orphan_pool::OrphanPool;
use crate::config::ChainConfig;
use crate::consensus::dag::{BlockDag, BlockNode, IBlock, MemoryDag};
use crate::consensus::difficulty::{new_difficulty_manager, DifficultyManager};
use crate::consensus::storage::UtxoViewpoint;
use crate::consensus::types::BestState;
use crate::consensus::validation::{BlockValidator, ContextualValidator, TransactionValidator};
use crate::errors::{fatal, ChainError, ChainResult};
use crate::interfaces::{IndexManager, MedianTimeSource, NoopBridge, SideChainBridge, TokenLedger};
use crate::process::median_time::MedianTime;
use crate::process::past_median_time::PastMedianTimeManager;
use crate::process::token_ledger::SupplyLedger;
use crossbeam::channel::Receiver;

/// How far behind the adjusted clock the main tip may be while the node still
/// counts as synced.
const MAX_TIP_AGE_MS: u64 = 24 * 60 * 60 * 1000;

/// Components the engine drives but does not implement.
pub struct Collaborators {
    pub dag: Arc<dyn BlockDag>,
    pub index_manager: Option<Arc<dyn IndexManager>>,
    pub bridge: Arc<dyn SideChainBridge>,
    pub token_ledger: Arc<dyn TokenLedger>,
    pub time_source: Arc<dyn MedianTimeSource>,
}

impl Collaborators {
    /// The in-memory DAG, the supply ledger and the peer-adjusted system
    /// clock, with no indexes and no side chain.
    pub fn standalone(params: &Params) -> Self {
        Self {
            dag: Arc::new(MemoryDag::new(params.ghostdag_k)),
            index_manager: None,
            bridge: Arc::new(NoopBridge),
            token_ledger: Arc::new(SupplyLedger::new()),
            time_source: Arc::new(MedianTime::new(params.max_time_offset_ms)),
        }
    }
}

pub struct BlockChain {
    pub(crate) params: Arc<Params>,
    pub(crate) db: Arc<Database>,
    pub(crate) blocks: BlockStore,
    pub(crate) index: BlockIndexStore,
    pub(crate) utxos: UtxoStore,
    pub(crate) journal: SpendJournalStore,
    pub(crate) chain_state: ChainStateStore,
    pub(crate) tokens: TokenStore,

    pub(crate) dag: Arc<dyn BlockDag>,
    pub(crate) difficulty: Arc<dyn DifficultyManager>,
    pub(crate) past_median_time: Arc<PastMedianTimeManager>,
    pub(crate) block_validator: BlockValidator,
    pub(crate) context_validator: ContextualValidator,
    pub(crate) tx_validator: TransactionValidator,
    pub(crate) index_manager: Option<Arc<dyn IndexManager>>,
    pub(crate) bridge: Arc<dyn SideChainBridge>,
    pub(crate) token_ledger: Arc<dyn TokenLedger>,
    pub(crate) time_source: Arc<dyn MedianTimeSource>,

    /// Readers for queries, the writer for any mutation
    pub(crate) chain_lock: RwLock<()>,
    pub(crate) orphans: Mutex<OrphanPool>,
    best_state: RwLock<Arc<BestState>>,
    pub(crate) notifications: NotificationHub,
    pub(crate) in_flight: InFlightMarker,
}

impl BlockChain {
    /// Opens the chain under `config.data_dir`, creating it from genesis when
    /// empty. Refuses to start when the previous run stopped mid-write.
    pub fn open(config: &ChainConfig, collaborators: Collaborators) -> ChainResult<Self> {
        let chain = Self::build(config, collaborators)?;
        if let Some(hash) = chain.in_flight.read()? {
            error!("Block {} was being applied when the node stopped; run a rebuild", hash);
            return Err(ChainError::DirtyShutdown(hash));
        }
        chain.load(true)?;
        Ok(chain)
    }

    /// Opens the chain whatever state the last run left it in and re-derives
    /// every ledger from the stored blocks.
    pub fn recover(config: &ChainConfig, collaborators: Collaborators) -> ChainResult<Self> {
        let chain = Self::build(config, collaborators)?;
        if let Some(hash) = chain.in_flight.read()? {
            warn!("Recovering from an interrupted write of block {}", hash);
        }
        chain.load(false)?;
        chain.rebuild()?;
        Ok(chain)
    }

    fn build(config: &ChainConfig, collaborators: Collaborators) -> ChainResult<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        let params = Arc::new(config.params());
        let db = Arc::new(Database::open(config.db_path())?);
        let Collaborators { dag, index_manager, bridge, token_ledger, time_source } = collaborators;

        let difficulty = new_difficulty_manager(params.clone(), dag.clone());
        let past_median_time = Arc::new(PastMedianTimeManager::new(params.median_time_blocks, dag.clone()));
        Ok(Self {
            blocks: BlockStore::new(db.clone(), config.block_cache_size),
            index: BlockIndexStore::new(db.clone()),
            utxos: UtxoStore::new(db.clone()),
            journal: SpendJournalStore::new(db.clone()),
            chain_state: ChainStateStore::new(db.clone()),
            tokens: TokenStore::new(db.clone()),
            block_validator: BlockValidator::new(params.clone()),
            context_validator: ContextualValidator::new(params.clone(), difficulty.clone(), past_median_time.clone()),
            tx_validator: TransactionValidator::new(params.clone()),
            orphans: Mutex::new(OrphanPool::new(params.max_orphan_blocks)),
            in_flight: InFlightMarker::new(config.in_flight_path()),
            chain_lock: RwLock::new(()),
            best_state: RwLock::new(Arc::new(BestState::default())),
            notifications: NotificationHub::new(),
            db,
            dag,
            difficulty,
            past_median_time,
            index_manager,
            bridge,
            token_ledger,
            time_source,
            params,
        })
    }

    /// Restores the DAG from the block index, or starts a new chain from
    /// genesis. With `verify`, the stored orders and the chain-state record
    /// must agree with the replayed DAG.
    fn load(&self, verify: bool) -> ChainResult<()> {
        let _guard = self.chain_lock.write();
        let indexed = self.index.hashes_by_id()?;
        if indexed.is_empty() {
            return self.init_genesis();
        }

        for (position, (id, hash)) in indexed.iter().enumerate() {
            if *id != position as u64 {
                return fatal(format!("block index skips from {} to {}", position, id));
            }
            let Some(block) = self.blocks.get_block(hash)? else {
                return fatal(format!("indexed block {} is not stored", hash));
            };
            let main_parent = self.dag.main_parent_of(block.parents()).map(|b| b.hash());
            let inserted = self.dag.insert(&BlockNode::new(block, main_parent))?;
            if inserted.block.id() != *id {
                return fatal(format!("block {} replayed with id {} instead of {}", hash, inserted.block.id(), id));
            }
        }
        for (_, hash) in &indexed {
            let Some(node) = self.dag.get(hash) else {
                return fatal(format!("replayed block {} is missing from the dag", hash));
            };
            match self.index.get_state(hash)? {
                Some(state) => {
                    if verify && state.order != node.order() {
                        return fatal(format!("block {} was stored at order {} but replays at {}", hash, state.order, node.order()));
                    }
                    node.set_state(state);
                }
                None if verify => return fatal(format!("block {} has no stored state", hash)),
                None => {}
            }
        }
        self.dag.commit()?;

        let Some(tip) = self.dag.main_tip() else {
            return fatal("replayed dag has no main tip");
        };
        let record = self.chain_state.get()?.unwrap_or_default();
        if verify {
            if record.tip_hash != tip.hash() {
                return fatal(format!("chain state points at {} but the dag tip is {}", record.tip_hash, tip.hash()));
            }
            self.publish_best_state(&record)?;
        }
        info!("Restored {} blocks, main tip {} at order {}", indexed.len(), tip.hash(), tip.order());
        Ok(())
    }

    fn init_genesis(&self) -> ChainResult<()> {
        let genesis = Arc::new(self.params.genesis_block());
        let hash = genesis.hash();
        self.in_flight.set(&hash)?;
        self.blocks.put_block(&genesis)?;
        let insertion = self.dag.insert(&BlockNode::new(genesis, None))?;
        let record = self.reorganize(&insertion).map_err(ChainError::escalate)?;
        self.dag.commit()?;
        self.in_flight.clear()?;
        self.notifications.discard();
        self.publish_best_state(&record)?;
        info!("Created chain {} from genesis {}", self.params.net, hash);
        Ok(())
    }

    /// Replaces the published snapshot with one describing `record`'s tip.
    pub(crate) fn publish_best_state(&self, record: &BestChainState) -> ChainResult<()> {
        let Some(tip) = self.dag.get(&record.tip_hash) else {
            return fatal(format!("best chain tip {} is not in the dag", record.tip_hash));
        };
        let Some(block) = self.blocks.get_block(&record.tip_hash)? else {
            return fatal(format!("best chain tip {} is not stored", record.tip_hash));
        };
        let state = BestState {
            hash: record.tip_hash,
            order: tip.order(),
            bits: tip.bits(),
            pow_type: tip.pow_type(),
            block_size: block.serialized_size() as u64,
            num_txns: block.transactions.len() as u64,
            total_txns: record.total_txns,
            median_time: self.past_median_time.calc_past_median_time(tip.as_ref()),
            total_subsidy: record.total_subsidy,
            token_tip_hash: record.token_tip_hash,
            graph_state: self.dag.graph_state(),
            work: record.work,
        };
        *self.best_state.write() = Arc::new(state);
        Ok(())
    }

    /// Current snapshot. Holding it never blocks writers, and it stays
    /// consistent after newer blocks are accepted.
    pub fn best_snapshot(&self) -> Arc<BestState> {
        self.best_state.read().clone()
    }

    pub fn params(&self) -> &Arc<Params> {
        &self.params
    }

    pub fn dag(&self) -> &Arc<dyn BlockDag> {
        &self.dag
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Whether the block is in the DAG or waiting in the orphan pool.
    pub fn have_block(&self, hash: &Hash) -> bool {
        let _guard = self.chain_lock.read();
        self.dag.has(hash) || self.orphans.lock().contains(hash)
    }

    pub fn is_known_orphan(&self, hash: &Hash) -> bool {
        self.orphans.lock().contains(hash)
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.lock().len()
    }

    pub fn block_by_hash(&self, hash: &Hash) -> ChainResult<Option<Arc<Block>>> {
        let _guard = self.chain_lock.read();
        if !self.dag.has(hash) {
            return Ok(None);
        }
        Ok(self.blocks.get_block(hash)?)
    }

    /// Whether the main tip is recent and past the last checkpoint.
    pub fn is_current(&self) -> bool {
        let best = self.best_snapshot();
        let checkpoint_height = self.params.checkpoints.iter().map(|c| c.height).max().unwrap_or(0);
        if best.graph_state.main_height < checkpoint_height {
            return false;
        }
        let Some(tip) = self.dag.get(&best.hash) else {
            return false;
        };
        tip.timestamp() >= self.time_source.adjusted_time_ms().saturating_sub(MAX_TIP_AGE_MS)
    }

    /// Unspent entry of `outpoint` in the persisted set.
    pub fn fetch_utxo_entry(&self, outpoint: &TransactionOutpoint) -> ChainResult<Option<UtxoEntry>> {
        let _guard = self.chain_lock.read();
        let mut keys = UtxoKeyBuf::new();
        Ok(self.utxos.get_entry(&mut keys, outpoint)?)
    }

    /// View holding the outputs `tx` spends and the outputs it creates, as far
    /// as the persisted set still has them.
    pub fn fetch_utxo_view(&self, tx: &Transaction) -> ChainResult<UtxoViewpoint> {
        let _guard = self.chain_lock.read();
        let tx_id = tx.id();
        let mut needed: HashSet<TransactionOutpoint> =
            (0..tx.outputs.len() as u32).map(|i| TransactionOutpoint::new(tx_id, i)).collect();
        if tx.spends_utxos() {
            needed.extend(tx.inputs.iter().map(|input| input.previous_outpoint));
        }
        let mut view = UtxoViewpoint::with_viewpoints(vec![self.best_snapshot().hash]);
        view.fetch_utxos_main(&self.utxos, &needed)?;
        Ok(view)
    }

    /// Bits a block mined on the current main tip at `timestamp_ms` must declare.
    pub fn calc_next_required_difficulty(&self, timestamp_ms: u64, pow_type: PowType) -> ChainResult<u32> {
        let _guard = self.chain_lock.read();
        let Some(tip) = self.dag.main_tip() else {
            return fatal("dag has no main tip");
        };
        Ok(self.difficulty.required_difficulty(tip.as_ref(), timestamp_ms, pow_type))
    }

    /// Token supplies as of the block with DAG id `block_id`.
    pub fn token_state(&self, block_id: u64) -> ChainResult<Option<TokenState>> {
        let _guard = self.chain_lock.read();
        Ok(self.tokens.get(block_id)?)
    }

    pub fn spend_journal(&self, hash: &Hash) -> ChainResult<Option<Vec<SpentTxOut>>> {
        let _guard = self.chain_lock.read();
        Ok(self.journal.get(hash)?)
    }

    /// The persisted best-chain record.
    pub fn chain_record(&self) -> ChainResult<BestChainState> {
        let _guard = self.chain_lock.read();
        Ok(self.chain_state.get()?.unwrap_or_default())
    }

    /// Closes the database; later calls fail with a storage error.
    pub fn close(&self) {
        let _guard = self.chain_lock.write();
        self.db.close();
        info!("Chain database closed");
    }
}
