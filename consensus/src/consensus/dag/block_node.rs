use consensus_core::block::Block;
use consensus_core::header::Header;
use consensus_core::pow::PowType;
use consensus_core::Hash;
use std::sync::Arc;

/// A raw block on its way into the DAG, together with the main parent the
/// provider picked for it.
#[derive(Debug, Clone)]
pub struct BlockNode {
    block: Arc<Block>,
    hash: Hash,
    main_parent: Option<Hash>,
}

impl BlockNode {
    pub fn new(block: Arc<Block>, main_parent: Option<Hash>) -> Self {
        let hash = block.hash();
        Self { block, hash, main_parent }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn block(&self) -> &Arc<Block> {
        &self.block
    }

    pub fn header(&self) -> &Header {
        &self.block.header
    }

    pub fn parents(&self) -> &[Hash] {
        &self.block.header.parents
    }

    pub fn main_parent(&self) -> Option<Hash> {
        self.main_parent
    }

    pub fn timestamp(&self) -> u64 {
        self.block.header.timestamp
    }

    pub fn bits(&self) -> u32 {
        self.block.header.bits
    }

    pub fn pow_type(&self) -> PowType {
        self.block.header.pow_type
    }
}
