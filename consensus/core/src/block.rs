use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::header::Header;
use crate::merkle::calc_tx_root;
use crate::tx::Transaction;
use crate::Hash;

/// Complete block structure including header and transactions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Block {
    /// Block header containing metadata and parent information
    pub header: Header,
    /// List of transactions in the block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block with the given header and transactions
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Recomputes the merkle root of the block's transactions
    pub fn calc_tx_root(&self) -> Hash {
        calc_tx_root(&self.transactions)
    }

    /// Size of the canonical (borsh) encoding in bytes
    pub fn serialized_size(&self) -> usize {
        borsh::object_length(self).unwrap_or(usize::MAX)
    }

    pub fn parents(&self) -> &[Hash] {
        &self.header.parents
    }
}
