//!
//! # Transaction
//!
//! This module implements the consensus [`Transaction`] structure and related types.
//!

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::constants::TX_VERSION;
use crate::hashing;
use crate::Hash;

/// COINBASE_TRANSACTION_INDEX is the index of the coinbase transaction in every block
pub const COINBASE_TRANSACTION_INDEX: usize = 0;

/// A 32-byte transaction identifier.
pub type TransactionId = Hash;

/// Identifies the asset an amount is denominated in.
pub type CoinId = u16;

/// The chain's native coin; fees and subsidy are paid in it.
pub const BASE_COIN: CoinId = 0;

/// A value together with the asset it is denominated in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Amount {
    pub value: u64,
    pub id: CoinId,
}

impl Amount {
    pub const fn new(value: u64, id: CoinId) -> Self {
        Self { value, id }
    }

    pub const fn base(value: u64) -> Self {
        Self { value, id: BASE_COIN }
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (coin {})", self.value, self.id)
    }
}

/// Represents a transaction outpoint
#[derive(Eq, Default, Hash, PartialEq, Debug, Copy, Clone, Serialize, Deserialize, BorshSerialize, BorshDeserialize, PartialOrd, Ord)]
pub struct TransactionOutpoint {
    pub transaction_id: TransactionId,
    pub index: u32,
}

impl TransactionOutpoint {
    pub fn new(transaction_id: TransactionId, index: u32) -> Self {
        Self { transaction_id, index }
    }
}

impl Display for TransactionOutpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.transaction_id, self.index)
    }
}

/// Represents a transaction input
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TransactionInput {
    pub previous_outpoint: TransactionOutpoint,
    pub signature_script: Vec<u8>,
    pub sequence: u32,
}

impl TransactionInput {
    pub fn new(previous_outpoint: TransactionOutpoint, signature_script: Vec<u8>, sequence: u32) -> Self {
        Self { previous_outpoint, signature_script, sequence }
    }
}

/// Represents a transaction output
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TransactionOutput {
    pub amount: Amount,
    pub pk_script: Vec<u8>,
}

impl TransactionOutput {
    pub fn new(amount: Amount, pk_script: Vec<u8>) -> Self {
        Self { amount, pk_script }
    }
}

/// Transaction kinds the UTXO layer treats differently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum TxType {
    #[default]
    Regular = 0,
    /// First transaction of every block, creates the subsidy
    Coinbase = 1,
    /// Moves base coin to the side chain; output 0 is the export marker
    CrossChainExport = 2,
    /// Brings value back from the side chain; inputs reference the side chain
    CrossChainImport = 3,
    /// Issues token supply; outputs in a token coin need no matching inputs
    TokenMint = 4,
    /// Burns token supply; token inputs need no matching outputs
    TokenUnmint = 5,
}

/// Represents a transaction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    pub version: u32,
    pub tx_type: TxType,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u64,
    pub payload: Vec<u8>,

    // A field that is used to cache the transaction ID.
    // Always use the corresponding self.id() instead of accessing this field directly
    id: TransactionId,
}

impl Transaction {
    pub fn new(
        tx_type: TxType,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        lock_time: u64,
        payload: Vec<u8>,
    ) -> Self {
        let mut tx = Self { version: TX_VERSION, tx_type, inputs, outputs, lock_time, payload, id: Default::default() };
        tx.finalize();
        tx
    }

    /// Recomputes the cached id. Must be called after mutating any field.
    pub fn finalize(&mut self) {
        self.id = hashing::tx::id(self);
    }

    /// Returns the transaction ID
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn is_coinbase(&self) -> bool {
        self.tx_type == TxType::Coinbase
    }

    pub fn is_import(&self) -> bool {
        self.tx_type == TxType::CrossChainImport
    }

    pub fn is_export(&self) -> bool {
        self.tx_type == TxType::CrossChainExport
    }

    /// Whether the inputs of this transaction consume entries of the UTXO set.
    pub fn spends_utxos(&self) -> bool {
        !self.is_coinbase() && !self.is_import()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction::new(
            TxType::Regular,
            vec![TransactionInput::new(TransactionOutpoint::new(Hash::from_u64_word(7), 1), vec![1, 2], 0)],
            vec![TransactionOutput::new(Amount::base(50), vec![0x51])],
            0,
            vec![],
        )
    }

    #[test]
    fn test_id_is_cached_and_deterministic() {
        let tx = sample_tx();
        assert_eq!(tx.id(), sample_tx().id());
        assert_ne!(tx.id(), Hash::default());
    }

    #[test]
    fn test_id_changes_after_finalize() {
        let mut tx = sample_tx();
        let before = tx.id();
        tx.outputs[0].amount.value = 51;
        assert_eq!(tx.id(), before);
        tx.finalize();
        assert_ne!(tx.id(), before);
    }

    #[test]
    fn test_type_predicates() {
        let mut tx = sample_tx();
        assert!(tx.spends_utxos());
        tx.tx_type = TxType::CrossChainImport;
        assert!(tx.is_import() && !tx.spends_utxos());
        tx.tx_type = TxType::Coinbase;
        assert!(tx.is_coinbase() && !tx.spends_utxos());
    }
}
