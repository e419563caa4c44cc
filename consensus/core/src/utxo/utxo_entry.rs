use bitflags::bitflags;

use crate::tx::Amount;
use crate::Hash;

bitflags! {
    /// State bits of a UTXO entry inside a viewpoint.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TxoFlags: u8 {
        /// Created by a coinbase transaction
        const COINBASE = 0b001;
        /// Consumed by a transaction connected in this view
        const SPENT = 0b010;
        /// Differs from the persisted UTXO set and must be written back
        const MODIFIED = 0b100;
    }
}

/// An unspent transaction output together with the block that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoEntry {
    pub amount: Amount,
    pub pk_script: Vec<u8>,
    pub block_hash: Hash,
    pub flags: TxoFlags,
}

impl UtxoEntry {
    pub fn new(amount: Amount, pk_script: Vec<u8>, block_hash: Hash, is_coinbase: bool) -> Self {
        let flags = if is_coinbase { TxoFlags::COINBASE } else { TxoFlags::empty() };
        Self { amount, pk_script, block_hash, flags }
    }

    pub fn is_coinbase(&self) -> bool {
        self.flags.contains(TxoFlags::COINBASE)
    }

    pub fn is_spent(&self) -> bool {
        self.flags.contains(TxoFlags::SPENT)
    }

    pub fn is_modified(&self) -> bool {
        self.flags.contains(TxoFlags::MODIFIED)
    }

    /// Marks the output as spent. Spending an already spent entry is a no-op.
    pub fn spend(&mut self) {
        if self.is_spent() {
            return;
        }
        self.flags.insert(TxoFlags::SPENT | TxoFlags::MODIFIED);
    }
}

/// One spend-journal record: everything needed to restore an output a block
/// consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpentTxOut {
    pub amount: Amount,
    /// Fee paid by the spending transaction
    pub fees: Amount,
    pub pk_script: Vec<u8>,
    pub block_hash: Hash,
    pub is_coinbase: bool,
    /// Index of the spending transaction within its block
    pub tx_index: u32,
    /// Index of the spending input within its transaction
    pub tx_in_index: u32,
}

impl SpentTxOut {
    pub fn from_entry(entry: &UtxoEntry, tx_index: u32, tx_in_index: u32) -> Self {
        Self {
            amount: entry.amount,
            fees: Amount::default(),
            pk_script: entry.pk_script.clone(),
            block_hash: entry.block_hash,
            is_coinbase: entry.is_coinbase(),
            tx_index,
            tx_in_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_is_idempotent() {
        let mut entry = UtxoEntry::new(Amount::base(10), vec![0x51], Hash::from_u64_word(1), true);
        assert!(entry.is_coinbase() && !entry.is_spent() && !entry.is_modified());
        entry.spend();
        let once = entry.clone();
        entry.spend();
        assert_eq!(entry, once);
        assert!(entry.is_spent() && entry.is_modified() && entry.is_coinbase());
    }
}
