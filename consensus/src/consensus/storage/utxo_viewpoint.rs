//! UTXO viewpoint
//!
//! A scoped working set of unspent outputs as seen from a set of blocks. The
//! engine loads the entries a block touches, applies or reverts the block in
//! memory, then writes the modified entries back in the same batch as the
//! spend journal. Each block connection gets its own view.

use consensus_core::block::Block;
use consensus_core::script::is_unspendable;
use consensus_core::tx::{Amount, Transaction, TransactionId, TransactionOutpoint};
use consensus_core::utxo::{SpentTxOut, TxoFlags, UtxoEntry, UtxoKeyBuf};
use consensus_core::Hash;
use database::stores::UtxoStore;
use database::{DbResult, StoreBatch};
use std::collections::{HashMap, HashSet};

use crate::errors::{fatal, ChainResult};

/// Whether output `index` of `tx` ever enters the UTXO set.
fn creates_utxo(tx: &Transaction, index: usize) -> bool {
    !(tx.is_export() && index == 0) && !is_unspendable(&tx.outputs[index].pk_script)
}

/// Ids of a block's transactions mapped to their position.
fn tx_positions(block: &Block) -> HashMap<TransactionId, usize> {
    block.transactions.iter().enumerate().map(|(i, tx)| (tx.id(), i)).collect()
}

/// Whether `outpoint` refers to a transaction placed before `tx_index` in the same block.
fn spends_in_block(positions: &HashMap<TransactionId, usize>, outpoint: &TransactionOutpoint, tx_index: usize) -> bool {
    positions.get(&outpoint.transaction_id).is_some_and(|&i| i < tx_index)
}

/// Number of spend-journal records connecting `block` produces.
pub fn count_spent_outputs(block: &Block) -> usize {
    let positions = tx_positions(block);
    block
        .transactions
        .iter()
        .enumerate()
        .filter(|(_, tx)| tx.spends_utxos())
        .map(|(i, tx)| tx.inputs.iter().filter(|input| !spends_in_block(&positions, &input.previous_outpoint, i)).count())
        .sum()
}

#[derive(Debug, Clone, Default)]
pub struct UtxoViewpoint {
    entries: HashMap<TransactionOutpoint, UtxoEntry>,
    viewpoints: Vec<Hash>,
}

impl UtxoViewpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewpoints(viewpoints: Vec<Hash>) -> Self {
        Self { entries: HashMap::new(), viewpoints }
    }

    /// Blocks whose effects this view represents
    pub fn viewpoints(&self) -> &[Hash] {
        &self.viewpoints
    }

    pub fn entries(&self) -> &HashMap<TransactionOutpoint, UtxoEntry> {
        &self.entries
    }

    pub fn lookup_entry(&self, outpoint: &TransactionOutpoint) -> Option<&UtxoEntry> {
        self.entries.get(outpoint)
    }

    pub fn add_entry(&mut self, outpoint: TransactionOutpoint, entry: UtxoEntry) {
        self.entries.insert(outpoint, entry);
    }

    /// Marks an entry spent; missing and already spent entries are left alone.
    pub fn spend_entry(&mut self, outpoint: &TransactionOutpoint) {
        if let Some(entry) = self.entries.get_mut(outpoint) {
            entry.spend();
        }
    }

    pub fn add_tx_out(&mut self, tx: &Transaction, index: usize, block_hash: Hash) {
        if index >= tx.outputs.len() || !creates_utxo(tx, index) {
            return;
        }
        let output = &tx.outputs[index];
        let mut entry = UtxoEntry::new(output.amount, output.pk_script.clone(), block_hash, tx.is_coinbase());
        entry.flags.insert(TxoFlags::MODIFIED);
        self.entries.insert(TransactionOutpoint::new(tx.id(), index as u32), entry);
    }

    /// Adds every output of `tx` that can be spent later.
    pub fn add_tx_outs(&mut self, tx: &Transaction, block_hash: Hash) {
        for index in 0..tx.outputs.len() {
            self.add_tx_out(tx, index, block_hash);
        }
    }

    /// Spends the inputs of `tx` and adds its outputs. Every spent input that
    /// predates the block is appended to `stxos`.
    pub fn connect_transaction(
        &mut self,
        tx: &Transaction,
        tx_index: usize,
        block_hash: Hash,
        in_block: &HashMap<TransactionId, usize>,
        fees: Amount,
        mut stxos: Option<&mut Vec<SpentTxOut>>,
    ) -> ChainResult<()> {
        if tx.spends_utxos() {
            for (in_index, input) in tx.inputs.iter().enumerate() {
                let Some(entry) = self.entries.get_mut(&input.previous_outpoint) else {
                    return fatal(format!("view does not contain referenced output {}", input.previous_outpoint));
                };
                if !spends_in_block(in_block, &input.previous_outpoint, tx_index) {
                    if let Some(stxos) = stxos.as_deref_mut() {
                        let mut stxo = SpentTxOut::from_entry(entry, tx_index as u32, in_index as u32);
                        stxo.fees = fees;
                        stxos.push(stxo);
                    }
                }
                entry.spend();
            }
        }
        self.add_tx_outs(tx, block_hash);
        Ok(())
    }

    /// Connects every transaction of `block` with no fee accounting.
    pub fn connect_transactions(&mut self, block: &Block, mut stxos: Option<&mut Vec<SpentTxOut>>) -> ChainResult<()> {
        let block_hash = block.hash();
        let positions = tx_positions(block);
        for (index, tx) in block.transactions.iter().enumerate() {
            self.connect_transaction(tx, index, block_hash, &positions, Amount::default(), stxos.as_deref_mut())?;
        }
        Ok(())
    }

    /// Exact inverse of connecting `block`: its outputs are marked spent and
    /// the outputs it consumed are restored from the journal, walking both in
    /// reverse.
    pub fn disconnect_transactions(&mut self, block: &Block, stxos: &[SpentTxOut]) -> ChainResult<()> {
        let block_hash = block.hash();
        let positions = tx_positions(block);
        let mut remaining = stxos.len();

        for (tx_index, tx) in block.transactions.iter().enumerate().rev() {
            for index in 0..tx.outputs.len() {
                if !creates_utxo(tx, index) {
                    continue;
                }
                let outpoint = TransactionOutpoint::new(tx.id(), index as u32);
                let entry = self.entries.entry(outpoint).or_insert_with(|| {
                    let output = &tx.outputs[index];
                    UtxoEntry::new(output.amount, output.pk_script.clone(), block_hash, tx.is_coinbase())
                });
                entry.spend();
            }

            if !tx.spends_utxos() {
                continue;
            }
            for input in tx.inputs.iter().rev() {
                if spends_in_block(&positions, &input.previous_outpoint, tx_index) {
                    continue;
                }
                if remaining == 0 {
                    return fatal(format!("spend journal of block {} ran out at tx {}", block_hash, tx_index));
                }
                remaining -= 1;
                let stxo = &stxos[remaining];
                let mut entry = UtxoEntry::new(stxo.amount, stxo.pk_script.clone(), stxo.block_hash, stxo.is_coinbase);
                entry.flags.insert(TxoFlags::MODIFIED);
                self.entries.insert(input.previous_outpoint, entry);
            }
        }
        if remaining != 0 {
            return fatal(format!("{} spend journal entries of block {} were not consumed", remaining, block_hash));
        }
        Ok(())
    }

    /// Loads the given outpoints from the persisted set unless already
    /// present. A missing key means the output is fully spent.
    pub fn fetch_utxos_main(&mut self, store: &UtxoStore, outpoints: &HashSet<TransactionOutpoint>) -> DbResult<()> {
        let mut keys = UtxoKeyBuf::new();
        for outpoint in outpoints {
            if self.entries.contains_key(outpoint) {
                continue;
            }
            if let Some(entry) = store.get_entry(&mut keys, outpoint)? {
                self.entries.insert(*outpoint, entry);
            }
        }
        Ok(())
    }

    pub fn fetch_utxos(&mut self, store: &UtxoStore, outpoints: &HashSet<TransactionOutpoint>) -> DbResult<()> {
        let missing: HashSet<TransactionOutpoint> = outpoints.iter().filter(|o| !self.entries.contains_key(o)).copied().collect();
        if missing.is_empty() {
            return Ok(());
        }
        self.fetch_utxos_main(store, &missing)
    }

    /// Loads every output `block` spends. Outputs created earlier in the same
    /// block come from the block itself.
    pub fn fetch_input_utxos(&mut self, store: &UtxoStore, block: &Block) -> DbResult<()> {
        let block_hash = block.hash();
        let positions = tx_positions(block);
        let mut needed = HashSet::new();
        for (tx_index, tx) in block.transactions.iter().enumerate() {
            if !tx.spends_utxos() {
                continue;
            }
            for input in &tx.inputs {
                let outpoint = input.previous_outpoint;
                if spends_in_block(&positions, &outpoint, tx_index) {
                    let origin = &block.transactions[positions[&outpoint.transaction_id]];
                    self.add_tx_outs(origin, block_hash);
                    continue;
                }
                if !self.entries.contains_key(&outpoint) {
                    needed.insert(outpoint);
                }
            }
        }
        self.fetch_utxos(store, &needed)
    }

    /// Loads the current entries of every output `block` creates.
    pub fn fetch_output_utxos(&mut self, store: &UtxoStore, block: &Block) -> DbResult<()> {
        let needed: HashSet<TransactionOutpoint> = block
            .transactions
            .iter()
            .flat_map(|tx| (0..tx.outputs.len() as u32).map(move |i| TransactionOutpoint::new(tx.id(), i)))
            .collect();
        self.fetch_utxos(store, &needed)
    }

    /// Stages every modified entry: spent ones are deleted, the rest written.
    pub fn write_to(&self, store: &UtxoStore, batch: &mut StoreBatch<'_>) -> DbResult<()> {
        let mut keys = UtxoKeyBuf::new();
        for (outpoint, entry) in self.entries.iter().filter(|(_, e)| e.is_modified()) {
            if entry.is_spent() {
                store.delete_entry(batch, &mut keys, outpoint)?;
            } else {
                store.put_entry(batch, &mut keys, outpoint, entry)?;
            }
        }
        Ok(())
    }

    /// Drops spent entries and clears the modified flag of the rest.
    pub fn commit(&mut self) {
        self.entries.retain(|_, entry| !(entry.is_spent() && entry.is_modified()));
        for entry in self.entries.values_mut() {
            entry.flags.remove(TxoFlags::MODIFIED);
        }
    }

    pub(crate) fn positions(block: &Block) -> HashMap<TransactionId, usize> {
        tx_positions(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::header::Header;
    use consensus_core::pow::PowType;
    use consensus_core::script::{null_data, pay_to_pubkey_hash};
    use consensus_core::tx::{TransactionInput, TransactionOutput, TxType};
    use database::Database;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn spend(outpoint: TransactionOutpoint, value: u64, salt: u8) -> Transaction {
        Transaction::new(
            TxType::Regular,
            vec![TransactionInput::new(outpoint, vec![salt], u32::MAX)],
            vec![TransactionOutput::new(Amount::base(value), pay_to_pubkey_hash(&[salt; 20]))],
            0,
            Vec::new(),
        )
    }

    fn block_with(txs: Vec<Transaction>) -> Block {
        let header = Header {
            version: 1,
            parents: vec![Hash::from_u64_word(1)],
            tx_root: Hash::default(),
            state_root: Hash::default(),
            timestamp: 5_000,
            bits: 0x207f_ffff,
            pow_type: PowType::Sha256d,
            nonce: 0,
        };
        Block::new(header, txs)
    }

    fn coinbase(salt: u8) -> Transaction {
        Transaction::new(
            TxType::Coinbase,
            Vec::new(),
            vec![
                TransactionOutput::new(Amount::base(50), pay_to_pubkey_hash(&[0xaa; 20])),
                TransactionOutput::new(Amount::base(0), null_data(&[salt])),
            ],
            0,
            vec![salt],
        )
    }

    fn persisted(entries: &[(TransactionOutpoint, UtxoEntry)]) -> UtxoViewpoint {
        let mut view = UtxoViewpoint::new();
        for (outpoint, entry) in entries {
            view.add_entry(*outpoint, entry.clone());
        }
        view
    }

    fn prior_outputs() -> Vec<(TransactionOutpoint, UtxoEntry)> {
        (0..2u8)
            .map(|i| {
                let outpoint = TransactionOutpoint::new(Hash::from_u64_word(100 + i as u64), 0);
                (outpoint, UtxoEntry::new(Amount::base(40), pay_to_pubkey_hash(&[i; 20]), Hash::from_u64_word(7), i == 0))
            })
            .collect()
    }

    #[test]
    fn test_connect_then_disconnect_restores_view() {
        let prior = prior_outputs();
        let tx1 = spend(prior[0].0, 30, 1);
        let tx2 = spend(TransactionOutpoint::new(tx1.id(), 0), 20, 2);
        let tx3 = spend(prior[1].0, 10, 3);
        let block = block_with(vec![coinbase(9), tx1.clone(), tx2, tx3]);

        let mut view = persisted(&prior);
        let mut stxos = Vec::new();
        view.connect_transactions(&block, Some(&mut stxos)).unwrap();
        // the in-block spend of tx1's output is not journaled
        assert_eq!(stxos.len(), 2);
        assert_eq!(stxos.len(), count_spent_outputs(&block));
        assert_eq!(stxos[0].tx_index, 1);
        assert_eq!(stxos[1].tx_index, 3);
        assert!(stxos[0].is_coinbase);
        view.commit();
        assert!(view.lookup_entry(&prior[0].0).is_none());
        assert!(view.lookup_entry(&TransactionOutpoint::new(tx1.id(), 0)).is_none());
        // coinbase null-data output never enters the set
        assert_eq!(view.entries().len(), 3);

        view.disconnect_transactions(&block, &stxos).unwrap();
        view.commit();
        let restored: HashMap<_, _> = view.entries().clone();
        let expected: HashMap<_, _> = prior.into_iter().collect();
        assert_eq!(restored, expected);
    }

    #[test]
    fn test_disconnect_rejects_journal_mismatch() {
        let prior = prior_outputs();
        let block = block_with(vec![coinbase(1), spend(prior[0].0, 30, 1)]);
        let mut view = persisted(&prior);
        let mut stxos = Vec::new();
        view.connect_transactions(&block, Some(&mut stxos)).unwrap();

        let mut short = view.clone();
        assert!(short.disconnect_transactions(&block, &[]).unwrap_err().is_fatal());
        let mut long = stxos.clone();
        long.push(stxos[0].clone());
        assert!(view.disconnect_transactions(&block, &long).unwrap_err().is_fatal());
    }

    #[test]
    fn test_connect_missing_input_is_fatal() {
        let block = block_with(vec![coinbase(1), spend(TransactionOutpoint::new(Hash::from_u64_word(5), 0), 1, 1)]);
        let mut view = UtxoViewpoint::new();
        assert!(view.connect_transactions(&block, None).unwrap_err().is_fatal());
    }

    #[test]
    fn test_export_marker_output_is_skipped() {
        let tx = Transaction::new(
            TxType::CrossChainExport,
            Vec::new(),
            vec![
                TransactionOutput::new(Amount::base(5), pay_to_pubkey_hash(&[1; 20])),
                TransactionOutput::new(Amount::base(6), pay_to_pubkey_hash(&[2; 20])),
            ],
            0,
            Vec::new(),
        );
        let mut view = UtxoViewpoint::new();
        view.add_tx_outs(&tx, Hash::from_u64_word(3));
        assert!(view.lookup_entry(&TransactionOutpoint::new(tx.id(), 0)).is_none());
        assert!(view.lookup_entry(&TransactionOutpoint::new(tx.id(), 1)).unwrap().is_modified());
    }

    #[test]
    fn test_fetch_and_write_through_store() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let store = UtxoStore::new(db.clone());
        let prior = prior_outputs();

        let mut seed = UtxoViewpoint::new();
        for (outpoint, entry) in &prior {
            let mut entry = entry.clone();
            entry.flags.insert(TxoFlags::MODIFIED);
            seed.add_entry(*outpoint, entry);
        }
        let mut batch = db.batch();
        seed.write_to(&store, &mut batch).unwrap();
        db.commit(batch).unwrap();

        let tx1 = spend(prior[0].0, 30, 1);
        let tx2 = spend(TransactionOutpoint::new(tx1.id(), 0), 20, 2);
        let block = block_with(vec![coinbase(4), tx1, tx2]);
        let mut view = UtxoViewpoint::with_viewpoints(vec![block.hash()]);
        view.fetch_input_utxos(&store, &block).unwrap();
        assert!(view.lookup_entry(&prior[0].0).is_some());
        assert!(view.lookup_entry(&prior[1].0).is_none());

        let mut stxos = Vec::new();
        view.connect_transactions(&block, Some(&mut stxos)).unwrap();
        let mut batch = db.batch();
        view.write_to(&store, &mut batch).unwrap();
        db.commit(batch).unwrap();
        view.commit();

        let mut keys = UtxoKeyBuf::new();
        assert!(store.get_entry(&mut keys, &prior[0].0).unwrap().is_none());
        assert!(store.get_entry(&mut keys, &prior[1].0).unwrap().is_some());
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(view.viewpoints(), &[block.hash()]);
    }
}
