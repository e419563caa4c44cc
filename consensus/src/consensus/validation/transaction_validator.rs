//! Transaction validation
//!
//! Context-free sanity checks run at admission; input checks run when the
//! containing block is connected against a UTXO viewpoint.

use consensus_core::config::params::Params;
use consensus_core::constants::{LOCK_TIME_THRESHOLD, MAX_AMOUNT, MAX_TX_IN_SEQUENCE};
use consensus_core::errors::RuleResult;
use consensus_core::rule_err;
use consensus_core::tx::{Amount, CoinId, Transaction, TxType, BASE_COIN};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::consensus::dag::BlockDag;
use crate::consensus::storage::UtxoViewpoint;

/// Per-coin totals of a transaction's outputs, rejecting overflow.
fn output_totals(tx: &Transaction) -> RuleResult<BTreeMap<CoinId, u64>> {
    let mut totals: BTreeMap<CoinId, u64> = BTreeMap::new();
    for (index, output) in tx.outputs.iter().enumerate() {
        if output.amount.value > MAX_AMOUNT {
            return rule_err!(BadTxOutValue, "output {} of tx {} is above the max amount", index, tx.id());
        }
        let total = totals.entry(output.amount.id).or_default();
        *total = match total.checked_add(output.amount.value) {
            Some(sum) if sum <= MAX_AMOUNT => sum,
            _ => return rule_err!(BadTxOutValue, "outputs of tx {} overflow coin {}", tx.id(), output.amount.id),
        };
    }
    Ok(totals)
}

/// Structural checks that need no chain context.
pub fn check_transaction_sanity(tx: &Transaction) -> RuleResult<()> {
    if tx.spends_utxos() && tx.inputs.is_empty() {
        return rule_err!(NoTxInputs, "tx {} has no inputs", tx.id());
    }
    if tx.outputs.is_empty() {
        return rule_err!(NoTxOutputs, "tx {} has no outputs", tx.id());
    }
    output_totals(tx)?;

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(input.previous_outpoint) {
            return rule_err!(DuplicateTxInputs, "tx {} spends {} twice", tx.id(), input.previous_outpoint);
        }
    }
    Ok(())
}

/// Lock time below the threshold is a height, otherwise unix seconds.
pub fn is_finalized(tx: &Transaction, height: u64, median_time_ms: u64) -> bool {
    if tx.lock_time == 0 {
        return true;
    }
    let bound = if tx.lock_time < LOCK_TIME_THRESHOLD { height } else { median_time_ms / 1000 };
    if tx.lock_time < bound {
        return true;
    }
    tx.inputs.iter().all(|input| input.sequence == MAX_TX_IN_SEQUENCE)
}

/// Connect-time input checks against a viewpoint.
pub struct TransactionValidator {
    params: Arc<Params>,
}

impl TransactionValidator {
    pub fn new(params: Arc<Params>) -> Self {
        Self { params }
    }

    /// Validates the inputs of `tx`, spent from a block with `spender_blue_score`,
    /// and returns the fee it pays in the base coin.
    pub fn check_transaction_inputs(
        &self,
        tx: &Transaction,
        spender_blue_score: u64,
        view: &UtxoViewpoint,
        dag: &dyn BlockDag,
    ) -> RuleResult<Amount> {
        if !tx.spends_utxos() {
            return Ok(Amount::base(0));
        }

        let mut inputs: BTreeMap<CoinId, u64> = BTreeMap::new();
        for input in &tx.inputs {
            let outpoint = &input.previous_outpoint;
            let entry = match view.lookup_entry(outpoint) {
                Some(entry) if !entry.is_spent() => entry,
                _ => return rule_err!(MissingTxOut, "output {} referenced by tx {} is missing or spent", outpoint, tx.id()),
            };

            if entry.is_coinbase() {
                let Some(origin) = dag.get(&entry.block_hash) else {
                    return rule_err!(MissingTxOut, "origin block {} of output {} is unknown", entry.block_hash, outpoint);
                };
                let confirmations = spender_blue_score.saturating_sub(origin.blue_score());
                if confirmations < self.params.coinbase_maturity {
                    return rule_err!(
                        ImmatureSpend,
                        "tx {} spends coinbase output {} after {} of {} confirmations",
                        tx.id(),
                        outpoint,
                        confirmations,
                        self.params.coinbase_maturity
                    );
                }
            }

            if entry.amount.value > MAX_AMOUNT {
                return rule_err!(BadTxOutValue, "output {} holds more than the max amount", outpoint);
            }
            let total = inputs.entry(entry.amount.id).or_default();
            *total = match total.checked_add(entry.amount.value) {
                Some(sum) if sum <= MAX_AMOUNT => sum,
                _ => return rule_err!(BadTxOutValue, "inputs of tx {} overflow coin {}", tx.id(), entry.amount.id),
            };
        }
        let outputs = output_totals(tx)?;

        let coins: HashSet<CoinId> = inputs.keys().chain(outputs.keys()).copied().collect();
        let mut fee = 0u64;
        for coin in coins {
            let spent = inputs.get(&coin).copied().unwrap_or(0);
            let created = outputs.get(&coin).copied().unwrap_or(0);
            if coin == BASE_COIN {
                if spent < created {
                    return rule_err!(SpendTooHigh, "tx {} spends {} but creates {} of the base coin", tx.id(), spent, created);
                }
                fee = spent - created;
                continue;
            }
            let minted = tx.tx_type == TxType::TokenMint && created > spent;
            let burned = tx.tx_type == TxType::TokenUnmint && spent > created;
            if spent < created && !minted {
                return rule_err!(SpendTooHigh, "tx {} creates {} of coin {} from {}", tx.id(), created, coin, spent);
            }
            if spent > created && !burned {
                return rule_err!(BadFees, "tx {} pays a fee in coin {}", tx.id(), coin);
            }
        }
        Ok(Amount::base(fee))
    }
}
