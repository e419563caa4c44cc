//! Token supply ledger
//!
//! Supply only changes through mint and unmint transactions; every other
//! transaction conserves its token amounts, which the input checks enforce.

use consensus_core::block::Block;
use consensus_core::errors::RuleResult;
use consensus_core::rule_err;
use consensus_core::token::TokenState;
use consensus_core::tx::{CoinId, Transaction, TxType, BASE_COIN};
use std::collections::BTreeMap;

use crate::consensus::storage::UtxoViewpoint;
use crate::interfaces::TokenLedger;

#[derive(Debug, Default, Clone, Copy)]
pub struct SupplyLedger;

impl SupplyLedger {
    pub fn new() -> Self {
        Self
    }
}

/// Token amounts a transaction consumes and creates, base coin excluded.
fn token_flows(tx: &Transaction, view: &UtxoViewpoint) -> BTreeMap<CoinId, (u128, u128)> {
    let mut flows: BTreeMap<CoinId, (u128, u128)> = BTreeMap::new();
    for input in &tx.inputs {
        if let Some(entry) = view.lookup_entry(&input.previous_outpoint) {
            if entry.amount.id != BASE_COIN {
                flows.entry(entry.amount.id).or_default().0 += u128::from(entry.amount.value);
            }
        }
    }
    for output in tx.outputs.iter().filter(|o| o.amount.id != BASE_COIN) {
        flows.entry(output.amount.id).or_default().1 += u128::from(output.amount.value);
    }
    flows
}

impl TokenLedger for SupplyLedger {
    fn genesis_state(&self) -> TokenState {
        TokenState::default()
    }

    fn update(&self, prev: &TokenState, block: &Block, view: &UtxoViewpoint) -> RuleResult<TokenState> {
        let mut next = prev.clone();
        for tx in &block.transactions {
            if !matches!(tx.tx_type, TxType::TokenMint | TxType::TokenUnmint) {
                continue;
            }
            for (coin, (consumed, created)) in token_flows(tx, view) {
                let supply = u128::from(next.supply(coin));
                let updated = match tx.tx_type {
                    TxType::TokenMint => supply + created.saturating_sub(consumed),
                    _ => match supply.checked_sub(consumed.saturating_sub(created)) {
                        Some(left) => left,
                        None => {
                            return rule_err!(BadTokenAmount, "tx {} burns more of coin {} than its supply {}", tx.id(), coin, supply)
                        }
                    },
                };
                let Ok(updated) = u64::try_from(updated) else {
                    return rule_err!(BadTokenAmount, "supply of coin {} overflows after tx {}", coin, tx.id());
                };
                if updated == 0 {
                    next.supplies.remove(&coin);
                } else {
                    next.supplies.insert(coin, updated);
                }
            }
        }
        Ok(next)
    }
}
