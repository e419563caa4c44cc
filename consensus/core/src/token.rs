use borsh::{BorshDeserialize, BorshSerialize};
use crypto_hashes::HashWriter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::tx::CoinId;
use crate::Hash;

/// Circulating supply of every issued token, as of some DAG block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TokenState {
    pub supplies: BTreeMap<CoinId, u64>,
    /// Id of the block whose connection produced this state
    pub block_id: u64,
}

impl TokenState {
    pub fn supply(&self, coin: CoinId) -> u64 {
        self.supplies.get(&coin).copied().unwrap_or(0)
    }

    /// Commitment over the supplies; the block id is not part of it.
    pub fn hash(&self) -> Hash {
        let mut writer = HashWriter::new();
        BorshSerialize::serialize(&self.supplies, &mut writer).expect("writing to a hasher never fails");
        writer.finalize_double()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_ignores_block_id() {
        let mut a = TokenState::default();
        a.supplies.insert(7, 100);
        let mut b = a.clone();
        b.block_id = 99;
        assert_eq!(a.hash(), b.hash());
        b.supplies.insert(7, 101);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(b.supply(7), 101);
        assert_eq!(b.supply(8), 0);
    }
}
