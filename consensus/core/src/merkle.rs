use crate::tx::Transaction;
use crate::Hash;
use crypto_hashes::HashWriter;

/// Computes the merkle root of the given leaves. An odd node at any level is
/// paired with itself; an empty set yields the zero hash.
pub fn merkle_root(mut level: Vec<Hash>) -> Hash {
    if level.is_empty() {
        return Hash::default();
    }
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|chunk| {
                let left = chunk[0];
                let right = if chunk.len() == 2 { chunk[1] } else { left };
                hash_pair(&left, &right)
            })
            .collect();
    }
    level[0]
}

/// Merkle root over the ids of `transactions`.
pub fn calc_tx_root(transactions: &[Transaction]) -> Hash {
    merkle_root(transactions.iter().map(|tx| tx.id()).collect())
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut writer = HashWriter::new();
    writer.update(left).update(right);
    writer.finalize_double()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_leaf_is_root() {
        let leaf = Hash::from_u64_word(9);
        assert_eq!(merkle_root(vec![leaf]), leaf);
    }

    #[test]
    fn test_odd_leaf_is_duplicated() {
        let a = Hash::from_u64_word(1);
        let b = Hash::from_u64_word(2);
        let c = Hash::from_u64_word(3);
        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &c));
        assert_eq!(merkle_root(vec![a, b, c]), expected);
    }

    #[test]
    fn test_order_matters() {
        let a = Hash::from_u64_word(1);
        let b = Hash::from_u64_word(2);
        assert_ne!(merkle_root(vec![a, b]), merkle_root(vec![b, a]));
        assert_eq!(merkle_root(vec![]), Hash::default());
    }
}
