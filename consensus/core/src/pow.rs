//! Proof-of-work algorithms
//!
//! Every block declares the algorithm it was mined with. Difficulty is tracked
//! per algorithm: each has its own limit and its own retarget window.

use borsh::{BorshDeserialize, BorshSerialize};
use crypto_hashes::{blake2bd, double_sha256, keccak256};
use jio_math::{compact_to_target, U256};
use serde::{Deserialize, Serialize};

use crate::Hash;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[serde(rename_all = "lowercase")]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum PowType {
    #[default]
    Sha256d = 0,
    Blake2bd = 1,
    Keccak256 = 2,
}

impl PowType {
    pub const ALL: [PowType; 3] = [PowType::Sha256d, PowType::Blake2bd, PowType::Keccak256];

    /// Hashes the serialized header with this algorithm.
    pub fn hash(&self, header_bytes: &[u8]) -> Hash {
        match self {
            PowType::Sha256d => double_sha256(header_bytes),
            PowType::Blake2bd => blake2bd(header_bytes),
            PowType::Keccak256 => keccak256(header_bytes),
        }
    }
}

impl std::fmt::Display for PowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PowType::Sha256d => "sha256d",
            PowType::Blake2bd => "blake2bd",
            PowType::Keccak256 => "keccak256",
        };
        f.write_str(name)
    }
}

/// Whether `pow_hash`, read as a little-endian 256-bit number, meets the
/// target encoded by `bits`.
pub fn meets_target(pow_hash: &Hash, bits: u32) -> bool {
    let target = compact_to_target(bits);
    if target.is_zero() {
        return false;
    }
    U256::from_big_endian(&pow_hash.to_be_number_bytes()) <= target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithms_differ() {
        let data = b"header";
        let hashes: Vec<Hash> = PowType::ALL.iter().map(|p| p.hash(data)).collect();
        assert_ne!(hashes[0], hashes[1]);
        assert_ne!(hashes[1], hashes[2]);
    }

    #[test]
    fn test_meets_target() {
        assert!(meets_target(&Hash::from_u64_word(1), 0x207f_ffff));
        let mut high = [0u8; 32];
        high[31] = 0xff;
        assert!(!meets_target(&Hash::from_bytes(high), 0x207f_ffff));
        assert!(!meets_target(&Hash::from_u64_word(1), 0));
    }
}
