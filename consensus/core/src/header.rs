use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::hashing;
use crate::pow::{meets_target, PowType};
use crate::Hash;

/// Block header. `timestamp` is in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Header {
    pub version: u32,
    pub parents: Vec<Hash>,
    pub tx_root: Hash,
    pub state_root: Hash,
    pub timestamp: u64,
    pub bits: u32,
    pub pow_type: PowType,
    pub nonce: u64,
}

impl Header {
    /// Block identity: double SHA256 of the serialized header, independent of
    /// the pow algorithm.
    pub fn hash(&self) -> Hash {
        hashing::header::block_hash(self)
    }

    /// Hash used for the proof-of-work check, computed with the header's
    /// declared algorithm.
    pub fn pow_hash(&self) -> Hash {
        self.pow_type.hash(&hashing::header::serialize(self))
    }

    pub fn check_pow(&self) -> bool {
        meets_target(&self.pow_hash(), self.bits)
    }

    pub fn is_genesis(&self) -> bool {
        self.parents.is_empty()
    }
}
