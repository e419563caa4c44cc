use crate::header::Header;
use crate::Hash;

/// Serializes the header fields in their hashing order.
pub fn serialize(header: &Header) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + 1 + header.parents.len() * 32 + 64 + 8 + 4 + 1 + 8);
    bytes.extend_from_slice(&header.version.to_le_bytes());
    bytes.push(header.parents.len() as u8);
    for parent in &header.parents {
        bytes.extend_from_slice(parent.as_bytes());
    }
    bytes.extend_from_slice(header.tx_root.as_bytes());
    bytes.extend_from_slice(header.state_root.as_bytes());
    bytes.extend_from_slice(&header.timestamp.to_le_bytes());
    bytes.extend_from_slice(&header.bits.to_le_bytes());
    bytes.push(header.pow_type as u8);
    bytes.extend_from_slice(&header.nonce.to_le_bytes());
    bytes
}

/// Computes the hash of a block header
pub fn block_hash(header: &Header) -> Hash {
    super::double_sha256(&serialize(header))
}
