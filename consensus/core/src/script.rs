//! Script classification
//!
//! The chain-state core never executes scripts; it only needs to recognise the
//! standard forms (for compact storage) and provably unspendable outputs (so
//! they never enter the UTXO set).

use crate::constants::MAX_SCRIPT_SIZE;

pub const OP_0: u8 = 0x00;
pub const OP_DATA_20: u8 = 0x14;
pub const OP_DATA_33: u8 = 0x21;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// An output whose script starts with OP_RETURN, or that is too large to ever
/// be executed, can never be spent.
pub fn is_unspendable(script: &[u8]) -> bool {
    script.first() == Some(&OP_RETURN) || script.len() > MAX_SCRIPT_SIZE
}

pub fn pay_to_pubkey_hash(hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, OP_DATA_20]);
    script.extend_from_slice(hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

pub fn pay_to_script_hash(hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.extend_from_slice(&[OP_HASH160, OP_DATA_20]);
    script.extend_from_slice(hash);
    script.push(OP_EQUAL);
    script
}

/// `<33-byte compressed key> OP_CHECKSIG`
pub fn pay_to_compressed_pubkey(key: &[u8; 33]) -> Vec<u8> {
    let mut script = Vec::with_capacity(35);
    script.push(OP_DATA_33);
    script.extend_from_slice(key);
    script.push(OP_CHECKSIG);
    script
}

/// A data-carrier output.
pub fn null_data(data: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(data.len() + 2);
    script.push(OP_RETURN);
    if !data.is_empty() {
        script.push(data.len().min(75) as u8);
        script.extend_from_slice(&data[..data.len().min(75)]);
    }
    script
}

pub fn extract_pubkey_hash(script: &[u8]) -> Option<[u8; 20]> {
    if script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == OP_DATA_20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        script[3..23].try_into().ok()
    } else {
        None
    }
}

pub fn extract_script_hash(script: &[u8]) -> Option<[u8; 20]> {
    if script.len() == 23 && script[0] == OP_HASH160 && script[1] == OP_DATA_20 && script[22] == OP_EQUAL {
        script[2..22].try_into().ok()
    } else {
        None
    }
}

pub fn extract_compressed_pubkey(script: &[u8]) -> Option<[u8; 33]> {
    if script.len() == 35 && script[0] == OP_DATA_33 && script[34] == OP_CHECKSIG && (script[1] == 0x02 || script[1] == 0x03) {
        script[1..34].try_into().ok()
    } else {
        None
    }
}
