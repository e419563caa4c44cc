//! On-disk encoding of UTXO entries and spend journals
//!
//! Entry key:   `tx hash (32) | VLQ(output index)`
//!
//! Entry value: `VLQ(header code) | block hash (32) | coin id (u16 LE) | compressed txout`
//!
//! Journal value: `VLQ(count)` followed by `count` records of
//! `VLQ(header code) | block hash (32) | coin id (u16 LE) | compressed txout |
//! VLQ(tx index) | VLQ(input index) | VLQ(compressed fee) | fee coin id (u16 LE)`
//!
//! Bit 0 of a header code is the coinbase flag; the remaining bits are reserved
//! and written as zero.

use thiserror::Error;

use super::compress::{compress_amount, decompress_amount, put_compressed_txout, read_compressed_txout};
use super::utxo_entry::{SpentTxOut, TxoFlags, UtxoEntry};
use super::vlq;
use crate::tx::{Amount, CoinId, TransactionOutpoint};
use crate::Hash;

const HEADER_CODE_COINBASE: u64 = 0x01;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of data while reading {0}")]
    UnexpectedEnd(&'static str),

    #[error("value overflows 64 bits")]
    Overflow,

    #[error("unsupported compressed script type {0}")]
    UnsupportedScriptType(u64),

    #[error("{0} trailing bytes after spend journal")]
    TrailingBytes(usize),
}

/// Reusable buffer for building UTXO keys. Holding one across a batch of
/// lookups avoids an allocation per outpoint.
#[derive(Debug, Default)]
pub struct UtxoKeyBuf(Vec<u8>);

impl UtxoKeyBuf {
    pub fn new() -> Self {
        Self(Vec::with_capacity(32 + 5))
    }

    /// Builds the key of `outpoint` in place and returns it.
    pub fn key(&mut self, outpoint: &TransactionOutpoint) -> &[u8] {
        self.0.clear();
        self.0.extend_from_slice(outpoint.transaction_id.as_bytes());
        vlq::put(&mut self.0, u64::from(outpoint.index));
        &self.0
    }
}

/// Decodes a key produced by [`UtxoKeyBuf::key`].
pub fn outpoint_from_key(key: &[u8]) -> Result<TransactionOutpoint, DecodeError> {
    let hash = key.get(..32).ok_or(DecodeError::UnexpectedEnd("outpoint key hash"))?;
    let (index, _) = vlq::read(&key[32..])?;
    let index = u32::try_from(index).map_err(|_| DecodeError::Overflow)?;
    Ok(TransactionOutpoint::new(Hash::try_from_slice(hash).map_err(|_| DecodeError::UnexpectedEnd("outpoint key hash"))?, index))
}

fn header_code(is_coinbase: bool) -> u64 {
    if is_coinbase {
        HEADER_CODE_COINBASE
    } else {
        0
    }
}

fn put_common(buf: &mut Vec<u8>, is_coinbase: bool, block_hash: &Hash, amount: &Amount, pk_script: &[u8]) {
    vlq::put(buf, header_code(is_coinbase));
    buf.extend_from_slice(block_hash.as_bytes());
    buf.extend_from_slice(&amount.id.to_le_bytes());
    put_compressed_txout(buf, amount.value, pk_script);
}

struct Common {
    is_coinbase: bool,
    block_hash: Hash,
    amount: Amount,
    pk_script: Vec<u8>,
}

fn read_coin_id(data: &[u8]) -> Result<CoinId, DecodeError> {
    let bytes = data.get(..2).ok_or(DecodeError::UnexpectedEnd("coin id"))?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_common(data: &[u8]) -> Result<(Common, usize), DecodeError> {
    let (code, mut offset) = vlq::read(data)?;
    let hash_bytes = data.get(offset..offset + 32).ok_or(DecodeError::UnexpectedEnd("block hash"))?;
    let block_hash = Hash::try_from_slice(hash_bytes).map_err(|_| DecodeError::UnexpectedEnd("block hash"))?;
    offset += 32;
    let coin_id = read_coin_id(&data[offset..])?;
    offset += 2;
    let (value, pk_script, txout_len) = read_compressed_txout(&data[offset..])?;
    offset += txout_len;
    let common = Common {
        is_coinbase: code & HEADER_CODE_COINBASE != 0,
        block_hash,
        amount: Amount::new(value, coin_id),
        pk_script,
    };
    Ok((common, offset))
}

/// Encodes an unspent entry. Spent entries are deleted rather than stored, so
/// only the coinbase flag is persisted.
pub fn serialize_utxo_entry(entry: &UtxoEntry) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 32 + 2 + 9 + entry.pk_script.len() + 1);
    put_common(&mut buf, entry.is_coinbase(), &entry.block_hash, &entry.amount, &entry.pk_script);
    buf
}

pub fn deserialize_utxo_entry(data: &[u8]) -> Result<UtxoEntry, DecodeError> {
    let (common, _) = read_common(data)?;
    let flags = if common.is_coinbase { TxoFlags::COINBASE } else { TxoFlags::empty() };
    Ok(UtxoEntry { amount: common.amount, pk_script: common.pk_script, block_hash: common.block_hash, flags })
}

pub fn serialize_spend_journal(stxos: &[SpentTxOut]) -> Vec<u8> {
    let mut buf = Vec::new();
    vlq::put(&mut buf, stxos.len() as u64);
    for stxo in stxos {
        put_common(&mut buf, stxo.is_coinbase, &stxo.block_hash, &stxo.amount, &stxo.pk_script);
        vlq::put(&mut buf, u64::from(stxo.tx_index));
        vlq::put(&mut buf, u64::from(stxo.tx_in_index));
        vlq::put(&mut buf, compress_amount(stxo.fees.value));
        buf.extend_from_slice(&stxo.fees.id.to_le_bytes());
    }
    buf
}

pub fn deserialize_spend_journal(data: &[u8]) -> Result<Vec<SpentTxOut>, DecodeError> {
    let (count, mut offset) = vlq::read(data)?;
    let mut stxos = Vec::with_capacity(count.min(1 << 16) as usize);
    for _ in 0..count {
        let (common, read) = read_common(&data[offset..])?;
        offset += read;
        let (tx_index, read) = vlq::read(&data[offset..])?;
        offset += read;
        let (tx_in_index, read) = vlq::read(&data[offset..])?;
        offset += read;
        let (fee, read) = vlq::read(&data[offset..])?;
        offset += read;
        let fee_coin = read_coin_id(&data[offset..])?;
        offset += 2;
        stxos.push(SpentTxOut {
            amount: common.amount,
            fees: Amount::new(decompress_amount(fee), fee_coin),
            pk_script: common.pk_script,
            block_hash: common.block_hash,
            is_coinbase: common.is_coinbase,
            tx_index: u32::try_from(tx_index).map_err(|_| DecodeError::Overflow)?,
            tx_in_index: u32::try_from(tx_in_index).map_err(|_| DecodeError::Overflow)?,
        });
    }
    if offset != data.len() {
        return Err(DecodeError::TrailingBytes(data.len() - offset));
    }
    Ok(stxos)
}
