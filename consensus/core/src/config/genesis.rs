use crate::block::Block;
use crate::config::params::Params;
use crate::constants::BLOCK_VERSION;
use crate::header::Header;
use crate::merkle::calc_tx_root;
use crate::script::null_data;
use crate::tx::{Amount, Transaction, TransactionOutput, TxType};
use crate::ZERO_HASH;

static COINBASE_PAYLOAD: &[u8] = b"dag genesis: ordered by blue work";

/// Builds the genesis block of a network. Its coinbase output is a data carrier
/// and therefore never enters the UTXO set.
pub fn build_genesis(params: &Params) -> Block {
    let coinbase = Transaction::new(
        TxType::Coinbase,
        Vec::new(),
        vec![TransactionOutput::new(Amount::base(0), null_data(params.net.to_string().as_bytes()))],
        0,
        COINBASE_PAYLOAD.to_vec(),
    );
    let transactions = vec![coinbase];
    let header = Header {
        version: BLOCK_VERSION,
        parents: Vec::new(),
        tx_root: calc_tx_root(&transactions),
        state_root: ZERO_HASH,
        timestamp: params.genesis_timestamp,
        bits: params.initial_bits(params.genesis_pow),
        pow_type: params.genesis_pow,
        nonce: 0,
    };
    Block::new(header, transactions)
}
