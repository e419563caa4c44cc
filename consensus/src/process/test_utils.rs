//! Block building helpers for the engine's tests.

use consensus_core::block::Block;
use consensus_core::config::NetworkKind;
use consensus_core::constants::BLOCK_VERSION;
use consensus_core::header::Header;
use consensus_core::pow::PowType;
use consensus_core::script::pay_to_pubkey_hash;
use consensus_core::subsidy::calc_block_subsidy;
use consensus_core::tx::{Amount, CoinId, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput, TxType};
use consensus_core::{Hash, ZERO_HASH};
use std::path::Path;
use std::sync::Arc;

use crate::config::ChainConfig;
use crate::pipeline::{BlockChain, Collaborators};

pub(crate) const TEST_COIN: CoinId = 7;

pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Regtest settings with a short coinbase maturity.
pub(crate) fn test_config(dir: &Path) -> ChainConfig {
    ChainConfig { coinbase_maturity: Some(2), ..ChainConfig::for_network(NetworkKind::Regtest, dir) }
}

pub(crate) fn open_chain(config: &ChainConfig) -> BlockChain {
    init_logging();
    BlockChain::open(config, Collaborators::standalone(&config.params())).unwrap()
}

pub(crate) fn genesis_hash(chain: &BlockChain) -> Hash {
    chain.dag().genesis().unwrap().hash()
}

/// Outpoint of the first coinbase output of `block`.
pub(crate) fn coinbase_outpoint(block: &Block) -> TransactionOutpoint {
    TransactionOutpoint::new(block.transactions[0].id(), 0)
}

/// Moves `value` base coins out of `outpoint`, paying `fee`.
pub(crate) fn spend(outpoint: TransactionOutpoint, value: u64, fee: u64, salt: u8) -> Transaction {
    Transaction::new(
        TxType::Regular,
        vec![TransactionInput::new(outpoint, Vec::new(), u32::MAX)],
        vec![TransactionOutput::new(Amount::base(value - fee), pay_to_pubkey_hash(&[salt; 20]))],
        0,
        Vec::new(),
    )
}

/// Passes `value` base coins through and issues `minted` units of [`TEST_COIN`].
pub(crate) fn mint(outpoint: TransactionOutpoint, value: u64, minted: u64, salt: u8) -> Transaction {
    Transaction::new(
        TxType::TokenMint,
        vec![TransactionInput::new(outpoint, Vec::new(), u32::MAX)],
        vec![
            TransactionOutput::new(Amount::base(value), pay_to_pubkey_hash(&[salt; 20])),
            TransactionOutput::new(Amount::new(minted, TEST_COIN), pay_to_pubkey_hash(&[salt; 20])),
        ],
        0,
        Vec::new(),
    )
}

/// Builds a block on `parents` that passes every admission check: the
/// coinbase claims the full subsidy, bits follow the main parent and the nonce
/// satisfies the regtest target. `salt` keeps sibling blocks distinct.
pub(crate) fn mine_block(chain: &BlockChain, parents: &[Hash], txs: Vec<Transaction>, salt: u64) -> Arc<Block> {
    let main_parent = chain.dag().main_parent_of(parents).unwrap();
    let height = main_parent.height() + 1;
    let timestamp = main_parent.timestamp() + 1_000;
    let pow_type = PowType::Sha256d;
    let bits = chain.difficulty.required_difficulty(main_parent.as_ref(), timestamp, pow_type);

    let mut payload = salt.to_le_bytes().to_vec();
    payload.extend_from_slice(&height.to_le_bytes());
    let coinbase = Transaction::new(
        TxType::Coinbase,
        Vec::new(),
        vec![TransactionOutput::new(
            Amount::base(calc_block_subsidy(chain.params(), height)),
            pay_to_pubkey_hash(&[salt as u8; 20]),
        )],
        0,
        payload,
    );
    let mut transactions = vec![coinbase];
    transactions.extend(txs);

    let mut block = Block::new(
        Header {
            version: BLOCK_VERSION,
            parents: parents.to_vec(),
            tx_root: ZERO_HASH,
            state_root: ZERO_HASH,
            timestamp,
            bits,
            pow_type,
            nonce: 0,
        },
        transactions,
    );
    block.header.tx_root = block.calc_tx_root();
    while !block.header.check_pow() {
        block.header.nonce += 1;
    }
    Arc::new(block)
}

/// Mines `count` blocks in a line on top of `parent`, returning them in order.
pub(crate) fn mine_line(chain: &BlockChain, parent: Hash, count: usize, salt: u64) -> Vec<Arc<Block>> {
    let mut blocks = Vec::with_capacity(count);
    let mut tip = parent;
    for i in 0..count {
        let block = mine_block(chain, &[tip], Vec::new(), salt + i as u64);
        chain.process_block(block.clone(), Default::default()).unwrap();
        tip = block.hash();
        blocks.push(block);
    }
    blocks
}
