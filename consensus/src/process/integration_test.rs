#[cfg(test)]
mod integration_tests {
    use crate::consensus::types::BehaviorFlags;
    use crate::process::test_utils::*;
    use consensus_core::errors::ErrorCode;
    use consensus_core::script::pay_to_pubkey_hash;
    use consensus_core::tx::{Amount, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput, TxType};
    use std::sync::Arc;

    #[test]
    fn test_token_supply_follows_mint_and_unmint() {
        let dir = tempfile::tempdir().unwrap();
        let chain = open_chain(&test_config(dir.path()));
        let line = mine_line(&chain, genesis_hash(&chain), 3, 10);
        let funding = coinbase_outpoint(&line[0]);
        let value = chain.fetch_utxo_entry(&funding).unwrap().unwrap().amount.value;

        let minting = mint(funding, value, 5_000, 1);
        let block = mine_block(&chain, &[line[2].hash()], vec![minting.clone()], 20);
        chain.process_block(block.clone(), BehaviorFlags::empty()).unwrap();
        let minted_at = chain.dag().get(&block.hash()).unwrap().id();
        assert_eq!(chain.token_state(minted_at).unwrap().unwrap().supply(TEST_COIN), 5_000);

        let unminting = Transaction::new(
            TxType::TokenUnmint,
            vec![TransactionInput::new(TransactionOutpoint::new(minting.id(), 1), Vec::new(), u32::MAX)],
            vec![TransactionOutput::new(Amount::new(3_000, TEST_COIN), pay_to_pubkey_hash(&[2; 20]))],
            0,
            Vec::new(),
        );
        let block = mine_block(&chain, &[block.hash()], vec![unminting], 21);
        chain.process_block(block.clone(), BehaviorFlags::empty()).unwrap();
        let burned_at = chain.dag().get(&block.hash()).unwrap().id();
        let state = chain.token_state(burned_at).unwrap().unwrap();
        assert_eq!(state.supply(TEST_COIN), 3_000);
        assert_eq!(chain.best_snapshot().token_tip_hash, state.hash());
    }

    #[test]
    fn test_stale_timestamp_is_rejected_without_trace() {
        let dir = tempfile::tempdir().unwrap();
        let chain = open_chain(&test_config(dir.path()));
        let line = mine_line(&chain, genesis_hash(&chain), 2, 10);

        let mut stale = (*mine_block(&chain, &[line[1].hash()], Vec::new(), 30)).clone();
        stale.header.timestamp = chain.params().genesis_timestamp;
        while !stale.header.check_pow() {
            stale.header.nonce += 1;
        }
        let err = chain.process_block(Arc::new(stale.clone()), BehaviorFlags::empty()).unwrap_err();
        assert_eq!(err.rule().map(|e| e.code), Some(ErrorCode::TimeTooOld));
        assert!(!chain.have_block(&stale.hash()));
        assert_eq!(chain.best_snapshot().hash, line[1].hash());
    }

    #[test]
    fn test_next_difficulty_matches_mined_bits() {
        let dir = tempfile::tempdir().unwrap();
        let chain = open_chain(&test_config(dir.path()));
        let line = mine_line(&chain, genesis_hash(&chain), 4, 10);
        let next = mine_block(&chain, &[line[3].hash()], Vec::new(), 50);
        let required = chain.calc_next_required_difficulty(next.header.timestamp, next.header.pow_type).unwrap();
        assert_eq!(required, next.header.bits);
    }
}
