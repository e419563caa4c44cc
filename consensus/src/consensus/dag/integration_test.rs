#[cfg(test)]
mod integration_tests {
    use super::super::{BlockDag, BlockNode, IBlock, MemoryDag};
    use consensus_core::block::Block;
    use consensus_core::header::Header;
    use consensus_core::pow::PowType;
    use consensus_core::Hash;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn node(dag: &MemoryDag, parents: &[Hash], salt: u64) -> BlockNode {
        let header = Header {
            version: 1,
            parents: parents.to_vec(),
            tx_root: Hash::from_le_u64([salt, 7, 7, salt]),
            state_root: Hash::default(),
            timestamp: 1_000 * salt,
            bits: 0x207f_ffff,
            pow_type: PowType::Sha256d,
            nonce: salt,
        };
        let main_parent = dag.main_parent_of(parents).map(|b| b.hash());
        BlockNode::new(Arc::new(Block::new(header, Vec::new())), main_parent)
    }

    /// Two blocks per level, each level merging both blocks of the previous one.
    fn build_wide_dag(dag: &MemoryDag, levels: u64) -> Vec<BlockNode> {
        let mut nodes = Vec::new();
        let genesis = node(dag, &[], 1);
        dag.insert(&genesis).unwrap();
        let mut level = vec![genesis.hash()];
        nodes.push(genesis);
        for l in 0..levels {
            let mut next = Vec::new();
            for w in 0..2 {
                let n = node(dag, &level, 100 + l * 2 + w);
                dag.insert(&n).unwrap();
                next.push(n.hash());
                nodes.push(n);
            }
            level = next;
        }
        let closing = node(dag, &level, 10_000);
        dag.insert(&closing).unwrap();
        nodes.push(closing);
        nodes
    }

    #[test]
    fn test_wide_dag_is_fully_and_topologically_ordered() {
        let dag = MemoryDag::new(3);
        let nodes = build_wide_dag(&dag, 6);
        let order = dag.ordered_hashes();
        assert_eq!(order.len(), nodes.len());
        assert_eq!(order.iter().collect::<HashSet<_>>().len(), nodes.len());

        for (position, hash) in order.iter().enumerate() {
            let block = dag.get(hash).unwrap();
            assert_eq!(block.order(), position as u64);
            for parent in block.parents() {
                assert!(dag.get(parent).unwrap().order() < block.order());
            }
        }
        // with k = 3 a width of two never produces red blocks
        assert!(order.iter().all(|h| dag.is_blue(h)));

        let tip = dag.main_tip().unwrap();
        assert_eq!(tip.hash(), nodes.last().unwrap().hash());
        assert_eq!(tip.blue_score(), nodes.len() as u64 - 1);
        let state = dag.graph_state();
        assert_eq!(state.tips, vec![tip.hash()]);
        assert_eq!(state.block_count, nodes.len() as u64);
        assert_eq!(state.main_order, nodes.len() as u64 - 1);
    }

    #[test]
    fn test_replay_in_id_order_reproduces_orders() {
        let dag = MemoryDag::new(3);
        let nodes = build_wide_dag(&dag, 4);
        let side = node(&dag, &[nodes[1].hash()], 77);
        dag.insert(&side).unwrap();

        let replayed = MemoryDag::new(3);
        for n in nodes.iter().chain(std::iter::once(&side)) {
            let expected_id = dag.get(&n.hash()).unwrap().id();
            assert_eq!(replayed.main_parent_of(n.parents()).map(|b| b.hash()), n.main_parent());
            let inserted = replayed.insert(&BlockNode::new(n.block().clone(), n.main_parent())).unwrap();
            assert_eq!(inserted.block.id(), expected_id);
        }
        assert_eq!(replayed.ordered_hashes(), dag.ordered_hashes());
        assert!(!replayed.get(&side.hash()).unwrap().is_ordered());
    }

    #[test]
    fn test_narrow_k_colors_excess_blocks_red() {
        let dag = MemoryDag::new(1);
        let genesis = node(&dag, &[], 1);
        dag.insert(&genesis).unwrap();
        let siblings: Vec<Hash> = (0..4)
            .map(|i| {
                let n = node(&dag, &[genesis.hash()], 50 + i);
                dag.insert(&n).unwrap();
                n.hash()
            })
            .collect();
        let merge = node(&dag, &siblings, 99);
        let inserted = dag.insert(&merge).unwrap();
        assert!(inserted.main_tip_changed);
        // main parent plus a single anticone blue fits k = 1
        assert_eq!(dag.blue_diff_anticone(&merge.hash()).len(), 1);
        assert_eq!(inserted.block.blue_score(), 1 + 1 + 1);
        let reds = siblings.iter().filter(|h| !dag.is_blue(h)).count();
        assert_eq!(reds, 2);
        assert_eq!(dag.ordered_hashes().len(), 6);
    }
}
