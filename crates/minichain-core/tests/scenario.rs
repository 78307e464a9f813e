use minichain_core::{
    calculate_hash, pow, ChainCorruption, Ledger, LedgerConfig, MemorySink, Transaction,
};
use rand::Rng;

fn ledger() -> Ledger<MemorySink> {
    let config = LedgerConfig {
        difficulty: 2,
        mining_reward: 100,
    };
    Ledger::with_sink(config, MemorySink::new()).expect("valid config")
}

/// Balance by the replay rule, computed independently of the ledger.
fn replay(txs: &[Transaction], address: &str) -> i128 {
    txs.iter().fold(0, |balance, tx| {
        let mut balance = balance;
        if tx.sender.as_deref() == Some(address) {
            balance -= tx.amount as i128;
        }
        if tx.recipient == address {
            balance += tx.amount as i128;
        }
        balance
    })
}

/// A -> B 50, B -> C 25, mine; C -> A 10, A -> M 15, mine.
fn demo_ledger() -> Ledger<MemorySink> {
    let mut ledger = ledger();
    ledger.add_transaction(Transaction::new("A", "B", 50)).unwrap();
    ledger.add_transaction(Transaction::new("B", "C", 25)).unwrap();
    ledger.mine_pending_transactions("M").unwrap();
    ledger.add_transaction(Transaction::new("C", "A", 10)).unwrap();
    ledger.add_transaction(Transaction::new("A", "M", 15)).unwrap();
    ledger.mine_pending_transactions("M").unwrap();
    ledger
}

#[test]
fn test_genesis_only_chain_is_valid() {
    let ledger = ledger();
    let genesis = &ledger.chain()[0];
    assert_eq!(genesis.index(), 0);
    assert_eq!(genesis.previous_hash(), "0");
    assert!(genesis.transactions().is_empty());
    assert_eq!(
        genesis.hash(),
        calculate_hash(0, genesis.timestamp(), &[], "0", genesis.nonce())
    );
    assert!(ledger.validate_chain());
}

#[test]
fn test_fresh_chain_links_and_validates() {
    let ledger = demo_ledger();
    assert_eq!(ledger.len(), 3);
    for pair in ledger.chain().windows(2) {
        assert_eq!(pair[1].previous_hash(), pair[0].hash());
        assert_eq!(pair[1].hash(), pair[1].calculate_hash());
        assert!(pow::meets_difficulty(pair[1].hash(), ledger.difficulty()));
    }
    assert!(ledger.validate_chain());
}

#[test]
fn test_balance_replay() {
    let ledger = demo_ledger();
    let committed: Vec<Transaction> = ledger
        .chain()
        .iter()
        .flat_map(|block| block.transactions().to_vec())
        .collect();

    // Block 2 carries the reward for block 1 ahead of C -> A and A -> M.
    assert_eq!(committed.len(), 5);
    assert!(committed[2].is_reward());

    for address in ["A", "B", "C", "M"] {
        assert_eq!(ledger.balance_of(address), replay(&committed, address));
    }
    assert_eq!(ledger.balance_of("M"), 100 + 15);
    assert_eq!(ledger.balance_of("A"), -50 + 10 - 15);
    assert_eq!(ledger.balance_of("B"), 50 - 25);
    assert_eq!(ledger.balance_of("C"), 25 - 10);
}

#[test]
fn test_pending_reward_is_not_counted() {
    let ledger = demo_ledger();
    assert_eq!(ledger.pending_transactions().len(), 1);
    let pending = &ledger.pending_transactions()[0];
    assert!(pending.is_reward());
    assert_eq!(pending.recipient, "M");
    assert_eq!(ledger.balance_of("M"), 115);
}

#[test]
fn test_tamper_detection_names_the_block() {
    let mut ledger = demo_ledger();
    let mut rng = rand::thread_rng();
    let target = rng.gen_range(1..ledger.len());
    let tx_count = ledger.chain()[target].transactions().len();
    let tx_index = rng.gen_range(0..tx_count);

    let block = ledger.block_mut(target).unwrap();
    let stored_hash = block.hash().to_string();
    block.transactions_mut()[tx_index].amount += 1;
    assert_eq!(block.hash(), stored_hash);

    assert!(!ledger.validate_chain());
    match ledger.verify_chain() {
        Err(ChainCorruption::HashMismatch { index, stored, .. }) => {
            assert_eq!(index, target as u64);
            assert_eq!(stored, stored_hash);
        }
        other => panic!("expected a hash mismatch, got {other:?}"),
    }
    assert!(ledger
        .sink()
        .contains(&format!("block {target} has been tampered with")));
}

#[test]
fn test_reported_amount_change_fifty_to_hundred() {
    let mut ledger = demo_ledger();
    let before = ledger.chain()[1].calculate_hash();
    let tx = &mut ledger.block_mut(1).unwrap().transactions_mut()[0];
    assert_eq!(tx.amount, 50);
    tx.amount = 100;
    assert_ne!(ledger.chain()[1].calculate_hash(), before);
    assert_eq!(ledger.verify_chain().unwrap_err().index(), 1);
}

#[test]
fn test_log_narration() {
    let ledger = demo_ledger();
    let sink = ledger.sink();
    assert!(sink.contains("blockchain initialized"));
    assert!(sink.contains("transaction added: A -> B (50)"));
    assert!(sink.contains("mining block 1"));
    assert!(sink.contains("mining block 2"));
    assert!(sink.contains(ledger.chain()[2].hash()));
}

#[test]
fn test_json_view() {
    let ledger = demo_ledger();
    let value: serde_json::Value = serde_json::from_str(&ledger.to_json().unwrap()).unwrap();
    let blocks = value.as_array().unwrap();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[1]["previous_hash"], ledger.chain()[0].hash());
    assert_eq!(blocks[2]["transactions"][0]["sender"], serde_json::Value::Null);
    assert_eq!(blocks[2]["transactions"][0]["recipient"], "M");
}
