#![allow(dead_code)]

use ledger_core::{pow::mine_block, Block, Ledger, Transaction, Wallet};

pub const TEST_DIFFICULTY: u32 = 1;

pub fn test_ledger() -> Ledger {
    Ledger::with_difficulty(TEST_DIFFICULTY)
}

/// Seals the next block on `ledger` paying `miner`, without accepting it.
pub fn sealed_next(ledger: &Ledger, miner: &str, txs: Vec<Transaction>) -> Block {
    mine_block(ledger.candidate_block(miner, txs), ledger.difficulty())
}

pub fn mine_and_accept(ledger: &mut Ledger, miner: &str, txs: Vec<Transaction>) -> Block {
    let block = sealed_next(ledger, miner, txs);
    ledger
        .accept(block.clone())
        .expect("sealed candidate should be accepted");
    block
}

/// Ledger where `wallet` owns one mature coinbase output.
pub fn funded_ledger(wallet: &Wallet) -> Ledger {
    let mut ledger = test_ledger();
    mine_and_accept(&mut ledger, wallet.address(), vec![]);
    mine_and_accept(&mut ledger, "filler-miner", vec![]);
    ledger
}
