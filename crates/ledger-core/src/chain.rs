use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::constants::{BLOCK_REWARD, COINBASE_MATURITY, DEFAULT_DIFFICULTY};
use crate::crypto;
use crate::error::{LedgerError, Result};
use crate::pow::meets_difficulty;
use crate::transaction::{OutPoint, Transaction};
use crate::Hash;

/// An unspent output and the height of the block that created it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub address: String,
    pub amount: u64,
    pub height: u64,
}

/// State change a block would make, computed before anything is committed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtxoDelta {
    pub spent: Vec<OutPoint>,
    pub created: Vec<(OutPoint, UtxoEntry)>,
}

/// Append-only chain of accepted blocks and the unspent outputs derived from it.
///
/// There is no fork choice: a block is accepted only if it extends the tip.
/// Callers sharing a ledger between tasks must hold one lock around it, so
/// that `accept` is atomic with respect to reads.
#[derive(Clone, Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    utxo: BTreeMap<OutPoint, UtxoEntry>,
    difficulty: u32,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_difficulty(DEFAULT_DIFFICULTY)
    }

    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            chain: vec![Block::genesis()],
            utxo: BTreeMap::new(),
            difficulty,
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn tip(&self) -> &Block {
        // The chain always holds at least genesis.
        &self.chain[self.chain.len() - 1]
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> u64 {
        self.chain.len() as u64
    }

    /// Always `false`: genesis is present from construction.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn utxo(&self) -> &BTreeMap<OutPoint, UtxoEntry> {
        &self.utxo
    }

    /// Validates `block` against the tip and applies it.
    ///
    /// On error nothing has changed.
    pub fn accept(&mut self, block: Block) -> Result<()> {
        let tip_hash = self.tip().hash();
        if block.prev_hash() != tip_hash {
            return Err(self.rejected(LedgerError::InvalidPredecessor {
                expected: tip_hash.to_string(),
                got: block.prev_hash().to_string(),
            }));
        }

        let expected_index = self.len();
        if block.index() != expected_index {
            return Err(self.rejected(LedgerError::InvalidIndex {
                expected: expected_index,
                got: block.index(),
            }));
        }

        // Never trust a stored hash for proof of work.
        let hash = block.compute_hash();
        if !meets_difficulty(&hash, self.difficulty) {
            return Err(self.rejected(LedgerError::InvalidProofOfWork {
                hash,
                difficulty: self.difficulty,
            }));
        }

        let delta = match self.check_transactions(block.transactions()) {
            Ok(delta) => delta,
            Err(e) => return Err(self.rejected(e)),
        };

        self.commit(delta);
        info!(
            index = block.index(),
            hash = %hash,
            txs = block.transactions().len(),
            "block accepted"
        );
        self.chain.push(block);
        Ok(())
    }

    /// Boolean form of [`Ledger::accept`].
    pub fn add_block(&mut self, block: Block) -> bool {
        self.accept(block).is_ok()
    }

    /// Validates `txs` as the body of the next block and returns the state
    /// change they would make, without applying it.
    pub fn check_transactions(&self, txs: &[Transaction]) -> Result<UtxoDelta> {
        let height = self.len();
        let mut delta = UtxoDelta::default();
        let mut spent: HashSet<&OutPoint> = HashSet::new();
        let mut created: BTreeMap<OutPoint, UtxoEntry> = BTreeMap::new();

        for (position, tx) in txs.iter().enumerate() {
            let txid = tx.txid();

            if tx.is_coinbase() {
                self.check_coinbase(&txid, tx, position)?;
            } else {
                let mut input_total: u64 = 0;
                for input in &tx.inputs {
                    if !spent.insert(input) {
                        return Err(LedgerError::DoubleSpendWithinBlock {
                            txid,
                            outpoint: input.clone(),
                        });
                    }
                    let entry = self
                        .utxo
                        .get(input)
                        .or_else(|| created.get(input))
                        .ok_or_else(|| LedgerError::UnknownInput {
                            txid: txid.clone(),
                            outpoint: input.clone(),
                        })?;
                    let confirmations = height.saturating_sub(entry.height);
                    if confirmations < COINBASE_MATURITY {
                        return Err(LedgerError::ImmatureInput {
                            txid,
                            outpoint: input.clone(),
                            confirmations,
                        });
                    }
                    input_total = input_total.saturating_add(entry.amount);
                }

                self.check_signature(&txid, tx, &created)?;

                let output_total = tx.total_output();
                if output_total > input_total {
                    return Err(LedgerError::Overspend {
                        txid,
                        inputs: input_total,
                        outputs: output_total,
                    });
                }
                delta.spent.extend(tx.inputs.iter().cloned());
            }

            for (i, output) in tx.outputs.iter().enumerate() {
                // Zero-value outputs (the coinbase height marker) carry nothing to spend.
                if output.amount == 0 {
                    continue;
                }
                let outpoint = OutPoint::new(txid.clone(), i as u32);
                if self.utxo.contains_key(&outpoint) || created.contains_key(&outpoint) {
                    return Err(LedgerError::DuplicateOutput { txid, outpoint });
                }
                let entry = UtxoEntry {
                    address: output.address.clone(),
                    amount: output.amount,
                    height,
                };
                created.insert(outpoint.clone(), entry.clone());
                delta.created.push((outpoint, entry));
            }
        }

        Ok(delta)
    }

    /// Mature balance of `address`: outputs at least `COINBASE_MATURITY` blocks old.
    pub fn balance(&self, address: &str) -> u64 {
        self.spendable_outputs(address)
            .map(|(_, entry)| entry.amount)
            .sum()
    }

    /// Mature unspent outputs owned by `address`, in key order.
    pub fn spendable_outputs<'a>(
        &'a self,
        address: &'a str,
    ) -> impl Iterator<Item = (&'a OutPoint, &'a UtxoEntry)> + 'a {
        let height = self.len();
        self.utxo.iter().filter(move |(_, entry)| {
            entry.address == address && height.saturating_sub(entry.height) >= COINBASE_MATURITY
        })
    }

    /// Unsealed next block on the tip: a reward to `miner` followed by `txs`.
    pub fn candidate_block(&self, miner: &str, txs: Vec<Transaction>) -> Block {
        let mut body = Vec::with_capacity(txs.len() + 1);
        body.push(Transaction::coinbase_at(self.len(), miner, BLOCK_REWARD));
        body.extend(txs);
        Block::new(self.len(), self.tip().hash().to_string(), body)
    }

    fn check_coinbase(&self, txid: &Hash, tx: &Transaction, position: usize) -> Result<()> {
        if position != 0 {
            return Err(LedgerError::InvalidCoinbase {
                txid: txid.clone(),
                reason: format!("coinbase at position {position}"),
            });
        }
        if tx.signature.is_some() || tx.public_key.is_some() {
            return Err(LedgerError::InvalidCoinbase {
                txid: txid.clone(),
                reason: "coinbase carries a signature".into(),
            });
        }
        let reward: u64 = tx.total_output();
        if reward > BLOCK_REWARD {
            return Err(LedgerError::InvalidCoinbase {
                txid: txid.clone(),
                reason: format!("reward {reward} exceeds {BLOCK_REWARD}"),
            });
        }
        Ok(())
    }

    fn check_signature(
        &self,
        txid: &Hash,
        tx: &Transaction,
        created: &BTreeMap<OutPoint, UtxoEntry>,
    ) -> Result<()> {
        let (Some(signature), Some(public_key)) = (&tx.signature, &tx.public_key) else {
            return Err(LedgerError::MissingSignature { txid: txid.clone() });
        };

        let valid = crypto::verify(public_key, &tx.signing_payload(), signature)
            .map_err(|_| LedgerError::InvalidSignature { txid: txid.clone() })?;
        if !valid {
            return Err(LedgerError::InvalidSignature { txid: txid.clone() });
        }

        let signer = crypto::address_from_public_key_hex(public_key);
        for input in &tx.inputs {
            // Inputs were resolved by the caller.
            let Some(entry) = self.utxo.get(input).or_else(|| created.get(input)) else {
                continue;
            };
            if entry.address != signer {
                return Err(LedgerError::InputOwnerMismatch {
                    txid: txid.clone(),
                    outpoint: input.clone(),
                    owner: entry.address.clone(),
                    signer,
                });
            }
        }
        Ok(())
    }

    fn commit(&mut self, delta: UtxoDelta) {
        for outpoint in &delta.spent {
            self.utxo.remove(outpoint);
        }
        for (outpoint, entry) in delta.created {
            debug!(%outpoint, address = %entry.address, amount = entry.amount, "utxo created");
            self.utxo.insert(outpoint, entry);
        }
    }

    fn rejected(&self, error: LedgerError) -> LedgerError {
        warn!(height = self.len(), %error, "block rejected");
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::zero_hash;
    use crate::crypto::KeyPair;
    use crate::pow::mine_block;
    use crate::transaction::TxOutput;

    const EASY: u32 = 1;

    fn mine_next(ledger: &Ledger, miner: &str, txs: Vec<Transaction>) -> Block {
        mine_block(ledger.candidate_block(miner, txs), ledger.difficulty())
    }

    fn coinbase_outpoint(block: &Block) -> OutPoint {
        OutPoint::new(block.transactions()[0].txid(), 0)
    }

    /// Ledger where `keys` owns one mature 50-unit coinbase output.
    fn funded(keys: &KeyPair) -> (Ledger, OutPoint) {
        let mut ledger = Ledger::with_difficulty(EASY);
        let first = mine_next(&ledger, &keys.address(), vec![]);
        let outpoint = coinbase_outpoint(&first);
        ledger.accept(first).unwrap();
        let second = mine_next(&ledger, "someone-else", vec![]);
        ledger.accept(second).unwrap();
        (ledger, outpoint)
    }

    fn spend(keys: &KeyPair, inputs: Vec<OutPoint>, outputs: Vec<TxOutput>) -> Transaction {
        let mut tx = Transaction::new(inputs, outputs);
        tx.sign(keys);
        tx
    }

    #[test]
    fn new_ledger_holds_only_genesis() {
        let ledger = Ledger::new();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.difficulty(), DEFAULT_DIFFICULTY);
        assert_eq!(ledger.tip().prev_hash(), zero_hash());
        assert!(ledger.tip().transactions().is_empty());
        assert!(ledger.utxo().is_empty());
    }

    #[test]
    fn maturity_scenario() {
        let mut ledger = Ledger::with_difficulty(EASY);
        let a = mine_next(&ledger, "addr1", vec![]);
        let a_out = coinbase_outpoint(&a);
        assert!(ledger.add_block(a));
        assert_eq!(
            ledger.utxo().get(&a_out),
            Some(&UtxoEntry {
                address: "addr1".into(),
                amount: 50,
                height: 1
            })
        );
        assert_eq!(ledger.utxo().len(), 1);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.balance("addr1"), 0);

        let b = mine_next(&ledger, "addr2", vec![]);
        assert!(ledger.add_block(b));
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.balance("addr1"), 50);
        assert_eq!(ledger.balance("addr2"), 0);
    }

    #[test]
    fn wrong_predecessor_leaves_state_unchanged() {
        let mut ledger = Ledger::with_difficulty(EASY);
        ledger.accept(mine_next(&ledger, "addr1", vec![])).unwrap();
        let before_chain = ledger.chain().to_vec();
        let before_utxo = ledger.utxo().clone();

        let stray = mine_block(
            Block::new(2, "ab".repeat(32), vec![Transaction::coinbase("addr1", 50)]),
            EASY,
        );
        assert!(matches!(
            ledger.accept(stray),
            Err(LedgerError::InvalidPredecessor { .. })
        ));
        assert_eq!(ledger.chain(), before_chain.as_slice());
        assert_eq!(ledger.utxo(), &before_utxo);
    }

    #[test]
    fn wrong_index_is_rejected() {
        let mut ledger = Ledger::with_difficulty(EASY);
        let block = mine_block(
            Block::new(5, ledger.tip().hash().to_string(), vec![]),
            EASY,
        );
        assert_eq!(
            ledger.accept(block),
            Err(LedgerError::InvalidIndex { expected: 1, got: 5 })
        );
    }

    #[test]
    fn insufficient_work_is_rejected() {
        let mut ledger = Ledger::with_difficulty(EASY);
        let mut block = ledger.candidate_block("addr1", vec![]);
        // Find a nonce whose hash does not start with zero.
        let mut nonce = 0;
        while block.hash().starts_with('0') {
            nonce += 1;
            block.set_nonce(nonce);
        }
        assert!(matches!(
            ledger.accept(block),
            Err(LedgerError::InvalidProofOfWork { difficulty: 1, .. })
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn accepted_chain_is_linked_and_worked() {
        let mut ledger = Ledger::with_difficulty(2);
        for i in 0..4 {
            let block = mine_next(&ledger, &format!("miner{i}"), vec![]);
            ledger.accept(block).unwrap();
        }
        let chain = ledger.chain();
        assert_eq!(chain.len(), 5);
        for pair in chain.windows(2) {
            assert_eq!(pair[1].prev_hash(), pair[0].hash());
            assert_eq!(pair[1].index(), pair[0].index() + 1);
            assert!(meets_difficulty(pair[1].hash(), 2));
        }
    }

    #[test]
    fn signed_spend_moves_value() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let (mut ledger, outpoint) = funded(&alice);
        assert_eq!(ledger.balance(&alice.address()), 50);

        let tx = spend(
            &alice,
            vec![outpoint.clone()],
            vec![
                TxOutput::new(bob.address(), 30),
                TxOutput::new(alice.address(), 20),
            ],
        );
        let txid = tx.txid();
        let block = mine_next(&ledger, "miner", vec![tx]);
        ledger.accept(block).unwrap();

        assert!(!ledger.utxo().contains_key(&outpoint));
        let to_bob = &ledger.utxo()[&OutPoint::new(txid.clone(), 0)];
        assert_eq!(to_bob.address, bob.address());
        assert_eq!(to_bob.amount, 30);
        assert_eq!(to_bob.height, 3);
        let change = &ledger.utxo()[&OutPoint::new(txid, 1)];
        assert_eq!(change.amount, 20);

        // New outputs are immature until two more blocks exist.
        assert_eq!(ledger.balance(&bob.address()), 0);
        ledger.accept(mine_next(&ledger, "miner", vec![])).unwrap();
        assert_eq!(ledger.balance(&bob.address()), 30);
        assert_eq!(ledger.balance(&alice.address()), 20);
    }

    #[test]
    fn unsigned_spend_is_rejected() {
        let alice = KeyPair::generate();
        let (mut ledger, outpoint) = funded(&alice);
        let tx = Transaction::new(vec![outpoint], vec![TxOutput::new("thief", 50)]);
        let block = mine_next(&ledger, "miner", vec![tx]);
        assert!(matches!(
            ledger.accept(block),
            Err(LedgerError::MissingSignature { .. })
        ));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn spend_signed_by_another_key_is_rejected() {
        let alice = KeyPair::generate();
        let mallory = KeyPair::generate();
        let (mut ledger, outpoint) = funded(&alice);
        let tx = spend(&mallory, vec![outpoint], vec![TxOutput::new(mallory.address(), 50)]);
        let block = mine_next(&ledger, "miner", vec![tx]);
        assert!(matches!(
            ledger.accept(block),
            Err(LedgerError::InputOwnerMismatch { .. })
        ));
    }

    #[test]
    fn tampered_outputs_break_signature() {
        let alice = KeyPair::generate();
        let (mut ledger, outpoint) = funded(&alice);
        let mut tx = spend(&alice, vec![outpoint], vec![TxOutput::new("bob", 10)]);
        tx.outputs[0].address = "mallory".into();
        let block = mine_next(&ledger, "miner", vec![tx]);
        assert!(matches!(
            ledger.accept(block),
            Err(LedgerError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn unknown_input_rejects_whole_block() {
        let alice = KeyPair::generate();
        let (mut ledger, outpoint) = funded(&alice);
        let utxo_before = ledger.utxo().clone();
        let good = spend(&alice, vec![outpoint], vec![TxOutput::new("bob", 50)]);
        let bad = spend(&alice, vec![OutPoint::new("ff".repeat(32), 0)], vec![TxOutput::new("bob", 1)]);
        let block = mine_next(&ledger, "miner", vec![good, bad]);
        assert!(matches!(
            ledger.accept(block),
            Err(LedgerError::UnknownInput { .. })
        ));
        assert_eq!(ledger.utxo(), &utxo_before);
    }

    #[test]
    fn double_spend_within_block_is_rejected() {
        let alice = KeyPair::generate();
        let (mut ledger, outpoint) = funded(&alice);
        let first = spend(&alice, vec![outpoint.clone()], vec![TxOutput::new("bob", 50)]);
        let second = spend(&alice, vec![outpoint], vec![TxOutput::new("carol", 50)]);
        let block = mine_next(&ledger, "miner", vec![first, second]);
        assert!(matches!(
            ledger.accept(block),
            Err(LedgerError::DoubleSpendWithinBlock { .. })
        ));
    }

    #[test]
    fn spent_output_cannot_be_spent_again() {
        let alice = KeyPair::generate();
        let (mut ledger, outpoint) = funded(&alice);
        let first = spend(&alice, vec![outpoint.clone()], vec![TxOutput::new("bob", 50)]);
        ledger.accept(mine_next(&ledger, "miner", vec![first])).unwrap();

        let again = spend(&alice, vec![outpoint], vec![TxOutput::new("carol", 50)]);
        let block = mine_next(&ledger, "miner", vec![again]);
        assert!(matches!(
            ledger.accept(block),
            Err(LedgerError::UnknownInput { .. })
        ));
    }

    #[test]
    fn immature_input_is_rejected() {
        let alice = KeyPair::generate();
        let mut ledger = Ledger::with_difficulty(EASY);
        let first = mine_next(&ledger, &alice.address(), vec![]);
        let outpoint = coinbase_outpoint(&first);
        ledger.accept(first).unwrap();

        let tx = spend(&alice, vec![outpoint], vec![TxOutput::new("bob", 50)]);
        let block = mine_next(&ledger, "miner", vec![tx]);
        assert!(matches!(
            ledger.accept(block),
            Err(LedgerError::ImmatureInput { confirmations: 1, .. })
        ));
    }

    #[test]
    fn overspend_is_rejected() {
        let alice = KeyPair::generate();
        let (mut ledger, outpoint) = funded(&alice);
        let tx = spend(&alice, vec![outpoint], vec![TxOutput::new("bob", 51)]);
        let block = mine_next(&ledger, "miner", vec![tx]);
        assert!(matches!(
            ledger.accept(block),
            Err(LedgerError::Overspend { inputs: 50, outputs: 51, .. })
        ));
    }

    #[test]
    fn oversized_or_misplaced_coinbase_is_rejected() {
        let mut ledger = Ledger::with_difficulty(EASY);
        let greedy = mine_block(
            Block::new(1, ledger.tip().hash().to_string(), vec![Transaction::coinbase("addr1", 51)]),
            EASY,
        );
        assert!(matches!(
            ledger.accept(greedy),
            Err(LedgerError::InvalidCoinbase { .. })
        ));

        let two = mine_next(&ledger, "addr1", vec![Transaction::coinbase("addr2", 1)]);
        assert!(matches!(
            ledger.accept(two),
            Err(LedgerError::InvalidCoinbase { .. })
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn repeated_rewards_to_one_miner_accumulate() {
        let mut ledger = Ledger::with_difficulty(EASY);
        for _ in 0..4 {
            ledger.accept(mine_next(&ledger, "addr1", vec![])).unwrap();
        }
        // Heights 1..=4 exist, chain length 5: heights 1, 2 and 3 are mature.
        assert_eq!(ledger.balance("addr1"), 150);
    }

    #[test]
    fn reused_coinbase_output_is_rejected() {
        let mut ledger = Ledger::with_difficulty(EASY);
        let first = mine_block(
            Block::new(1, ledger.tip().hash().to_string(), vec![Transaction::coinbase("addr1", 50)]),
            EASY,
        );
        let outpoint = coinbase_outpoint(&first);
        ledger.accept(first).unwrap();

        // Same reward transaction again: same txid, so it would overwrite the
        // unspent entry from height 1.
        let replay = mine_block(
            Block::new(2, ledger.tip().hash().to_string(), vec![Transaction::coinbase("addr1", 50)]),
            EASY,
        );
        let utxo_before = ledger.utxo().clone();
        assert_eq!(
            ledger.accept(replay),
            Err(LedgerError::DuplicateOutput {
                txid: outpoint.txid.clone(),
                outpoint: outpoint.clone(),
            })
        );
        assert_eq!(ledger.utxo(), &utxo_before);
        assert_eq!(ledger.utxo()[&outpoint].height, 1);

        ledger.accept(mine_next(&ledger, "addr2", vec![])).unwrap();
        assert_eq!(ledger.balance("addr1"), 50);
    }

    #[test]
    fn height_markers_leave_no_utxo_entries() {
        let mut ledger = Ledger::with_difficulty(EASY);
        for _ in 0..5 {
            ledger.accept(mine_next(&ledger, "addr1", vec![])).unwrap();
        }
        assert_eq!(ledger.utxo().len(), 5);
        assert!(ledger.utxo().values().all(|entry| entry.amount > 0));
    }

    #[test]
    fn block_without_coinbase_is_accepted() {
        let mut ledger = Ledger::with_difficulty(EASY);
        let empty = mine_block(Block::new(1, ledger.tip().hash().to_string(), vec![]), EASY);
        assert!(ledger.add_block(empty));
        assert!(ledger.utxo().is_empty());
    }

    #[test]
    fn check_transactions_does_not_mutate() {
        let alice = KeyPair::generate();
        let (ledger, outpoint) = funded(&alice);
        let tx = spend(&alice, vec![outpoint.clone()], vec![TxOutput::new("bob", 50)]);
        let delta = ledger.check_transactions(&[tx]).unwrap();
        assert_eq!(delta.spent, vec![outpoint.clone()]);
        assert_eq!(delta.created.len(), 1);
        assert!(ledger.utxo().contains_key(&outpoint));
    }
}
