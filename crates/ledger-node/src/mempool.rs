use std::collections::HashSet;

use ledger_core::{Hash, Ledger, OutPoint, Transaction};
use tracing::debug;

/// Pending transactions in arrival order, unique by txid.
///
/// Nothing is evicted except transactions made obsolete by an accepted block.
#[derive(Debug, Default)]
pub struct Mempool {
    txs: Vec<Transaction>,
    ids: HashSet<Hash>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.txs
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.ids.contains(txid)
    }

    /// Adds `tx`; returns `false` if it is already pending.
    pub fn insert(&mut self, tx: Transaction) -> bool {
        if !self.ids.insert(tx.txid()) {
            return false;
        }
        self.txs.push(tx);
        true
    }

    /// First input of `tx` already claimed by a pending transaction.
    pub fn conflict(&self, tx: &Transaction) -> Option<OutPoint> {
        let pending = self.pending_inputs();
        tx.inputs.iter().find(|i| pending.contains(*i)).cloned()
    }

    pub fn pending_inputs(&self) -> HashSet<OutPoint> {
        self.txs
            .iter()
            .flat_map(|tx| tx.inputs.iter().cloned())
            .collect()
    }

    /// Pending transactions that are valid together on top of `ledger`, in
    /// arrival order.
    pub fn select(&self, ledger: &Ledger) -> Vec<Transaction> {
        let mut selected = Vec::new();
        for tx in &self.txs {
            selected.push(tx.clone());
            if let Err(e) = ledger.check_transactions(&selected) {
                debug!(txid = %tx.txid(), error = %e, "pending transaction skipped");
                selected.pop();
            }
        }
        selected
    }

    /// Drops transactions included in an accepted block, and any that spend
    /// an output the block consumed.
    pub fn remove_included(&mut self, block_txs: &[Transaction]) {
        let included: HashSet<Hash> = block_txs.iter().map(Transaction::txid).collect();
        let consumed: HashSet<&OutPoint> = block_txs.iter().flat_map(|tx| tx.inputs.iter()).collect();

        let before = self.txs.len();
        self.txs.retain(|tx| {
            !included.contains(&tx.txid()) && !tx.inputs.iter().any(|i| consumed.contains(i))
        });
        self.ids = self.txs.iter().map(Transaction::txid).collect();
        if self.txs.len() != before {
            debug!(removed = before - self.txs.len(), remaining = self.txs.len(), "mempool pruned");
        }
    }
}
