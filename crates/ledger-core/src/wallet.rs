use std::collections::HashSet;

use tracing::debug;

use crate::chain::Ledger;
use crate::crypto::KeyPair;
use crate::error::{LedgerError, Result};
use crate::transaction::{OutPoint, Transaction, TxOutput};

/// A key pair that builds and signs spends of its own mature outputs.
#[derive(Debug, Clone)]
pub struct Wallet {
    keys: KeyPair,
    address: String,
}

impl Wallet {
    pub fn new(keys: KeyPair) -> Self {
        let address = keys.address();
        Self { keys, address }
    }

    pub fn generate() -> Self {
        Self::new(KeyPair::generate())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// Spends enough mature outputs, in key order, to pay `amount` to `to`,
    /// returning any excess to this wallet as change.
    pub fn create_transaction(&self, ledger: &Ledger, to: &str, amount: u64) -> Result<Transaction> {
        self.create_transaction_excluding(ledger, to, amount, &HashSet::new())
    }

    /// Like [`Wallet::create_transaction`], but never selects an outpoint in
    /// `exclude` (outputs already claimed by pending transactions).
    pub fn create_transaction_excluding(
        &self,
        ledger: &Ledger,
        to: &str,
        amount: u64,
        exclude: &HashSet<OutPoint>,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut inputs: Vec<OutPoint> = Vec::new();
        let mut total: u64 = 0;
        let available = ledger
            .spendable_outputs(&self.address)
            .filter(|(outpoint, _)| !exclude.contains(*outpoint));
        for (outpoint, entry) in available {
            inputs.push(outpoint.clone());
            total = total.saturating_add(entry.amount);
            if total >= amount {
                break;
            }
        }
        if total < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: total,
            });
        }

        let mut outputs = vec![TxOutput::new(to, amount)];
        let change = total - amount;
        if change > 0 {
            outputs.push(TxOutput::new(self.address.clone(), change));
        }

        let mut tx = Transaction::new(inputs, outputs);
        tx.sign(&self.keys);
        debug!(txid = %tx.txid(), to, amount, change, "transaction created");
        Ok(tx)
    }
}
