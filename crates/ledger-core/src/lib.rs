//! Ledger and consensus engine for a minimal proof-of-work UTXO chain.
//!
//! Blocks and transactions are identified by the SHA-256 of their canonical
//! encoding (see [`canonical`]). A [`chain::Ledger`] accepts sealed blocks
//! that extend its tip and maintains the unspent-output set they produce.

pub mod block;
pub mod canonical;
pub mod chain;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod mine;
pub mod pow;
pub mod transaction;
pub mod wallet;

/// Lowercase hex SHA-256 digest.
pub type Hash = String;

pub use block::{Block, BlockShape};
pub use chain::{Ledger, UtxoDelta, UtxoEntry};
pub use crypto::KeyPair;
pub use error::{LedgerError, Result};
pub use transaction::{OutPoint, Transaction, TxOutput};
pub use wallet::Wallet;
