use thiserror::Error;

use crate::transaction::OutPoint;
use crate::Hash;

/// Reasons the ledger declines a block, and wallet-side failures.
///
/// Every variant is recoverable: a rejected block leaves the ledger untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid predecessor: expected prev_hash {expected}, got {got}")]
    InvalidPredecessor { expected: Hash, got: Hash },

    #[error("invalid index: expected {expected}, got {got}")]
    InvalidIndex { expected: u64, got: u64 },

    #[error("invalid proof of work: hash {hash} needs {difficulty} leading zeros")]
    InvalidProofOfWork { hash: Hash, difficulty: u32 },

    #[error("invalid coinbase in transaction {txid}: {reason}")]
    InvalidCoinbase { txid: Hash, reason: String },

    #[error("transaction {txid} spends unknown output {outpoint}")]
    UnknownInput { txid: Hash, outpoint: OutPoint },

    #[error("transaction {txid} spends {outpoint}, already spent in this block")]
    DoubleSpendWithinBlock { txid: Hash, outpoint: OutPoint },

    #[error("transaction {txid} spends immature output {outpoint} ({confirmations} confirmations)")]
    ImmatureInput {
        txid: Hash,
        outpoint: OutPoint,
        confirmations: u64,
    },

    #[error("transaction {txid} is not signed")]
    MissingSignature { txid: Hash },

    #[error("transaction {txid} has an invalid signature")]
    InvalidSignature { txid: Hash },

    #[error("transaction {txid} spends {outpoint} owned by {owner}, signer is {signer}")]
    InputOwnerMismatch {
        txid: Hash,
        outpoint: OutPoint,
        owner: String,
        signer: String,
    },

    #[error("transaction {txid} creates {outpoint}, which already exists unspent")]
    DuplicateOutput { txid: Hash, outpoint: OutPoint },

    #[error("transaction {txid} spends {inputs} but creates {outputs}")]
    Overspend { txid: Hash, inputs: u64, outputs: u64 },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(u64),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("mining cancelled")]
    MiningCancelled,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
