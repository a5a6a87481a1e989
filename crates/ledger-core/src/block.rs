use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::canonical;
use crate::constants::{zero_hash, GENESIS_TIMESTAMP};
use crate::transaction::Transaction;
use crate::Hash;

/// A sealed batch of transactions.
///
/// Fields are only reachable through methods that keep `hash` equal to
/// `compute_hash()`. On the wire a block has no hash at all; it is
/// recomputed from content whenever a block is deserialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BlockShape", into = "BlockShape")]
pub struct Block {
    index: u64,
    prev_hash: Hash,
    transactions: Vec<Transaction>,
    timestamp: u64,
    nonce: u64,
    hash: Hash,
}

/// Wire form of a [`Block`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockShape {
    pub index: u64,
    pub prev_hash: Hash,
    pub transactions: Vec<Transaction>,
    pub timestamp: u64,
    pub nonce: u64,
}

impl From<BlockShape> for Block {
    fn from(shape: BlockShape) -> Self {
        Block::with_fields(
            shape.index,
            shape.prev_hash,
            shape.transactions,
            shape.timestamp,
            shape.nonce,
        )
    }
}

impl From<Block> for BlockShape {
    fn from(block: Block) -> Self {
        BlockShape {
            index: block.index,
            prev_hash: block.prev_hash,
            transactions: block.transactions,
            timestamp: block.timestamp,
            nonce: block.nonce,
        }
    }
}

impl Block {
    /// New candidate stamped with the current time and nonce 0.
    pub fn new(index: u64, prev_hash: Hash, transactions: Vec<Transaction>) -> Self {
        Self::with_fields(index, prev_hash, transactions, now_secs(), 0)
    }

    pub fn with_fields(
        index: u64,
        prev_hash: Hash,
        transactions: Vec<Transaction>,
        timestamp: u64,
        nonce: u64,
    ) -> Self {
        let mut block = Self {
            index,
            prev_hash,
            transactions,
            timestamp,
            nonce,
            hash: Hash::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Fixed genesis block, identical on every node.
    pub fn genesis() -> Self {
        Self::with_fields(0, zero_hash(), vec![], GENESIS_TIMESTAMP, 0)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn prev_hash(&self) -> &str {
        &self.prev_hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.compute_hash();
    }

    /// Seals the block with a nonce whose hash the caller already computed
    /// through [`Block::seal_template`].
    pub(crate) fn with_sealed_nonce(mut self, nonce: u64, hash: Hash) -> Self {
        self.nonce = nonce;
        self.hash = hash;
        debug_assert_eq!(self.hash, self.compute_hash());
        self
    }

    /// `{index, nonce, prev_hash, timestamp, transactions}`.
    pub fn canonical_encoding(&self) -> Value {
        json!({
            "index": self.index,
            "prev_hash": self.prev_hash,
            "transactions": self.transactions.iter().map(Transaction::canonical_encoding).collect::<Vec<_>>(),
            "timestamp": self.timestamp,
            "nonce": self.nonce,
        })
    }

    pub fn compute_hash(&self) -> Hash {
        canonical::hash(&self.canonical_encoding())
    }

    /// Encoding split around the nonce, for hashing many nonces without
    /// re-encoding the transactions.
    pub fn seal_template(&self) -> SealTemplate {
        let (prefix, suffix) = canonical::split_at_key(&self.canonical_encoding(), "nonce")
            .unwrap_or_else(|| unreachable!("block encoding always has a nonce"));
        SealTemplate::new(&prefix, suffix)
    }
}

/// Pre-hashed block encoding with a hole where the nonce goes.
#[derive(Clone)]
pub struct SealTemplate {
    prefix_state: Sha256,
    suffix: Vec<u8>,
}

impl SealTemplate {
    fn new(prefix: &[u8], suffix: Vec<u8>) -> Self {
        let mut prefix_state = Sha256::new();
        prefix_state.update(prefix);
        Self {
            prefix_state,
            suffix,
        }
    }

    /// Block hash for `nonce`; equal to `compute_hash()` with that nonce set.
    pub fn hash_with_nonce(&self, nonce: u64) -> Hash {
        let mut state = self.prefix_state.clone();
        state.update(nonce.to_string().as_bytes());
        state.update(&self.suffix);
        hex::encode(state.finalize())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
