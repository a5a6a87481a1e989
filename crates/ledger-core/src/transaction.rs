use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::canonical;
use crate::constants::COINBASE_MARKER_PREFIX;
use crate::crypto::KeyPair;
use crate::Hash;

/// Reference to output `index` of transaction `txid`. Travels as `[txid, index]`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(Hash, u32)", into = "(Hash, u32)")]
pub struct OutPoint {
    pub txid: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<Hash>, index: u32) -> Self {
        Self {
            txid: txid.into(),
            index,
        }
    }
}

impl From<(Hash, u32)> for OutPoint {
    fn from((txid, index): (Hash, u32)) -> Self {
        Self { txid, index }
    }
}

impl From<OutPoint> for (Hash, u32) {
    fn from(outpoint: OutPoint) -> Self {
        (outpoint.txid, outpoint.index)
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// Value sent to an address. Travels as `[address, amount]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, u64)", into = "(String, u64)")]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
}

impl TxOutput {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

impl From<(String, u64)> for TxOutput {
    fn from((address, amount): (String, u64)) -> Self {
        Self { address, amount }
    }
}

impl From<TxOutput> for (String, u64) {
    fn from(output: TxOutput) -> Self {
        (output.address, output.amount)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<TxOutput>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
}

impl Transaction {
    pub fn new(inputs: Vec<OutPoint>, outputs: Vec<TxOutput>) -> Self {
        Self {
            inputs,
            outputs,
            signature: None,
            public_key: None,
        }
    }

    /// Reward transaction: no inputs, one output, unsigned.
    pub fn coinbase(address: impl Into<String>, amount: u64) -> Self {
        Self::new(vec![], vec![TxOutput::new(address, amount)])
    }

    /// Coinbase for the block at `height`, with a zero-value marker output so
    /// that rewards to the same address in different blocks get distinct txids.
    pub fn coinbase_at(height: u64, address: impl Into<String>, amount: u64) -> Self {
        let mut tx = Self::coinbase(address, amount);
        tx.outputs
            .push(TxOutput::new(format!("{COINBASE_MARKER_PREFIX}{height}"), 0));
        tx
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn total_output(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |total, o| total.saturating_add(o.amount))
    }

    /// `{inputs, outputs, signature, public_key}`; unsigned fields are `null`.
    pub fn canonical_encoding(&self) -> Value {
        json!({
            "inputs": self.inputs.iter().map(|i| json!([i.txid, i.index])).collect::<Vec<_>>(),
            "outputs": self.outputs.iter().map(|o| json!([o.address, o.amount])).collect::<Vec<_>>(),
            "signature": self.signature,
            "public_key": self.public_key,
        })
    }

    /// Content identifier. Changes when a signature is attached.
    pub fn txid(&self) -> Hash {
        canonical::hash(&self.canonical_encoding())
    }

    /// The bytes a spender signs: the encoding with signature fields cleared.
    pub fn signing_payload(&self) -> Vec<u8> {
        let unsigned = Self::new(self.inputs.clone(), self.outputs.clone());
        canonical::encode(&unsigned.canonical_encoding())
    }

    pub fn sign(&mut self, keys: &KeyPair) {
        self.signature = Some(keys.sign(&self.signing_payload()));
        self.public_key = Some(keys.public_key_hex());
    }
}
