pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const ADDRESS_HEX_SIZE: usize = 40;
pub const BLOCK_REWARD: u64 = 50;
pub const COINBASE_MATURITY: u64 = 2;
pub const DEFAULT_DIFFICULTY: u32 = 4;
pub const GENESIS_TIMESTAMP: u64 = 0;
/// Address of the zero-value output that tags a coinbase with its height.
pub const COINBASE_MARKER_PREFIX: &str = "coinbase:";

/// All-zero sentinel used as the genesis `prev_hash`.
pub fn zero_hash() -> String {
    "0".repeat(HASH_HEX_SIZE)
}
