use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::info;

use crate::block::Block;
use crate::error::{LedgerError, Result};
use crate::pow::meets_difficulty;

/// Searches nonces in parallel, from the block's current nonce upward, for a
/// hash with at least `difficulty` leading zero hex digits.
///
/// The search is ordered, so the result is the same smallest nonce that
/// [`crate::pow::mine_block`] finds. Setting `cancel` aborts it with
/// [`LedgerError::MiningCancelled`].
pub fn mine_block_parallel(block: Block, difficulty: u32, cancel: &AtomicBool) -> Result<Block> {
    let template = block.seal_template();
    let start = block.nonce();

    let found = (start..u64::MAX).into_par_iter().find_first(|nonce| {
        cancel.load(Ordering::Relaxed) || meets_difficulty(&template.hash_with_nonce(*nonce), difficulty)
    });

    // After cancellation every nonce satisfies the predicate, so re-check.
    let Some(nonce) = found else {
        return Err(LedgerError::MiningCancelled);
    };
    let hash = template.hash_with_nonce(nonce);
    if !meets_difficulty(&hash, difficulty) {
        return Err(LedgerError::MiningCancelled);
    }

    info!(index = block.index(), nonce, hash = %hash, "block sealed");
    Ok(block.with_sealed_nonce(nonce, hash))
}
